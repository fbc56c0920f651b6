//! Public error type for finviz operations.
//!
//! Internally we use `anyhow` and attach context as we go. At the boundary of a public operation
//! the `anyhow::Error` is classified with an `ErrorType` via `IntoResult::pub_result`, which is
//! what the HTTP layer uses to pick a status code.

use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};

/// The result type returned by public finviz operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The broad class of a failure.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    /// A referenced user does not exist.
    NotFound,
    /// The spreadsheet is unreadable, lacks the required columns or has no usable rows.
    InvalidFormat,
    /// The upload was refused at the boundary: no file, wrong type or too large.
    UploadRejected,
    /// A request parameter could not be understood.
    BadRequest,
    /// A database statement or transaction failed.
    Storage,
    /// Writing or removing a file failed.
    Filesystem,
    /// The configuration or home directory is unusable.
    Config,
    /// A background task failed to complete, e.g. it panicked.
    Internal,
}

serde_plain::derive_display_from_serialize!(ErrorType);

/// An error with a classification, a message that is safe to show to a caller and, optionally,
/// the underlying cause.
pub struct Error {
    error_type: ErrorType,
    message: String,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Create an error that has no underlying cause.
    pub fn new(error_type: ErrorType, message: impl Into<String>) -> Self {
        Self {
            error_type,
            message: message.into(),
            source: None,
        }
    }

    /// Create an error that wraps `source`.
    pub fn with_source(
        error_type: ErrorType,
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self {
            error_type,
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn error_type(&self) -> ErrorType {
        self.error_type
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// The full chain of the underlying cause, if there is one.
    pub fn details(&self) -> Option<String> {
        self.source.as_ref().map(|e| format!("{e:#}"))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let source: &anyhow::Error = self.source.as_ref()?;
        Some(source.as_ref())
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Error")
            .field("error_type", &self.error_type)
            .field("message", &self.message)
            .field("details", &self.details())
            .finish()
    }
}

/// Converts an internal `anyhow` result into a public `Result`.
pub trait IntoResult<T> {
    /// Classify the error, if any, as `error_type`. The outermost context becomes the message.
    fn pub_result(self, error_type: ErrorType) -> Result<T>;
}

impl<T> IntoResult<T> for anyhow::Result<T> {
    fn pub_result(self, error_type: ErrorType) -> Result<T> {
        self.map_err(|e| {
            let message = e.to_string();
            Error::with_source(error_type, message, e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_pub_result_keeps_outer_context_as_message() {
        let res: anyhow::Result<()> = Err(anyhow::anyhow!("disk on fire")).context("Write failed");
        let err = res.pub_result(ErrorType::Filesystem).unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Filesystem);
        assert_eq!(err.message(), "Write failed");
        assert_eq!(err.details().unwrap(), "Write failed: disk on fire");
    }

    #[test]
    fn test_error_without_source_has_no_details() {
        let err = Error::new(ErrorType::NotFound, "User not found");
        assert!(err.details().is_none());
        assert_eq!(err.to_string(), "User not found");
    }

    #[test]
    fn test_error_type_display() {
        assert_eq!(ErrorType::InvalidFormat.to_string(), "invalid_format");
    }
}
