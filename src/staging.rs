//! Temporary on-disk copies of uploaded spreadsheets.
//!
//! A `StagedUpload` owns its file. Dropping it deletes the file, so the file cannot outlive the
//! upload no matter how the upload ends. `discard` does the same thing but reports a failed
//! delete in the log.

use crate::error::{ErrorType, IntoResult};
use crate::Result;
use anyhow::Context;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::{Builder, NamedTempFile};
use tracing::{debug, warn};

const PREFIX: &str = "upload-";
const SUFFIX: &str = ".xlsx";

#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
    original_name: String,
    len: u64,
}

impl StagedUpload {
    /// Writes `bytes` to a new file in `dir`.
    pub async fn write(
        dir: impl Into<PathBuf>,
        original_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<Self> {
        let dir = dir.into();
        let original_name = original_name.into();
        tokio::task::spawn_blocking(move || -> anyhow::Result<Self> {
            let mut file = new_file(&dir)?;
            file.write_all(&bytes)
                .and_then(|_| file.flush())
                .with_context(|| format!("Unable to write to {}", file.path().display()))?;
            debug!(
                "Staged '{original_name}' ({} bytes) at {}",
                bytes.len(),
                file.path().display()
            );
            Ok(Self {
                file,
                original_name,
                len: bytes.len() as u64,
            })
        })
        .await
        .context("The staging task failed")
        .and_then(|res| res)
        .pub_result(ErrorType::Filesystem)
    }

    /// Stages a copy of the local file at `source`. The source file itself is never removed.
    pub async fn copy_from(dir: impl Into<PathBuf>, source: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(source)
            .await
            .with_context(|| format!("Failed to read file at {}", source.display()))
            .pub_result(ErrorType::Filesystem)?;
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::write(dir, name, bytes).await
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// The name the file had on the client.
    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Deletes the staged file. A failure is logged and otherwise ignored.
    pub fn discard(self) {
        let path = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => debug!("Removed staged upload {}", path.display()),
            Err(e) => warn!("Unable to remove staged upload {}: {e}", path.display()),
        }
    }
}

fn new_file(dir: &Path) -> anyhow::Result<NamedTempFile> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Unable to create directory {}", dir.display()))?;
    Builder::new()
        .prefix(PREFIX)
        .suffix(SUFFIX)
        .tempfile_in(dir)
        .with_context(|| format!("Unable to create a staging file in {}", dir.display()))
}
