//! finviz stores one spreadsheet per user and year of monthly financial amounts and serves them
//! to a browser dashboard.
//!
//! The crate is split into the command handlers in [`commands`], which hold the upload and
//! retrieval logic, and the two interfaces that drive them: the HTTP API in [`server`] and the
//! command line in [`args`].

pub mod args;
pub mod commands;
mod config;
mod db;
mod error;
mod import;
pub mod model;
pub mod server;
pub mod staging;
#[cfg(test)]
mod test;
mod utils;

pub use config::Config;
pub use error::{Error, ErrorType, IntoResult, Result};
