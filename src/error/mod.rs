//! # Error Module
//!
//! Error types for the deduplication engine.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - paths, file names, what went wrong
//! - **Recover locally** - only configuration and cache-open failures are
//!   fatal; per-file problems are logged and the file is dropped from the
//!   affected stage
//!
//! Scan failures and per-file hashing failures intentionally have no error
//! type of their own: they never cross an API boundary. The affected subtree
//! or candidate is logged and skipped.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum FileSieveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Errors raised while building the effective configuration.
///
/// All of these are fatal at construction time; a run never starts with a
/// partially-valid configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid mode: {value} (expected \"exact\" or \"media\")")]
    InvalidMode { value: String },

    #[error("base path is not a directory or does not exist: {path}")]
    BaseDirInvalid { path: PathBuf },

    #[error("unable to use duplicate directory {path}: {reason}")]
    DupDirUnusable { path: PathBuf, reason: String },

    #[error("{field} must be a positive integer, got {value}")]
    InvalidWorkerCount { field: &'static str, value: i64 },

    #[error("{field} must be positive, got {value}")]
    InvalidThreshold { field: &'static str, value: i64 },

    #[error("config file does not exist: {path}")]
    MissingConfigFile { path: PathBuf },

    #[error("failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Errors from the persistent signature cache
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("failed to open cache database at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("cache query failed: {0}")]
    QueryFailed(String),
}

/// Errors from the external media tools and signature computation
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("probe failed for {path}: {reason}")]
    Probe { path: PathBuf, reason: String },

    #[error("frame extraction failed for {path}: {reason}")]
    Frame { path: PathBuf, reason: String },

    #[error("cannot compute signature for {path}: {reason}")]
    Signature { path: PathBuf, reason: String },
}

/// Errors while writing the similarity report
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("failed to write report to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, FileSieveError>;
