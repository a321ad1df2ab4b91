//! # FileSieve
//!
//! Finds byte-identical duplicate files beneath one or more directory trees
//! and moves all but the oldest copy into a mirrored destination tree.
//! Optionally clusters perceptually-similar images and videos into an
//! advisory report.
//!
//! ## Architecture
//! - `core` - the deduplication engine (scan, cache, exact, media, report)
//! - `config` - layered configuration folded into one validated record
//! - `error` - error types
//!
//! The staged exact pipeline eliminates candidates cheaply before it ever
//! reads a file in full: size grouping, then sampled quick hashes, then
//! full-file hashes, then byte-for-byte verification. A persistent signature
//! cache memoizes both exact and perceptual fingerprints across runs, keyed
//! by the file's full stat identity.

pub mod config;
pub mod core;
pub mod error;

// Re-export the common entry points at the crate root
pub use config::{Mode, SieveOptions};
pub use crate::core::sieve::{RunReport, Sieve};
pub use error::{FileSieveError, Result};
