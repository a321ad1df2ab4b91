//! # Core Module
//!
//! The deduplication engine, GUI- and CLI-agnostic.
//!
//! - `scanner` - inventory records and the filesystem walk
//! - `cache` - persistent signature memo
//! - `pool` - bounded parallel execution
//! - `exact` - staged byte-identical duplicate elimination
//! - `media` - perceptual similarity clustering
//! - `sieve` - run orchestration
//! - `report` - JSON similarity report

pub mod cache;
pub mod exact;
pub mod media;
pub mod pool;
pub mod report;
pub mod scanner;
pub mod sieve;
