//! # Report Module
//!
//! Writes the similarity-cluster report as pretty-printed JSON with sorted
//! keys and a trailing newline, matching the layout of archived reports.

use crate::core::media::MediaCluster;
use crate::error::ReportError;
use std::fs;
use std::io;
use std::path::Path;

/// Write `clusters` to `path` as JSON.
pub fn write_similar_report(path: &Path, clusters: &[MediaCluster]) -> Result<(), ReportError> {
    // Going through Value sorts object keys, which keeps the output diffable
    // against reports from earlier runs.
    let value = serde_json::to_value(clusters).map_err(|e| ReportError::Write {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })?;
    let mut payload = serde_json::to_string_pretty(&value).map_err(|e| ReportError::Write {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })?;
    payload.push('\n');

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| ReportError::Write {
                path: path.to_path_buf(),
                source: e,
            })?;
        }
    }
    fs::write(path, payload).map_err(|e| ReportError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}
