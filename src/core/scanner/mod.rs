//! # Scanner Module
//!
//! Builds the run inventory: one metadata record per regular file found
//! beneath the base directories.
//!
//! ## Records
//! - `FileIdentity` - the `(path, size, mtime_ns, dev, ino)` tuple used as
//!   the cache key and invalidation predicate
//! - `FileRecord` - identity plus lowercased extension and media kind
//!
//! Classification is by extension membership in fixed sets; everything else
//! is `FileKind::Other` and only participates in the exact pipeline.

mod walker;

pub use walker::scan_trees;

use std::path::{Path, PathBuf};

/// Extensions treated as still images.
const IMAGE_EXTENSIONS: &[&str] = &[
    "bmp", "gif", "heic", "heif", "jpeg", "jpg", "png", "tif", "tiff", "webp",
];

/// Extensions treated as videos.
const VIDEO_EXTENSIONS: &[&str] = &[
    "3gp", "avi", "flv", "m2ts", "m4v", "mkv", "mov", "mp4", "mpeg", "mpg", "ts", "webm", "wmv",
];

/// Media classification of a scanned file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Image,
    Video,
    Other,
}

impl FileKind {
    /// Classify a lowercased extension.
    pub fn from_extension(extension: &str) -> Self {
        if IMAGE_EXTENSIONS.contains(&extension) {
            FileKind::Image
        } else if VIDEO_EXTENSIONS.contains(&extension) {
            FileKind::Video
        } else {
            FileKind::Other
        }
    }

    /// True for kinds the media pipeline can fingerprint.
    pub fn is_media(self) -> bool {
        matches!(self, FileKind::Image | FileKind::Video)
    }
}

/// The stat identity of a file: cache key and invalidation predicate.
///
/// `path` catches renames, `size`/`mtime_ns` catch edits, `dev`/`ino` catch
/// hard-link or remount anomalies. Any component mismatch invalidates every
/// cached fingerprint for the path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FileIdentity {
    pub path: PathBuf,
    pub size: u64,
    pub mtime_ns: i64,
    pub dev: u64,
    pub ino: u64,
}

/// A scanned file: identity plus classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub identity: FileIdentity,
    /// Lowercased extension, empty when the file has none.
    pub extension: String,
    pub kind: FileKind,
}

impl FileRecord {
    /// Build a record from a path and its stat metadata.
    pub fn from_metadata(path: &Path, metadata: &std::fs::Metadata) -> Self {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let kind = FileKind::from_extension(&extension);
        Self {
            identity: identity_from_metadata(path, metadata),
            extension,
            kind,
        }
    }

    pub fn path(&self) -> &Path {
        &self.identity.path
    }
}

#[cfg(unix)]
fn identity_from_metadata(path: &Path, metadata: &std::fs::Metadata) -> FileIdentity {
    use std::os::unix::fs::MetadataExt;
    FileIdentity {
        path: path.to_path_buf(),
        size: metadata.len(),
        mtime_ns: metadata
            .mtime()
            .saturating_mul(1_000_000_000)
            .saturating_add(metadata.mtime_nsec()),
        dev: metadata.dev(),
        ino: metadata.ino(),
    }
}

#[cfg(not(unix))]
fn identity_from_metadata(path: &Path, metadata: &std::fs::Metadata) -> FileIdentity {
    // No dev/ino on this platform; size + mtime still invalidate edits.
    let mtime_ns = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_nanos().min(i64::MAX as u128) as i64)
        .unwrap_or(0);
    FileIdentity {
        path: path.to_path_buf(),
        size: metadata.len(),
        mtime_ns,
        dev: 0,
        ino: 0,
    }
}
