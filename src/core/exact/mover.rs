//! Relocation of verified duplicates into the mirrored destination tree.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

/// Mirror an absolute source path beneath `dup_dir`.
///
/// The leading separator is stripped so the full directory structure is
/// reproduced under the destination root; drive prefixes become a
/// `drive_<letter>` component so sources from different volumes cannot
/// collide.
pub fn mirror_destination(source: &Path, dup_dir: &Path) -> PathBuf {
    let source = absolutize(source);
    let mut relative = PathBuf::new();
    for component in source.components() {
        match component {
            Component::Prefix(prefix) => {
                let token: String = prefix
                    .as_os_str()
                    .to_string_lossy()
                    .chars()
                    .filter(|c| !matches!(c, ':' | '\\' | '/'))
                    .collect();
                relative.push(format!("drive_{token}"));
            }
            Component::RootDir | Component::CurDir => {}
            Component::ParentDir => {}
            Component::Normal(part) => relative.push(part),
        }
    }
    dup_dir.join(relative)
}

/// Move `source` to its mirrored destination, creating intermediate
/// directories. Falls back to copy-and-remove when rename crosses devices.
pub fn relocate(source: &Path, dup_dir: &Path) -> io::Result<PathBuf> {
    let destination = mirror_destination(source, dup_dir);
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    if fs::rename(source, &destination).is_err() {
        fs::copy(source, &destination)?;
        fs::remove_file(source)?;
    }
    Ok(destination)
}
