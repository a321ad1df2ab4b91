//! Inventory traversal using walkdir.

use super::FileRecord;
use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Walk every base directory and collect metadata records.
///
/// Depth-first with siblings visited in name order, so repeated runs over an
/// unchanged tree produce the same inventory sequence. Symlinks are never
/// followed; anything at or beneath `dup_dir` is skipped so a destination
/// nested inside a base does not feed moved files back into the run.
///
/// Unreadable directories and unstatable files are logged and skipped; the
/// scan itself never fails.
pub fn scan_trees(bases: &[PathBuf], dup_dir: &Path) -> Vec<FileRecord> {
    let mut records = Vec::new();
    for base in bases {
        scan_tree(base, dup_dir, &mut records);
    }
    records
}

fn scan_tree(base: &Path, dup_dir: &Path, records: &mut Vec<FileRecord>) {
    let walker = WalkDir::new(base)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !entry.path().starts_with(dup_dir));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| base.to_path_buf());
                warn!(path = %path.display(), error = %err, "unable to read directory entry; skipping");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        match entry.metadata() {
            Ok(metadata) => records.push(FileRecord::from_metadata(entry.path(), &metadata)),
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "unable to stat file; omitting from inventory");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::write(path, b"payload").unwrap();
    }

    #[test]
    fn scan_empty_directory_returns_empty_inventory() {
        let temp_dir = TempDir::new().unwrap();
        let dup_dir = temp_dir.path().join("dups");

        let records = scan_trees(&[temp_dir.path().to_path_buf()], &dup_dir);

        assert!(records.is_empty());
    }

    #[test]
    fn scan_collects_nested_files_in_name_order() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("albums");
        fs::create_dir(&subdir).unwrap();
        touch(&temp_dir.path().join("b.txt"));
        touch(&temp_dir.path().join("a.txt"));
        touch(&subdir.join("c.jpg"));

        let records = scan_trees(
            &[temp_dir.path().to_path_buf()],
            &temp_dir.path().join("dups"),
        );

        let names: Vec<_> = records
            .iter()
            .map(|r| r.path().file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.txt", "c.jpg", "b.txt"]);
    }

    #[test]
    fn scan_skips_duplicate_destination_subtree() {
        let temp_dir = TempDir::new().unwrap();
        let dup_dir = temp_dir.path().join("dups");
        fs::create_dir(&dup_dir).unwrap();
        touch(&temp_dir.path().join("keep.bin"));
        touch(&dup_dir.join("already-moved.bin"));

        let records = scan_trees(&[temp_dir.path().to_path_buf()], &dup_dir);

        assert_eq!(records.len(), 1);
        assert!(records[0].path().ends_with("keep.bin"));
    }

    #[test]
    #[cfg(unix)]
    fn scan_does_not_follow_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("real.bin");
        touch(&target);
        std::os::unix::fs::symlink(&target, temp_dir.path().join("alias.bin")).unwrap();

        let records = scan_trees(
            &[temp_dir.path().to_path_buf()],
            &temp_dir.path().join("dups"),
        );

        assert_eq!(records.len(), 1);
        assert!(records[0].path().ends_with("real.bin"));
    }

    #[test]
    fn scan_nonexistent_base_yields_nothing() {
        let records = scan_trees(
            &[PathBuf::from("/nonexistent/path/12345")],
            Path::new("/tmp/dups"),
        );
        assert!(records.is_empty());
    }

    #[test]
    fn scan_many_combines_roots() {
        let root_a = TempDir::new().unwrap();
        let root_b = TempDir::new().unwrap();
        touch(&root_a.path().join("one.bin"));
        touch(&root_b.path().join("two.bin"));

        let records = scan_trees(
            &[root_a.path().to_path_buf(), root_b.path().to_path_buf()],
            Path::new("/tmp/dups"),
        );

        assert_eq!(records.len(), 2);
    }
}
