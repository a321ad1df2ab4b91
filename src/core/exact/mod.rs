//! # Exact Pipeline Module
//!
//! Staged elimination of byte-identical duplicates.
//!
//! ## Stages
//! 1. **Size grouping** - files of differing sizes are never duplicates
//! 2. **Quick hash** - 128-bit BLAKE2b over three 64 KiB samples
//! 3. **Full hash** - 256-bit BLAKE2b over the whole file
//! 4. **Byte verification** - the canonical member is compared byte-by-byte
//!    against every candidate before anything is touched
//! 5. **Move** - verified duplicates relocate to a mirrored tree
//!
//! Each hashing stage consults the signature cache first and only schedules
//! misses on the worker pool. Cache reads and writes stay on the calling
//! thread, interleaved with result consumption.
//!
//! The canonical member of a group is the one with minimum
//! `(mtime_ns, path)`: the oldest copy wins, paths break ties.

pub mod hashing;
pub mod mover;

use crate::core::cache::{CacheRecord, SignatureCache, SignatureUpdate};
use crate::core::pool::bounded_for_each;
use crate::core::scanner::{FileIdentity, FileRecord};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

const EXACT_IN_FLIGHT_MULTIPLIER: usize = 4;

/// One successfully relocated duplicate
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MoveRecord {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kept: PathBuf,
}

/// Aggregate exact-stage output and metrics
#[derive(Debug, Default)]
pub struct ExactOutcome {
    pub duplicates_moved: Vec<MoveRecord>,
    pub moved_paths: HashSet<PathBuf>,
    pub bytes_read_exact: u64,
    pub bytes_read_verify: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

#[derive(Debug, Clone, Copy)]
enum HashStage {
    Quick,
    Full,
}

impl HashStage {
    fn cached<'a>(self, record: &'a CacheRecord) -> Option<&'a str> {
        match self {
            HashStage::Quick => record.quick_hash.as_deref(),
            HashStage::Full => record.full_hash.as_deref(),
        }
    }

    fn compute(self, record: &FileRecord) -> io::Result<(String, u64)> {
        match self {
            HashStage::Quick => hashing::quick_hash(record.path(), record.identity.size),
            HashStage::Full => hashing::full_hash(record.path()),
        }
    }

    fn update(self, digest: String) -> SignatureUpdate {
        match self {
            HashStage::Quick => SignatureUpdate {
                quick_hash: Some(digest),
                ..Default::default()
            },
            HashStage::Full => SignatureUpdate {
                full_hash: Some(digest),
                ..Default::default()
            },
        }
    }

    fn label(self) -> &'static str {
        match self {
            HashStage::Quick => "quick",
            HashStage::Full => "full",
        }
    }
}

fn cache_lookup(cache: &mut SignatureCache, identity: &FileIdentity) -> Option<CacheRecord> {
    match cache.get(identity) {
        Ok(found) => found,
        Err(err) => {
            warn!(path = %identity.path.display(), error = %err, "cache lookup failed; treating as miss");
            None
        }
    }
}

fn cache_stamp(
    cache: &mut SignatureCache,
    identity: &FileIdentity,
    update: SignatureUpdate,
    run_id: &str,
) {
    if let Err(err) = cache.upsert(identity, update, run_id) {
        warn!(path = %identity.path.display(), error = %err, "cache update failed");
    }
}

/// Resolve one digest per candidate, consuming the cache where possible and
/// scheduling the remainder on the worker pool. Files whose reads fail are
/// logged and left out of the returned map, which drops them from every
/// later stage.
fn resolve_hashes(
    candidates: &[FileRecord],
    stage: HashStage,
    workers: usize,
    cache: &mut Option<&mut SignatureCache>,
    run_id: &str,
    outcome: &mut ExactOutcome,
) -> BTreeMap<PathBuf, String> {
    let mut digests: BTreeMap<PathBuf, String> = BTreeMap::new();
    let mut todo: Vec<FileRecord> = Vec::new();

    for record in candidates {
        if let Some(cache) = cache.as_deref_mut() {
            match cache_lookup(cache, &record.identity) {
                Some(stored) => {
                    if let Some(digest) = stage.cached(&stored).map(str::to_string) {
                        outcome.cache_hits += 1;
                        digests.insert(record.path().to_path_buf(), digest);
                        cache_stamp(cache, &record.identity, stored.into(), run_id);
                        continue;
                    }
                    outcome.cache_misses += 1;
                }
                None => outcome.cache_misses += 1,
            }
        }
        todo.push(record.clone());
    }

    bounded_for_each(
        todo,
        workers.max(1),
        EXACT_IN_FLIGHT_MULTIPLIER,
        |record| stage.compute(record),
        |record, computed| match computed {
            Ok((digest, bytes_read)) => {
                outcome.bytes_read_exact += bytes_read;
                if let Some(cache) = cache.as_deref_mut() {
                    cache_stamp(cache, &record.identity, stage.update(digest.clone()), run_id);
                }
                digests.insert(record.identity.path, digest);
            }
            Err(err) => {
                warn!(
                    path = %record.path().display(),
                    stage = stage.label(),
                    error = %err,
                    "unable to hash file; dropping from candidate set"
                );
            }
        },
    );

    digests
}

/// Group candidates by `(size, digest)`, dropping files with no digest.
fn regroup<'a>(
    candidates: &'a [FileRecord],
    digests: &BTreeMap<PathBuf, String>,
) -> BTreeMap<(u64, String), Vec<&'a FileRecord>> {
    let mut groups: BTreeMap<(u64, String), Vec<&'a FileRecord>> = BTreeMap::new();
    for record in candidates {
        if let Some(digest) = digests.get(record.path()) {
            groups
                .entry((record.identity.size, digest.clone()))
                .or_default()
                .push(record);
        }
    }
    groups
}

/// Byte-verify one full-hash group against its canonical member and move the
/// confirmed duplicates. Mismatches are collision anomalies: logged, nothing
/// touched.
fn settle_full_hash_group(members: &[&FileRecord], dup_dir: &Path, outcome: &mut ExactOutcome) {
    let mut ordered: Vec<&FileRecord> = members.to_vec();
    ordered.sort_by(|a, b| {
        (a.identity.mtime_ns, a.path()).cmp(&(b.identity.mtime_ns, b.path()))
    });
    let canonical = ordered[0];

    for candidate in &ordered[1..] {
        let (equal, bytes_read) = match hashing::compare_files(canonical.path(), candidate.path())
        {
            Ok(result) => result,
            Err(err) => {
                warn!(
                    path = %candidate.path().display(),
                    error = %err,
                    "unable to byte-verify candidate; skipping"
                );
                continue;
            }
        };
        outcome.bytes_read_verify += bytes_read;

        if !equal {
            warn!(
                "Hash collision anomaly detected; skipping move for {}",
                candidate.path().display()
            );
            continue;
        }

        match mover::relocate(candidate.path(), dup_dir) {
            Ok(destination) => {
                outcome.moved_paths.insert(candidate.path().to_path_buf());
                outcome.duplicates_moved.push(MoveRecord {
                    source: candidate.path().to_path_buf(),
                    destination,
                    kept: canonical.path().to_path_buf(),
                });
            }
            Err(err) => {
                error!(
                    path = %candidate.path().display(),
                    error = %err,
                    "Unable to move duplicate file"
                );
            }
        }
    }
}

/// Run the staged exact pipeline over the inventory.
pub fn run_exact_pipeline(
    files: &[FileRecord],
    dup_dir: &Path,
    hash_workers: usize,
    mut cache: Option<&mut SignatureCache>,
    run_id: &str,
) -> ExactOutcome {
    let mut outcome = ExactOutcome::default();

    let mut size_groups: BTreeMap<u64, Vec<&FileRecord>> = BTreeMap::new();
    for record in files {
        size_groups
            .entry(record.identity.size)
            .or_default()
            .push(record);
    }
    let candidates: Vec<FileRecord> = size_groups
        .values()
        .filter(|group| group.len() > 1)
        .flat_map(|group| group.iter().map(|record| (*record).clone()))
        .collect();
    if candidates.is_empty() {
        return outcome;
    }

    let quick_digests = resolve_hashes(
        &candidates,
        HashStage::Quick,
        hash_workers,
        &mut cache,
        run_id,
        &mut outcome,
    );
    let quick_groups = regroup(&candidates, &quick_digests);

    let full_candidates: Vec<FileRecord> = quick_groups
        .values()
        .filter(|group| group.len() > 1)
        .flat_map(|group| group.iter().map(|record| (*record).clone()))
        .collect();
    if full_candidates.is_empty() {
        return outcome;
    }

    let full_digests = resolve_hashes(
        &full_candidates,
        HashStage::Full,
        hash_workers,
        &mut cache,
        run_id,
        &mut outcome,
    );
    let full_groups = regroup(&full_candidates, &full_digests);

    for group in full_groups.values() {
        if group.len() > 1 {
            settle_full_hash_group(group, dup_dir, &mut outcome);
        }
    }

    outcome
}
