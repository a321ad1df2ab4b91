//! # Media Pipeline Module
//!
//! Advisory clustering of perceptually-similar images and videos. This stage
//! never moves files; it only reports clusters.
//!
//! ## Flow
//! 1. Resolve ffmpeg/ffprobe; if either is missing, warn once and return an
//!    empty cluster list without failing the run
//! 2. Serve signatures from the cache where the identity still matches,
//!    schedule the misses on the worker pool
//! 3. Block, compare, and union-find the signature set into clusters
//!
//! Files the exact stage already moved are excluded up front. Per-file probe
//! or extraction failures drop that file from the signature set.

pub mod cluster;
pub mod signature;
pub mod tools;

pub use cluster::{cluster_signatures, MediaCluster, ScoreSummary, SimilarityThresholds};
pub use signature::MediaSignature;
pub use tools::{MediaProbe, MediaTools};

use crate::core::cache::{CacheRecord, SignatureCache, SignatureUpdate};
use crate::core::pool::bounded_for_each;
use crate::core::scanner::{FileIdentity, FileRecord};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::warn;

const MEDIA_IN_FLIGHT_MULTIPLIER: usize = 2;

/// Everything the media stage needs beyond the inventory
#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub workers: usize,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub thresholds: SimilarityThresholds,
}

/// Output of the media stage
#[derive(Debug, Default)]
pub struct MediaOutcome {
    pub similar_media: Vec<MediaCluster>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub tools_available: bool,
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

fn cached_signature(stored: &CacheRecord) -> Option<(MediaSignature, MediaProbe)> {
    let sig = signature::decode_signature(stored.media_sig.as_deref()?)?;
    let probe = signature::decode_probe(stored.media_meta.as_deref()?)?;
    Some((sig, probe))
}

/// Run the perceptual media stage over the remaining inventory.
pub fn run_media_pipeline(
    files: &[FileRecord],
    moved_paths: &HashSet<PathBuf>,
    settings: &MediaSettings,
    mut cache: Option<&mut SignatureCache>,
    run_id: &str,
) -> MediaOutcome {
    let mut outcome = MediaOutcome::default();

    let media_tools = match tools::resolve_media_tools(
        settings.ffmpeg_path.as_deref(),
        settings.ffprobe_path.as_deref(),
    ) {
        Some(found) => found,
        None => {
            warn!(
                ffmpeg = ?settings.ffmpeg_path,
                ffprobe = ?settings.ffprobe_path,
                "media tools unavailable; skipping perceptual media stage"
            );
            return outcome;
        }
    };
    outcome.tools_available = true;

    let candidates: Vec<&FileRecord> = files
        .iter()
        .filter(|record| record.kind.is_media() && !moved_paths.contains(record.path()))
        .collect();
    if candidates.is_empty() {
        return outcome;
    }

    let mut signatures: BTreeMap<PathBuf, (MediaSignature, MediaProbe)> = BTreeMap::new();
    let mut todo: Vec<FileRecord> = Vec::new();

    for record in candidates {
        if let Some(cache) = cache.as_deref_mut() {
            match cache_lookup(cache, &record.identity) {
                Some(stored) => match cached_signature(&stored) {
                    Some(entry) => {
                        outcome.cache_hits += 1;
                        signatures.insert(record.path().to_path_buf(), entry);
                        cache_stamp(cache, &record.identity, stored.into(), run_id);
                        continue;
                    }
                    None => outcome.cache_misses += 1,
                },
                None => outcome.cache_misses += 1,
            }
        }
        todo.push(record.clone());
    }

    bounded_for_each(
        todo,
        settings.workers.max(1),
        MEDIA_IN_FLIGHT_MULTIPLIER,
        |record| signature::compute_signature(record, &media_tools),
        |record, computed| match computed {
            Ok((sig, probe)) => {
                if let Some(cache) = cache.as_deref_mut() {
                    cache_stamp(
                        cache,
                        &record.identity,
                        SignatureUpdate {
                            media_sig: Some(signature::encode_signature(&sig)),
                            media_meta: Some(signature::encode_probe(&probe)),
                            ..Default::default()
                        },
                        run_id,
                    );
                }
                signatures.insert(record.identity.path, (sig, probe));
            }
            Err(err) => {
                warn!(path = %record.path().display(), error = %err, "unable to compute media signature");
            }
        },
    );

    outcome.similar_media = cluster_signatures(&signatures, &settings.thresholds);
    outcome
}
