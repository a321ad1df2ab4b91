//! # Sieve Module
//!
//! Drives a run end-to-end: inventory scan, cache open, exact stage, media
//! stage, cache finalize, and the aggregated result.
//!
//! ## Sequencing
//! Stages run strictly one after another; all exact moves complete before
//! any media signature is computed, and the moved paths are excluded from
//! the media input. The orchestrator thread owns the cache, the moved-path
//! set, and the stats; workers only ever return pure values.
//!
//! Every run gets a fresh 128-bit random identifier. Rows the run touches
//! are stamped with it, and pruning at the end deletes everything else, so
//! the cache tracks the live inventory.

use crate::config::{Mode, SieveConfig, SieveOptions};
use crate::core::cache::SignatureCache;
use crate::core::exact::{run_exact_pipeline, MoveRecord};
use crate::core::media::{
    run_media_pipeline, MediaCluster, MediaOutcome, MediaSettings, SimilarityThresholds,
};
use crate::core::scanner::scan_trees;
use crate::error::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::debug;
use uuid::Uuid;

/// Wall-clock seconds spent in each stage
#[derive(Debug, Clone, Default, Serialize)]
pub struct StageTimings {
    pub scan: f64,
    pub cache_open: f64,
    pub exact: f64,
    pub media: f64,
    pub cache_finalize: f64,
}

/// Aggregate counters for one run
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub files_scanned: usize,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_hit_ratio: f64,
    pub bytes_read_exact: u64,
    pub bytes_read_verify: u64,
    pub timings_by_stage: StageTimings,
}

/// Everything a completed run produced
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub duplicates_moved: Vec<MoveRecord>,
    pub similar_media: Vec<MediaCluster>,
    /// Non-moved files grouped by size, for callers that want the classic
    /// per-size view of what remains in place.
    pub files_by_size: BTreeMap<u64, Vec<PathBuf>>,
    pub stats: RunStats,
}

/// The deduplication engine
pub struct Sieve {
    config: SieveConfig,
}

impl Sieve {
    /// Build an engine from explicit options merged over config file and
    /// defaults. Fails fast on any invalid configuration.
    pub fn new(options: SieveOptions) -> Result<Self> {
        Ok(Self {
            config: SieveConfig::resolve(options)?,
        })
    }

    pub fn config(&self) -> &SieveConfig {
        &self.config
    }

    fn media_settings(&self) -> MediaSettings {
        MediaSettings {
            workers: self.config.media_workers,
            ffmpeg_path: self.config.media.ffmpeg_path.clone(),
            ffprobe_path: self.config.media.ffprobe_path.clone(),
            thresholds: SimilarityThresholds {
                image_hamming: self.config.media.image_hamming_threshold,
                video_hamming: self.config.media.video_hamming_threshold,
                video_frame_hamming: self.config.media.video_frame_hamming_threshold,
                duration_bucket_seconds: self.config.media.duration_bucket_seconds,
            },
        }
    }

    /// Run the engine over one or more base directory trees.
    pub fn run(&self, bases: &[PathBuf]) -> Result<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let mut timings = StageTimings::default();

        let started = Instant::now();
        let files = scan_trees(bases, &self.config.dup_dir);
        timings.scan = started.elapsed().as_secs_f64();
        debug!(run_id = %run_id, files = files.len(), "inventory scan complete");

        let started = Instant::now();
        let mut cache = if self.config.no_cache {
            None
        } else {
            Some(SignatureCache::open(&self.config.cache_db)?)
        };
        timings.cache_open = started.elapsed().as_secs_f64();

        let started = Instant::now();
        let exact = run_exact_pipeline(
            &files,
            &self.config.dup_dir,
            self.config.hash_workers,
            cache.as_mut(),
            &run_id,
        );
        timings.exact = started.elapsed().as_secs_f64();
        debug!(
            run_id = %run_id,
            moved = exact.duplicates_moved.len(),
            "exact stage complete"
        );

        let started = Instant::now();
        let media = if self.config.mode == Mode::Media && self.config.media.enabled {
            run_media_pipeline(
                &files,
                &exact.moved_paths,
                &self.media_settings(),
                cache.as_mut(),
                &run_id,
            )
        } else {
            MediaOutcome::default()
        };
        timings.media = started.elapsed().as_secs_f64();

        let started = Instant::now();
        if let Some(mut open_cache) = cache.take() {
            open_cache.commit()?;
            open_cache.prune_stale(&run_id)?;
            open_cache.close()?;
        }
        timings.cache_finalize = started.elapsed().as_secs_f64();

        let mut files_by_size: BTreeMap<u64, Vec<PathBuf>> = BTreeMap::new();
        for record in &files {
            if !exact.moved_paths.contains(record.path()) {
                files_by_size
                    .entry(record.identity.size)
                    .or_default()
                    .push(record.path().to_path_buf());
            }
        }

        let cache_hits = exact.cache_hits + media.cache_hits;
        let cache_misses = exact.cache_misses + media.cache_misses;
        let lookups = cache_hits + cache_misses;

        Ok(RunReport {
            duplicates_moved: exact.duplicates_moved,
            similar_media: media.similar_media,
            files_by_size,
            stats: RunStats {
                files_scanned: files.len(),
                cache_hits,
                cache_misses,
                cache_hit_ratio: if lookups > 0 {
                    cache_hits as f64 / lookups as f64
                } else {
                    0.0
                },
                bytes_read_exact: exact.bytes_read_exact,
                bytes_read_verify: exact.bytes_read_verify,
                timings_by_stage: timings,
            },
        })
    }
}
