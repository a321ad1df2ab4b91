//! # CLI Module
//!
//! Command-line interface for the deduplication engine.
//!
//! ## Usage
//! ```bash
//! # Move duplicates out of a tree
//! filesieve ~/media --alternate /tmp/sieve/dups --mode exact
//!
//! # Full run with a similarity report
//! filesieve ~/media --report-similar similar.json
//!
//! # Without the signature cache
//! filesieve ~/media --no-cache
//! ```

use clap::{Parser, ValueEnum};
use console::{style, Term};
use filesieve::config::Mode;
use filesieve::core::report::write_similar_report;
use filesieve::error::ConfigError;
use filesieve::{Result, RunReport, Sieve, SieveOptions};
use std::path::PathBuf;

/// Move duplicate files into an alternate directory, leaving only unique
/// files in the base directory trees.
#[derive(Parser, Debug)]
#[command(name = "filesieve")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Base directory trees to search
    #[arg(required = true)]
    base: Vec<PathBuf>,

    /// Move duplicate files into this directory (created if absent)
    #[arg(short, long)]
    alternate: Option<PathBuf>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pipeline selection
    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    /// Override the cache database path
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Disable the signature cache
    #[arg(long)]
    no_cache: bool,

    /// Exact-stage hashing threads
    #[arg(long)]
    hash_workers: Option<usize>,

    /// Media signature threads
    #[arg(long)]
    media_workers: Option<usize>,

    /// ffmpeg executable override
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// ffprobe executable override
    #[arg(long)]
    ffprobe: Option<PathBuf>,

    /// Write the similarity clusters to this file as JSON
    #[arg(long)]
    report_similar: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Exact duplicates only
    Exact,
    /// Exact duplicates plus perceptual similarity clusters
    Media,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Exact => Mode::Exact,
            ModeArg::Media => Mode::Media,
        }
    }
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    for base in &cli.base {
        if !base.is_dir() {
            return Err(ConfigError::BaseDirInvalid { path: base.clone() }.into());
        }
    }

    let options = SieveOptions {
        dup_dir: cli.alternate,
        config_path: cli.config,
        mode: cli.mode.map(Mode::from),
        cache_db: cli.cache,
        no_cache: cli.no_cache,
        hash_workers: cli.hash_workers,
        media_workers: cli.media_workers,
        ffmpeg_path: cli.ffmpeg,
        ffprobe_path: cli.ffprobe,
        ..Default::default()
    };

    let sieve = Sieve::new(options)?;
    let report = sieve.run(&cli.base)?;

    if let Some(report_path) = cli.report_similar.as_deref() {
        write_similar_report(report_path, &report.similar_media)?;
    }

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &RunReport) {
    let term = Term::stderr();
    let stats = &report.stats;

    term.write_line("").ok();
    term.write_line(&format!("{} Run complete", style("✓").green().bold()))
        .ok();
    term.write_line(&format!(
        "  {} files scanned in {:.1}s",
        style(stats.files_scanned).cyan(),
        stats.timings_by_stage.scan
            + stats.timings_by_stage.exact
            + stats.timings_by_stage.media
    ))
    .ok();
    term.write_line(&format!(
        "  {} duplicates moved ({} read, {} verified)",
        style(report.duplicates_moved.len()).cyan(),
        format_bytes(stats.bytes_read_exact),
        format_bytes(stats.bytes_read_verify),
    ))
    .ok();
    if !report.similar_media.is_empty() {
        term.write_line(&format!(
            "  {} similarity clusters",
            style(report.similar_media.len()).cyan()
        ))
        .ok();
    }
    if stats.cache_hits + stats.cache_misses > 0 {
        term.write_line(&format!(
            "  {} cache hit ratio",
            style(format!("{:.0}%", stats.cache_hit_ratio * 100.0)).dim()
        ))
        .ok();
    }

    for moved in &report.duplicates_moved {
        term.write_line(&format!(
            "  {} {} {} {}",
            style("moved").yellow(),
            moved.source.display(),
            style("→ kept").dim(),
            moved.kept.display()
        ))
        .ok();
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
