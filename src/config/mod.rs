//! # Config Module
//!
//! Three immutable layers folded into one effective configuration:
//! built-in defaults, then the optional config file, then explicit options.
//! Validation runs once on the fold result, never piecemeal, so a run can
//! only ever start from a fully-valid `SieveConfig`.
//!
//! The config file is TOML with a `[global]` section (dup_dir, mode,
//! cache_db, hash_workers, media_workers) and a `[media]` section (enabled,
//! ffmpeg_path, ffprobe_path, the three hamming thresholds, and
//! duration_bucket_seconds).

use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_DUP_DIR: &str = "/tmp/sieve/dups";
pub const DEFAULT_CACHE_DB: &str = ".filesieve-cache.sqlite";
pub const DEFAULT_IMAGE_HAMMING_THRESHOLD: u32 = 8;
pub const DEFAULT_VIDEO_HAMMING_THRESHOLD: u32 = 32;
pub const DEFAULT_VIDEO_FRAME_HAMMING_THRESHOLD: u32 = 12;
pub const DEFAULT_DURATION_BUCKET_SECONDS: u32 = 2;

/// Pipeline selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Exact,
    Media,
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "exact" => Ok(Mode::Exact),
            "media" => Ok(Mode::Media),
            other => Err(ConfigError::InvalidMode {
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Exact => write!(f, "exact"),
            Mode::Media => write!(f, "media"),
        }
    }
}

/// Explicit overrides: the highest-precedence layer.
///
/// Every field is optional; `None` falls through to the config file and then
/// to the built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct SieveOptions {
    pub dup_dir: Option<PathBuf>,
    pub config_path: Option<PathBuf>,
    pub mode: Option<Mode>,
    pub cache_db: Option<PathBuf>,
    pub no_cache: bool,
    pub hash_workers: Option<usize>,
    pub media_workers: Option<usize>,
    pub media_enabled: Option<bool>,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub image_hamming_threshold: Option<u32>,
    pub video_hamming_threshold: Option<u32>,
    pub video_frame_hamming_threshold: Option<u32>,
    pub duration_bucket_seconds: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    global: GlobalSection,
    #[serde(default)]
    media: MediaSection,
}

#[derive(Debug, Deserialize, Default)]
struct GlobalSection {
    dup_dir: Option<PathBuf>,
    mode: Option<String>,
    cache_db: Option<PathBuf>,
    hash_workers: Option<i64>,
    media_workers: Option<i64>,
}

#[derive(Debug, Deserialize, Default)]
struct MediaSection {
    enabled: Option<bool>,
    ffmpeg_path: Option<PathBuf>,
    ffprobe_path: Option<PathBuf>,
    image_hamming_threshold: Option<i64>,
    video_hamming_threshold: Option<i64>,
    video_frame_hamming_threshold: Option<i64>,
    duration_bucket_seconds: Option<i64>,
}

/// Effective media-stage settings
#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub enabled: bool,
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
    pub image_hamming_threshold: u32,
    pub video_hamming_threshold: u32,
    pub video_frame_hamming_threshold: u32,
    pub duration_bucket_seconds: u32,
}

/// The validated effective configuration
#[derive(Debug, Clone)]
pub struct SieveConfig {
    pub dup_dir: PathBuf,
    pub mode: Mode,
    pub cache_db: PathBuf,
    pub no_cache: bool,
    pub hash_workers: usize,
    pub media_workers: usize,
    pub media: MediaConfig,
}

fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(4)
}

fn default_hash_workers() -> usize {
    (2 * cpu_count()).clamp(4, 16)
}

fn default_media_workers() -> usize {
    (cpu_count() / 2).max(2)
}

fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    if !path.is_file() {
        return Err(ConfigError::MissingConfigFile {
            path: path.to_path_buf(),
        });
    }
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    toml::from_str(&raw).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn fold_workers(
    field: &'static str,
    explicit: Option<usize>,
    from_file: Option<i64>,
    default: usize,
) -> Result<usize, ConfigError> {
    if let Some(value) = explicit {
        if value == 0 {
            return Err(ConfigError::InvalidWorkerCount { field, value: 0 });
        }
        return Ok(value);
    }
    if let Some(value) = from_file {
        if value <= 0 {
            return Err(ConfigError::InvalidWorkerCount { field, value });
        }
        return Ok(value as usize);
    }
    Ok(default)
}

fn fold_threshold(
    field: &'static str,
    explicit: Option<u32>,
    from_file: Option<i64>,
    default: u32,
) -> Result<u32, ConfigError> {
    if let Some(value) = explicit {
        if value == 0 {
            return Err(ConfigError::InvalidThreshold { field, value: 0 });
        }
        return Ok(value);
    }
    if let Some(value) = from_file {
        if value <= 0 || value > u32::MAX as i64 {
            return Err(ConfigError::InvalidThreshold { field, value });
        }
        return Ok(value as u32);
    }
    Ok(default)
}

fn ensure_writable_dir(path: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(path).map_err(|e| ConfigError::DupDirUnusable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let metadata = std::fs::metadata(path).map_err(|e| ConfigError::DupDirUnusable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if metadata.permissions().readonly() {
        return Err(ConfigError::DupDirUnusable {
            path: path.to_path_buf(),
            reason: "directory is not writable".to_string(),
        });
    }
    Ok(())
}

impl SieveConfig {
    /// Fold defaults, config file, and explicit options, then validate.
    pub fn resolve(options: SieveOptions) -> Result<Self, ConfigError> {
        let file = match options.config_path.as_deref() {
            Some(path) => load_file_config(path)?,
            None => FileConfig::default(),
        };

        let mode = match options.mode {
            Some(mode) => mode,
            None => match file.global.mode.as_deref() {
                Some(raw) => raw.parse()?,
                None => Mode::Media,
            },
        };

        let dup_dir = options
            .dup_dir
            .or(file.global.dup_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DUP_DIR));
        ensure_writable_dir(&dup_dir)?;

        let cache_db = options
            .cache_db
            .or(file.global.cache_db)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DB));

        let hash_workers = fold_workers(
            "hash_workers",
            options.hash_workers,
            file.global.hash_workers,
            default_hash_workers(),
        )?;
        let media_workers = fold_workers(
            "media_workers",
            options.media_workers,
            file.global.media_workers,
            default_media_workers(),
        )?;

        let media = MediaConfig {
            enabled: options.media_enabled.or(file.media.enabled).unwrap_or(true),
            ffmpeg_path: options.ffmpeg_path.or(file.media.ffmpeg_path),
            ffprobe_path: options.ffprobe_path.or(file.media.ffprobe_path),
            image_hamming_threshold: fold_threshold(
                "image_hamming_threshold",
                options.image_hamming_threshold,
                file.media.image_hamming_threshold,
                DEFAULT_IMAGE_HAMMING_THRESHOLD,
            )?,
            video_hamming_threshold: fold_threshold(
                "video_hamming_threshold",
                options.video_hamming_threshold,
                file.media.video_hamming_threshold,
                DEFAULT_VIDEO_HAMMING_THRESHOLD,
            )?,
            video_frame_hamming_threshold: fold_threshold(
                "video_frame_hamming_threshold",
                options.video_frame_hamming_threshold,
                file.media.video_frame_hamming_threshold,
                DEFAULT_VIDEO_FRAME_HAMMING_THRESHOLD,
            )?,
            duration_bucket_seconds: fold_threshold(
                "duration_bucket_seconds",
                options.duration_bucket_seconds,
                file.media.duration_bucket_seconds,
                DEFAULT_DURATION_BUCKET_SECONDS,
            )?,
        };

        Ok(Self {
            dup_dir,
            mode,
            cache_db,
            no_cache: options.no_cache,
            hash_workers,
            media_workers,
            media,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn base_options(dir: &TempDir) -> SieveOptions {
        SieveOptions {
            dup_dir: Some(dir.path().join("dups")),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_fill_every_unset_field() {
        let dir = TempDir::new().unwrap();
        let config = SieveConfig::resolve(base_options(&dir)).unwrap();

        assert_eq!(config.mode, Mode::Media);
        assert_eq!(config.cache_db, PathBuf::from(DEFAULT_CACHE_DB));
        assert!((4..=16).contains(&config.hash_workers));
        assert!(config.media_workers >= 2);
        assert!(config.media.enabled);
        assert_eq!(config.media.image_hamming_threshold, 8);
        assert_eq!(config.media.video_hamming_threshold, 32);
        assert_eq!(config.media.video_frame_hamming_threshold, 12);
        assert_eq!(config.media.duration_bucket_seconds, 2);
    }

    #[test]
    fn config_file_layer_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("sieve.toml");
        std::fs::write(
            &config_path,
            format!(
                r#"
[global]
dup_dir = "{dups}"
mode = "exact"
cache_db = "{cache}"
hash_workers = 3
media_workers = 2

[media]
enabled = true
image_hamming_threshold = 7
video_hamming_threshold = 31
video_frame_hamming_threshold = 11
duration_bucket_seconds = 4
"#,
                dups = dir.path().join("config-dups").display(),
                cache = dir.path().join("cache-from-config.sqlite").display(),
            ),
        )
        .unwrap();

        let config = SieveConfig::resolve(SieveOptions {
            config_path: Some(config_path),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(config.mode, Mode::Exact);
        assert_eq!(config.hash_workers, 3);
        assert_eq!(config.media_workers, 2);
        assert_eq!(config.media.image_hamming_threshold, 7);
        assert_eq!(config.media.video_hamming_threshold, 31);
        assert_eq!(config.media.video_frame_hamming_threshold, 11);
        assert_eq!(config.media.duration_bucket_seconds, 4);
    }

    #[test]
    fn explicit_options_beat_the_config_file() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("sieve.toml");
        std::fs::write(
            &config_path,
            format!(
                "[global]\ndup_dir = \"{}\"\nmode = \"exact\"\nhash_workers = 3\n",
                dir.path().join("config-dups").display()
            ),
        )
        .unwrap();

        let config = SieveConfig::resolve(SieveOptions {
            config_path: Some(config_path),
            mode: Some(Mode::Media),
            hash_workers: Some(5),
            media_workers: Some(4),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(config.mode, Mode::Media);
        assert_eq!(config.hash_workers, 5);
        assert_eq!(config.media_workers, 4);
    }

    #[test]
    fn invalid_mode_string_is_rejected() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("sieve.toml");
        std::fs::write(&config_path, "[global]\nmode = \"invalid-mode\"\n").unwrap();

        let err = SieveConfig::resolve(SieveOptions {
            config_path: Some(config_path),
            dup_dir: Some(dir.path().join("dups")),
            ..Default::default()
        })
        .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidMode { .. }));
    }

    #[test]
    fn non_positive_worker_counts_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut options = base_options(&dir);
        options.hash_workers = Some(0);
        assert!(matches!(
            SieveConfig::resolve(options),
            Err(ConfigError::InvalidWorkerCount { .. })
        ));

        let config_path = dir.path().join("sieve.toml");
        std::fs::write(&config_path, "[global]\nmedia_workers = -2\n").unwrap();
        let mut options = base_options(&dir);
        options.config_path = Some(config_path);
        assert!(matches!(
            SieveConfig::resolve(options),
            Err(ConfigError::InvalidWorkerCount { .. })
        ));
    }

    #[test]
    fn non_positive_thresholds_are_rejected() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("sieve.toml");
        std::fs::write(&config_path, "[media]\nimage_hamming_threshold = 0\n").unwrap();

        let mut options = base_options(&dir);
        options.config_path = Some(config_path);
        assert!(matches!(
            SieveConfig::resolve(options),
            Err(ConfigError::InvalidThreshold { .. })
        ));
    }

    #[test]
    fn missing_config_path_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut options = base_options(&dir);
        options.config_path = Some(dir.path().join("no-such-file.toml"));
        assert!(matches!(
            SieveConfig::resolve(options),
            Err(ConfigError::MissingConfigFile { .. })
        ));
    }

    #[test]
    #[cfg(unix)]
    fn read_only_dup_dir_is_rejected() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let locked = dir.path().join("locked");
        std::fs::create_dir(&locked).unwrap();
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

        let result = SieveConfig::resolve(SieveOptions {
            dup_dir: Some(locked.clone()),
            ..Default::default()
        });

        // Restore so TempDir cleanup can remove it.
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert!(matches!(result, Err(ConfigError::DupDirUnusable { .. })));
    }

    #[test]
    fn mode_round_trips_through_display_and_parse() {
        assert_eq!("exact".parse::<Mode>().unwrap(), Mode::Exact);
        assert_eq!("media".parse::<Mode>().unwrap(), Mode::Media);
        assert_eq!(Mode::Exact.to_string(), "exact");
        assert!("Exact".parse::<Mode>().is_err());
    }
}
