//! External media-tool resolution and subprocess drivers.
//!
//! The engine never decodes containers itself: ffprobe supplies stream
//! dimensions and duration, and ffmpeg renders 9x8 area-scaled grayscale
//! frames straight to stdout. Non-zero exit or short output is a per-file
//! failure, surfaced as a `MediaError` and handled by the caller.

use crate::error::MediaError;
use std::path::{Path, PathBuf};
use std::process::Command;

pub const FRAME_WIDTH: usize = 9;
pub const FRAME_HEIGHT: usize = 8;
pub const FRAME_PIXELS: usize = FRAME_WIDTH * FRAME_HEIGHT;

/// Resolved ffmpeg/ffprobe executables
#[derive(Debug, Clone)]
pub struct MediaTools {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

/// Stream facts from ffprobe. `duration` is 0 for stills.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaProbe {
    pub width: u32,
    pub height: u32,
    pub duration: f64,
}

fn search_path(name: &Path) -> Option<PathBuf> {
    // Only bare command names go through PATH lookup.
    if name.components().nth(1).is_some() {
        return None;
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

fn resolve_binary(explicit: Option<&Path>, default_name: &str) -> Option<PathBuf> {
    match explicit {
        Some(candidate) => search_path(candidate)
            .or_else(|| candidate.is_file().then(|| absolutize(candidate))),
        None => search_path(Path::new(default_name)),
    }
}

/// Resolve both tools, honouring explicit overrides before PATH lookup.
/// Returns `None` when either tool cannot be found.
pub fn resolve_media_tools(
    ffmpeg_path: Option<&Path>,
    ffprobe_path: Option<&Path>,
) -> Option<MediaTools> {
    let ffmpeg = resolve_binary(ffmpeg_path, "ffmpeg")?;
    let ffprobe = resolve_binary(ffprobe_path, "ffprobe")?;
    Some(MediaTools { ffmpeg, ffprobe })
}

/// Probe width/height/duration for a media file.
pub fn probe_media(ffprobe: &Path, file: &Path) -> Result<MediaProbe, MediaError> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height:format=duration",
            "-of",
            "json",
        ])
        .arg(file)
        .output()
        .map_err(|e| MediaError::Probe {
            path: file.to_path_buf(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr.trim();
        return Err(MediaError::Probe {
            path: file.to_path_buf(),
            reason: if reason.is_empty() {
                "ffprobe failed".to_string()
            } else {
                reason.to_string()
            },
        });
    }

    let payload: serde_json::Value =
        serde_json::from_slice(&output.stdout).map_err(|e| MediaError::Probe {
            path: file.to_path_buf(),
            reason: e.to_string(),
        })?;

    let stream = payload
        .get("streams")
        .and_then(|streams| streams.get(0))
        .cloned()
        .unwrap_or(serde_json::Value::Null);
    let width = stream.get("width").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    let height = stream.get("height").and_then(|v| v.as_u64()).unwrap_or(0) as u32;

    // ffprobe reports duration as a decimal string; stills have none.
    let duration = payload
        .pointer("/format/duration")
        .and_then(|value| {
            value
                .as_f64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        })
        .unwrap_or(0.0)
        .max(0.0);

    Ok(MediaProbe {
        width,
        height,
        duration,
    })
}

/// Render one 9x8 grayscale frame at `timestamp` seconds.
pub fn extract_gray_frame(
    ffmpeg: &Path,
    file: &Path,
    timestamp: f64,
) -> Result<[u8; FRAME_PIXELS], MediaError> {
    let output = Command::new(ffmpeg)
        .args(["-v", "error", "-ss"])
        .arg(format!("{timestamp:.3}"))
        .arg("-i")
        .arg(file)
        .arg("-vf")
        .arg(format!("scale={FRAME_WIDTH}:{FRAME_HEIGHT}:flags=area,format=gray"))
        .args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "gray", "pipe:1"])
        .output()
        .map_err(|e| MediaError::Frame {
            path: file.to_path_buf(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let reason = stderr.trim();
        return Err(MediaError::Frame {
            path: file.to_path_buf(),
            reason: if reason.is_empty() {
                "ffmpeg failed".to_string()
            } else {
                reason.to_string()
            },
        });
    }
    if output.stdout.len() < FRAME_PIXELS {
        return Err(MediaError::Frame {
            path: file.to_path_buf(),
            reason: format!(
                "expected {FRAME_PIXELS} frame bytes, got {}",
                output.stdout.len()
            ),
        });
    }

    let mut frame = [0u8; FRAME_PIXELS];
    frame.copy_from_slice(&output.stdout[..FRAME_PIXELS]);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn fake_tool(dir: &TempDir, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.path().join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn resolve_fails_for_missing_override() {
        let resolved = resolve_media_tools(
            Some(Path::new("definitely-missing-ffmpeg")),
            Some(Path::new("definitely-missing-ffprobe")),
        );
        assert!(resolved.is_none());
    }

    #[test]
    fn resolve_accepts_explicit_file_paths() {
        let dir = TempDir::new().unwrap();
        let ffmpeg = dir.path().join("ffmpeg-local");
        let ffprobe = dir.path().join("ffprobe-local");
        std::fs::write(&ffmpeg, b"").unwrap();
        std::fs::write(&ffprobe, b"").unwrap();

        let tools = resolve_media_tools(Some(&ffmpeg), Some(&ffprobe)).unwrap();
        assert_eq!(tools.ffmpeg, ffmpeg);
        assert_eq!(tools.ffprobe, ffprobe);
    }

    #[test]
    #[cfg(unix)]
    fn probe_parses_dimensions_and_decimal_duration() {
        let dir = TempDir::new().unwrap();
        let ffprobe = fake_tool(
            &dir,
            "ffprobe",
            r#"echo '{"streams":[{"width":1920,"height":1080}],"format":{"duration":"12.5"}}'"#,
        );

        let probe = probe_media(&ffprobe, Path::new("/media/clip.mp4")).unwrap();
        assert_eq!(probe.width, 1920);
        assert_eq!(probe.height, 1080);
        assert!((probe.duration - 12.5).abs() < f64::EPSILON);
    }

    #[test]
    #[cfg(unix)]
    fn probe_without_duration_reports_zero() {
        let dir = TempDir::new().unwrap();
        let ffprobe = fake_tool(
            &dir,
            "ffprobe",
            r#"echo '{"streams":[{"width":640,"height":480}],"format":{}}'"#,
        );

        let probe = probe_media(&ffprobe, Path::new("/media/photo.jpg")).unwrap();
        assert_eq!(probe.width, 640);
        assert_eq!(probe.duration, 0.0);
    }

    #[test]
    #[cfg(unix)]
    fn probe_failure_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let ffprobe = fake_tool(&dir, "ffprobe", "echo 'no such stream' >&2; exit 1");

        let err = probe_media(&ffprobe, Path::new("/media/broken.mp4")).unwrap_err();
        assert!(err.to_string().contains("no such stream"));
    }

    #[test]
    #[cfg(unix)]
    fn frame_extraction_requires_full_frame() {
        let dir = TempDir::new().unwrap();
        let full = fake_tool(&dir, "ffmpeg-full", "head -c 72 /dev/zero");
        let short = fake_tool(&dir, "ffmpeg-short", "head -c 10 /dev/zero");

        let frame = extract_gray_frame(&full, Path::new("/media/clip.mp4"), 0.0).unwrap();
        assert_eq!(frame, [0u8; FRAME_PIXELS]);

        assert!(extract_gray_frame(&short, Path::new("/media/clip.mp4"), 0.0).is_err());
    }
}
