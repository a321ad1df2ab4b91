//! Perceptual signatures: dHash computation and the cached blob codec.
//!
//! ## dHash
//! Each 9x8 grayscale frame yields 64 bits: for every row, the 8 horizontal
//! pixel pairs each contribute a 1 when the left pixel is strictly brighter
//! than its right neighbour, concatenated MSB-first.
//!
//! ## Blob framing
//! Signatures and probe facts persist in the cache as compact tagged byte
//! strings (one-byte tag, big-endian fields) so future hash widths can be
//! added without a schema change. Blobs that fail to decode are treated as
//! cache misses by the pipeline, never as errors.

use super::tools::{self, MediaProbe, MediaTools, FRAME_HEIGHT, FRAME_PIXELS, FRAME_WIDTH};
use crate::core::scanner::{FileKind, FileRecord};
use crate::error::MediaError;
use std::path::Path;

/// Fractions of the duration at which video frames are sampled.
pub const VIDEO_SAMPLE_FRACTIONS: [f64; 4] = [0.10, 0.35, 0.65, 0.90];

const IMAGE_SIG_TAG: u8 = 0x01;
const VIDEO_SIG_TAG: u8 = 0x02;
const PROBE_TAG: u8 = 0x01;

/// Perceptual fingerprint of one media file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSignature {
    Image { hash: u64 },
    Video { hashes: Vec<u64> },
}

impl MediaSignature {
    pub fn kind_label(&self) -> &'static str {
        match self {
            MediaSignature::Image { .. } => "image",
            MediaSignature::Video { .. } => "video",
        }
    }
}

/// 64-bit difference hash of a 9x8 grayscale frame.
pub fn dhash(pixels: &[u8; FRAME_PIXELS]) -> u64 {
    let mut digest = 0u64;
    for row in 0..FRAME_HEIGHT {
        let offset = row * FRAME_WIDTH;
        for col in 0..FRAME_WIDTH - 1 {
            digest = (digest << 1) | u64::from(pixels[offset + col] > pixels[offset + col + 1]);
        }
    }
    digest
}

fn image_signature(
    path: &Path,
    media_tools: &MediaTools,
) -> Result<(MediaSignature, MediaProbe), MediaError> {
    let probe = tools::probe_media(&media_tools.ffprobe, path)?;
    let frame = tools::extract_gray_frame(&media_tools.ffmpeg, path, 0.0)?;
    Ok((MediaSignature::Image { hash: dhash(&frame) }, probe))
}

fn video_signature(
    path: &Path,
    media_tools: &MediaTools,
) -> Result<(MediaSignature, MediaProbe), MediaError> {
    let probe = tools::probe_media(&media_tools.ffprobe, path)?;
    let timestamps: Vec<f64> = if probe.duration > 0.0 {
        VIDEO_SAMPLE_FRACTIONS
            .iter()
            .map(|fraction| probe.duration * fraction)
            .collect()
    } else {
        vec![0.0; VIDEO_SAMPLE_FRACTIONS.len()]
    };

    let mut hashes = Vec::with_capacity(timestamps.len());
    for timestamp in timestamps {
        let frame = tools::extract_gray_frame(&media_tools.ffmpeg, path, timestamp)?;
        hashes.push(dhash(&frame));
    }
    Ok((MediaSignature::Video { hashes }, probe))
}

/// Probe and fingerprint one media file according to its kind.
pub fn compute_signature(
    record: &FileRecord,
    media_tools: &MediaTools,
) -> Result<(MediaSignature, MediaProbe), MediaError> {
    match record.kind {
        FileKind::Image => image_signature(record.path(), media_tools),
        FileKind::Video => video_signature(record.path(), media_tools),
        FileKind::Other => Err(MediaError::Signature {
            path: record.path().to_path_buf(),
            reason: "not an image or video".to_string(),
        }),
    }
}

pub fn encode_signature(signature: &MediaSignature) -> Vec<u8> {
    match signature {
        MediaSignature::Image { hash } => {
            let mut blob = Vec::with_capacity(9);
            blob.push(IMAGE_SIG_TAG);
            blob.extend_from_slice(&hash.to_be_bytes());
            blob
        }
        MediaSignature::Video { hashes } => {
            let mut blob = Vec::with_capacity(2 + hashes.len() * 8);
            blob.push(VIDEO_SIG_TAG);
            blob.push(hashes.len() as u8);
            for hash in hashes {
                blob.extend_from_slice(&hash.to_be_bytes());
            }
            blob
        }
    }
}

pub fn decode_signature(blob: &[u8]) -> Option<MediaSignature> {
    match blob.split_first()? {
        (&IMAGE_SIG_TAG, rest) => {
            let hash = u64::from_be_bytes(rest.try_into().ok()?);
            Some(MediaSignature::Image { hash })
        }
        (&VIDEO_SIG_TAG, rest) => {
            let (&count, frames) = rest.split_first()?;
            if frames.len() != count as usize * 8 {
                return None;
            }
            let hashes = frames
                .chunks_exact(8)
                .map(|chunk| u64::from_be_bytes(chunk.try_into().unwrap_or_default()))
                .collect();
            Some(MediaSignature::Video { hashes })
        }
        _ => None,
    }
}

pub fn encode_probe(probe: &MediaProbe) -> Vec<u8> {
    let mut blob = Vec::with_capacity(17);
    blob.push(PROBE_TAG);
    blob.extend_from_slice(&probe.width.to_be_bytes());
    blob.extend_from_slice(&probe.height.to_be_bytes());
    blob.extend_from_slice(&probe.duration.to_be_bytes());
    blob
}

pub fn decode_probe(blob: &[u8]) -> Option<MediaProbe> {
    let (&tag, rest) = blob.split_first()?;
    if tag != PROBE_TAG || rest.len() != 16 {
        return None;
    }
    Some(MediaProbe {
        width: u32::from_be_bytes(rest[0..4].try_into().ok()?),
        height: u32::from_be_bytes(rest[4..8].try_into().ok()?),
        duration: f64::from_be_bytes(rest[8..16].try_into().ok()?),
    })
}
