//! BLAKE2b digests and byte-level comparison for the exact stages.
//!
//! The quick hash reads three 64 KiB samples (head, middle, tail) and is
//! only an elimination filter; the full hash streams the entire file. Both
//! report how many bytes they read so the orchestrator can account for I/O.

use blake2::digest::consts::{U16, U32};
use blake2::{Blake2b, Digest};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

pub const QUICK_SAMPLE_SIZE: u64 = 64 * 1024;
pub const HASH_CHUNK_SIZE: usize = 1024 * 1024;

type QuickDigest = Blake2b<U16>;
type FullDigest = Blake2b<U32>;

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().fold(
        String::with_capacity(bytes.len() * 2),
        |mut out, byte| {
            use std::fmt::Write;
            let _ = write!(out, "{byte:02x}");
            out
        },
    )
}

fn clamp_offset(offset: u64, size: u64, sample_size: u64) -> u64 {
    offset.min(size.saturating_sub(sample_size))
}

/// Offsets for the three quick-hash samples, clamped into the file and with
/// duplicates collapsed so small files are read exactly once.
fn sample_offsets(size: u64, sample_size: u64) -> Vec<u64> {
    let raw = [
        clamp_offset(0, size, sample_size),
        clamp_offset(size / 2, size, sample_size),
        clamp_offset(size.saturating_sub(sample_size), size, sample_size),
    ];
    let mut offsets = Vec::with_capacity(3);
    for offset in raw {
        if !offsets.contains(&offset) {
            offsets.push(offset);
        }
    }
    offsets
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// 128-bit BLAKE2b over three strategic samples. Returns (hex digest, bytes read).
pub fn quick_hash(path: &Path, size: u64) -> io::Result<(String, u64)> {
    quick_hash_with_sample(path, size, QUICK_SAMPLE_SIZE)
}

pub fn quick_hash_with_sample(path: &Path, size: u64, sample_size: u64) -> io::Result<(String, u64)> {
    let mut file = File::open(path)?;
    let mut hasher = QuickDigest::new();
    let mut buf = vec![0u8; sample_size as usize];
    let mut bytes_read = 0u64;

    for offset in sample_offsets(size, sample_size) {
        file.seek(SeekFrom::Start(offset))?;
        let n = read_up_to(&mut file, &mut buf)?;
        hasher.update(&buf[..n]);
        bytes_read += n as u64;
    }
    Ok((to_hex(&hasher.finalize()), bytes_read))
}

/// 256-bit BLAKE2b streamed over the whole file. Returns (hex digest, bytes read).
pub fn full_hash(path: &Path) -> io::Result<(String, u64)> {
    let mut file = File::open(path)?;
    let mut hasher = FullDigest::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    let mut bytes_read = 0u64;

    loop {
        let n = read_up_to(&mut file, &mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        bytes_read += n as u64;
    }
    Ok((to_hex(&hasher.finalize()), bytes_read))
}

/// Chunk-by-chunk byte comparison. Returns (equal, bytes read across both files).
pub fn compare_files(path_a: &Path, path_b: &Path) -> io::Result<(bool, u64)> {
    let mut file_a = File::open(path_a)?;
    let mut file_b = File::open(path_b)?;
    let mut buf_a = vec![0u8; HASH_CHUNK_SIZE];
    let mut buf_b = vec![0u8; HASH_CHUNK_SIZE];
    let mut bytes_read = 0u64;

    loop {
        let read_a = read_up_to(&mut file_a, &mut buf_a)?;
        let read_b = read_up_to(&mut file_b, &mut buf_b)?;
        bytes_read += (read_a + read_b) as u64;
        if buf_a[..read_a] != buf_b[..read_b] {
            return Ok((false, bytes_read));
        }
        if read_a == 0 {
            return Ok((true, bytes_read));
        }
    }
}
