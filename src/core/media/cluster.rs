//! Blocking and union-find clustering over perceptual signatures.
//!
//! All-pairs comparison is avoided by pre-partitioning on a cheap blocking
//! key; only intra-block pairs are scored. The bit-prefix components
//! (`hash >> 48`) can miss similar pairs whose top bits differ, which is a
//! deliberate recall/precision trade-off kept for compatibility with
//! archived reports.

use super::signature::MediaSignature;
use super::tools::MediaProbe;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Numeric limits governing pair similarity
#[derive(Debug, Clone, Copy)]
pub struct SimilarityThresholds {
    pub image_hamming: u32,
    pub video_hamming: u32,
    pub video_frame_hamming: u32,
    pub duration_bucket_seconds: u32,
}

/// Bitwise Hamming distance between two 64-bit hashes.
pub fn hamming_distance(left: u64, right: u64) -> u32 {
    (left ^ right).count_ones()
}

/// Disjoint sets over dense handles with path compression and union by rank.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            rank: vec![0; len],
        }
    }

    fn find(&mut self, mut handle: usize) -> usize {
        while self.parent[handle] != handle {
            // Path halving keeps trees shallow without recursion.
            self.parent[handle] = self.parent[self.parent[handle]];
            handle = self.parent[handle];
        }
        handle
    }

    fn union(&mut self, left: usize, right: usize) {
        let root_left = self.find(left);
        let root_right = self.find(right);
        if root_left == root_right {
            return;
        }
        if self.rank[root_left] < self.rank[root_right] {
            self.parent[root_left] = root_right;
        } else if self.rank[root_left] > self.rank[root_right] {
            self.parent[root_right] = root_left;
        } else {
            self.parent[root_right] = root_left;
            self.rank[root_left] += 1;
        }
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
enum BlockKey {
    Image {
        width_bucket: u32,
        height_bucket: u32,
        hash_prefix: u16,
    },
    Video {
        duration_bucket: i64,
        aspect_bucket: i64,
        hash_prefix: u16,
    },
}

fn blocking_key(
    signature: &MediaSignature,
    probe: &MediaProbe,
    duration_bucket_seconds: u32,
) -> BlockKey {
    match signature {
        MediaSignature::Image { hash } => BlockKey::Image {
            width_bucket: probe.width / 64,
            height_bucket: probe.height / 64,
            hash_prefix: (hash >> 48) as u16,
        },
        MediaSignature::Video { hashes } => {
            let duration_bucket = if duration_bucket_seconds > 0 {
                (probe.duration / duration_bucket_seconds as f64).floor() as i64
            } else {
                probe.duration as i64
            };
            let aspect_bucket = if probe.height > 0 {
                ((probe.width as f64 / probe.height as f64) * 10.0).round() as i64
            } else {
                0
            };
            BlockKey::Video {
                duration_bucket,
                aspect_bucket,
                hash_prefix: hashes.first().map(|h| (h >> 48) as u16).unwrap_or(0),
            }
        }
    }
}

/// Score a pair, returning `Some(score)` only when the pair is similar.
fn similarity_score(
    left: &MediaSignature,
    right: &MediaSignature,
    thresholds: &SimilarityThresholds,
) -> Option<u32> {
    match (left, right) {
        (MediaSignature::Image { hash: a }, MediaSignature::Image { hash: b }) => {
            let score = hamming_distance(*a, *b);
            (score <= thresholds.image_hamming).then_some(score)
        }
        (MediaSignature::Video { hashes: a }, MediaSignature::Video { hashes: b }) => {
            if a.len() != b.len() {
                return None;
            }
            let frame_scores: Vec<u32> = a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| hamming_distance(*x, *y))
                .collect();
            let total: u32 = frame_scores.iter().sum();
            let similar = total <= thresholds.video_hamming
                && frame_scores
                    .iter()
                    .all(|score| *score <= thresholds.video_frame_hamming);
            similar.then_some(total)
        }
        _ => None,
    }
}

/// Per-cluster score digest over the similar pairs it contains
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScoreSummary {
    pub kind: String,
    pub pairs: usize,
    pub min: u32,
    pub max: u32,
}

/// One connected component of similar files
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MediaCluster {
    pub cluster_id: String,
    pub paths: Vec<PathBuf>,
    pub score_summary: ScoreSummary,
}

/// Build similarity clusters from the signature set.
///
/// Entries arrive keyed by path, so handles are assigned in path order and
/// both the member lists and the `media-<n>` sequence are invariant under
/// permutation of the original scan order.
pub fn cluster_signatures(
    entries: &BTreeMap<PathBuf, (MediaSignature, MediaProbe)>,
    thresholds: &SimilarityThresholds,
) -> Vec<MediaCluster> {
    let paths: Vec<&PathBuf> = entries.keys().collect();
    let signatures: Vec<&(MediaSignature, MediaProbe)> = entries.values().collect();

    let mut blocks: HashMap<BlockKey, Vec<usize>> = HashMap::new();
    for (handle, (signature, probe)) in entries.values().enumerate() {
        blocks
            .entry(blocking_key(signature, probe, thresholds.duration_bucket_seconds))
            .or_default()
            .push(handle);
    }

    let mut sets = UnionFind::new(paths.len());
    let mut pair_scores: Vec<(usize, u32)> = Vec::new();
    for members in blocks.values() {
        if members.len() <= 1 {
            continue;
        }
        for (index, &left) in members.iter().enumerate() {
            for &right in &members[index + 1..] {
                if let Some(score) =
                    similarity_score(&signatures[left].0, &signatures[right].0, thresholds)
                {
                    sets.union(left, right);
                    pair_scores.push((left, score));
                }
            }
        }
    }

    // Components in first-discovery order over path-sorted handles.
    let mut slot_by_root: HashMap<usize, usize> = HashMap::new();
    let mut components: Vec<Vec<usize>> = Vec::new();
    for handle in 0..paths.len() {
        let root = sets.find(handle);
        let slot = *slot_by_root.entry(root).or_insert_with(|| {
            components.push(Vec::new());
            components.len() - 1
        });
        components[slot].push(handle);
    }

    let mut scores_by_root: HashMap<usize, Vec<u32>> = HashMap::new();
    for (member, score) in pair_scores {
        let root = sets.find(member);
        scores_by_root.entry(root).or_default().push(score);
    }

    let mut clusters = Vec::new();
    let mut sequence = 0usize;
    for component in components.iter().filter(|component| component.len() > 1) {
        sequence += 1;
        let root = sets.find(component[0]);
        let scores = scores_by_root.remove(&root).unwrap_or_default();
        clusters.push(MediaCluster {
            cluster_id: format!("media-{sequence}"),
            paths: component.iter().map(|&handle| paths[handle].clone()).collect(),
            score_summary: ScoreSummary {
                kind: signatures[component[0]].0.kind_label().to_string(),
                pairs: scores.len(),
                min: scores.iter().copied().min().unwrap_or(0),
                max: scores.iter().copied().max().unwrap_or(0),
            },
        });
    }
    clusters
}
