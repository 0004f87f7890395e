// file: src/chunker/fingerprint.rs
// description: content+config digest gating document re-indexing
// reference: https://docs.rs/sha2

use crate::config::ChunkingConfig;
use crate::corpus::Unit;
use sha2::{Digest, Sha256};

/// Hex SHA-256 over the unit's normalized text and the chunking parameters
/// that shape its chunk set. Two units with equal fingerprints are guaranteed
/// to produce identical chunk sets, so fingerprint equality (plus a chunk
/// count match) is the sole gate for skipping a document.
pub fn fingerprint(unit: &Unit, config: &ChunkingConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(unit.text.as_bytes());
    hasher.update([0u8]);
    hasher.update((config.max_chars as u64).to_le_bytes());
    hasher.update((config.overlap_chars as u64).to_le_bytes());
    hasher.update((config.min_chars as u64).to_le_bytes());
    format!("{:x}", hasher.finalize())
}
