use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");
// unwrap_or as a const fn is not stable yet
const DEFAULT_VERSION: &str = "none";

pub mod delta_generation;
pub mod patch;
pub mod signature_generation;

pub mod rolling_checksum;
pub mod strong_hash;

pub type ChunkNumber = u64;

pub(crate) fn version() -> String {
    VERSION.unwrap_or(DEFAULT_VERSION).to_string()
}

/// Per-block fingerprint of some content: every block's weak checksum maps to the strong
/// hashes and numbers of the blocks that share it.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Signature<W, S>
where
    W: Eq + Hash + PartialEq,
    S: PartialEq + Copy,
{
    checksum_to_hashes: HashMap<W, Vec<(S, ChunkNumber)>>,
    chunk_size: usize,
    chunk_count: usize,
    content_len: usize,
    version: String,
}

impl<W, S> Signature<W, S>
where
    W: Eq + Hash + PartialEq,
    S: PartialEq + Copy,
{
    pub fn quick_query(&self, weak_checksum: &W) -> Option<&Vec<(S, ChunkNumber)>> {
        self.checksum_to_hashes.get(weak_checksum)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    pub fn content_len(&self) -> usize {
        self.content_len
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Length of the last block, which is shorter than `chunk_size` when the content length
    /// isn't a multiple of it.
    pub fn last_chunk_len(&self) -> usize {
        if self.chunk_count == 0 {
            return 0;
        }
        self.content_len
            .saturating_sub((self.chunk_count - 1).saturating_mul(self.chunk_size))
    }

    pub fn chunk_len(&self, chunk_number: ChunkNumber) -> usize {
        if chunk_number + 1 == self.chunk_count as ChunkNumber {
            self.last_chunk_len()
        } else {
            self.chunk_size
        }
    }

    /// Whether both signatures describe the same number of blocks with the same set of weak
    /// checksums - used to verify a signature that was written out and read back.
    pub fn block_count_matches(&self, other: &Self) -> bool {
        self.chunk_count == other.chunk_count
            && self.checksum_to_hashes.len() == other.checksum_to_hashes.len()
            && self
                .checksum_to_hashes
                .iter()
                .all(|(checksum, blocks)| {
                    other
                        .checksum_to_hashes
                        .get(checksum)
                        .map_or(false, |other_blocks| other_blocks.len() == blocks.len())
                })
    }
}
