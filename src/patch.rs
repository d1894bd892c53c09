use std::fmt::Debug;
use std::io::Write;

use log::debug;
use thiserror::Error;

use crate::delta_generation::{Delta, DeltaToken};
use crate::strong_hash::StrongHash;
use crate::ChunkNumber;

type Result<T, S> = std::result::Result<T, PatchError<S>>;

#[derive(Error, Debug)]
pub enum PatchError<S: Debug> {
    #[error("delta was generated by version {delta_ver} but this is version {patcher_ver}")]
    VersionMismatch {
        delta_ver: String,
        patcher_ver: String,
    },
    #[error("delta was generated against {expected} bytes of old content, got {actual}")]
    BaseLengthMismatch { expected: usize, actual: usize },
    #[error("chunk {chunk_num} of size {chunk_size} is outside of the {old_content_len} bytes of old content")]
    ChunkOutOfBounds {
        chunk_num: ChunkNumber,
        chunk_size: usize,
        old_content_len: usize,
    },
    #[error("chunk {chunk_num} hashes to {old_content_hash:?} but the delta expects {new_hash:?}")]
    ChunkHashMismatch {
        chunk_num: ChunkNumber,
        old_content_hash: S,
        new_hash: S,
    },
    #[error("failed to write the patched content")]
    OutputFailure(#[source] std::io::Error),
}

/// Writes the content described by `delta` into `out`, taking reused chunks from
/// `old_content`.
pub fn patch<S, W>(
    old_content: &[u8],
    delta: Delta<S::HashType>,
    out: &mut W,
) -> Result<(), S::HashType>
where
    S: StrongHash,
    W: Write,
{
    let patcher_ver = crate::version();
    if delta.version != patcher_ver {
        return Err(PatchError::VersionMismatch {
            delta_ver: delta.version,
            patcher_ver,
        });
    }
    if delta.base_content_len != old_content.len() {
        return Err(PatchError::BaseLengthMismatch {
            expected: delta.base_content_len,
            actual: old_content.len(),
        });
    }

    for token in delta.tokens {
        match token {
            DeltaToken::Reused(chunk_number, hash) => {
                let chunk = match old_chunk(old_content, delta.chunk_size, chunk_number) {
                    Some(chunk) => chunk,
                    None => {
                        return Err(PatchError::ChunkOutOfBounds {
                            chunk_num: chunk_number,
                            chunk_size: delta.chunk_size,
                            old_content_len: old_content.len(),
                        })
                    }
                };
                let actual_hash = S::hash(chunk);
                if actual_hash != hash {
                    return Err(PatchError::ChunkHashMismatch {
                        chunk_num: chunk_number,
                        old_content_hash: actual_hash,
                        new_hash: hash,
                    });
                }
                out.write_all(chunk).map_err(PatchError::OutputFailure)?
            }
            DeltaToken::Added(bytes) => out.write_all(&bytes).map_err(PatchError::OutputFailure)?,
            DeltaToken::Removed(chunk_number) => {
                debug!("chunk {} removed", chunk_number);
            }
        }
    }
    out.flush().map_err(PatchError::OutputFailure)
}

fn old_chunk(old_content: &[u8], chunk_size: usize, chunk_number: ChunkNumber) -> Option<&[u8]> {
    let start = usize::try_from(chunk_number).ok()?.checked_mul(chunk_size)?;
    if chunk_size == 0 || start >= old_content.len() {
        return None;
    }
    let end = start.saturating_add(chunk_size).min(old_content.len());
    Some(&old_content[start..end])
}
