use std::fmt::Debug;
use std::hash::Hash;

use bitvec::prelude::*;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::delta_generation::DeltaToken::{Added, Removed, Reused};
use crate::rolling_checksum::{RollingChecksum, RollingError};
use crate::strong_hash::StrongHash;
use crate::{ChunkNumber, Signature};

#[derive(Error, Debug, PartialEq)]
pub enum DeltaError {
    #[error("signature refers to chunk {chunk_num} but only describes {chunk_count} chunks")]
    ChunkOutOfBounds {
        chunk_num: ChunkNumber,
        chunk_count: usize,
    },
    #[error("signature describes {chunk_count} chunks of size 0")]
    EmptyChunks { chunk_count: usize },
    #[error(transparent)]
    Rolling(#[from] RollingError),
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub enum DeltaToken<S>
where
    S: PartialEq + Debug,
{
    Reused(
        ChunkNumber, /* chunk number in old file */
        S,           /* strong hash over the content for the patch operation to use */
    ),
    Added(Vec<u8> /* new data */),
    Removed(ChunkNumber),
}

/// The instructions to rebuild new content out of the old content a signature was generated
/// from.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct Delta<S>
where
    S: PartialEq + Debug,
{
    pub(crate) tokens: Vec<DeltaToken<S>>,
    pub(crate) chunk_size: usize,
    pub(crate) base_content_len: usize,
    pub(crate) version: String,
}

impl<S> Delta<S>
where
    S: PartialEq + Debug,
{
    pub fn tokens(&self) -> &[DeltaToken<S>] {
        &self.tokens
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn base_content_len(&self) -> usize {
        self.base_content_len
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

pub fn generate_delta<R, S>(
    old_signature: &Signature<R::ChecksumType, S::HashType>,
    new_content: &[u8],
) -> Result<Delta<S::HashType>, DeltaError>
where
    R: RollingChecksum,
    <R as RollingChecksum>::ChecksumType: Eq + Hash,
    S: StrongHash,
{
    let chunk_count = old_signature.chunk_count();
    let mut delta = Delta {
        tokens: Vec::with_capacity(chunk_count),
        chunk_size: old_signature.chunk_size(),
        base_content_len: old_signature.content_len(),
        version: crate::version(),
    };
    if chunk_count == 0 {
        // nothing to reuse from empty content
        if !new_content.is_empty() {
            delta.tokens.push(Added(new_content.to_vec()));
        }
        return Ok(delta);
    }
    if old_signature.chunk_size() == 0 {
        return Err(DeltaError::EmptyChunks { chunk_count });
    }

    let mut reused_chunks = bitvec![0; chunk_count];
    let mut left = 0;

    while let Some((bytes_until_reused, chunk_number, reused_strong_hash)) =
        find_reused_chunk::<R, S>(old_signature, &new_content[left..])?
    {
        if bytes_until_reused > 0 {
            delta
                .tokens
                .push(Added(new_content[left..left + bytes_until_reused].to_vec()));
            left += bytes_until_reused;
        }
        debug!("chunk {} reused at offset {}", chunk_number, left);
        delta.tokens.push(Reused(chunk_number, reused_strong_hash));
        left += old_signature.chunk_size();
        reused_chunks.set(chunk_number as usize, true);
    }

    // couldn't find another whole chunk until the end of the new content - the remainder
    // might still be the shorter last chunk of the old content
    match find_reused_tail::<R, S>(old_signature, &new_content[left..])? {
        Some((bytes_until_reused, chunk_number, reused_strong_hash)) => {
            if bytes_until_reused > 0 {
                delta
                    .tokens
                    .push(Added(new_content[left..left + bytes_until_reused].to_vec()));
            }
            delta.tokens.push(Reused(chunk_number, reused_strong_hash));
            reused_chunks.set(chunk_number as usize, true);
        }
        None => {
            if left < new_content.len() {
                delta.tokens.push(Added(new_content[left..].to_vec()));
            }
        }
    }

    // fill up all the removed chunks at the end
    for chunk_number in reused_chunks.iter_zeros() {
        delta.tokens.push(Removed(chunk_number as ChunkNumber));
    }
    info!(
        "delta of {} new bytes against {} chunks: {} tokens, {} chunks reused",
        new_content.len(),
        chunk_count,
        delta.tokens.len(),
        reused_chunks.count_ones()
    );
    Ok(delta)
}

fn find_reused_chunk<R, S>(
    old_signature: &Signature<R::ChecksumType, S::HashType>,
    new_content: &[u8],
) -> Result<Option<(usize, ChunkNumber, S::HashType)>, DeltaError>
where
    R: RollingChecksum,
    <R as RollingChecksum>::ChecksumType: Eq + Hash,
    S: StrongHash,
{
    let chunk_size = old_signature.chunk_size();
    if chunk_size > new_content.len() {
        // there isn't a whole chunk in the new content
        return Ok(None);
    }

    let mut rolling_checksum = R::new(&new_content[..chunk_size]);
    let mut checksum = rolling_checksum.checksum();
    let mut chunk_start = 0;

    loop {
        let candidate = &new_content[chunk_start..chunk_start + chunk_size];
        if let Some((chunk_number, hash)) =
            confirm_chunk::<R::ChecksumType, S>(old_signature, &checksum, candidate)?
        {
            return Ok(Some((chunk_start, chunk_number, hash)));
        }

        if chunk_start + chunk_size >= new_content.len() {
            return Ok(None);
        }
        checksum = rolling_checksum.slide_by(new_content[chunk_start + chunk_size])?;
        chunk_start += 1;
    }
}

fn find_reused_tail<R, S>(
    old_signature: &Signature<R::ChecksumType, S::HashType>,
    remaining: &[u8],
) -> Result<Option<(usize, ChunkNumber, S::HashType)>, DeltaError>
where
    R: RollingChecksum,
    <R as RollingChecksum>::ChecksumType: Eq + Hash,
    S: StrongHash,
{
    let last_chunk_len = old_signature.last_chunk_len();
    if last_chunk_len == old_signature.chunk_size() || last_chunk_len > remaining.len() {
        // a full sized last chunk was already looked for by the sliding window
        return Ok(None);
    }

    let tail_start = remaining.len() - last_chunk_len;
    let tail = &remaining[tail_start..];
    let checksum = R::new(tail).checksum();
    Ok(confirm_chunk::<R::ChecksumType, S>(old_signature, &checksum, tail)?
        .map(|(chunk_number, hash)| (tail_start, chunk_number, hash)))
}

/// Looks the weak checksum of `candidate` up in the signature and compares strong hashes of
/// the blocks sharing it.
fn confirm_chunk<W, S>(
    old_signature: &Signature<W, S::HashType>,
    checksum: &W,
    candidate: &[u8],
) -> Result<Option<(ChunkNumber, S::HashType)>, DeltaError>
where
    W: Eq + Hash,
    S: StrongHash,
{
    let strong_hashes = match old_signature.quick_query(checksum) {
        Some(strong_hashes) => strong_hashes,
        None => return Ok(None),
    };
    let hash = S::hash(candidate);

    for &(signature_hash, chunk_number) in strong_hashes {
        if chunk_number >= old_signature.chunk_count() as ChunkNumber {
            return Err(DeltaError::ChunkOutOfBounds {
                chunk_num: chunk_number,
                chunk_count: old_signature.chunk_count(),
            });
        }
        if signature_hash == hash && old_signature.chunk_len(chunk_number) == candidate.len() {
            return Ok(Some((chunk_number, signature_hash)));
        }
    }
    Ok(None)
}
