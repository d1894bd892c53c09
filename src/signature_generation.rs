use std::collections::HashMap;
use std::hash::Hash;

use log::info;
use rayon::iter::{IndexedParallelIterator, ParallelIterator};
use rayon::slice::ParallelSlice;

use crate::rolling_checksum::RollingChecksum;
use crate::strong_hash::StrongHash;
use crate::{ChunkNumber, Signature};

/// Splits `content` into blocks of `chunk_size` bytes (the last one may be shorter) and
/// fingerprints every block with a weak checksum and a strong hash.
///
/// `None` or `Some(0)` lets [`determine_chunk_size`] pick the block size.
pub fn generate_signature<R, S>(
    content: &[u8],
    chunk_size: Option<usize>,
) -> Signature<R::ChecksumType, S::HashType>
where
    R: RollingChecksum,
    <R as RollingChecksum>::ChecksumType: Eq + Hash,
    S: StrongHash,
    <R as RollingChecksum>::ChecksumType: Send + Copy,
    <S as StrongHash>::HashType: Send,
{
    let version = crate::version();
    if content.is_empty() {
        return Signature {
            checksum_to_hashes: HashMap::<R::ChecksumType, Vec<(S::HashType, ChunkNumber)>>::new(),
            chunk_size: 0,
            chunk_count: 0,
            content_len: 0,
            version,
        };
    }
    let chunk_size = match chunk_size {
        Some(chunk_size) if chunk_size > 0 => chunk_size.min(content.len()),
        _ => determine_chunk_size::<R::ChecksumType, S::HashType>(content.len()),
    };
    info!(
        "content len: {} chunk count: {}; chunk size: {}",
        content.len(),
        (content.len() as f64 / (chunk_size as f64)).ceil(),
        chunk_size
    );

    // every block gets its own checksum state, so they can be computed in parallel
    let checksum_hash_tuples: Vec<(usize, R::ChecksumType, S::HashType)> = content
        .par_chunks(chunk_size)
        .enumerate()
        .map(|(chunk_number, chunk)| {
            let checksum = R::new(chunk).checksum();
            let hash = S::hash(chunk);
            (chunk_number, checksum, hash)
        })
        .collect();

    let mut signature_map: HashMap<R::ChecksumType, Vec<(S::HashType, ChunkNumber)>> =
        HashMap::with_capacity(checksum_hash_tuples.len());

    let chunk_count = checksum_hash_tuples.len();
    // go through all chunks sequentially - if this is too slow,
    // concurrent hash maps are an option that might speed things up
    for (chunk_number, checksum, hash) in checksum_hash_tuples {
        signature_map
            .entry(checksum)
            .or_insert_with(|| Vec::with_capacity(1))
            .push((hash, chunk_number as ChunkNumber));
    }

    Signature {
        checksum_to_hashes: signature_map,
        chunk_size,
        chunk_count,
        content_len: content.len(),
        version,
    }
}

const MAGIC_CHUNK_COUNT: usize = (1 << 10) << 2;

///
/// Determines a "good" chunk size based on the content length
///
/// ```
/// use rolling_window_diff::signature_generation::determine_chunk_size;
/// use rolling_window_diff::ChunkNumber;
///
///
/// // when the overhead of hashes is bigger than the content
/// assert_eq!(determine_chunk_size::<u64, u64>(6), 6);
///
/// let overhead = 1 + 1 + std::mem::size_of::<ChunkNumber>();
/// let content_len = 20 * overhead;
/// // can fit 20 overheads -> the next smaller power of 2 == 16
/// assert_eq!(determine_chunk_size::<u8, u8>(content_len), content_len / 16);
/// ```
pub fn determine_chunk_size<R, S>(content_len: usize) -> usize {
    let overhead_per_chunk =
        std::mem::size_of::<R>() + std::mem::size_of::<S>() + std::mem::size_of::<ChunkNumber>();

    let mut chunk_count = MAGIC_CHUNK_COUNT;
    while chunk_count > 0 {
        let overhead = chunk_count * overhead_per_chunk;
        if overhead >= content_len {
            chunk_count >>= 1;
        } else {
            break;
        }
    }
    if chunk_count == 0 {
        // the overhead of having signatures will defeat the purpose of having multiple chunks
        // just having 1 chunk will be better
        return content_len;
    }

    // TODO: cap the chunk size - 10GB with MAGIC_CHUNK_COUNT=4k gives 2.5MB blocks
    content_len / chunk_count
}
