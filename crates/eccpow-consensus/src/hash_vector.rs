//! Expansion of trial digests into hash vectors.

use crate::{ConsensusError, ConsensusResult};

/// Expand the first `n / 8` bytes of `digest` into an `n`-bit vector,
/// most significant bit first.
///
/// Codes whose length is not a multiple of 8 only get `8 * (n / 8)` bits
/// from the digest; the trailing positions stay 0.
pub fn to_hash_vector(digest: &[u8], n: usize) -> ConsensusResult<Vec<u8>> {
    let needed = n / 8;
    if digest.len() < needed {
        return Err(ConsensusError::InsufficientDigest {
            needed,
            got: digest.len(),
        });
    }

    let mut hash_vector = vec![0u8; n];
    for (chunk, &byte) in hash_vector.chunks_exact_mut(8).zip(&digest[..needed]) {
        for (bit, slot) in chunk.iter_mut().enumerate() {
            *slot = (byte >> (7 - bit)) & 1;
        }
    }

    Ok(hash_vector)
}

/// Pack the whole leading bytes of a bit vector back into bytes.
pub fn from_hash_vector(bits: &[u8]) -> Vec<u8> {
    bits.chunks_exact(8)
        .map(|chunk| chunk.iter().fold(0u8, |acc, &bit| (acc << 1) | (bit & 1)))
        .collect()
}
