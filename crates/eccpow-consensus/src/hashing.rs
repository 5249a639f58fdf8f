//! Hash functions used by ECCPoW.

use crate::params::{HEADER_DIGEST_LEN, NONCE_BUFFER_LEN};
use sha3::{Digest, Keccak256, Keccak512};

/// Size of a trial digest (Keccak-512 output).
pub const TRIAL_DIGEST_SIZE: usize = 64;

/// Keccak-512 of `data`.
pub fn keccak512(data: &[u8]) -> [u8; TRIAL_DIGEST_SIZE] {
    let mut hasher = Keccak512::new();
    Digest::update(&mut hasher, data);
    let mut out = [0u8; TRIAL_DIGEST_SIZE];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// Keccak-256 of the signed-message envelope of `data`.
///
/// Returns the hash together with the envelope that was hashed.
pub fn legacy_hash(data: &[u8]) -> ([u8; 32], String) {
    let prefix = format!("\x19Ethereum Signed Message:\n{}", data.len());
    let mut hasher = Keccak256::new();
    Digest::update(&mut hasher, prefix.as_bytes());
    Digest::update(&mut hasher, data);
    let msg = format!("{}{}", prefix, String::from_utf8_lossy(data));
    (hasher.finalize().into(), msg)
}

/// Trial digest: `keccak512(header_digest || nonce_le)`.
///
/// The header digest is truncated or zero-padded to 32 bytes, and the nonce
/// is written little-endian into the following 8 bytes.
pub fn trial_digest(header_digest: &[u8], nonce: u64) -> [u8; TRIAL_DIGEST_SIZE] {
    let mut buf = [0u8; NONCE_BUFFER_LEN];
    let len = header_digest.len().min(HEADER_DIGEST_LEN);
    buf[..len].copy_from_slice(&header_digest[..len]);
    buf[HEADER_DIGEST_LEN..].copy_from_slice(&nonce.to_le_bytes());
    keccak512(&buf)
}
