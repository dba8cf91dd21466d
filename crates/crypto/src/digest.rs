//! Block digests

use sha2::{Digest, Sha256};

/// Digest length of the group's hash.
pub const DIGEST_BYTES: usize = 32;

/// Hash of a published block, as announced to hosted clients.
pub fn block_digest(data: &[u8]) -> Vec<u8> {
    Sha256::digest(data).to_vec()
}
