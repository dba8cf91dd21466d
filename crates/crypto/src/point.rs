//! Point marshalling and data embedding
//!
//! Group elements travel as their canonical 32-byte compressed encoding.
//! Plaintext chunks are embedded into points by rejection sampling over
//! candidate encodings: the low byte carries the payload length shifted
//! left by one (the low bit of a valid encoding must be clear), the payload
//! occupies the next bytes, and the remaining tail is resampled until the
//! candidate decompresses. Compressing the point recovers the exact
//! encoding, so embedded data survives any number of homomorphic layers.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use rand::{CryptoRng, RngCore};

use crate::error::{CryptoError, Result};

/// Canonical compressed encoding length.
pub const POINT_BYTES: usize = 32;

/// Payload capacity of a single embedded point.
pub const EMBED_BYTES: usize = 29;

/// Resampling bound. A candidate encoding is valid with probability around
/// one quarter, so hitting this bound means the RNG is broken.
const MAX_EMBED_ATTEMPTS: usize = 10_000;

/// Number of chunks a block of `block_size` bytes splits into.
pub fn chunk_count(block_size: usize) -> usize {
    block_size.div_ceil(EMBED_BYTES).max(1)
}

/// Encode a point to its canonical compressed form.
pub fn marshal_point(point: &RistrettoPoint) -> [u8; POINT_BYTES] {
    point.compress().to_bytes()
}

/// Decode a canonical compressed encoding.
pub fn unmarshal_point(bytes: &[u8]) -> Result<RistrettoPoint> {
    let compressed =
        CompressedRistretto::from_slice(bytes).map_err(|_| CryptoError::MalformedPoint {
            expected: POINT_BYTES,
            got: bytes.len(),
        })?;
    compressed.decompress().ok_or(CryptoError::InvalidPoint)
}

/// Embed up to [`EMBED_BYTES`] of data into a fresh group element.
pub fn embed_data<R: RngCore + CryptoRng>(data: &[u8], rng: &mut R) -> Result<RistrettoPoint> {
    if data.len() > EMBED_BYTES {
        return Err(CryptoError::EmbeddingOverflow {
            len: data.len(),
            max: EMBED_BYTES,
        });
    }

    let mut buf = [0u8; POINT_BYTES];
    buf[0] = (data.len() as u8) << 1;
    buf[1..1 + data.len()].copy_from_slice(data);

    for _ in 0..MAX_EMBED_ATTEMPTS {
        rng.fill_bytes(&mut buf[1 + data.len()..]);
        // Keep the field element canonical: clear the top bit.
        buf[POINT_BYTES - 1] &= 0x7f;
        let compressed = CompressedRistretto(buf);
        if let Some(point) = compressed.decompress() {
            return Ok(point);
        }
    }
    Err(CryptoError::EmbeddingFailed)
}

/// Recover the data embedded by [`embed_data`].
pub fn extract_data(point: &RistrettoPoint) -> Result<Vec<u8>> {
    let buf = point.compress().to_bytes();
    let len = (buf[0] >> 1) as usize;
    if len > EMBED_BYTES {
        return Err(CryptoError::NoEmbeddedData);
    }
    Ok(buf[1..1 + len].to_vec())
}
