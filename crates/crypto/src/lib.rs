//! Mixbox cryptography
//!
//! Everything the cascade needs from the group lives here: point
//! marshalling and data embedding, ElGamal layer encryption, the
//! Diffie-Hellman exchange used for PIR masks, and the re-encryption
//! shuffle with its Fiat-Shamir consistency proof.
//!
//! All servers share the ristretto255 group; a single ChaCha20 PRNG seeded
//! from OS entropy drives every sampling operation in a process. Workers
//! that need their own generator fork a sub-generator from it (fresh seed,
//! never a copy).

mod context;
mod digest;
mod elgamal;
mod error;
mod point;
mod shuffle;

pub use context::CryptoContext;
pub use digest::{block_digest, DIGEST_BYTES};
pub use elgamal::{aggregate_key, encrypt, layer_decrypt};
pub use error::{CryptoError, Result};
pub use point::{
    chunk_count, embed_data, extract_data, marshal_point, unmarshal_point, EMBED_BYTES, POINT_BYTES,
};
pub use shuffle::{shuffle_pairs, ChunkShuffle, ShuffleProof};

pub use curve25519_dalek::ristretto::RistrettoPoint;
pub use curve25519_dalek::scalar::Scalar;
