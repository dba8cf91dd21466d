//! Crypto error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CryptoError>;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("Malformed point encoding: expected {expected} bytes, got {got}")]
    MalformedPoint { expected: usize, got: usize },

    #[error("Point encoding does not decompress to a group element")]
    InvalidPoint,

    #[error("Embedding overflow: {len} bytes exceeds capacity of {max}")]
    EmbeddingOverflow { len: usize, max: usize },

    #[error("Embedding failed to converge")]
    EmbeddingFailed,

    #[error("Point does not carry embedded data")]
    NoEmbeddedData,

    #[error("Shuffle proof rejected")]
    ProofRejected,

    #[error("Shuffle input length mismatch: {xs} first components, {ys} second components")]
    PairLengthMismatch { xs: usize, ys: usize },
}
