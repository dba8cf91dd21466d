//! Protocol error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProtocolError>;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Encode failed: {0}")]
    Encode(String),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Chunk count mismatch across uploads: expected {expected}, got {got}")]
    ChunkCountMismatch { expected: usize, got: usize },

    #[error("Ciphertext component counts differ within one upload: {c1} vs {c2}")]
    UnpairedChunks { c1: usize, c2: usize },

    #[error("Empty upload batch")]
    EmptyBatch,
}
