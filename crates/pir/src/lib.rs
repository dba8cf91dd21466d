//! Mixbox PIR primitives
//!
//! The download path is a k-server XOR PIR: every server computes an
//! independent share over the published plaintexts and the shares cancel
//! at the hosting server. This crate holds the share algebra — nothing
//! here knows about rounds, channels, or the wire.

mod response;
mod xor;

pub use response::compute_response;
pub use xor::{xor_all, xor_combine_rows, xor_into};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PirError>;

#[derive(Error, Debug)]
pub enum PirError {
    #[error("XOR operands differ in length: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Request shares differ in shape: row {row} has {got} entries, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        got: usize,
    },
}
