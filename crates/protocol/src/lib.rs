//! Mixbox protocol crate
//!
//! Serde message types for every RPC in the contract, the route table both
//! sides agree on, and the bincode wire helpers. Payload bodies travel as
//! `application/octet-stream`.

mod constants;
mod error;
mod messages;
mod wire;

pub use constants::*;
pub use error::{ProtocolError, Result};
pub use messages::*;
pub use wire::{decode, encode};
