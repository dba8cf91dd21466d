//! Mixbox cluster harness
//!
//! Spins up a full in-process cluster on ephemeral ports for end-to-end
//! tests and demos, and provides the protocol-side client operations
//! (registration, DH exchange, onion upload, PIR fetch) that live outside
//! the server itself.

mod client;
mod cluster;

pub use client::MixClient;
pub use cluster::TestCluster;
