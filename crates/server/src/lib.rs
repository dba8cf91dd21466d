//! Mixbox server library
//!
//! One node of a fixed cluster jointly providing anonymous block sharing.
//! The engine is a set of round pipelines over per-client mailboxes:
//! request shares are XOR-combined, uploads travel a re-encryption mix
//! cascade ordered by server id, and downloads are assembled from XOR PIR
//! shares at each client's host server.

pub mod config;
pub mod error;
pub mod mailbox;
pub mod peers;
pub mod pipeline;
pub mod registry;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use peers::connect_peers;
pub use routes::create_router;
pub use state::{AppState, RoundState, ServerState};
