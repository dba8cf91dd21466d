//! RPC message types
//!
//! One struct per contract operation argument/result. Group elements are
//! carried as their canonical compressed encodings; blocks as opaque byte
//! strings of the configured block length.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, Result};

/// A client's registration record. `id` is assigned by the host server
/// before the record is fanned out, so the record is globally consistent
/// after the barrier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRegistration {
    pub id: u32,
    pub addr: String,
    pub server_id: u32,
}

/// Reply to `Register`: the assigned client id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegisterReply {
    pub client_id: u32,
}

/// Barrier release: the agreed total client count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegisterDone {
    pub total_clients: u32,
}

/// One side of a Diffie-Hellman exchange with a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientDh {
    pub id: u32,
    pub public: Vec<u8>,
}

/// The server's ephemeral public point answering a [`ClientDh`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DhReply {
    pub public: Vec<u8>,
}

/// A client's per-round request share: a vector of byte strings whose
/// inner dimension every client must agree on within a round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRequest {
    pub id: u32,
    pub request: Vec<Vec<u8>>,
}

/// One client upload: per-chunk ElGamal ciphertext components, in chunk
/// order. `c1[c]` and `c2[c]` are compressed point encodings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpBlock {
    pub c1: Vec<Vec<u8>>,
    pub c2: Vec<Vec<u8>>,
}

impl UpBlock {
    pub fn chunk_count(&self) -> usize {
        self.c1.len()
    }
}

/// A decrypted payload with the round it was published in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub data: Vec<u8>,
    pub round: u64,
}

/// One server's PIR share for one client, routed to the client's host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientBlock {
    pub client_id: u32,
    pub server_id: u32,
    pub block: Block,
}

/// A hosted client's completing mask, sent with `GetResponse`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientMask {
    pub id: u32,
    pub mask: Vec<u8>,
}

/// Client id wrapper for the blocking fetch RPCs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClientId {
    pub id: u32,
}

/// Check a gathered batch: non-empty, every upload pairs its components,
/// and all uploads carry the same chunk count. Returns that count.
pub fn batch_chunk_count(batch: &[UpBlock]) -> Result<usize> {
    let first = batch.first().ok_or(ProtocolError::EmptyBatch)?;
    let chunks = first.chunk_count();
    for upload in batch {
        if upload.c1.len() != upload.c2.len() {
            return Err(ProtocolError::UnpairedChunks {
                c1: upload.c1.len(),
                c2: upload.c2.len(),
            });
        }
        if upload.chunk_count() != chunks {
            return Err(ProtocolError::ChunkCountMismatch {
                expected: chunks,
                got: upload.chunk_count(),
            });
        }
    }
    Ok(chunks)
}
