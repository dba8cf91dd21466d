//! Outbound RPC mesh
//!
//! Every server dials every server, itself included — the loopback call
//! keeps broadcast code uniform. Peer addresses come from the shared
//! server list; the index into it is both the peer id and its cascade
//! position.

use std::sync::Arc;
use std::time::Duration;

use mixbox_crypto::{aggregate_key, unmarshal_point};
use mixbox_protocol::{
    encode, routes, Block, ClientBlock, ClientRegistration, ClientRequest, RegisterDone, UpBlock,
};
use serde::Serialize;

use crate::error::{Result, ServerError};
use crate::state::ServerState;

/// How long to keep retrying peers during cluster bring-up.
const CONNECT_ATTEMPTS: usize = 100;
const CONNECT_BACKOFF: Duration = Duration::from_millis(200);

pub struct PeerMesh {
    http: reqwest::Client,
    urls: Vec<String>,
}

impl PeerMesh {
    pub fn new(servers: &[String]) -> Self {
        Self {
            http: reqwest::Client::new(),
            urls: servers.iter().map(|addr| format!("http://{addr}")).collect(),
        }
    }

    pub fn num_peers(&self) -> usize {
        self.urls.len()
    }

    async fn get_raw(&self, peer: usize, path: &str) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.urls[peer], path);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| ServerError::Rpc {
                peer,
                detail: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(ServerError::Rpc {
                peer,
                detail: format!("{} returned {}", path, response.status()),
            });
        }
        let body = response.bytes().await.map_err(|e| ServerError::Rpc {
            peer,
            detail: e.to_string(),
        })?;
        Ok(body.to_vec())
    }

    async fn post_msg<T: Serialize>(&self, peer: usize, path: &str, msg: &T) -> Result<Vec<u8>> {
        let body = encode(msg)?;
        let url = format!("{}{}", self.urls[peer], path);
        let response = self
            .http
            .post(&url)
            .header("content-type", "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| ServerError::Rpc {
                peer,
                detail: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(ServerError::Rpc {
                peer,
                detail: format!("{} returned {}", path, response.status()),
            });
        }
        let body = response.bytes().await.map_err(|e| ServerError::Rpc {
            peer,
            detail: e.to_string(),
        })?;
        Ok(body.to_vec())
    }

    /// Fetch a peer's long-term public key (raw compressed point bytes).
    pub async fn get_pk(&self, peer: usize) -> Result<Vec<u8>> {
        self.get_raw(peer, routes::GET_PK).await
    }

    pub async fn register2(&self, peer: usize, reg: &ClientRegistration) -> Result<()> {
        self.post_msg(peer, routes::REGISTER_FANIN, reg).await?;
        Ok(())
    }

    pub async fn register_done2(&self, peer: usize, total_clients: u32) -> Result<()> {
        self.post_msg(peer, routes::REGISTER_DONE, &RegisterDone { total_clients })
            .await?;
        Ok(())
    }

    pub async fn share_request(&self, peer: usize, request: &ClientRequest) -> Result<()> {
        self.post_msg(peer, routes::SHARE_REQUEST, request).await?;
        Ok(())
    }

    /// Forward an upload to the cascade head.
    pub async fn upload_block2(&self, block: &UpBlock) -> Result<()> {
        self.post_msg(0, routes::UPLOAD_INTAKE, block).await?;
        Ok(())
    }

    pub async fn shuffle_blocks(&self, peer: usize, batch: &Vec<UpBlock>) -> Result<()> {
        self.post_msg(peer, routes::SHUFFLE_BLOCKS, batch).await?;
        Ok(())
    }

    pub async fn put_uploaded_blocks(&self, peer: usize, blocks: &Vec<Block>) -> Result<()> {
        self.post_msg(peer, routes::PUT_UPLOADED_BLOCKS, blocks)
            .await?;
        Ok(())
    }

    pub async fn put_client_block(&self, peer: usize, cblock: &ClientBlock) -> Result<()> {
        self.post_msg(peer, routes::PUT_CLIENT_BLOCK, cblock).await?;
        Ok(())
    }
}

/// Dial every server, fetch its public key, and derive the cascade key.
/// Must complete before any round begins; a peer that never comes up is
/// fatal.
pub async fn connect_peers(state: &Arc<ServerState>) -> Result<()> {
    let mesh = PeerMesh::new(&state.config().servers);
    let n = mesh.num_peers();

    let mut pks = Vec::with_capacity(n);
    for peer in 0..n {
        let bytes = fetch_pk_with_retry(&mesh, peer).await?;
        pks.push(unmarshal_point(&bytes)?);
        tracing::debug!(peer, "fetched peer public key");
    }

    // The key this hop re-encrypts under: every key at or beyond our
    // cascade position.
    let next_pk = aggregate_key(&pks[state.id()..]);

    tracing::info!(
        id = state.id(),
        servers = n,
        "connected to cluster, cascade key derived"
    );
    state.install_peers(mesh, pks, next_pk);
    Ok(())
}

async fn fetch_pk_with_retry(mesh: &PeerMesh, peer: usize) -> Result<Vec<u8>> {
    let mut last_err = None;
    for _ in 0..CONNECT_ATTEMPTS {
        match mesh.get_pk(peer).await {
            Ok(bytes) => return Ok(bytes),
            Err(e) => {
                last_err = Some(e);
                tokio::time::sleep(CONNECT_BACKOFF).await;
            }
        }
    }
    Err(last_err.unwrap_or(ServerError::Rpc {
        peer,
        detail: "unreachable".into(),
    }))
}
