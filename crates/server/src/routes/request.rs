//! Request pipeline endpoints

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use futures::future::try_join_all;
use mixbox_protocol::{ClientId, ClientRequest};

use crate::error::{Result, ServerError};
use crate::routes::{decode_body, octet_reply};
use crate::state::AppState;

/// POST /v1/request/block - host entry; fans the share to every server
pub async fn request_block(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let cr: ClientRequest = decode_body(&body)?;
    state.server.round()?;

    let peers = state.server.peers()?;
    let result = try_join_all(
        (0..state.server.num_servers()).map(|peer| peers.share_request(peer, &cr)),
    )
    .await;
    if let Err(err) = result {
        state.server.report_fatal("request", err);
        return Err(ServerError::Internal("request share fan-out failed".into()));
    }
    Ok(StatusCode::OK)
}

/// POST /v1/request/share - deliver one client's share into its mailbox
pub async fn share_request(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let cr: ClientRequest = decode_body(&body)?;
    let round = state.server.round()?;
    let id = cr.id as usize;
    if id >= round.num_clients {
        return Err(ServerError::UnknownClient(cr.id));
    }
    round.requests[id].put(cr.request).await?;
    Ok(StatusCode::OK)
}

/// POST /v1/request/hashes - blocks until the round's combined request
/// hashes are published, then returns them
pub async fn req_hashes(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let client: ClientId = decode_body(&body)?;
    let round = state.server.round()?;
    let id = client.id as usize;
    if id >= round.num_clients {
        return Err(ServerError::UnknownClient(client.id));
    }

    round.req_hashes_rdy[id].take().await?;
    let hashes = round.req_hashes.read().clone();
    octet_reply(&hashes)
}
