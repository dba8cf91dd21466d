//! Upload pipeline endpoints

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use mixbox_crypto::block_digest;
use mixbox_protocol::{Block, UpBlock};

use crate::error::Result;
use crate::routes::decode_body;
use crate::state::AppState;

/// POST /v1/upload/block - host entry; the forward loop relays to hop 0
pub async fn upload_block(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let upload: UpBlock = decode_body(&body)?;
    state.server.round()?;
    state.server.ublock.put(upload).await?;
    Ok(StatusCode::OK)
}

/// POST /v1/upload/intake - cascade-head intake of one forwarded upload
pub async fn upload_intake(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let upload: UpBlock = decode_body(&body)?;
    state.server.round()?;
    state.server.ublock2.put(upload).await?;
    Ok(StatusCode::OK)
}

/// POST /v1/upload/shuffle - cascade handoff of a whole batch
pub async fn shuffle_blocks(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let batch: Vec<UpBlock> = decode_body(&body)?;
    state.server.round()?;
    state.server.shuffle.put(batch).await?;
    Ok(StatusCode::OK)
}

/// POST /v1/upload/published - final plaintext broadcast from the last hop
pub async fn put_uploaded_blocks(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let blocks: Vec<Block> = decode_body(&body)?;
    let round = state.server.round()?.clone();

    // Hashes must be fully populated before any hosted client is woken.
    *round.up_hashes.write() = blocks.iter().map(|b| block_digest(&b.data)).collect();
    for id in state.server.hosted_clients() {
        let round = round.clone();
        tokio::spawn(async move {
            let _ = round.up_hashes_rdy[id as usize].put(()).await;
        });
    }

    state.server.dblocks.put(blocks).await?;
    Ok(StatusCode::OK)
}
