//! Download / PIR pipeline endpoints

use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse};
use futures::future::try_join_all;
use mixbox_pir::{compute_response, xor_into};
use mixbox_protocol::{ClientBlock, ClientId, ClientMask};

use crate::error::{Result, ServerError};
use crate::routes::{decode_body, octet_reply};
use crate::state::AppState;

/// POST /v1/download/share - one peer's PIR share for a hosted client
pub async fn put_client_block(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let cblock: ClientBlock = decode_body(&body)?;
    let round = state.server.round()?;
    let server = cblock.server_id as usize;
    let client = cblock.client_id as usize;
    if server >= state.server.num_servers() {
        return Err(ServerError::Violation(format!(
            "share from unknown server {server}"
        )));
    }
    if client >= round.num_clients {
        return Err(ServerError::UnknownClient(cblock.client_id));
    }
    round.xors[server][client].put(cblock.block).await?;
    Ok(StatusCode::OK)
}

/// POST /v1/download/hashes - blocks until the round's block digests are
/// published, then returns them
pub async fn up_hashes(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let client: ClientId = decode_body(&body)?;
    let round = state.server.round()?;
    let id = client.id as usize;
    if id >= round.num_clients {
        return Err(ServerError::UnknownClient(client.id));
    }

    round.up_hashes_rdy[id].take().await?;
    let hashes = round.up_hashes.read().clone();
    octet_reply(&hashes)
}

/// POST /v1/download/response - assemble the PIR answer for a hosted
/// client: every other server's share, plus the local share under the
/// client's completing mask, XORed together
pub async fn get_response(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let cmask: ClientMask = decode_body(&body)?;
    let round = state.server.round()?;
    let id = cmask.id as usize;
    if id >= round.num_clients {
        return Err(ServerError::UnknownClient(cmask.id));
    }

    // One share from every other server; the local share stands in for
    // this server's slot.
    let self_id = state.server.id();
    let remote = try_join_all(
        (0..state.server.num_servers())
            .filter(|server| *server != self_id)
            .map(|server| round.xors[server][id].take()),
    )
    .await?;

    round.blocks_rdy[id].take().await?;

    let mut response = {
        let all_blocks = round.all_blocks.read();
        let secrets = round.secrets.read();
        let block_refs: Vec<&[u8]> = all_blocks.iter().map(|b| b.data.as_slice()).collect();
        compute_response(&block_refs, &cmask.mask, &secrets[id])
    };
    for share in &remote {
        xor_into(&mut response, &share.data)?;
    }

    tracing::debug!(client = cmask.id, "PIR response assembled");
    octet_reply(&response)
}
