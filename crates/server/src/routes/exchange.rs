//! Mask and secret exchange endpoints
//!
//! Each is one Diffie-Hellman exchange with a registered client, called
//! exactly once per client after the barrier releases.

use axum::{body::Bytes, extract::State, response::IntoResponse};
use mixbox_crypto::{marshal_point, unmarshal_point};
use mixbox_protocol::{ClientDh, DhReply};
use zeroize::Zeroize;

use crate::error::{Result, ServerError};
use crate::routes::{decode_body, octet_reply};
use crate::state::AppState;

/// POST /v1/exchange/mask - agree on the client's PIR selection mask
pub async fn share_mask(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let dh: ClientDh = decode_body(&body)?;
    let round = state.server.round()?;
    let id = dh.id as usize;
    if id >= round.num_clients {
        return Err(ServerError::UnknownClient(dh.id));
    }

    let client_pub = unmarshal_point(&dh.public)?;
    let (eph, shared) = state.server.crypto().share_secret(&client_pub);
    round.masks.write()[id] = marshal_point(&shared).to_vec();

    tracing::debug!(client = dh.id, "PIR mask agreed");
    octet_reply(&DhReply {
        public: marshal_point(&eph).to_vec(),
    })
}

/// POST /v1/exchange/secret - agree on the client's response secret
pub async fn share_secret(State(state): State<AppState>, body: Bytes) -> Result<impl IntoResponse> {
    let dh: ClientDh = decode_body(&body)?;
    let round = state.server.round()?;
    let id = dh.id as usize;
    if id >= round.num_clients {
        return Err(ServerError::UnknownClient(dh.id));
    }

    let client_pub = unmarshal_point(&dh.public)?;
    let (eph, shared) = state.server.crypto().share_secret(&client_pub);
    {
        // The derived secret is stored and immediately retired: the
        // response-secret channel is disabled in this build and the slot
        // reverts to zeros.
        let mut secrets = round.secrets.write();
        secrets[id] = marshal_point(&shared).to_vec();
        let mut retired = std::mem::replace(
            &mut secrets[id],
            vec![0u8; state.server.config().secret_size],
        );
        retired.zeroize();
    }

    tracing::debug!(client = dh.id, "response secret exchanged");
    octet_reply(&DhReply {
        public: marshal_point(&eph).to_vec(),
    })
}
