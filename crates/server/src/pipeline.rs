//! Round pipelines
//!
//! One background loop per pipeline stage, started when the registration
//! barrier releases; each loop iteration is one round. A lost message
//! stalls the round (no timeouts in the core); any RPC or protocol failure
//! is fatal and reported for process termination.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;
use mixbox_crypto::{
    extract_data, layer_decrypt, marshal_point, shuffle_pairs, unmarshal_point, RistrettoPoint,
    ShuffleProof,
};
use mixbox_pir::{compute_response, xor_combine_rows};
use mixbox_protocol::{batch_chunk_count, Block, ClientBlock, UpBlock};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

use crate::error::{Result, ServerError};
use crate::state::ServerState;

/// Start the background pipeline loops. Upload intake gathering runs only
/// on the cascade head; every other stage runs everywhere.
pub fn spawn(state: &Arc<ServerState>) {
    spawn_loop(state, "request", request_round);
    spawn_loop(state, "upload-forward", upload_forward_round);
    if state.config().is_first_hop() {
        spawn_loop(state, "gather", gather_round);
    }
    spawn_loop(state, "shuffle", shuffle_round);
    spawn_loop(state, "response", response_round);
}

fn spawn_loop<F, Fut>(state: &Arc<ServerState>, stage: &'static str, f: F)
where
    F: Fn(Arc<ServerState>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let state = state.clone();
    tokio::spawn(async move {
        loop {
            if let Err(err) = f(state.clone()).await {
                state.report_fatal(stage, err);
                break;
            }
        }
    });
}

/// One request round: await every client's share, XOR-combine, publish,
/// and wake the hosted clients.
async fn request_round(state: Arc<ServerState>) -> Result<()> {
    let round = state.round()?.clone();

    let shares = try_join_all(round.requests.iter().map(|mailbox| mailbox.take())).await?;
    let combined = xor_combine_rows(&shares)?;
    tracing::debug!(clients = shares.len(), "request shares combined");

    *round.req_hashes.write() = combined;
    for id in state.hosted_clients() {
        let round = round.clone();
        tokio::spawn(async move {
            let _ = round.req_hashes_rdy[id as usize].put(()).await;
        });
    }
    Ok(())
}

/// Host side of the upload intake: forward each hosted client's ciphertext
/// to the cascade head.
async fn upload_forward_round(state: Arc<ServerState>) -> Result<()> {
    state.round()?;
    let upload = state.ublock.take().await?;
    state.peers()?.upload_block2(&upload).await
}

/// Cascade head only: collect exactly one upload per client, in arrival
/// order, and hand the batch to the shuffle stage.
async fn gather_round(state: Arc<ServerState>) -> Result<()> {
    let round = state.round()?.clone();
    let mut batch = Vec::with_capacity(round.num_clients);
    for _ in 0..round.num_clients {
        batch.push(state.ublock2.take().await?);
    }
    tracing::debug!(uploads = batch.len(), "upload batch gathered");
    state.shuffle.put(batch).await
}

enum HopPayload {
    /// Repackaged ciphertexts for the next hop.
    Handoff(Vec<UpBlock>),
    /// Plaintext payloads recovered at the final hop.
    Publish(Vec<Vec<u8>>),
}

/// One cascade hop: shuffle every chunk column under a shared permutation,
/// re-encrypt under the remaining servers' joint key, strip this server's
/// ElGamal layer, then hand off (or publish, at the last hop).
async fn shuffle_round(state: Arc<ServerState>) -> Result<()> {
    let round = state.round()?.clone();
    let batch = state.shuffle.take().await?;
    let started = Instant::now();

    if batch.len() != round.num_clients {
        return Err(ServerError::Violation(format!(
            "expected {} uploads in the batch, got {}",
            round.num_clients,
            batch.len()
        )));
    }
    let chunks = batch_chunk_count(&batch)?;
    let n = batch.len();

    // Transpose into per-chunk ciphertext columns.
    let mut bx: Vec<Vec<RistrettoPoint>> = vec![Vec::with_capacity(n); chunks];
    let mut by: Vec<Vec<RistrettoPoint>> = vec![Vec::with_capacity(n); chunks];
    for upload in &batch {
        for c in 0..chunks {
            bx[c].push(unmarshal_point(&upload.c1[c])?);
            by[c].push(unmarshal_point(&upload.c2[c])?);
        }
    }

    // One permutation for the whole round so every client's chunks stay
    // co-indexed; each chunk worker forks its own generator.
    let pi = state.crypto().random_permutation(n);
    let seeds: Vec<[u8; 32]> = (0..chunks).map(|_| state.crypto().fork_seed()).collect();
    let sk = state.crypto().sk();
    let hop_key = state.next_pk()?;
    let is_last = state.is_last_hop();
    let block_size = state.config().block_size;

    let (proofs, payload) = tokio::task::spawn_blocking(
        move || -> Result<(Vec<ShuffleProof>, HopPayload)> {
            let columns: Vec<(Vec<RistrettoPoint>, Vec<RistrettoPoint>, ShuffleProof)> = bx
                .into_par_iter()
                .zip(by.into_par_iter())
                .zip(seeds.into_par_iter())
                .map(|((xs, ys), seed)| {
                    let mut rng = ChaCha20Rng::from_seed(seed);
                    let shuffled = shuffle_pairs(&pi, &hop_key, &xs, &ys, &mut rng)?;
                    let decs: Vec<RistrettoPoint> = shuffled
                        .xs
                        .par_iter()
                        .zip(shuffled.ys.par_iter())
                        .map(|(c1, c2)| layer_decrypt(&sk, c1, c2))
                        .collect();
                    Ok((shuffled.xs, decs, shuffled.proof))
                })
                .collect::<Result<Vec<_>>>()?;

            let proofs = columns.iter().map(|(_, _, prf)| prf.clone()).collect();

            let payload = if is_last {
                let mut payloads = Vec::with_capacity(n);
                for j in 0..n {
                    let mut data = Vec::with_capacity(block_size);
                    for (_, decs, _) in &columns {
                        data.extend(extract_data(&decs[j])?);
                    }
                    if data.len() != block_size {
                        return Err(ServerError::Violation(format!(
                            "decoded block has {} bytes, expected {}",
                            data.len(),
                            block_size
                        )));
                    }
                    payloads.push(data);
                }
                HopPayload::Publish(payloads)
            } else {
                let handoff = (0..n)
                    .map(|j| UpBlock {
                        c1: columns
                            .iter()
                            .map(|(xbars, _, _)| marshal_point(&xbars[j]).to_vec())
                            .collect(),
                        c2: columns
                            .iter()
                            .map(|(_, decs, _)| marshal_point(&decs[j]).to_vec())
                            .collect(),
                    })
                    .collect();
                HopPayload::Handoff(handoff)
            };

            Ok((proofs, payload))
        },
    )
    .await
    .map_err(|e| ServerError::Internal(format!("shuffle worker panicked: {e}")))??;

    *round.proofs.write() = proofs;

    match payload {
        HopPayload::Handoff(batch) => {
            let next = state.id() + 1;
            tracing::info!(
                chunks,
                uploads = n,
                elapsed_ms = started.elapsed().as_millis() as u64,
                next,
                "hop complete, handing off"
            );
            state.peers()?.shuffle_blocks(next, &batch).await?;
        }
        HopPayload::Publish(payloads) => {
            let round_number = state.next_round_number();
            let blocks: Vec<Block> = payloads
                .into_iter()
                .map(|data| Block {
                    data,
                    round: round_number,
                })
                .collect();
            tracing::info!(
                chunks,
                blocks = blocks.len(),
                round = round_number,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "final hop complete, publishing plaintexts"
            );
            let peers = state.peers()?;
            try_join_all((0..state.num_servers()).map(|peer| peers.put_uploaded_blocks(peer, &blocks)))
                .await?;
        }
    }
    Ok(())
}

/// One download round: compute PIR shares for every client hosted
/// elsewhere and ship them to the host, then install the plaintexts and
/// wake hosted clients.
async fn response_round(state: Arc<ServerState>) -> Result<()> {
    let round = state.round()?.clone();
    let blocks = state.dblocks.take().await?;
    let round_number = blocks.first().map(|b| b.round).unwrap_or(0);

    {
        let masks = round.masks.read();
        let secrets = round.secrets.read();
        let block_refs: Vec<&[u8]> = blocks.iter().map(|b| b.data.as_slice()).collect();

        for client in 0..round.num_clients as u32 {
            let host = state.host_of(client)?;
            if host == state.id() as u32 {
                continue;
            }
            let share = compute_response(
                &block_refs,
                &masks[client as usize],
                &secrets[client as usize],
            );
            let cblock = ClientBlock {
                client_id: client,
                server_id: state.id() as u32,
                block: Block {
                    data: share,
                    round: round_number,
                },
            };
            let state = state.clone();
            tokio::spawn(async move {
                let outcome = match state.peers() {
                    Ok(peers) => peers.put_client_block(host as usize, &cblock).await,
                    Err(e) => Err(e),
                };
                if let Err(err) = outcome {
                    state.report_fatal("response", err);
                }
            });
        }
    }

    *round.all_blocks.write() = blocks;
    for id in state.hosted_clients() {
        let round = round.clone();
        tokio::spawn(async move {
            let _ = round.blocks_rdy[id as usize].put(()).await;
        });
    }
    tracing::debug!(round = round_number, "plaintexts installed");
    Ok(())
}
