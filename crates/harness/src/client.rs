//! Protocol-side client operations
//!
//! Implements the client half of the contract against a running cluster:
//! register through a host, agree on DH masks/secrets with every server,
//! onion-encrypt uploads under the cluster key, and assemble PIR fetches
//! with a completing mask. Masks and secrets MUST be exchanged before the
//! first upload round so every server's shares line up.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use mixbox_crypto::{
    aggregate_key, embed_data, encrypt, marshal_point, unmarshal_point, EMBED_BYTES, POINT_BYTES,
};
use mixbox_pir::xor_into;
use mixbox_protocol::{
    decode, encode, routes, ClientDh, ClientId, ClientMask, ClientRegistration, ClientRequest,
    DhReply, RegisterReply, UpBlock,
};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{de::DeserializeOwned, Serialize};

pub struct MixClient {
    http: reqwest::Client,
    urls: Vec<String>,
    host: usize,
    pub id: u32,
    block_size: usize,
    /// Marshalled DH shared point per server, the server-side PIR masks.
    dh_masks: Vec<Vec<u8>>,
}

impl MixClient {
    /// Register through the host server and learn the assigned client id.
    pub async fn register(
        urls: Vec<String>,
        host: usize,
        block_size: usize,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::new();
        let reg = ClientRegistration {
            id: 0,
            addr: "in-process".to_string(),
            server_id: host as u32,
        };
        let reply: RegisterReply =
            post_msg(&http, &urls[host], routes::REGISTER, &reg).await?;
        Ok(Self {
            http,
            urls,
            host,
            id: reply.client_id,
            block_size,
            dh_masks: Vec::new(),
        })
    }

    /// Run both DH exchanges with every server. Must complete before the
    /// first upload round.
    pub async fn exchange(&mut self) -> anyhow::Result<()> {
        let mut masks = Vec::with_capacity(self.urls.len());
        for url in &self.urls {
            masks.push(self.one_exchange(url, routes::SHARE_MASK).await?);
            // The response-secret channel is zeroed server-side; the
            // client's copy is discarded to match.
            let _ = self.one_exchange(url, routes::SHARE_SECRET).await?;
        }
        self.dh_masks = masks;
        Ok(())
    }

    async fn one_exchange(&self, url: &str, route: &str) -> anyhow::Result<Vec<u8>> {
        let mut wide = [0u8; 64];
        OsRng.fill_bytes(&mut wide);
        let a = Scalar::from_bytes_mod_order_wide(&wide);
        let public = RistrettoPoint::mul_base(&a);

        let reply: DhReply = post_msg(
            &self.http,
            url,
            route,
            &ClientDh {
                id: self.id,
                public: marshal_point(&public).to_vec(),
            },
        )
        .await?;
        let eph = unmarshal_point(&reply.public)?;
        Ok(marshal_point(&(eph * a)).to_vec())
    }

    /// Registrations known to one server (the GetNumClients diagnostic).
    pub async fn num_clients_of(&self, server: usize) -> anyhow::Result<u32> {
        let body = get_raw(&self.http, &self.urls[server], routes::NUM_CLIENTS).await?;
        Ok(decode(&body)?)
    }

    /// The joint key the whole cascade is encrypted under.
    pub async fn cluster_key(&self) -> anyhow::Result<RistrettoPoint> {
        let mut pks = Vec::with_capacity(self.urls.len());
        for url in &self.urls {
            let bytes = get_raw(&self.http, url, routes::GET_PK).await?;
            pks.push(unmarshal_point(&bytes)?);
        }
        Ok(aggregate_key(&pks))
    }

    /// Chunk, embed, and onion-encrypt one block, then hand it to the host.
    pub async fn upload(&self, data: &[u8]) -> anyhow::Result<()> {
        anyhow::ensure!(
            data.len() == self.block_size,
            "upload must be exactly {} bytes",
            self.block_size
        );
        let key = self.cluster_key().await?;
        let mut rng = OsRng;

        let mut c1 = Vec::new();
        let mut c2 = Vec::new();
        for chunk in data.chunks(EMBED_BYTES) {
            let msg = embed_data(chunk, &mut rng)?;
            let (x, y) = encrypt(&key, &msg, &mut rng);
            c1.push(marshal_point(&x).to_vec());
            c2.push(marshal_point(&y).to_vec());
        }

        post_ok(
            &self.http,
            &self.urls[self.host],
            routes::UPLOAD_BLOCK,
            &UpBlock { c1, c2 },
        )
        .await
    }

    /// Send this round's request share; the host fans it to every server.
    pub async fn send_request(&self, share: Vec<Vec<u8>>) -> anyhow::Result<()> {
        post_ok(
            &self.http,
            &self.urls[self.host],
            routes::REQUEST_BLOCK,
            &ClientRequest {
                id: self.id,
                request: share,
            },
        )
        .await
    }

    /// Blocks until the round's combined request hashes publish.
    pub async fn req_hashes(&self) -> anyhow::Result<Vec<Vec<u8>>> {
        post_msg(
            &self.http,
            &self.urls[self.host],
            routes::REQ_HASHES,
            &ClientId { id: self.id },
        )
        .await
    }

    /// Blocks until the round's block digests publish. Any server answers;
    /// defaults to the host.
    pub async fn up_hashes(&self) -> anyhow::Result<Vec<Vec<u8>>> {
        self.up_hashes_from(self.host).await
    }

    pub async fn up_hashes_from(&self, server: usize) -> anyhow::Result<Vec<Vec<u8>>> {
        post_msg(
            &self.http,
            &self.urls[server],
            routes::UP_HASHES,
            &ClientId { id: self.id },
        )
        .await
    }

    /// Fetch the block at `index` without telling any single server which
    /// one: the completing mask XORs the DH masks held by every other
    /// server against the selector.
    pub async fn fetch_block(&self, index: usize) -> anyhow::Result<Vec<u8>> {
        anyhow::ensure!(!self.dh_masks.is_empty(), "exchange() must run first");

        let mut mask = vec![0u8; POINT_BYTES];
        mask[index / 8] |= 1 << (index % 8);
        for (server, dh_mask) in self.dh_masks.iter().enumerate() {
            if server != self.host {
                xor_into(&mut mask, dh_mask)?;
            }
        }

        post_msg(
            &self.http,
            &self.urls[self.host],
            routes::GET_RESPONSE,
            &ClientMask { id: self.id, mask },
        )
        .await
    }
}

async fn get_raw(http: &reqwest::Client, url: &str, path: &str) -> anyhow::Result<Vec<u8>> {
    let response = http.get(format!("{url}{path}")).send().await?;
    anyhow::ensure!(
        response.status().is_success(),
        "{path} returned {}",
        response.status()
    );
    Ok(response.bytes().await?.to_vec())
}

async fn post_raw<T: Serialize>(
    http: &reqwest::Client,
    url: &str,
    path: &str,
    msg: &T,
) -> anyhow::Result<Vec<u8>> {
    let response = http
        .post(format!("{url}{path}"))
        .header("content-type", "application/octet-stream")
        .body(encode(msg)?)
        .send()
        .await?;
    anyhow::ensure!(
        response.status().is_success(),
        "{path} returned {}",
        response.status()
    );
    Ok(response.bytes().await?.to_vec())
}

async fn post_msg<T: Serialize, R: DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    path: &str,
    msg: &T,
) -> anyhow::Result<R> {
    let body = post_raw(http, url, path, msg).await?;
    Ok(decode(&body)?)
}

async fn post_ok<T: Serialize>(
    http: &reqwest::Client,
    url: &str,
    path: &str,
    msg: &T,
) -> anyhow::Result<()> {
    post_raw(http, url, path, msg).await?;
    Ok(())
}
