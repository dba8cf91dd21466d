//! In-process cluster bring-up
//!
//! Binds every server on an ephemeral port first so the shared address
//! list is known, then serves and dials. The server states stay reachable
//! for cross-server invariant checks.

use std::sync::Arc;

use futures::future::try_join_all;
use mixbox_protocol::DEFAULT_SECRET_SIZE;
use mixbox_server::{connect_peers, create_router, AppState, ServerConfig, ServerError, ServerState};
use tokio::sync::mpsc;

pub struct TestCluster {
    pub servers: Vec<Arc<ServerState>>,
    pub addrs: Vec<String>,
    // Keep the fatal receivers alive so pipeline failures are observable.
    fatal_rxs: Vec<mpsc::Receiver<ServerError>>,
}

impl TestCluster {
    /// Start `num_servers` servers expecting `num_clients` clients.
    pub async fn start(
        num_servers: usize,
        num_clients: usize,
        block_size: usize,
    ) -> anyhow::Result<Self> {
        // Bind everything first so every config carries the full list.
        let mut listeners = Vec::with_capacity(num_servers);
        let mut addrs = Vec::with_capacity(num_servers);
        for _ in 0..num_servers {
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
            addrs.push(listener.local_addr()?.to_string());
            listeners.push(listener);
        }

        let mut servers = Vec::with_capacity(num_servers);
        let mut fatal_rxs = Vec::with_capacity(num_servers);
        for (id, listener) in listeners.into_iter().enumerate() {
            let config = ServerConfig {
                bind_addr: "127.0.0.1".to_string(),
                port: listener.local_addr()?.port(),
                id,
                servers: addrs.clone(),
                num_clients,
                block_size,
                secret_size: DEFAULT_SECRET_SIZE,
            };
            let (fatal_tx, fatal_rx) = mpsc::channel(8);
            let state = ServerState::new(config, fatal_tx);
            let app = create_router(AppState {
                server: state.clone(),
            });
            tokio::spawn(async move {
                let _ = axum::serve(listener, app).await;
            });
            servers.push(state);
            fatal_rxs.push(fatal_rx);
        }

        try_join_all(servers.iter().map(connect_peers)).await?;

        Ok(Self {
            servers,
            addrs,
            fatal_rxs,
        })
    }

    pub fn urls(&self) -> Vec<String> {
        self.addrs.iter().map(|a| format!("http://{a}")).collect()
    }

    /// Fail if any server reported a fatal pipeline error.
    pub fn assert_no_fatal(&mut self) {
        for (id, rx) in self.fatal_rxs.iter_mut().enumerate() {
            if let Ok(err) = rx.try_recv() {
                panic!("server {id} reported fatal pipeline error: {err}");
            }
        }
    }
}
