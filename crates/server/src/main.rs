//! Mixbox server binary
//!
//! Run one node of the cluster:
//! `mixbox-server --id 0 --port 8080 --servers 127.0.0.1:8080,127.0.0.1:8081 --num-clients 2`

use std::net::SocketAddr;

use clap::Parser;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mixbox_server::{connect_peers, create_router, AppState, ServerConfig, ServerState};

#[derive(Parser, Debug)]
#[command(name = "mixbox-server", about = "One node of the mixbox cluster")]
struct Args {
    /// Bind address
    #[arg(long, env = "MIXBOX_BIND_ADDR", default_value = "0.0.0.0")]
    bind_addr: String,

    /// Listener port
    #[arg(long, short, env = "MIXBOX_PORT", default_value_t = 8080)]
    port: u16,

    /// This server's index in the server list (cascade position)
    #[arg(long, short, env = "MIXBOX_SERVER_ID")]
    id: usize,

    /// Comma-separated host:port of every server, cascade order
    #[arg(long, short, env = "MIXBOX_SERVERS", value_delimiter = ',')]
    servers: Vec<String>,

    /// Expected number of clients
    #[arg(long, short, env = "MIXBOX_NUM_CLIENTS")]
    num_clients: usize,

    /// Payload block length in bytes
    #[arg(long, env = "MIXBOX_BLOCK_SIZE", default_value_t = mixbox_protocol::DEFAULT_BLOCK_SIZE)]
    block_size: usize,

    /// Mask/secret slot length in bytes
    #[arg(long, env = "MIXBOX_SECRET_SIZE", default_value_t = mixbox_protocol::DEFAULT_SECRET_SIZE)]
    secret_size: usize,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind_addr,
            port: self.port,
            id: self.id,
            servers: self.servers,
            num_clients: self.num_clients,
            block_size: self.block_size,
            secret_size: self.secret_size,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mixbox_server=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    anyhow::ensure!(
        args.id < args.servers.len(),
        "server id {} out of range for {} servers",
        args.id,
        args.servers.len()
    );
    let config = args.into_config();

    tracing::info!("Starting mixbox server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        id = config.id,
        servers = config.num_servers(),
        num_clients = config.num_clients,
        block_size = config.block_size,
        "configuration loaded"
    );

    // Any pipeline failure lands here; the cluster cannot recover from a
    // lost message, so the node terminates.
    let (fatal_tx, mut fatal_rx) = mpsc::channel(8);
    let state = ServerState::new(config.clone(), fatal_tx);

    let app = create_router(AppState {
        server: state.clone(),
    })
    .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_address().parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server listening on {}", addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("listener failed: {e}");
        }
    });

    // Serve first, then dial: peers fetch each other's keys over the same
    // listener.
    connect_peers(&state).await?;

    tokio::select! {
        fatal = fatal_rx.recv() => {
            if let Some(err) = fatal {
                tracing::error!(error = %err, "terminating on fatal pipeline failure");
                std::process::exit(1);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }
    Ok(())
}
