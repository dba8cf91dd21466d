//! End-to-end demo: two servers, two clients, one full round trip.
//!
//! Run with: cargo run -p mixbox-harness --bin mixbox-demo

use mixbox_harness::{MixClient, TestCluster};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mixbox_server=info,mixbox_harness=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let block_size = 16;
    let cluster = TestCluster::start(2, 2, block_size).await?;
    tracing::info!(addrs = ?cluster.addrs, "cluster up");

    let mut alice = MixClient::register(cluster.urls(), 0, block_size).await?;
    let mut bob = MixClient::register(cluster.urls(), 1, block_size).await?;
    tracing::info!(alice = alice.id, bob = bob.id, "registered");

    alice.exchange().await?;
    bob.exchange().await?;

    let block_a = vec![0x00u8; block_size];
    let block_b = vec![0xffu8; block_size];
    alice.upload(&block_a).await?;
    bob.upload(&block_b).await?;

    let hashes = alice.up_hashes().await?;
    tracing::info!(blocks = hashes.len(), "upload round published");

    // Alice privately fetches whatever landed in slot 1.
    let fetched = alice.fetch_block(1).await?;
    tracing::info!(
        fetched = %hex(&fetched),
        "PIR fetch complete"
    );
    assert!(fetched == block_a || fetched == block_b);
    println!("fetched slot 1: {}", hex(&fetched));
    Ok(())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
