//! Mixbox end-to-end integration tests
//!
//! Every test brings up a real in-process cluster on ephemeral ports and
//! drives it through the HTTP surface, exactly as external clients would.

use mixbox_crypto::block_digest;
use mixbox_harness::{MixClient, TestCluster};
use mixbox_pir::xor_combine_rows;

const BLOCK_SIZE: usize = 16;

async fn two_by_two() -> (TestCluster, MixClient, MixClient) {
    let cluster = TestCluster::start(2, 2, BLOCK_SIZE).await.unwrap();
    let c0 = MixClient::register(cluster.urls(), 0, BLOCK_SIZE).await.unwrap();
    let c1 = MixClient::register(cluster.urls(), 1, BLOCK_SIZE).await.unwrap();
    (cluster, c0, c1)
}

// =============================================================================
// Section 1: Registration barrier
// =============================================================================

mod registration_tests {
    use super::*;

    /// Both servers agree on the totals and the host map after the
    /// two-phase barrier releases.
    #[tokio::test(flavor = "multi_thread")]
    async fn barrier_synchronizes_cluster() {
        let (cluster, c0, c1) = two_by_two().await;

        assert_eq!(c0.id, 0);
        assert_eq!(c1.id, 1);

        for server in &cluster.servers {
            assert_eq!(server.registry().len(), 2);
            assert!(server.reg_done());
            let map = server.registry().client_map();
            assert_eq!(map.get(&0), Some(&0));
            assert_eq!(map.get(&1), Some(&1));
        }
        let maps: Vec<_> = cluster
            .servers
            .iter()
            .map(|s| s.registry().client_map())
            .collect();
        assert_eq!(maps[0], maps[1]);

        assert_eq!(c0.num_clients_of(0).await.unwrap(), 2);
        assert_eq!(c0.num_clients_of(1).await.unwrap(), 2);
    }

    /// Every server fetched the same key set, and the head's cascade key
    /// is the whole cluster's aggregate.
    #[tokio::test(flavor = "multi_thread")]
    async fn cluster_keys_agree() {
        let cluster = TestCluster::start(3, 1, BLOCK_SIZE).await.unwrap();
        let reference: Vec<_> = cluster.servers[0].pks().unwrap().to_vec();
        for server in &cluster.servers[1..] {
            assert_eq!(server.pks().unwrap(), &reference[..]);
        }
        let aggregate = mixbox_crypto::aggregate_key(&reference);
        assert_eq!(cluster.servers[0].next_pk().unwrap(), aggregate);
    }
}

// =============================================================================
// Section 2: Mask and secret exchange
// =============================================================================

mod exchange_tests {
    use super::*;
    use mixbox_crypto::POINT_BYTES;
    use mixbox_protocol::DEFAULT_SECRET_SIZE;

    /// After the exchange every server holds a DH-derived mask per client,
    /// while the response-secret slots stay zeroed.
    #[tokio::test(flavor = "multi_thread")]
    async fn masks_set_and_secrets_stay_zeroed() {
        let (cluster, mut c0, mut c1) = two_by_two().await;
        c0.exchange().await.unwrap();
        c1.exchange().await.unwrap();

        for server in &cluster.servers {
            let masks = server.masks();
            assert_eq!(masks.len(), 2);
            for mask in &masks {
                assert_eq!(mask.len(), POINT_BYTES);
                assert!(mask.iter().any(|&b| b != 0));
            }

            let secrets = server.secrets();
            assert_eq!(secrets.len(), 2);
            for secret in &secrets {
                assert_eq!(secret, &vec![0u8; DEFAULT_SECRET_SIZE]);
            }
        }
    }
}

// =============================================================================
// Section 3: Upload round (shuffle cascade)
// =============================================================================

mod upload_tests {
    use super::*;

    /// After the cascade, the published multiset equals the uploaded
    /// multiset; the permutation itself is unobservable.
    #[tokio::test(flavor = "multi_thread")]
    async fn cascade_publishes_uploaded_multiset() {
        let (mut cluster, mut c0, mut c1) = two_by_two().await;
        c0.exchange().await.unwrap();
        c1.exchange().await.unwrap();

        let block_a = vec![0x00u8; BLOCK_SIZE];
        let block_b = vec![0xffu8; BLOCK_SIZE];
        c0.upload(&block_a).await.unwrap();
        c1.upload(&block_b).await.unwrap();

        let mut hashes = c0.up_hashes().await.unwrap();
        assert_eq!(hashes.len(), 2);
        hashes.sort();
        let mut expected = vec![block_digest(&block_a), block_digest(&block_b)];
        expected.sort();
        assert_eq!(hashes, expected);
        cluster.assert_no_fatal();
    }

    /// The last hop's broadcast leaves every server with byte-identical
    /// digests.
    #[tokio::test(flavor = "multi_thread")]
    async fn published_hashes_identical_on_every_server() {
        let (mut cluster, mut c0, mut c1) = two_by_two().await;
        c0.exchange().await.unwrap();
        c1.exchange().await.unwrap();

        c0.upload(&vec![0x11u8; BLOCK_SIZE]).await.unwrap();
        c1.upload(&vec![0x22u8; BLOCK_SIZE]).await.unwrap();

        // c0 is hosted on server 0, c1 on server 1; each asks its host.
        let from_s0 = c0.up_hashes_from(0).await.unwrap();
        let from_s1 = c1.up_hashes_from(1).await.unwrap();
        assert_eq!(from_s0, from_s1);
        cluster.assert_no_fatal();
    }

    /// Each hop's retained shuffle proofs verify against that hop's
    /// cascade key.
    #[tokio::test(flavor = "multi_thread")]
    async fn shuffle_proofs_verify_per_hop() {
        let (mut cluster, mut c0, mut c1) = two_by_two().await;
        c0.exchange().await.unwrap();
        c1.exchange().await.unwrap();

        c0.upload(&vec![0x33u8; BLOCK_SIZE]).await.unwrap();
        c1.upload(&vec![0x44u8; BLOCK_SIZE]).await.unwrap();
        let _ = c0.up_hashes().await.unwrap();

        for server in &cluster.servers {
            let hop_key = server.next_pk().unwrap();
            let round = server.round().unwrap().clone();
            let proofs = round.proofs.read();
            assert!(!proofs.is_empty(), "hop retained no proofs");
            for proof in proofs.iter() {
                proof.verify(&hop_key).unwrap();
            }
        }
        cluster.assert_no_fatal();
    }
}

// =============================================================================
// Section 4: Request round
// =============================================================================

mod request_tests {
    use super::*;

    /// The published request hashes are the XOR of every client's share,
    /// identical on both servers.
    #[tokio::test(flavor = "multi_thread")]
    async fn request_hashes_are_xor_of_shares() {
        let (mut cluster, c0, c1) = two_by_two().await;

        let q0 = vec![vec![0x0fu8; 32], vec![0xaau8; 32]];
        let q1 = vec![vec![0xf0u8; 32], vec![0x55u8; 32]];
        c0.send_request(q0.clone()).await.unwrap();
        c1.send_request(q1.clone()).await.unwrap();

        let expected = xor_combine_rows(&[q0, q1]).unwrap();
        let on_s0 = c0.req_hashes().await.unwrap();
        let on_s1 = c1.req_hashes().await.unwrap();
        assert_eq!(on_s0, expected);
        assert_eq!(on_s1, expected);
        cluster.assert_no_fatal();
    }
}

// =============================================================================
// Section 5: Download round (PIR)
// =============================================================================

mod download_tests {
    use super::*;

    /// A client retrieves the block at a chosen slot; no single server
    /// sees the selector.
    #[tokio::test(flavor = "multi_thread")]
    async fn pir_fetch_returns_selected_slot() {
        let (mut cluster, mut c0, mut c1) = two_by_two().await;
        c0.exchange().await.unwrap();
        c1.exchange().await.unwrap();

        let block_a = vec![0x00u8; BLOCK_SIZE];
        let block_b = vec![0xffu8; BLOCK_SIZE];
        c0.upload(&block_a).await.unwrap();
        c1.upload(&block_b).await.unwrap();

        // Identify what landed in slot 1, then fetch it privately.
        let hashes = c0.up_hashes().await.unwrap();
        let expected = if hashes[1] == block_digest(&block_b) {
            block_b.clone()
        } else {
            block_a.clone()
        };

        let fetched = c0.fetch_block(1).await.unwrap();
        assert_eq!(fetched, expected);
        cluster.assert_no_fatal();
    }

    /// Both clients can fetch in the same round.
    #[tokio::test(flavor = "multi_thread")]
    async fn both_clients_fetch_in_one_round() {
        let (mut cluster, mut c0, mut c1) = two_by_two().await;
        c0.exchange().await.unwrap();
        c1.exchange().await.unwrap();

        let block_a = vec![0x5au8; BLOCK_SIZE];
        let block_b = vec![0xa5u8; BLOCK_SIZE];
        c0.upload(&block_a).await.unwrap();
        c1.upload(&block_b).await.unwrap();

        let hashes = c0.up_hashes().await.unwrap();
        let at = |slot: usize| {
            if hashes[slot] == block_digest(&block_a) {
                block_a.clone()
            } else {
                block_b.clone()
            }
        };

        assert_eq!(c0.fetch_block(0).await.unwrap(), at(0));
        assert_eq!(c1.fetch_block(1).await.unwrap(), at(1));
        cluster.assert_no_fatal();
    }
}

// =============================================================================
// Section 6: Boundary cases
// =============================================================================

mod boundary_tests {
    use super::*;

    /// N = 1: the single server is first and last hop; the cascade
    /// degenerates to one shuffle + decrypt + broadcast.
    #[tokio::test(flavor = "multi_thread")]
    async fn single_server_cluster() {
        let mut cluster = TestCluster::start(1, 2, BLOCK_SIZE).await.unwrap();
        let mut c0 = MixClient::register(cluster.urls(), 0, BLOCK_SIZE).await.unwrap();
        let mut c1 = MixClient::register(cluster.urls(), 0, BLOCK_SIZE).await.unwrap();
        c0.exchange().await.unwrap();
        c1.exchange().await.unwrap();

        let block_a = vec![0x01u8; BLOCK_SIZE];
        let block_b = vec![0x02u8; BLOCK_SIZE];
        c0.upload(&block_a).await.unwrap();
        c1.upload(&block_b).await.unwrap();

        let hashes = c0.up_hashes().await.unwrap();
        let expected = if hashes[0] == block_digest(&block_a) {
            block_a
        } else {
            block_b
        };
        assert_eq!(c0.fetch_block(0).await.unwrap(), expected);
        cluster.assert_no_fatal();
    }

    /// numClients = 1: the shuffle is trivial and the answer is the single
    /// block.
    #[tokio::test(flavor = "multi_thread")]
    async fn single_client() {
        let mut cluster = TestCluster::start(2, 1, BLOCK_SIZE).await.unwrap();
        let mut c0 = MixClient::register(cluster.urls(), 0, BLOCK_SIZE).await.unwrap();
        c0.exchange().await.unwrap();

        let block = vec![0xabu8; BLOCK_SIZE];
        c0.upload(&block).await.unwrap();

        let hashes = c0.up_hashes().await.unwrap();
        assert_eq!(hashes, vec![block_digest(&block)]);
        assert_eq!(c0.fetch_block(0).await.unwrap(), block);
        cluster.assert_no_fatal();
    }

    /// Blocks wider than one embedded point exercise the multi-chunk
    /// cascade (64 bytes = 3 chunks).
    #[tokio::test(flavor = "multi_thread")]
    async fn multi_chunk_blocks() {
        let block_size = 64;
        let mut cluster = TestCluster::start(2, 2, block_size).await.unwrap();
        let mut c0 = MixClient::register(cluster.urls(), 0, block_size).await.unwrap();
        let mut c1 = MixClient::register(cluster.urls(), 1, block_size).await.unwrap();
        c0.exchange().await.unwrap();
        c1.exchange().await.unwrap();

        let block_a: Vec<u8> = (0..block_size as u8).collect();
        let block_b: Vec<u8> = (0..block_size as u8).rev().collect();
        c0.upload(&block_a).await.unwrap();
        c1.upload(&block_b).await.unwrap();

        let hashes = c0.up_hashes().await.unwrap();
        let expected = if hashes[1] == block_digest(&block_b) {
            block_b
        } else {
            block_a
        };
        assert_eq!(c0.fetch_block(1).await.unwrap(), expected);
        cluster.assert_no_fatal();
    }
}
