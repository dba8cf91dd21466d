//! Per-process crypto context
//!
//! Owns the server's long-term ElGamal keypair and the process PRNG. The
//! PRNG sits behind a mutex; parallel workers never share it directly but
//! fork sub-generators via [`CryptoContext::fork_seed`].

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_TABLE;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use parking_lot::Mutex;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use zeroize::Zeroize;

use crate::elgamal;
use crate::point::{marshal_point, POINT_BYTES};

pub struct CryptoContext {
    sk: Scalar,
    pk: RistrettoPoint,
    rng: Mutex<ChaCha20Rng>,
}

impl CryptoContext {
    /// Generate a fresh keypair from OS entropy.
    pub fn new() -> Self {
        let mut rng = ChaCha20Rng::from_entropy();
        let mut wide = [0u8; 64];
        rng.fill_bytes(&mut wide);
        let sk = Scalar::from_bytes_mod_order_wide(&wide);
        wide.zeroize();
        let pk = &sk * RISTRETTO_BASEPOINT_TABLE;
        Self {
            sk,
            pk,
            rng: Mutex::new(rng),
        }
    }

    pub fn pk(&self) -> RistrettoPoint {
        self.pk
    }

    pub fn pk_bytes(&self) -> [u8; POINT_BYTES] {
        marshal_point(&self.pk)
    }

    /// The long-term secret, for layer decryption inside the shuffle hop.
    pub fn sk(&self) -> Scalar {
        self.sk
    }

    /// Strip this server's ElGamal layer from `(c1, c2)`.
    pub fn layer_decrypt(&self, c1: &RistrettoPoint, c2: &RistrettoPoint) -> RistrettoPoint {
        elgamal::layer_decrypt(&self.sk, c1, c2)
    }

    /// One Diffie-Hellman exchange: sample an ephemeral scalar `e`, return
    /// `(g*e, client_pub*e)`.
    pub fn share_secret(&self, client_pub: &RistrettoPoint) -> (RistrettoPoint, RistrettoPoint) {
        let e = self.sample_scalar();
        let eph = &e * RISTRETTO_BASEPOINT_TABLE;
        let shared = client_pub * e;
        (eph, shared)
    }

    /// Sample a uniform scalar from the process PRNG.
    pub fn sample_scalar(&self) -> Scalar {
        let mut wide = [0u8; 64];
        self.rng.lock().fill_bytes(&mut wide);
        let s = Scalar::from_bytes_mod_order_wide(&wide);
        wide.zeroize();
        s
    }

    /// Seed for a forked sub-generator. Every call draws fresh output from
    /// the parent, so no two workers ever run the same stream.
    pub fn fork_seed(&self) -> [u8; 32] {
        let mut seed = [0u8; 32];
        self.rng.lock().fill_bytes(&mut seed);
        seed
    }

    /// A uniform permutation of `[0, n)`, Fisher-Yates over the process PRNG.
    pub fn random_permutation(&self, n: usize) -> Vec<usize> {
        let mut pi: Vec<usize> = (0..n).collect();
        let mut rng = self.rng.lock();
        for i in (1..n).rev() {
            let j = (rng.next_u64() % (i as u64 + 1)) as usize;
            pi.swap(i, j);
        }
        pi
    }
}

impl Drop for CryptoContext {
    fn drop(&mut self) {
        self.sk.zeroize();
    }
}

impl std::fmt::Debug for CryptoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoContext")
            .field("pk", &self.pk.compress())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn dh_agreement() {
        let ctx = CryptoContext::new();

        // Client side of the exchange.
        let mut rng = OsRng;
        let mut wide = [0u8; 64];
        rng.fill_bytes(&mut wide);
        let a = Scalar::from_bytes_mod_order_wide(&wide);
        let client_pub = &a * RISTRETTO_BASEPOINT_TABLE;

        let (eph, server_shared) = ctx.share_secret(&client_pub);
        let client_shared = eph * a;
        assert_eq!(server_shared, client_shared);
    }

    #[test]
    fn permutation_is_a_bijection() {
        let ctx = CryptoContext::new();
        for n in [1usize, 2, 7, 64] {
            let mut pi = ctx.random_permutation(n);
            pi.sort_unstable();
            assert_eq!(pi, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn forked_seeds_differ() {
        let ctx = CryptoContext::new();
        assert_ne!(ctx.fork_seed(), ctx.fork_seed());
    }
}
