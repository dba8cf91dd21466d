//! ElGamal layer encryption
//!
//! Ciphertexts entering cascade hop i are encrypted under the sum of the
//! public keys of servers i..N-1. Each hop strips exactly its own layer:
//! `layer_decrypt` subtracts `sk * c1` from `c2`, leaving a ciphertext
//! under the remaining servers' aggregate key (or the plaintext point at
//! the final hop).

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_TABLE;
use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use rand::{CryptoRng, RngCore};

/// Sum of a set of public keys, the joint encryption key.
pub fn aggregate_key(pks: &[RistrettoPoint]) -> RistrettoPoint {
    pks.iter()
        .fold(RistrettoPoint::identity(), |acc, pk| acc + pk)
}

/// Encrypt an embedded point under `pk`, producing the pair `(c1, c2)`.
pub fn encrypt<R: RngCore + CryptoRng>(
    pk: &RistrettoPoint,
    msg: &RistrettoPoint,
    rng: &mut R,
) -> (RistrettoPoint, RistrettoPoint) {
    let mut wide = [0u8; 64];
    rng.fill_bytes(&mut wide);
    let r = Scalar::from_bytes_mod_order_wide(&wide);
    let c1 = &r * RISTRETTO_BASEPOINT_TABLE;
    let c2 = msg + r * pk;
    (c1, c2)
}

/// Strip one ElGamal layer: `c2 - sk * c1`.
pub fn layer_decrypt(sk: &Scalar, c1: &RistrettoPoint, c2: &RistrettoPoint) -> RistrettoPoint {
    c2 - sk * c1
}
