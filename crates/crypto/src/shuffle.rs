//! Re-encryption shuffle
//!
//! One cascade hop permutes a column of ciphertext pairs under a shared
//! permutation and re-randomizes every pair under the remaining servers'
//! joint key. Alongside the shuffled column it emits a Fiat-Shamir proof
//! that the output column is a re-encryption of the input column in
//! aggregate: the difference of the column sums is proven to be a fresh
//! encryption of zero under the hop key (a Chaum-Pedersen equality of
//! discrete logs over a merlin transcript). The full permutation argument
//! is an extension point; proofs are generated and retained but not yet
//! routed between hops.

use curve25519_dalek::constants::RISTRETTO_BASEPOINT_TABLE;
use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use merlin::Transcript;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::error::{CryptoError, Result};
use crate::point::POINT_BYTES;

const TRANSCRIPT_LABEL: &[u8] = b"mixbox.shuffle.v1";

/// Output of one chunk's shuffle: the permuted, re-randomized column and
/// the consistency proof for it.
pub struct ChunkShuffle {
    pub xs: Vec<RistrettoPoint>,
    pub ys: Vec<RistrettoPoint>,
    pub proof: ShuffleProof,
}

/// Non-interactive aggregate re-encryption proof for one shuffled column.
///
/// Self-contained: carries the compressed column sums of both sides of the
/// statement so it can be checked without the original ciphertexts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShuffleProof {
    sum_x_in: [u8; POINT_BYTES],
    sum_y_in: [u8; POINT_BYTES],
    sum_x_out: [u8; POINT_BYTES],
    sum_y_out: [u8; POINT_BYTES],
    commit_g: [u8; POINT_BYTES],
    commit_pk: [u8; POINT_BYTES],
    response: [u8; 32],
}

/// Shuffle one column of pairs under `pi`, re-encrypting under `pk`.
///
/// Every output index j holds the re-randomization of input `pi[j]`. The
/// caller supplies the permutation so all chunks of a round stay
/// co-indexed.
pub fn shuffle_pairs<R: RngCore + CryptoRng>(
    pi: &[usize],
    pk: &RistrettoPoint,
    xs: &[RistrettoPoint],
    ys: &[RistrettoPoint],
    rng: &mut R,
) -> Result<ChunkShuffle> {
    if xs.len() != ys.len() {
        return Err(CryptoError::PairLengthMismatch {
            xs: xs.len(),
            ys: ys.len(),
        });
    }
    debug_assert_eq!(pi.len(), xs.len());

    let n = xs.len();
    let mut out_xs = Vec::with_capacity(n);
    let mut out_ys = Vec::with_capacity(n);
    let mut r_total = Scalar::ZERO;

    for &src in pi.iter().take(n) {
        let r = sample_scalar(rng);
        out_xs.push(xs[src] + &r * RISTRETTO_BASEPOINT_TABLE);
        out_ys.push(ys[src] + r * pk);
        r_total += r;
    }

    let proof = ShuffleProof::prove(pk, xs, ys, &out_xs, &out_ys, &r_total, rng);

    Ok(ChunkShuffle {
        xs: out_xs,
        ys: out_ys,
        proof,
    })
}

impl ShuffleProof {
    fn prove<R: RngCore + CryptoRng>(
        pk: &RistrettoPoint,
        xs: &[RistrettoPoint],
        ys: &[RistrettoPoint],
        out_xs: &[RistrettoPoint],
        out_ys: &[RistrettoPoint],
        r_total: &Scalar,
        rng: &mut R,
    ) -> Self {
        let sum_x_in = column_sum(xs);
        let sum_y_in = column_sum(ys);
        let sum_x_out = column_sum(out_xs);
        let sum_y_out = column_sum(out_ys);

        let w = sample_scalar(rng);
        let commit_g = &w * RISTRETTO_BASEPOINT_TABLE;
        let commit_pk = w * pk;

        let c = challenge(
            pk,
            &sum_x_in,
            &sum_y_in,
            &sum_x_out,
            &sum_y_out,
            &commit_g,
            &commit_pk,
        );
        let z = w + c * r_total;

        Self {
            sum_x_in: sum_x_in.compress().to_bytes(),
            sum_y_in: sum_y_in.compress().to_bytes(),
            sum_x_out: sum_x_out.compress().to_bytes(),
            sum_y_out: sum_y_out.compress().to_bytes(),
            commit_g: commit_g.compress().to_bytes(),
            commit_pk: commit_pk.compress().to_bytes(),
            response: z.to_bytes(),
        }
    }

    /// Check the proof against the hop key it was produced under.
    pub fn verify(&self, pk: &RistrettoPoint) -> Result<()> {
        let sum_x_in = decompress(&self.sum_x_in)?;
        let sum_y_in = decompress(&self.sum_y_in)?;
        let sum_x_out = decompress(&self.sum_x_out)?;
        let sum_y_out = decompress(&self.sum_y_out)?;
        let commit_g = decompress(&self.commit_g)?;
        let commit_pk = decompress(&self.commit_pk)?;
        let z = Option::<Scalar>::from(Scalar::from_canonical_bytes(self.response))
            .ok_or(CryptoError::ProofRejected)?;

        let c = challenge(
            pk,
            &sum_x_in,
            &sum_y_in,
            &sum_x_out,
            &sum_y_out,
            &commit_g,
            &commit_pk,
        );

        let delta_x = sum_x_out - sum_x_in;
        let delta_y = sum_y_out - sum_y_in;

        let lhs_g = &z * RISTRETTO_BASEPOINT_TABLE;
        let rhs_g = commit_g + c * delta_x;
        let lhs_pk = z * pk;
        let rhs_pk = commit_pk + c * delta_y;

        if lhs_g == rhs_g && lhs_pk == rhs_pk {
            Ok(())
        } else {
            Err(CryptoError::ProofRejected)
        }
    }

    /// The output column sums the prover committed to, for cross-checking
    /// against a received batch.
    pub fn output_sums(&self) -> Result<(RistrettoPoint, RistrettoPoint)> {
        Ok((decompress(&self.sum_x_out)?, decompress(&self.sum_y_out)?))
    }
}

fn column_sum(points: &[RistrettoPoint]) -> RistrettoPoint {
    points
        .iter()
        .fold(RistrettoPoint::identity(), |acc, p| acc + p)
}

fn sample_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    let mut wide = [0u8; 64];
    rng.fill_bytes(&mut wide);
    Scalar::from_bytes_mod_order_wide(&wide)
}

fn decompress(bytes: &[u8; POINT_BYTES]) -> Result<RistrettoPoint> {
    CompressedRistretto(*bytes)
        .decompress()
        .ok_or(CryptoError::InvalidPoint)
}

#[allow(clippy::too_many_arguments)]
fn challenge(
    pk: &RistrettoPoint,
    sum_x_in: &RistrettoPoint,
    sum_y_in: &RistrettoPoint,
    sum_x_out: &RistrettoPoint,
    sum_y_out: &RistrettoPoint,
    commit_g: &RistrettoPoint,
    commit_pk: &RistrettoPoint,
) -> Scalar {
    let mut transcript = Transcript::new(TRANSCRIPT_LABEL);
    transcript.append_message(b"pk", pk.compress().as_bytes());
    transcript.append_message(b"sum_x_in", sum_x_in.compress().as_bytes());
    transcript.append_message(b"sum_y_in", sum_y_in.compress().as_bytes());
    transcript.append_message(b"sum_x_out", sum_x_out.compress().as_bytes());
    transcript.append_message(b"sum_y_out", sum_y_out.compress().as_bytes());
    transcript.append_message(b"commit_g", commit_g.compress().as_bytes());
    transcript.append_message(b"commit_pk", commit_pk.compress().as_bytes());
    let mut wide = [0u8; 64];
    transcript.challenge_bytes(b"c", &mut wide);
    Scalar::from_bytes_mod_order_wide(&wide)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::{encrypt, layer_decrypt};
    use crate::point::{embed_data, extract_data};
    use rand::rngs::OsRng;

    fn keypair(rng: &mut OsRng) -> (Scalar, RistrettoPoint) {
        let sk = sample_scalar(rng);
        (sk, &sk * RISTRETTO_BASEPOINT_TABLE)
    }

    fn identity_permutation(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn shuffle_preserves_plaintext_multiset() {
        let mut rng = OsRng;
        let (sk, pk) = keypair(&mut rng);

        let payloads: Vec<Vec<u8>> = (0..4u8).map(|i| vec![i; 8]).collect();
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for payload in &payloads {
            let msg = embed_data(payload, &mut rng).unwrap();
            let (c1, c2) = encrypt(&pk, &msg, &mut rng);
            xs.push(c1);
            ys.push(c2);
        }

        let pi = vec![2usize, 0, 3, 1];
        let shuffled = shuffle_pairs(&pi, &pk, &xs, &ys, &mut rng).unwrap();

        let mut recovered: Vec<Vec<u8>> = shuffled
            .xs
            .iter()
            .zip(&shuffled.ys)
            .map(|(c1, c2)| extract_data(&layer_decrypt(&sk, c1, c2)).unwrap())
            .collect();
        recovered.sort();
        let mut expected = payloads.clone();
        expected.sort();
        assert_eq!(recovered, expected);

        // And co-indexing holds: output j is input pi[j].
        for (j, &src) in pi.iter().enumerate() {
            let plain = extract_data(&layer_decrypt(&sk, &shuffled.xs[j], &shuffled.ys[j])).unwrap();
            assert_eq!(plain, payloads[src]);
        }
    }

    #[test]
    fn proof_verifies() {
        let mut rng = OsRng;
        let (_, pk) = keypair(&mut rng);

        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for i in 0..3u8 {
            let msg = embed_data(&[i], &mut rng).unwrap();
            let (c1, c2) = encrypt(&pk, &msg, &mut rng);
            xs.push(c1);
            ys.push(c2);
        }

        let shuffled =
            shuffle_pairs(&identity_permutation(3), &pk, &xs, &ys, &mut rng).unwrap();
        shuffled.proof.verify(&pk).unwrap();

        // The committed output sums match the shuffled column.
        let (sum_x, sum_y) = shuffled.proof.output_sums().unwrap();
        assert_eq!(sum_x, column_sum(&shuffled.xs));
        assert_eq!(sum_y, column_sum(&shuffled.ys));
    }

    #[test]
    fn tampered_proof_is_rejected() {
        let mut rng = OsRng;
        let (_, pk) = keypair(&mut rng);

        let msg = embed_data(b"x", &mut rng).unwrap();
        let (c1, c2) = encrypt(&pk, &msg, &mut rng);
        let shuffled =
            shuffle_pairs(&identity_permutation(1), &pk, &[c1], &[c2], &mut rng).unwrap();

        let mut bad = shuffled.proof.clone();
        bad.response[0] ^= 0x01;
        assert!(bad.verify(&pk).is_err());
    }

    #[test]
    fn proof_is_bound_to_the_hop_key() {
        let mut rng = OsRng;
        let (_, pk) = keypair(&mut rng);
        let (_, other_pk) = keypair(&mut rng);

        let msg = embed_data(b"x", &mut rng).unwrap();
        let (c1, c2) = encrypt(&pk, &msg, &mut rng);
        let shuffled =
            shuffle_pairs(&identity_permutation(1), &pk, &[c1], &[c2], &mut rng).unwrap();
        assert!(shuffled.proof.verify(&other_pk).is_err());
    }

    #[test]
    fn mismatched_columns_are_rejected() {
        let mut rng = OsRng;
        let (_, pk) = keypair(&mut rng);
        let msg = embed_data(b"x", &mut rng).unwrap();
        let (c1, c2) = encrypt(&pk, &msg, &mut rng);
        assert!(matches!(
            shuffle_pairs(&[0], &pk, &[c1], &[c2, c1], &mut rng),
            Err(CryptoError::PairLengthMismatch { .. })
        ));
    }
}
