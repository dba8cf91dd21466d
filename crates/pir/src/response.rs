//! Per-server PIR response
//!
//! The selection is XOR-linear in the mask, which is what makes the
//! multi-server scheme work: the XOR of every server's response under
//! masks m_0..m_{N-1} equals the single response under m_0 ⊕ … ⊕ m_{N-1}.

/// XOR of the blocks selected by `mask` bit-positions, whitened by XOR
/// with `secret` cycled to the block length. Bit j of the mask (LSB-first
/// within each byte) selects block j; bits beyond the block count are
/// ignored.
pub fn compute_response<B: AsRef<[u8]>>(blocks: &[B], mask: &[u8], secret: &[u8]) -> Vec<u8> {
    let block_len = blocks.first().map(|b| b.as_ref().len()).unwrap_or(0);
    let mut out = vec![0u8; block_len];

    for (j, block) in blocks.iter().enumerate() {
        let selected = mask
            .get(j / 8)
            .map(|byte| (byte >> (j % 8)) & 1 == 1)
            .unwrap_or(false);
        if selected {
            for (o, b) in out.iter_mut().zip(block.as_ref()) {
                *o ^= b;
            }
        }
    }

    if !secret.is_empty() {
        for (k, o) in out.iter_mut().enumerate() {
            *o ^= secret[k % secret.len()];
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xor_all;

    fn selector(index: usize, len: usize) -> Vec<u8> {
        let mut mask = vec![0u8; len];
        mask[index / 8] |= 1 << (index % 8);
        mask
    }

    fn test_blocks() -> Vec<Vec<u8>> {
        (0..4u8).map(|i| vec![i * 0x11; 8]).collect()
    }

    #[test]
    fn unit_selector_returns_the_block() {
        let blocks = test_blocks();
        let zeros = vec![0u8; 16];
        for (j, block) in blocks.iter().enumerate() {
            let mask = selector(j, 16);
            assert_eq!(&compute_response(&blocks, &mask, &zeros), block);
        }
    }

    #[test]
    fn response_is_xor_linear_in_the_mask() {
        let blocks = test_blocks();
        let zeros = vec![0u8; 16];
        let m1 = selector(0, 16);
        let m2 = selector(3, 16);
        let both: Vec<u8> = m1.iter().zip(&m2).map(|(a, b)| a | b).collect();

        let combined = xor_all(&[
            compute_response(&blocks, &m1, &zeros),
            compute_response(&blocks, &m2, &zeros),
        ])
        .unwrap();
        assert_eq!(combined, compute_response(&blocks, &both, &zeros));
    }

    #[test]
    fn shares_cancel_to_the_selected_block() {
        // Three servers, masks XORing to the selector for block 2.
        let blocks = test_blocks();
        let zeros = vec![0u8; 16];
        let m0 = vec![0b0101u8, 0x3c];
        let m1 = vec![0b1100u8, 0x3c];
        let target = selector(2, 2);
        let m2: Vec<u8> = m0
            .iter()
            .zip(&m1)
            .zip(&target)
            .map(|((a, b), t)| a ^ b ^ t)
            .collect();

        let combined = xor_all(&[
            compute_response(&blocks, &m0, &zeros),
            compute_response(&blocks, &m1, &zeros),
            compute_response(&blocks, &m2, &zeros),
        ])
        .unwrap();
        assert_eq!(combined, blocks[2]);
    }

    #[test]
    fn zero_secret_whitening_is_identity() {
        let blocks = test_blocks();
        let mask = selector(1, 16);
        assert_eq!(
            compute_response(&blocks, &mask, &vec![0u8; 16]),
            compute_response(&blocks, &mask, &[]),
        );
    }

    #[test]
    fn secret_whitening_cycles() {
        let blocks = vec![vec![0u8; 8]];
        let mask = selector(0, 1);
        let secret = vec![0xaa, 0xbb];
        let out = compute_response(&blocks, &mask, &secret);
        assert_eq!(out, vec![0xaa, 0xbb, 0xaa, 0xbb, 0xaa, 0xbb, 0xaa, 0xbb]);
    }

    #[test]
    fn empty_block_set_yields_empty_response() {
        let blocks: Vec<Vec<u8>> = Vec::new();
        assert!(compute_response(&blocks, &[0xff], &[]).is_empty());
    }
}
