//! Byte-string XOR combinators

use crate::{PirError, Result};

/// XOR `src` into `dst` in place.
pub fn xor_into(dst: &mut [u8], src: &[u8]) -> Result<()> {
    if dst.len() != src.len() {
        return Err(PirError::LengthMismatch {
            left: dst.len(),
            right: src.len(),
        });
    }
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
    Ok(())
}

/// XOR a non-empty sequence of equal-length byte strings together.
pub fn xor_all<B: AsRef<[u8]>>(shares: &[B]) -> Result<Vec<u8>> {
    let mut out = vec![0u8; shares.first().map(|s| s.as_ref().len()).unwrap_or(0)];
    for share in shares {
        xor_into(&mut out, share.as_ref())?;
    }
    Ok(out)
}

/// Elementwise XOR across rows, preserving the inner dimension: the
/// combined row's entry k is the XOR of every row's entry k. Every row
/// must have the same shape.
pub fn xor_combine_rows(rows: &[Vec<Vec<u8>>]) -> Result<Vec<Vec<u8>>> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let width = first.len();

    let mut combined: Vec<Vec<u8>> = first.clone();
    for (i, row) in rows.iter().enumerate().skip(1) {
        if row.len() != width {
            return Err(PirError::RaggedRows {
                row: i,
                expected: width,
                got: row.len(),
            });
        }
        for (entry, share) in combined.iter_mut().zip(row) {
            xor_into(entry, share)?;
        }
    }
    Ok(combined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xor_into_is_involutive() {
        let a = vec![0x12u8, 0x34, 0x56];
        let b = vec![0xffu8, 0x00, 0x0f];
        let mut out = a.clone();
        xor_into(&mut out, &b).unwrap();
        xor_into(&mut out, &b).unwrap();
        assert_eq!(out, a);
    }

    #[test]
    fn xor_into_rejects_length_mismatch() {
        let mut dst = vec![0u8; 4];
        assert!(matches!(
            xor_into(&mut dst, &[0u8; 3]),
            Err(PirError::LengthMismatch { left: 4, right: 3 })
        ));
    }

    #[test]
    fn xor_all_is_order_independent() {
        let shares = [vec![1u8, 2], vec![3u8, 4], vec![5u8, 6]];
        let reversed: Vec<_> = shares.iter().rev().cloned().collect();
        assert_eq!(xor_all(&shares).unwrap(), xor_all(&reversed).unwrap());
    }

    #[test]
    fn combine_rows_preserves_inner_dimension() {
        let rows = vec![
            vec![vec![0x0fu8; 4], vec![0xf0u8; 4]],
            vec![vec![0xffu8; 4], vec![0xffu8; 4]],
        ];
        let combined = xor_combine_rows(&rows).unwrap();
        assert_eq!(combined, vec![vec![0xf0u8; 4], vec![0x0fu8; 4]]);
    }

    #[test]
    fn combine_rows_rejects_ragged_input() {
        let rows = vec![vec![vec![0u8; 4]], vec![vec![0u8; 4], vec![0u8; 4]]];
        assert!(matches!(
            xor_combine_rows(&rows),
            Err(PirError::RaggedRows { row: 1, .. })
        ));
    }
}
