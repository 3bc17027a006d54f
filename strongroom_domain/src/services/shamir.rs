// /////////////////////////////////////////////////////////////////////////////
// Strongroom
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Shamir Secret Sharing over GF(2⁸)
//!
//! Byte-wise threshold splitting of the 32-byte master key. Each byte
//! position of the secret gets its own random polynomial of degree T−1 with
//! the secret byte as the constant term; share j carries the polynomial
//! evaluations at x = j. Any T shares reconstruct the secret by Lagrange
//! interpolation at x = 0; any T−1 shares are information-theoretically
//! independent of it.
//!
//! ## Field
//!
//! Arithmetic is in GF(2⁸) with the AES reduction polynomial
//! x⁸ + x⁴ + x³ + x + 1 (0x11B). Addition is XOR; multiplication is the
//! carry-less peasant algorithm; inversion is exponentiation to 254.
//!
//! ## Share format (bit-exact)
//!
//! 33 bytes per share: byte 0 is the x-coordinate (1–255, never 0 — x = 0
//! would carry the secret itself), bytes 1..=32 are the y-values for the 32
//! secret byte positions. See [`UnsealShare`].

use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::value_objects::{UnsealShare, SHARE_LEN};
use crate::VaultError;

/// Length of the secret being split.
pub const SECRET_LEN: usize = 32;

/// GF(2⁸) multiplication with the AES polynomial.
fn gf_mul(mut a: u8, mut b: u8) -> u8 {
    let mut product = 0u8;
    while b != 0 {
        if b & 1 != 0 {
            product ^= a;
        }
        let carry = a & 0x80;
        a <<= 1;
        if carry != 0 {
            a ^= 0x1B;
        }
        b >>= 1;
    }
    product
}

/// Multiplicative inverse via a^254. Zero has no inverse; callers guarantee
/// a ≠ 0 (x-coordinates are never zero and interpolation denominators are
/// differences of distinct x values).
fn gf_inv(a: u8) -> u8 {
    debug_assert!(a != 0);
    let mut result = 1u8;
    let mut base = a;
    let mut exp = 254u16;
    while exp != 0 {
        if exp & 1 != 0 {
            result = gf_mul(result, base);
        }
        base = gf_mul(base, base);
        exp >>= 1;
    }
    result
}

fn gf_div(a: u8, b: u8) -> u8 {
    gf_mul(a, gf_inv(b))
}

/// Horner evaluation of a polynomial given low-to-high coefficients.
fn poly_eval(coefficients: &[u8], x: u8) -> u8 {
    coefficients
        .iter()
        .rev()
        .fold(0u8, |acc, &c| gf_mul(acc, x) ^ c)
}

/// Splits a 32-byte secret into `share_count` shares with reconstruction
/// threshold `threshold`.
///
/// The randomness source is a caller-supplied [`RngCore`] so the seal
/// controller can inject the system CSPRNG while tests stay deterministic.
pub fn split(
    secret: &[u8; SECRET_LEN],
    share_count: u8,
    threshold: u8,
    rng: &mut dyn RngCore,
) -> Result<Vec<UnsealShare>, VaultError> {
    crate::entities::SealConfiguration::validate_split(share_count, threshold)?;

    // One random polynomial per secret byte; coefficient 0 is the secret.
    let mut polynomials: Vec<Zeroizing<Vec<u8>>> = Vec::with_capacity(SECRET_LEN);
    for &byte in secret.iter() {
        let mut coefficients = Zeroizing::new(vec![0u8; threshold as usize]);
        coefficients[0] = byte;
        rng.fill_bytes(&mut coefficients[1..]);
        polynomials.push(coefficients);
    }

    let mut shares = Vec::with_capacity(share_count as usize);
    for x in 1..=share_count {
        let mut raw = [0u8; SHARE_LEN];
        raw[0] = x;
        for (position, coefficients) in polynomials.iter().enumerate() {
            raw[1 + position] = poly_eval(coefficients, x);
        }
        let share = UnsealShare::from_bytes(&raw);
        raw.zeroize();
        // x starts at 1 and the buffer is exactly SHARE_LEN, so construction
        // cannot fail; surface Internal rather than panicking if it ever does.
        shares.push(share.map_err(|e| VaultError::Internal(format!("share assembly: {e}")))?);
    }
    Ok(shares)
}

/// Reconstructs the secret from at least one share by Lagrange interpolation
/// at x = 0. The caller is responsible for supplying exactly the threshold
/// number of *distinct* shares; duplicate x-coordinates are rejected because
/// interpolation through them is undefined.
pub fn combine(shares: &[UnsealShare]) -> Result<Zeroizing<[u8; SECRET_LEN]>, VaultError> {
    if shares.is_empty() {
        return Err(VaultError::InvalidShare("no shares provided".into()));
    }
    for (i, a) in shares.iter().enumerate() {
        for b in shares.iter().skip(i + 1) {
            if a.x() == b.x() {
                return Err(VaultError::InvalidShare(format!(
                    "duplicate x-coordinate {}",
                    a.x()
                )));
            }
        }
    }

    let mut secret = Zeroizing::new([0u8; SECRET_LEN]);
    for position in 0..SECRET_LEN {
        let mut accumulator = 0u8;
        for share_i in shares {
            // Lagrange basis at x = 0: Π_{j≠i} x_j / (x_j ⊕ x_i).
            let mut basis = 1u8;
            for share_j in shares {
                if share_j.x() != share_i.x() {
                    basis = gf_mul(basis, gf_div(share_j.x(), share_j.x() ^ share_i.x()));
                }
            }
            accumulator ^= gf_mul(basis, share_i.y()[position]);
        }
        secret[position] = accumulator;
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rng() -> impl RngCore {
        rand::thread_rng()
    }

    fn secret() -> [u8; SECRET_LEN] {
        let mut s = [0u8; SECRET_LEN];
        rng().fill_bytes(&mut s);
        s
    }

    #[test]
    fn field_basics() {
        // 0x53 * 0xCA = 0x01 in the AES field.
        assert_eq!(gf_mul(0x53, 0xCA), 0x01);
        assert_eq!(gf_inv(0x53), 0xCA);
        for a in 1..=255u8 {
            assert_eq!(gf_mul(a, gf_inv(a)), 1, "inverse failed for {a}");
        }
    }

    #[test]
    fn split_rejects_bad_parameters() {
        let s = secret();
        assert!(split(&s, 0, 0, &mut rng()).is_err());
        assert!(split(&s, 5, 0, &mut rng()).is_err());
        assert!(split(&s, 3, 5, &mut rng()).is_err());
    }

    #[test]
    fn share_format() {
        let s = secret();
        let shares = split(&s, 5, 3, &mut rng()).unwrap();
        assert_eq!(shares.len(), 5);
        for (i, share) in shares.iter().enumerate() {
            assert_eq!(share.x() as usize, i + 1);
            assert_eq!(share.as_bytes().len(), SHARE_LEN);
        }
    }

    #[test]
    fn every_three_of_five_subset_reconstructs() {
        let s = secret();
        let shares = split(&s, 5, 3, &mut rng()).unwrap();
        for i in 0..5 {
            for j in (i + 1)..5 {
                for k in (j + 1)..5 {
                    let subset = [shares[i].clone(), shares[j].clone(), shares[k].clone()];
                    let recovered = combine(&subset).unwrap();
                    assert_eq!(*recovered, s, "subset ({i},{j},{k}) failed");
                }
            }
        }
    }

    #[test]
    fn order_does_not_matter() {
        let s = secret();
        let shares = split(&s, 4, 2, &mut rng()).unwrap();
        let forward = combine(&[shares[0].clone(), shares[3].clone()]).unwrap();
        let backward = combine(&[shares[3].clone(), shares[0].clone()]).unwrap();
        assert_eq!(*forward, s);
        assert_eq!(*backward, s);
    }

    #[test]
    fn one_of_one() {
        let s = secret();
        let shares = split(&s, 1, 1, &mut rng()).unwrap();
        assert_eq!(*combine(&shares).unwrap(), s);
    }

    #[test]
    fn combine_rejects_duplicates_and_empty() {
        let s = secret();
        let shares = split(&s, 3, 2, &mut rng()).unwrap();
        assert!(matches!(
            combine(&[shares[0].clone(), shares[0].clone()]),
            Err(VaultError::InvalidShare(_))
        ));
        assert!(combine(&[]).is_err());
    }

    proptest! {
        #[test]
        fn split_combine_round_trips(
            secret in proptest::array::uniform32(any::<u8>()),
            n in 1u8..=12,
            t_offset in 0u8..12,
        ) {
            let t = 1 + t_offset % n;
            let shares = split(&secret, n, t, &mut rng()).unwrap();
            let recovered = combine(&shares[..t as usize]).unwrap();
            prop_assert_eq!(*recovered, secret);
        }

        #[test]
        fn full_share_set_also_reconstructs(
            secret in proptest::array::uniform32(any::<u8>()),
        ) {
            let shares = split(&secret, 7, 4, &mut rng()).unwrap();
            let recovered = combine(&shares).unwrap();
            prop_assert_eq!(*recovered, secret);
        }
    }
}
