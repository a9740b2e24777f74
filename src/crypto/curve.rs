//! Curve Parameters and Field Primitives
//!
//! Group arithmetic comes from `secp256kfun`. This module pins down the curve
//! the protocol runs over and provides the small primitives the protocol
//! consumes: hash-to-scalar, random scalars, base-point multiplication and the
//! second Pedersen generator.

use rand::RngCore;
use secp256kfun::prelude::*;
use sha2::{Digest, Sha256, Sha512};
use std::sync::OnceLock;

/// A curve point that may be the identity.
pub type GroupPoint = Point<Normal, Public, Zero>;

/// A secret scalar that may be zero (refresh polynomials have a zero constant term).
pub type SecretScalar = Scalar<Secret, Zero>;

/// Short Weierstrass curve parameters `y² = x³ + ax + b` over `F_p`,
/// generator `(gx, gy)` of prime order `n` and cofactor `h`. Hex encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurveParams {
    pub name: &'static str,
    pub p: &'static str,
    pub a: &'static str,
    pub b: &'static str,
    pub gx: &'static str,
    pub gy: &'static str,
    pub n: &'static str,
    pub h: &'static str,
}

/// See: https://en.bitcoin.it/wiki/Secp256k1
pub const SECP256K1: CurveParams = CurveParams {
    name: "secp256k1",
    p: "fffffffffffffffffffffffffffffffffffffffffffffffffffffffefffffc2f",
    a: "0",
    b: "7",
    gx: "79be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
    gy: "483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8",
    n: "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141",
    h: "1",
};

impl CurveParams {
    /// Bit length of the subgroup order `n`.
    pub fn order_bits(&self) -> usize {
        let digits = self.n.trim_start_matches('0');
        let Some(first) = digits.chars().next().and_then(|c| c.to_digit(16)) else {
            return 0;
        };
        (digits.len() - 1) * 4 + (32 - first.leading_zeros()) as usize
    }
}

/// Hash arbitrary bytes to a scalar.
///
/// SHA-512, truncated to the leftmost `bitlength(n)` bits (FIPS 180 style), then
/// reduced mod `n`. The result never has more bits than `n`.
pub fn hash_to_scalar(curve: &CurveParams, data: &[u8]) -> Scalar<Public, Zero> {
    let digest = Sha512::digest(data);
    let mut truncated = [0u8; 32];
    truncated.copy_from_slice(&digest[..32]);

    let bits = curve.order_bits().min(256);
    if bits < 256 {
        shift_right(&mut truncated, 256 - bits);
    }

    Scalar::from_bytes_mod_order(truncated)
}

/// Big-endian right shift of a 256-bit integer.
fn shift_right(bytes: &mut [u8; 32], shift: usize) {
    let byte_shift = shift / 8;
    let bit_shift = shift % 8;
    let src = *bytes;

    for i in 0..32usize {
        let hi = i
            .checked_sub(byte_shift)
            .map(|j| src[j])
            .unwrap_or(0);
        let lo = i
            .checked_sub(byte_shift + 1)
            .map(|j| src[j])
            .unwrap_or(0);

        bytes[i] = if bit_shift == 0 {
            hi
        } else {
            (hi >> bit_shift) | (lo << (8 - bit_shift))
        };
    }
}

/// Random scalar in `[0, n)`: 32 random bytes reduced mod `n`. The bias is
/// below 2^-128 since `n` is within 2^129 of 2^256.
pub fn random_scalar<R: RngCore>(rng: &mut R) -> SecretScalar {
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    Scalar::from_bytes_mod_order(bytes)
}

/// Party id cast into the scalar field.
pub fn index_scalar(id: u32) -> Scalar<Public, Zero> {
    Scalar::from(id)
}

/// `k·G`
pub fn base_mul(k: &SecretScalar) -> GroupPoint {
    let k = *k;
    g!(k * G).normalize()
}

/// The point at infinity.
pub fn identity() -> GroupPoint {
    Point::zero()
}

const PEDERSEN_TAG: &[u8] = b"frostpss/pedersen/H";

/// Second generator `H` for Pedersen commitments.
///
/// Derived by hashing a fixed tag with a counter until the digest is a valid
/// x-coordinate, so nobody knows `log_G(H)`.
pub fn second_generator() -> Point {
    static H: OnceLock<Point> = OnceLock::new();
    *H.get_or_init(|| {
        let mut counter: u32 = 0;
        loop {
            let mut hasher = Sha256::new();
            hasher.update(PEDERSEN_TAG);
            hasher.update(counter.to_be_bytes());
            let digest: [u8; 32] = hasher.finalize().into();

            let mut encoded = [0u8; 33];
            encoded[0] = 0x02;
            encoded[1..].copy_from_slice(&digest);

            if let Some(point) = Point::from_bytes(encoded) {
                return point;
            }
            counter += 1;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secp256k1_generator_matches_library() {
        let one = Scalar::<Secret, Zero>::from(1u32);
        let generator = base_mul(&one);
        // gy is even, so the compressed prefix is 0x02
        assert_eq!(
            hex::encode(generator.to_bytes()),
            format!("02{}", SECP256K1.gx)
        );
    }

    #[test]
    fn test_order_bits() {
        assert_eq!(SECP256K1.order_bits(), 256);

        let narrow = CurveParams {
            n: "7fff",
            ..SECP256K1
        };
        assert_eq!(narrow.order_bits(), 15);
    }

    #[test]
    fn test_hash_to_scalar_is_deterministic() {
        let a = hash_to_scalar(&SECP256K1, b"frostpss");
        let b = hash_to_scalar(&SECP256K1, b"frostpss");
        let c = hash_to_scalar(&SECP256K1, b"frostpsS");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_hash_to_scalar_truncates_to_order_bits() {
        let narrow = CurveParams {
            n: "7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
            ..SECP256K1
        };
        for msg in [b"a".as_slice(), b"b", b"c", b"d", b"e", b"f"] {
            let scalar = hash_to_scalar(&narrow, msg);
            assert!(scalar.to_bytes()[0] < 0x80);
        }
    }

    #[test]
    fn test_shift_right() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0b1000_0001;
        shift_right(&mut bytes, 9);
        assert_eq!(bytes[0], 0);
        assert_eq!(bytes[1], 0b0100_0000);
        assert_eq!(bytes[2], 0b1000_0000);
    }

    #[test]
    fn test_second_generator_is_independent_of_g() {
        let one = Scalar::<Secret, Zero>::from(1u32);
        let h = second_generator().mark_zero();
        assert_ne!(h, base_mul(&one));
        assert_eq!(second_generator(), second_generator());
    }

    #[test]
    fn test_random_scalar_is_seeded() {
        use rand::SeedableRng;
        use rand_chacha::ChaCha20Rng;

        let a = random_scalar(&mut ChaCha20Rng::seed_from_u64(1));
        let b = random_scalar(&mut ChaCha20Rng::seed_from_u64(1));
        let c = random_scalar(&mut ChaCha20Rng::seed_from_u64(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, Scalar::<Secret, Zero>::zero());
    }

    #[test]
    fn test_identity_is_neutral() {
        let mut rng = rand::thread_rng();
        let k = random_scalar(&mut rng);
        let p = base_mul(&k);
        let zero = identity();
        assert_eq!(g!(p + zero).normalize(), p);
        assert_eq!(base_mul(&Scalar::zero()), zero);
    }
}
