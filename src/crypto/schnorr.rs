//! Schnorr Signatures over full (compressed) points
//!
//! Unlike BIP340 there is no even-Y normalisation: the signer proves knowledge
//! of the discrete log of exactly the point it publishes. The challenge is
//!
//!   e = H(PK ‖ R ‖ m)
//!
//! with `H` the curve's hash-to-scalar and points in 33-byte compressed form.

use super::curve::{base_mul, hash_to_scalar, CurveParams, GroupPoint, SecretScalar};
use rand::RngCore;
use secp256kfun::prelude::*;

/// `(R, s)` with `s·G == R + e·PK`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signature {
    pub r: Point,
    pub s: Scalar<Public, Zero>,
}

/// A signing key bound to the curve it was created for.
pub struct SchnorrSigner {
    curve: CurveParams,
    secret: SecretScalar,
    public: GroupPoint,
}

impl SchnorrSigner {
    pub fn new(curve: CurveParams, secret: SecretScalar) -> Self {
        let public = base_mul(&secret);
        Self {
            curve,
            secret,
            public,
        }
    }

    pub fn curve(&self) -> &CurveParams {
        &self.curve
    }

    pub fn public_key(&self) -> GroupPoint {
        self.public
    }

    pub fn sign<R: RngCore>(&self, message: &[u8], rng: &mut R) -> Signature {
        let k = Scalar::<Secret, NonZero>::random(rng);
        let r = g!(k * G).normalize();

        let e = challenge(&self.curve, &self.public, &r, message);
        let secret = self.secret;
        let s = s!(k + e * secret).public();

        Signature { r, s }
    }
}

/// Check `s·G == R + e·PK`.
pub fn verify(
    curve: &CurveParams,
    public_key: &GroupPoint,
    message: &[u8],
    signature: &Signature,
) -> bool {
    let e = challenge(curve, public_key, &signature.r, message);
    let (r, s, pk) = (signature.r, signature.s, *public_key);

    let lhs = g!(s * G).normalize();
    let rhs = g!(r + e * pk).normalize();

    lhs == rhs
}

fn challenge(
    curve: &CurveParams,
    public_key: &GroupPoint,
    r: &Point,
    message: &[u8],
) -> Scalar<Public, Zero> {
    let mut data = Vec::with_capacity(33 + 33 + message.len());
    data.extend_from_slice(&public_key.to_bytes());
    data.extend_from_slice(&r.to_bytes());
    data.extend_from_slice(message);
    hash_to_scalar(curve, &data)
}
