//! Knowledge-of-Secret-Key Proofs
//!
//! Before anyone trusts a party's commitments, the party proves it knows the
//! discrete log of its zero-degree commitment `f(0)·G` by signing the encoding
//! of that very point. This blocks rogue-key attacks where a party picks its
//! contribution as a function of the others' to cancel them out.
//!
//! Refresh rounds carry no proof: a zero constant term has no discrete log
//! worth proving.

use crate::crypto::curve::{CurveParams, GroupPoint, SecretScalar};
use crate::crypto::schnorr::{self, SchnorrSigner, Signature};
use crate::error::DkgError;
use rand::RngCore;

/// A Schnorr signature over `f(0)·G`, tagged with the signer's curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KoskProof {
    pub curve: CurveParams,
    pub signature: Signature,
}

/// Prove knowledge of `zero_coefficient`.
pub fn prove<R: RngCore>(
    curve: &CurveParams,
    zero_coefficient: &SecretScalar,
    rng: &mut R,
) -> KoskProof {
    let signer = SchnorrSigner::new(*curve, *zero_coefficient);
    let message = signer.public_key().to_bytes();

    KoskProof {
        curve: *signer.curve(),
        signature: signer.sign(&message, rng),
    }
}

/// Verify `proof` against the zero-degree commitment a peer broadcast.
///
/// Returns `Ok(false)` for an invalid signature so the caller can attribute
/// it; a proof made over another curve is an error outright.
pub fn verify(
    protocol_curve: &CurveParams,
    peer: u32,
    zero_commitment: &GroupPoint,
    proof: &KoskProof,
) -> Result<bool, DkgError> {
    if proof.curve != *protocol_curve {
        return Err(DkgError::CurveMismatch {
            peer,
            expected: protocol_curve.name,
            found: proof.curve.name,
        });
    }

    let message = zero_commitment.to_bytes();
    Ok(schnorr::verify(
        protocol_curve,
        zero_commitment,
        &message,
        &proof.signature,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::curve::{base_mul, random_scalar, SECP256K1};

    #[test]
    fn test_valid_proof() {
        let mut rng = rand::thread_rng();
        let secret = random_scalar(&mut rng);
        let proof = prove(&SECP256K1, &secret, &mut rng);

        assert_eq!(verify(&SECP256K1, 1, &base_mul(&secret), &proof), Ok(true));
    }

    #[test]
    fn test_proof_for_other_commitment_fails() {
        let mut rng = rand::thread_rng();
        let secret = random_scalar(&mut rng);
        let other = random_scalar(&mut rng);
        let proof = prove(&SECP256K1, &secret, &mut rng);

        assert_eq!(verify(&SECP256K1, 1, &base_mul(&other), &proof), Ok(false));
    }

    #[test]
    fn test_curve_mismatch() {
        let mut rng = rand::thread_rng();
        let secret = random_scalar(&mut rng);
        let foreign = CurveParams {
            name: "secp256r1",
            ..SECP256K1
        };
        let proof = prove(&foreign, &secret, &mut rng);

        assert_eq!(
            verify(&SECP256K1, 4, &base_mul(&secret), &proof),
            Err(DkgError::CurveMismatch {
                peer: 4,
                expected: "secp256k1",
                found: "secp256r1",
            })
        );
    }
}
