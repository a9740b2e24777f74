//! Lagrange Interpolation
//!
//! Used out of band to audit a run: reconstructing the group secret from any
//! `t` shares and checking it against the public key. The protocol itself
//! never reconstructs the secret.

use super::curve::{index_scalar, SecretScalar};
use crate::error::DkgError;
use secp256kfun::prelude::*;

/// Compute Lagrange coefficient for party_index at target_x.
///
/// λ_i(x) = Π_{j≠i} (x - j) / (i - j)
///
/// Uses field arithmetic directly so large party counts cannot overflow.
pub fn lagrange_coefficient_at(
    party_index: u32,
    all_indices: &[u32],
    target_x: u32,
) -> Result<SecretScalar, DkgError> {
    let mut numerator: SecretScalar = Scalar::from(1u32);
    let mut denominator: SecretScalar = Scalar::from(1u32);

    let i_scalar = index_scalar(party_index);
    let x_scalar = index_scalar(target_x);

    for &other_index in all_indices {
        if other_index == party_index {
            continue;
        }

        let j_scalar = index_scalar(other_index);

        // numerator *= (x - j)
        let x_minus_j = s!(x_scalar - j_scalar);
        numerator = s!(numerator * x_minus_j);

        // denominator *= (i - j)
        let i_minus_j = s!(i_scalar - j_scalar);
        denominator = s!(denominator * i_minus_j);
    }

    let denom_inv = denominator
        .non_zero()
        .ok_or_else(|| {
            DkgError::Configuration(format!(
                "zero Lagrange denominator for index {}",
                party_index
            ))
        })?
        .invert();

    Ok(s!(numerator * denom_inv))
}

/// λ_i(0), the weight of share `i` when recovering the constant term.
pub fn lagrange_coefficient_at_zero(
    party_index: u32,
    all_indices: &[u32],
) -> Result<SecretScalar, DkgError> {
    lagrange_coefficient_at(party_index, all_indices, 0)
}

/// Interpolate `f(0)` from `(id, f(id))` pairs.
///
/// With fewer shares than the threshold this still returns a value, it is
/// just not the secret.
pub fn reconstruct_secret(shares: &[(u32, SecretScalar)]) -> Result<SecretScalar, DkgError> {
    if shares.is_empty() {
        return Err(DkgError::Configuration(
            "cannot interpolate from zero shares".to_string(),
        ));
    }

    let indices: Vec<u32> = shares.iter().map(|(index, _)| *index).collect();
    let mut distinct = indices.clone();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() != indices.len() {
        return Err(DkgError::Configuration(
            "duplicate share index in interpolation".to_string(),
        ));
    }

    let mut secret: SecretScalar = Scalar::zero();
    for &(index, share) in shares {
        let lambda = lagrange_coefficient_at_zero(index, &indices)?;
        secret = s!(secret + lambda * share);
    }

    Ok(secret)
}
