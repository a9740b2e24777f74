//! Secret-sharing polynomials over the secp256k1 scalar field.

use super::curve::{index_scalar, random_scalar, SecretScalar};
use rand::RngCore;
use secp256kfun::prelude::*;
use std::fmt;

/// `f(x) = c₀ + c₁x + … + c_d x^d` with coefficients ordered low to high degree.
///
/// The modulus is the curve order, which is prime, so every nonzero party id
/// is invertible.
#[derive(Clone)]
pub struct Polynomial {
    coefficients: Vec<SecretScalar>,
}

impl Polynomial {
    /// Sample `degree + 1` random coefficients. With `force_zero_constant` the
    /// constant term is overwritten with zero (refresh polynomials).
    pub fn generate<R: RngCore>(degree: usize, force_zero_constant: bool, rng: &mut R) -> Self {
        let mut coefficients: Vec<SecretScalar> =
            (0..=degree).map(|_| random_scalar(rng)).collect();

        if force_zero_constant {
            coefficients[0] = Scalar::zero();
        }

        Self { coefficients }
    }

    pub fn from_coefficients(coefficients: Vec<SecretScalar>) -> Self {
        Self { coefficients }
    }

    pub fn degree(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.coefficients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coefficients.is_empty()
    }

    pub fn coefficients(&self) -> &[SecretScalar] {
        &self.coefficients
    }

    /// `f(0)`, the party's contribution to the group secret.
    pub fn constant_term(&self) -> SecretScalar {
        self.coefficients.first().copied().unwrap_or(Scalar::zero())
    }

    /// Evaluate at a party id.
    pub fn evaluate(&self, x: u32) -> SecretScalar {
        self.evaluate_at(&index_scalar(x))
    }

    /// Horner evaluation: `((c_d·x + c_{d-1})·x + …)·x + c₀`.
    pub fn evaluate_at(&self, x: &Scalar<Public, Zero>) -> SecretScalar {
        let x = *x;
        self.coefficients
            .iter()
            .rev()
            .fold(Scalar::zero(), |acc: SecretScalar, coeff| {
                let coeff = *coeff;
                s!(acc * x + coeff)
            })
    }
}

impl fmt::Debug for Polynomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Polynomial")
            .field("degree", &self.degree())
            .field("coefficients", &"<redacted>")
            .finish()
    }
}
