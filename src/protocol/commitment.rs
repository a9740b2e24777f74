//! Verifiable Secret Sharing Commitments
//!
//! Commitments are public and broadcast; evaluations are secret and only ever
//! sent point-to-point. Two schemes share one interface:
//!
//! - **Feldman**: `Cᵢ = fᵢ·G`, binding but not hiding
//! - **Pedersen**: `Cᵢ = fᵢ·G + hᵢ·H`, binding and hiding, needs a masking polynomial
//!
//! A share `(x, y)` from a party verifies when
//!
//!   y·G (+ y_h·H) == Σᵢ x^(i+offset) · Cᵢ
//!
//! where `offset` is 1 past epoch 0, because refresh polynomials have a zero
//! constant term and omit its commitment.

use crate::crypto::curve::{base_mul, identity, index_scalar, second_generator, GroupPoint, SecretScalar};
use crate::crypto::polynomial::Polynomial;
use crate::error::DkgError;
use secp256kfun::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which commitment scheme a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemeKind {
    #[default]
    Feldman,
    Pedersen,
}

/// A polynomial evaluation sent from one party to another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShareEvaluation {
    /// Recipient id
    pub x: u32,
    /// `f(x)`
    pub y: SecretScalar,
    /// `h(x)`, Pedersen only
    pub y_masking: Option<SecretScalar>,
}

pub trait CommitmentScheme: Send + Sync {
    fn kind(&self) -> SchemeKind;

    /// Whether parties must also sample a masking polynomial.
    fn uses_masking(&self) -> bool;

    /// Commit to coefficients `offset..`.
    fn commit(
        &self,
        polynomial: &Polynomial,
        masking: Option<&Polynomial>,
        offset: usize,
    ) -> Result<Vec<GroupPoint>, DkgError>;

    /// Check an evaluation against the sender's commitments.
    fn verify(&self, commitments: &[GroupPoint], offset: usize, evaluation: &ShareEvaluation)
        -> bool;
}

pub fn scheme_for(kind: SchemeKind) -> Arc<dyn CommitmentScheme> {
    match kind {
        SchemeKind::Feldman => Arc::new(Feldman),
        SchemeKind::Pedersen => Arc::new(Pedersen::new()),
    }
}

/// `fᵢ·G` for coefficients `offset..`.
pub fn feldman_commitments(polynomial: &Polynomial, offset: usize) -> Vec<GroupPoint> {
    polynomial
        .coefficients()
        .iter()
        .skip(offset)
        .map(base_mul)
        .collect()
}

/// `Σᵢ x^(i+offset) · Cᵢ`, with the powers of `x` taken in the scalar field.
pub fn evaluate_commitments(commitments: &[GroupPoint], offset: usize, x: u32) -> GroupPoint {
    let x = index_scalar(x);

    let mut power: Scalar<Public, Zero> = Scalar::from(1u32);
    for _ in 0..offset {
        power = s!(power * x).public();
    }

    let mut acc = identity();
    for commitment in commitments {
        let commitment = *commitment;
        acc = g!(acc + power * commitment).normalize();
        power = s!(power * x).public();
    }
    acc
}

/// Feldman share check `y·G == Σᵢ x^(i+offset) · Cᵢ`.
pub fn verify_feldman(commitments: &[GroupPoint], offset: usize, x: u32, y: &SecretScalar) -> bool {
    base_mul(y) == evaluate_commitments(commitments, offset, x)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Feldman;

impl CommitmentScheme for Feldman {
    fn kind(&self) -> SchemeKind {
        SchemeKind::Feldman
    }

    fn uses_masking(&self) -> bool {
        false
    }

    fn commit(
        &self,
        polynomial: &Polynomial,
        _masking: Option<&Polynomial>,
        offset: usize,
    ) -> Result<Vec<GroupPoint>, DkgError> {
        Ok(feldman_commitments(polynomial, offset))
    }

    fn verify(
        &self,
        commitments: &[GroupPoint],
        offset: usize,
        evaluation: &ShareEvaluation,
    ) -> bool {
        verify_feldman(commitments, offset, evaluation.x, &evaluation.y)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Pedersen {
    h: Point,
}

impl Pedersen {
    pub fn new() -> Self {
        Self {
            h: second_generator(),
        }
    }

    pub fn h(&self) -> Point {
        self.h
    }
}

impl Default for Pedersen {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitmentScheme for Pedersen {
    fn kind(&self) -> SchemeKind {
        SchemeKind::Pedersen
    }

    fn uses_masking(&self) -> bool {
        true
    }

    fn commit(
        &self,
        polynomial: &Polynomial,
        masking: Option<&Polynomial>,
        offset: usize,
    ) -> Result<Vec<GroupPoint>, DkgError> {
        let masking = masking.ok_or_else(|| {
            DkgError::Configuration("Pedersen commitments need a masking polynomial".to_string())
        })?;

        if polynomial.len() != masking.len() {
            return Err(DkgError::Configuration(format!(
                "polynomial has {} coefficients but masking polynomial has {}",
                polynomial.len(),
                masking.len()
            )));
        }

        let h = self.h;
        Ok(polynomial
            .coefficients()
            .iter()
            .zip(masking.coefficients())
            .skip(offset)
            .map(|(f, m)| {
                let (f, m) = (*f, *m);
                g!(f * G + m * h).normalize()
            })
            .collect())
    }

    fn verify(
        &self,
        commitments: &[GroupPoint],
        offset: usize,
        evaluation: &ShareEvaluation,
    ) -> bool {
        let Some(y_masking) = evaluation.y_masking else {
            return false;
        };

        let (y, h) = (evaluation.y, self.h);
        let lhs = g!(y * G + y_masking * h).normalize();

        lhs == evaluate_commitments(commitments, offset, evaluation.x)
    }
}
