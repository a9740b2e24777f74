//! Cryptographic Primitives
//!
//! The building blocks the DKG consumes:
//!
//! - **curve**: secp256k1 parameters, hash-to-scalar, random scalars
//! - **polynomial**: secret-sharing polynomials over the scalar field
//! - **schnorr**: Schnorr signatures used for knowledge-of-secret-key proofs
//! - **helpers**: Lagrange interpolation for auditing reconstructed secrets

pub mod curve;
pub mod helpers;
pub mod polynomial;
pub mod schnorr;
