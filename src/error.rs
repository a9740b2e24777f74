//! Protocol Errors
//!
//! Every error is fatal to the current run. A failed DKG or refresh must be
//! restarted from scratch with fresh randomness; there is no per-party
//! disqualification.

use crate::protocol::party::PartyState;
use thiserror::Error;

/// Errors raised while configuring or running the DKG / refresh protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DkgError {
    /// Bad parameters: `t > n`, zero threshold, zero party id, or mismatched
    /// polynomial/masking-polynomial lengths.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A peer record, field or delivery channel was absent when consumed.
    #[error("party {party} is missing {what} from party {peer}")]
    MissingData {
        party: u32,
        peer: u32,
        what: &'static str,
    },

    /// A peer broadcast a vector of unexpected length.
    #[error(
        "party {party} received {what} of length {actual} from party {peer}, expected {expected}"
    )]
    Integrity {
        party: u32,
        peer: u32,
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("verification failed: {0}")]
    Verification(VerificationFailure),

    /// The KOSK signer was bound to a different curve than the protocol.
    #[error("curve mismatch: proof from party {peer} uses {found}, protocol uses {expected}")]
    CurveMismatch {
        peer: u32,
        expected: &'static str,
        found: &'static str,
    },

    /// A round function was called out of order.
    #[error("party {party} cannot {action} in state {state:?}")]
    InvalidState {
        party: u32,
        state: PartyState,
        action: &'static str,
    },

    /// A previous round of this run failed; the run cannot be resumed.
    #[error("run was aborted and must be restarted with fresh randomness")]
    Aborted,
}

/// Which check failed, and who detected it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationFailure {
    #[error("party {verifier} rejected the knowledge-of-secret-key proof of party {peer}")]
    InvalidKosk { verifier: u32, peer: u32 },

    #[error("party {verifier} rejected the share evaluation sent by party {peer}")]
    InvalidShare { verifier: u32, peer: u32 },

    #[error("party {party} computed a public key different from party {reference}")]
    PublicKeyMismatch { reference: u32, party: u32 },
}

impl From<VerificationFailure> for DkgError {
    fn from(failure: VerificationFailure) -> Self {
        DkgError::Verification(failure)
    }
}
