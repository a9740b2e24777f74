//! Party Protocol State
//!
//! One party's side of the DKG and of every refresh epoch. The orchestrator
//! drives the round functions in lock-step; each function checks that it is
//! called in the right state and moves the party forward.
//!
//! ```text
//! Init → CommitmentsReady → Broadcast → KoskVerified → EvaluationsSent
//!      → EvaluationsVerified → ShareComputed → PublicKeyComputed
//!
//! any verification step ──failure──► Aborted
//! PublicKeyComputed ──begin_epoch──► Init   (refresh)
//! ```

use super::commitment::{feldman_commitments, verify_feldman, CommitmentScheme, ShareEvaluation};
use super::kosk::{self, KoskProof};
use super::transport::{Payload, Transport};
use crate::crypto::curve::{base_mul, CurveParams, GroupPoint, SecretScalar};
use crate::crypto::polynomial::Polynomial;
use crate::error::{DkgError, VerificationFailure};
use rand::RngCore;
use secp256kfun::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartyState {
    Init,
    CommitmentsReady,
    Broadcast,
    KoskVerified,
    EvaluationsSent,
    EvaluationsVerified,
    ShareComputed,
    PublicKeyComputed,
    Aborted,
}

/// Everything one party has received from one peer in the current epoch.
#[derive(Debug, Clone, Default)]
pub struct PeerRecord {
    commitments: Option<Vec<GroupPoint>>,
    masked_coefficients: Option<Vec<GroupPoint>>,
    evaluation: Option<ShareEvaluation>,
    kosk: Option<KoskProof>,
}

impl PeerRecord {
    pub fn commitments(&self) -> Option<&[GroupPoint]> {
        self.commitments.as_deref()
    }

    pub fn masked_coefficients(&self) -> Option<&[GroupPoint]> {
        self.masked_coefficients.as_deref()
    }

    pub fn evaluation(&self) -> Option<&ShareEvaluation> {
        self.evaluation.as_ref()
    }

    pub fn kosk(&self) -> Option<&KoskProof> {
        self.kosk.as_ref()
    }

    fn clear(&mut self) {
        *self = PeerRecord::default();
    }
}

pub struct Party {
    id: u32,
    threshold: u32,
    epoch: u64,
    curve: CurveParams,
    scheme: Arc<dyn CommitmentScheme>,
    polynomial: Option<Polynomial>,
    masking_polynomial: Option<Polynomial>,
    commitments: Vec<GroupPoint>,
    masked_coefficients: Vec<GroupPoint>,
    zero_commitment: Option<GroupPoint>,
    kosk: Option<KoskProof>,
    secret_share: Option<SecretScalar>,
    public_key: Option<GroupPoint>,
    peers: BTreeMap<u32, PeerRecord>,
    transport: Box<dyn Transport>,
    state: PartyState,
}

impl Party {
    /// Create a party whose transport is already connected to every peer.
    pub fn new(
        threshold: u32,
        curve: CurveParams,
        scheme: Arc<dyn CommitmentScheme>,
        transport: Box<dyn Transport>,
    ) -> Result<Self, DkgError> {
        let id = transport.id();
        if id == 0 {
            return Err(DkgError::Configuration(
                "party ids must be positive".to_string(),
            ));
        }
        if threshold == 0 {
            return Err(DkgError::Configuration(
                "threshold must be at least 1".to_string(),
            ));
        }

        let peers: BTreeMap<u32, PeerRecord> = transport
            .peers()
            .into_iter()
            .map(|peer| (peer, PeerRecord::default()))
            .collect();
        let n_parties = peers.len() + 1;
        if threshold as usize > n_parties {
            return Err(DkgError::Configuration(format!(
                "threshold {} exceeds number of parties {}",
                threshold, n_parties
            )));
        }

        Ok(Self {
            id,
            threshold,
            epoch: 0,
            curve,
            scheme,
            polynomial: None,
            masking_polynomial: None,
            commitments: Vec::new(),
            masked_coefficients: Vec::new(),
            zero_commitment: None,
            kosk: None,
            secret_share: None,
            public_key: None,
            peers,
            transport,
            state: PartyState::Init,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn state(&self) -> PartyState {
        self.state
    }

    pub fn commitments(&self) -> &[GroupPoint] {
        &self.commitments
    }

    pub fn kosk(&self) -> Option<&KoskProof> {
        self.kosk.as_ref()
    }

    pub fn secret_share(&self) -> Option<SecretScalar> {
        self.secret_share
    }

    pub fn public_key(&self) -> Option<GroupPoint> {
        self.public_key
    }

    /// `secretShare·G`, safe to publish.
    pub fn verification_share(&self) -> Option<GroupPoint> {
        self.secret_share.as_ref().map(base_mul)
    }

    pub fn peer(&self, id: u32) -> Option<&PeerRecord> {
        self.peers.get(&id)
    }

    pub fn peer_ids(&self) -> Vec<u32> {
        self.peers.keys().copied().collect()
    }

    /// Index of the first committed coefficient: refresh skips the zero constant.
    fn offset(&self) -> usize {
        if self.epoch > 0 {
            1
        } else {
            0
        }
    }

    fn expected_commitment_len(&self) -> usize {
        self.threshold as usize - self.offset()
    }

    fn expect_state(&self, expected: PartyState, action: &'static str) -> Result<(), DkgError> {
        if self.state != expected {
            return Err(DkgError::InvalidState {
                party: self.id,
                state: self.state,
                action,
            });
        }
        Ok(())
    }

    /// Move to `Aborted` if `result` is an error.
    fn abort_on_err<T>(&mut self, result: Result<T, DkgError>) -> Result<T, DkgError> {
        if let Err(err) = &result {
            warn!(party = self.id, epoch = self.epoch, error = %err, "party aborted");
            self.state = PartyState::Aborted;
        }
        result
    }

    /// Start a refresh epoch. Only a party that finished the previous epoch may refresh.
    pub fn begin_epoch(&mut self) -> Result<(), DkgError> {
        self.expect_state(PartyState::PublicKeyComputed, "begin a refresh epoch")?;

        self.epoch += 1;
        self.polynomial = None;
        self.masking_polynomial = None;
        self.commitments.clear();
        self.masked_coefficients.clear();
        self.kosk = None;
        for record in self.peers.values_mut() {
            record.clear();
        }
        self.state = PartyState::Init;

        debug!(party = self.id, epoch = self.epoch, "refresh epoch started");
        Ok(())
    }

    /// Round 1 setup: sample polynomial(s), compute commitments and, at epoch 0,
    /// the KOSK over the zero-degree commitment.
    pub fn prepare_commitments<R: RngCore>(&mut self, rng: &mut R) -> Result<(), DkgError> {
        self.expect_state(PartyState::Init, "prepare commitments")?;

        let degree = self.threshold as usize - 1;
        let refresh = self.epoch > 0;
        let offset = self.offset();

        let polynomial = Polynomial::generate(degree, refresh, rng);
        let masking = self
            .scheme
            .uses_masking()
            .then(|| Polynomial::generate(degree, refresh, rng));

        let commitments = self.scheme.commit(&polynomial, masking.as_ref(), offset);
        self.commitments = self.abort_on_err(commitments)?;
        self.masked_coefficients = if self.scheme.uses_masking() {
            feldman_commitments(&polynomial, offset)
        } else {
            Vec::new()
        };

        if !refresh {
            let zero_coefficient = polynomial.constant_term();
            self.zero_commitment = Some(base_mul(&zero_coefficient));
            self.kosk = Some(kosk::prove(&self.curve, &zero_coefficient, rng));
        }

        self.polynomial = Some(polynomial);
        self.masking_polynomial = masking;
        self.state = PartyState::CommitmentsReady;

        debug!(
            party = self.id,
            epoch = self.epoch,
            commitments = self.commitments.len(),
            "commitments ready"
        );
        Ok(())
    }

    /// Round 1: broadcast commitments (and KOSK at epoch 0) to every peer.
    pub fn broadcast_commitments(&mut self) -> Result<(), DkgError> {
        self.expect_state(PartyState::CommitmentsReady, "broadcast commitments")?;

        let result = self.send_broadcasts();
        self.abort_on_err(result)?;

        self.state = PartyState::Broadcast;
        Ok(())
    }

    fn send_broadcasts(&self) -> Result<(), DkgError> {
        self.transport
            .broadcast(Payload::Commitments(self.commitments.clone()))?;
        if self.scheme.uses_masking() {
            self.transport
                .broadcast(Payload::MaskedCoefficients(self.masked_coefficients.clone()))?;
        }
        if let Some(proof) = self.kosk {
            self.transport.broadcast(Payload::Kosk(proof))?;
        }
        Ok(())
    }

    /// File everything waiting in the inbox under its sender.
    fn receive(&mut self) -> Result<(), DkgError> {
        for envelope in self.transport.receive() {
            let record = self
                .peers
                .get_mut(&envelope.from)
                .ok_or(DkgError::MissingData {
                    party: self.id,
                    peer: envelope.from,
                    what: "peer record",
                })?;

            match envelope.payload {
                Payload::Kosk(proof) => record.kosk = Some(proof),
                Payload::Commitments(points) => record.commitments = Some(points),
                Payload::MaskedCoefficients(points) => record.masked_coefficients = Some(points),
                Payload::Evaluation(evaluation) => record.evaluation = Some(evaluation),
            }
        }
        Ok(())
    }

    /// Every peer's broadcast vectors must have exactly `t` entries (`t - 1`
    /// when refreshing). A longer vector would mean a higher-degree polynomial
    /// and a higher effective threshold.
    fn check_integrity(&self) -> Result<(), DkgError> {
        let expected = self.expected_commitment_len();

        for (&peer, record) in &self.peers {
            let commitments = record.commitments().ok_or(DkgError::MissingData {
                party: self.id,
                peer,
                what: "commitments",
            })?;
            if commitments.len() != expected {
                return Err(DkgError::Integrity {
                    party: self.id,
                    peer,
                    what: "commitments",
                    expected,
                    actual: commitments.len(),
                });
            }

            if self.scheme.uses_masking() {
                let masked = record.masked_coefficients().ok_or(DkgError::MissingData {
                    party: self.id,
                    peer,
                    what: "masked coefficients",
                })?;
                if masked.len() != expected {
                    return Err(DkgError::Integrity {
                        party: self.id,
                        peer,
                        what: "masked coefficients",
                        expected,
                        actual: masked.len(),
                    });
                }
            }
        }
        Ok(())
    }

    /// The point a peer claims as `f(0)·G`.
    fn peer_zero_commitment(&self, peer: u32, record: &PeerRecord) -> Result<GroupPoint, DkgError> {
        let vector = if self.scheme.uses_masking() {
            record.masked_coefficients()
        } else {
            record.commitments()
        };

        vector
            .and_then(|points| points.first().copied())
            .ok_or(DkgError::MissingData {
                party: self.id,
                peer,
                what: "zero-degree commitment",
            })
    }

    /// Round 1 verify: check every peer's KOSK against its zero-degree
    /// commitment. Stops at the first bad proof. Nothing to check when refreshing.
    pub fn verify_kosks(&mut self) -> Result<(), DkgError> {
        self.expect_state(PartyState::Broadcast, "verify KOSK proofs")?;

        let result = self.receive().and_then(|()| self.check_kosks());
        self.abort_on_err(result)?;

        self.state = PartyState::KoskVerified;
        Ok(())
    }

    fn check_kosks(&self) -> Result<(), DkgError> {
        self.check_integrity()?;

        if self.epoch > 0 {
            debug!(party = self.id, epoch = self.epoch, "refresh epoch, no KOSK to verify");
            return Ok(());
        }

        for (&peer, record) in &self.peers {
            let zero_commitment = self.peer_zero_commitment(peer, record)?;
            let proof = record.kosk().ok_or(DkgError::MissingData {
                party: self.id,
                peer,
                what: "KOSK proof",
            })?;

            if !kosk::verify(&self.curve, peer, &zero_commitment, proof)? {
                return Err(VerificationFailure::InvalidKosk {
                    verifier: self.id,
                    peer,
                }
                .into());
            }
            debug!(party = self.id, peer, "KOSK verified");
        }
        Ok(())
    }

    /// Round 2: evaluate the polynomial(s) at every peer id and send each
    /// evaluation only to the peer it belongs to.
    pub fn distribute_shares(&mut self) -> Result<(), DkgError> {
        self.expect_state(PartyState::KoskVerified, "distribute shares")?;

        let result = self.send_evaluations();
        self.abort_on_err(result)?;

        self.state = PartyState::EvaluationsSent;
        Ok(())
    }

    fn send_evaluations(&self) -> Result<(), DkgError> {
        let polynomial = self.own_polynomial()?;

        for &peer in self.peers.keys() {
            let evaluation = ShareEvaluation {
                x: peer,
                y: polynomial.evaluate(peer),
                y_masking: self.masking_polynomial.as_ref().map(|m| m.evaluate(peer)),
            };
            self.transport.send(peer, Payload::Evaluation(evaluation))?;
        }
        Ok(())
    }

    fn own_polynomial(&self) -> Result<&Polynomial, DkgError> {
        self.polynomial.as_ref().ok_or(DkgError::MissingData {
            party: self.id,
            peer: self.id,
            what: "own polynomial",
        })
    }

    /// Round 2 verify: check every received evaluation against the sender's
    /// broadcast commitments. Stops at the first mismatch.
    pub fn verify_shares(&mut self) -> Result<(), DkgError> {
        self.expect_state(PartyState::EvaluationsSent, "verify shares")?;

        let result = self.receive().and_then(|()| self.check_shares());
        self.abort_on_err(result)?;

        self.state = PartyState::EvaluationsVerified;
        Ok(())
    }

    fn check_shares(&self) -> Result<(), DkgError> {
        self.check_integrity()?;
        let offset = self.offset();

        for (&peer, record) in &self.peers {
            let evaluation = record.evaluation().ok_or(DkgError::MissingData {
                party: self.id,
                peer,
                what: "share evaluation",
            })?;
            let commitments = record.commitments().ok_or(DkgError::MissingData {
                party: self.id,
                peer,
                what: "commitments",
            })?;

            let mut valid =
                evaluation.x == self.id && self.scheme.verify(commitments, offset, evaluation);

            if valid && self.scheme.uses_masking() {
                let masked = record.masked_coefficients().ok_or(DkgError::MissingData {
                    party: self.id,
                    peer,
                    what: "masked coefficients",
                })?;
                valid = verify_feldman(masked, offset, self.id, &evaluation.y);
            }

            if !valid {
                return Err(VerificationFailure::InvalidShare {
                    verifier: self.id,
                    peer,
                }
                .into());
            }
            debug!(party = self.id, peer, epoch = self.epoch, "share verified");
        }
        Ok(())
    }

    /// `Σ received y + f(own id)`, added onto the previous share when refreshing.
    pub fn compute_secret_share(&mut self) -> Result<SecretScalar, DkgError> {
        self.expect_state(PartyState::EvaluationsVerified, "compute secret share")?;

        let result = self.sum_shares();
        let share = self.abort_on_err(result)?;

        self.secret_share = Some(share);
        self.state = PartyState::ShareComputed;
        Ok(share)
    }

    fn sum_shares(&self) -> Result<SecretScalar, DkgError> {
        let mut share = self.own_polynomial()?.evaluate(self.id);

        for (&peer, record) in &self.peers {
            let y = record
                .evaluation()
                .map(|evaluation| evaluation.y)
                .ok_or(DkgError::MissingData {
                    party: self.id,
                    peer,
                    what: "share evaluation",
                })?;
            share = s!(share + y);
        }

        if self.epoch > 0 {
            let previous = self.secret_share.ok_or(DkgError::MissingData {
                party: self.id,
                peer: self.id,
                what: "previous secret share",
            })?;
            share = s!(previous + share);
        }

        Ok(share)
    }

    /// Group public key `Σ fⱼ(0)·G`. Computed once at epoch 0; refresh keeps it.
    pub fn compute_public_key(&mut self) -> Result<GroupPoint, DkgError> {
        self.expect_state(PartyState::ShareComputed, "compute public key")?;

        let result = if self.epoch == 0 {
            self.sum_zero_commitments()
        } else {
            self.public_key.ok_or(DkgError::MissingData {
                party: self.id,
                peer: self.id,
                what: "public key from epoch 0",
            })
        };
        let public_key = self.abort_on_err(result)?;

        self.public_key = Some(public_key);
        self.state = PartyState::PublicKeyComputed;
        Ok(public_key)
    }

    fn sum_zero_commitments(&self) -> Result<GroupPoint, DkgError> {
        let mut public_key = self.zero_commitment.ok_or(DkgError::MissingData {
            party: self.id,
            peer: self.id,
            what: "own zero-degree commitment",
        })?;

        for (&peer, record) in &self.peers {
            let commitment = self.peer_zero_commitment(peer, record)?;
            public_key = g!(public_key + commitment).normalize();
        }

        Ok(public_key)
    }
}
