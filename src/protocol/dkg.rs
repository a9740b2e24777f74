//! DKG Orchestrator and Proactive Refresh
//!
//! Drives every party through the same round in lock-step. Each round is a
//! fan-out over the parties followed by a barrier: no party starts round
//! r+1 until all of them finished round r. The first failure aborts the whole
//! run and the `Dkg` refuses any further use.
//!
//! A refresh re-runs both rounds with zero-constant polynomials so the shares
//! are re-randomized while the group secret and public key stay the same.

use super::commitment::scheme_for;
use super::party::{Party, PartyState};
use super::transport::{ChannelEndpoint, MessageTap};
use crate::config::DkgConfig;
use crate::crypto::curve::{CurveParams, GroupPoint, SECP256K1};
use crate::error::{DkgError, VerificationFailure};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use std::thread;
use tracing::{debug, info, warn};

pub struct Dkg {
    config: DkgConfig,
    curve: CurveParams,
    parties: Vec<Party>,
    public_key: Option<GroupPoint>,
    aborted: bool,
}

impl Dkg {
    pub fn new(config: DkgConfig) -> Result<Self, DkgError> {
        Self::with_tap(config, None)
    }

    /// Build `n` parties on a fully connected in-process network. `tap` sees
    /// every envelope before delivery.
    pub fn with_tap(config: DkgConfig, tap: Option<MessageTap>) -> Result<Self, DkgError> {
        config.validate()?;

        let curve = SECP256K1;
        let scheme = scheme_for(config.scheme);
        let parties = ChannelEndpoint::fully_connected(config.n_parties, tap)
            .into_iter()
            .map(|endpoint| Party::new(config.threshold, curve, scheme.clone(), Box::new(endpoint)))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            threshold = config.threshold,
            n_parties = config.n_parties,
            scheme = ?config.scheme,
            parallel = config.parallel,
            "DKG network built"
        );

        Ok(Self {
            config,
            curve,
            parties,
            public_key: None,
            aborted: false,
        })
    }

    pub fn config(&self) -> &DkgConfig {
        &self.config
    }

    pub fn curve(&self) -> &CurveParams {
        &self.curve
    }

    pub fn parties(&self) -> &[Party] {
        &self.parties
    }

    /// Direct access for driving parties by hand, one round function at a time.
    pub fn parties_mut(&mut self) -> &mut [Party] {
        &mut self.parties
    }

    pub fn party(&self, id: u32) -> Option<&Party> {
        self.parties.iter().find(|party| party.id() == id)
    }

    pub fn epoch(&self) -> u64 {
        self.parties.first().map(Party::epoch).unwrap_or(0)
    }

    pub fn public_key(&self) -> Option<GroupPoint> {
        self.public_key
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    /// Run the full DKG and return the group public key.
    ///
    /// Calling this on parties that already started is refused without
    /// aborting, so a finished key set can still be refreshed.
    pub fn run<R: RngCore>(&mut self, rng: &mut R) -> Result<GroupPoint, DkgError> {
        self.ensure_live()?;
        self.require_state(PartyState::Init, "run keygen")?;

        info!(
            threshold = self.config.threshold,
            n_parties = self.config.n_parties,
            "starting DKG"
        );
        self.run_rounds(rng)
    }

    /// Re-randomize every share. The public key must come out unchanged.
    pub fn refresh<R: RngCore>(&mut self, rng: &mut R) -> Result<GroupPoint, DkgError> {
        self.ensure_live()?;
        self.require_state(PartyState::PublicKeyComputed, "begin a refresh epoch")?;

        let result = self.fan_out(Vec::new(), |party, ()| party.begin_epoch());
        self.guard(result)?;

        info!(epoch = self.epoch(), "starting refresh");
        self.run_rounds(rng)
    }

    fn run_rounds<R: RngCore>(&mut self, rng: &mut R) -> Result<GroupPoint, DkgError> {
        self.commitment_round(rng)?;
        self.kosk_round()?;
        self.share_round()?;
        self.verification_round()?;
        self.finalize()
    }

    /// Round 1: every party samples its polynomial(s), commits, and broadcasts.
    pub fn commitment_round<R: RngCore>(&mut self, rng: &mut R) -> Result<(), DkgError> {
        self.ensure_live()?;

        // One independent stream per party so parallel and sequential runs match
        let seeds: Vec<[u8; 32]> = self
            .parties
            .iter()
            .map(|_| {
                let mut seed = [0u8; 32];
                rng.fill_bytes(&mut seed);
                seed
            })
            .collect();

        let result = self.fan_out(seeds, |party, seed| {
            let mut rng = ChaCha20Rng::from_seed(seed);
            party.prepare_commitments(&mut rng)?;
            party.broadcast_commitments()
        });
        self.guard(result)?;

        debug!(epoch = self.epoch(), "commitment round complete");
        Ok(())
    }

    /// Round 1 verify: integrity checks and KOSK verification.
    pub fn kosk_round(&mut self) -> Result<(), DkgError> {
        self.ensure_live()?;
        let result = self.fan_out(Vec::new(), |party, ()| party.verify_kosks());
        self.guard(result)?;

        debug!(epoch = self.epoch(), "KOSK round complete");
        Ok(())
    }

    /// Round 2: point-to-point share distribution.
    pub fn share_round(&mut self) -> Result<(), DkgError> {
        self.ensure_live()?;
        let result = self.fan_out(Vec::new(), |party, ()| party.distribute_shares());
        self.guard(result)?;

        debug!(epoch = self.epoch(), "share round complete");
        Ok(())
    }

    /// Round 2 verify: every received share against its sender's commitments.
    pub fn verification_round(&mut self) -> Result<(), DkgError> {
        self.ensure_live()?;
        let result = self.fan_out(Vec::new(), |party, ()| party.verify_shares());
        self.guard(result)?;

        debug!(epoch = self.epoch(), "verification round complete");
        Ok(())
    }

    /// Compute shares and public keys, then check every party agrees on the key.
    pub fn finalize(&mut self) -> Result<GroupPoint, DkgError> {
        self.ensure_live()?;
        let result = self.fan_out(Vec::new(), |party, ()| {
            party.compute_secret_share()?;
            party.compute_public_key().map(|_| ())
        });
        self.guard(result)?;

        let result = self.agreed_public_key();
        let public_key = self.guard(result)?;
        self.public_key = Some(public_key);

        info!(
            epoch = self.epoch(),
            public_key = %hex::encode(public_key.to_bytes()),
            "DKG finalized"
        );
        Ok(public_key)
    }

    /// All parties must hold the same key, and after a refresh it must be the
    /// key from epoch 0.
    fn agreed_public_key(&self) -> Result<GroupPoint, DkgError> {
        let mut keys = self
            .parties
            .iter()
            .map(|party| (party.id(), party.public_key()));

        let (reference, reference_key) = keys
            .next()
            .ok_or_else(|| DkgError::Configuration("no parties".to_string()))?;
        let reference_key = reference_key.ok_or(DkgError::MissingData {
            party: reference,
            peer: reference,
            what: "public key",
        })?;

        for (party, key) in keys {
            if key != Some(reference_key) {
                return Err(VerificationFailure::PublicKeyMismatch { reference, party }.into());
            }
        }

        if let Some(previous) = self.public_key {
            if previous != reference_key {
                return Err(VerificationFailure::PublicKeyMismatch {
                    reference,
                    party: reference,
                }
                .into());
            }
        }

        Ok(reference_key)
    }

    /// Precondition for `run`/`refresh`; nothing has been mutated yet, so a
    /// failure here leaves the run usable.
    fn require_state(&self, expected: PartyState, action: &'static str) -> Result<(), DkgError> {
        match self.parties.iter().find(|party| party.state() != expected) {
            Some(party) => Err(DkgError::InvalidState {
                party: party.id(),
                state: party.state(),
                action,
            }),
            None => Ok(()),
        }
    }

    fn ensure_live(&self) -> Result<(), DkgError> {
        if self.aborted {
            return Err(DkgError::Aborted);
        }
        Ok(())
    }

    fn guard<T>(&mut self, result: Result<T, DkgError>) -> Result<T, DkgError> {
        if let Err(err) = &result {
            warn!(epoch = self.epoch(), error = %err, "DKG aborted");
            self.aborted = true;
        }
        result
    }

    /// Apply `step` to every party, on one scoped thread each when parallel.
    /// Every party runs the step; the error of the lowest party id wins.
    /// An empty `inputs` means unit input for every party.
    fn fan_out<T, F>(&mut self, inputs: Vec<T>, step: F) -> Result<(), DkgError>
    where
        T: Send + Default,
        F: Fn(&mut Party, T) -> Result<(), DkgError> + Sync,
    {
        let mut inputs = inputs;
        inputs.resize_with(self.parties.len(), T::default);

        let results: Vec<Result<(), DkgError>> = if self.config.parallel {
            let step = &step;
            thread::scope(|scope| {
                let handles: Vec<_> = self
                    .parties
                    .iter_mut()
                    .zip(inputs)
                    .map(|(party, input)| scope.spawn(move || step(party, input)))
                    .collect();

                handles
                    .into_iter()
                    .map(|handle| {
                        handle
                            .join()
                            .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
                    })
                    .collect()
            })
        } else {
            self.parties
                .iter_mut()
                .zip(inputs)
                .map(|(party, input)| step(party, input))
                .collect()
        };

        results.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_agrees_on_public_key() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let mut dkg = Dkg::new(DkgConfig::new(2, 3)).unwrap();
        let public_key = dkg.run(&mut rng).unwrap();

        assert_eq!(dkg.public_key(), Some(public_key));
        for party in dkg.parties() {
            assert_eq!(party.public_key(), Some(public_key));
            assert_eq!(party.state(), PartyState::PublicKeyComputed);
        }
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let mut sequential = Dkg::new(DkgConfig::new(3, 4)).unwrap();
        let mut parallel = Dkg::new(DkgConfig::new(3, 4).with_parallel(true)).unwrap();

        let a = sequential.run(&mut ChaCha20Rng::seed_from_u64(7)).unwrap();
        let b = parallel.run(&mut ChaCha20Rng::seed_from_u64(7)).unwrap();
        assert_eq!(a, b);

        for (x, y) in sequential.parties().iter().zip(parallel.parties()) {
            assert_eq!(x.secret_share(), y.secret_share());
        }
    }

    #[test]
    fn test_second_run_is_invalid_state() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let mut dkg = Dkg::new(DkgConfig::new(2, 2)).unwrap();
        let public_key = dkg.run(&mut rng).unwrap();

        let err = dkg.run(&mut rng).unwrap_err();
        assert_eq!(
            err,
            DkgError::InvalidState {
                party: 1,
                state: PartyState::PublicKeyComputed,
                action: "run keygen",
            }
        );

        // The mistake does not cost the key set
        assert!(!dkg.is_aborted());
        assert_eq!(dkg.refresh(&mut rng), Ok(public_key));
        assert_eq!(dkg.epoch(), 1);
    }

    #[test]
    fn test_refresh_before_keygen_keeps_dkg_usable() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let mut dkg = Dkg::new(DkgConfig::new(2, 3)).unwrap();

        assert!(matches!(
            dkg.refresh(&mut rng),
            Err(DkgError::InvalidState { party: 1, .. })
        ));
        assert!(!dkg.is_aborted());
        assert!(dkg.run(&mut rng).is_ok());
    }

    #[test]
    fn test_party_lookup() {
        let dkg = Dkg::new(DkgConfig::new(2, 4)).unwrap();
        assert_eq!(dkg.party(3).map(Party::id), Some(3));
        assert!(dkg.party(5).is_none());
        assert_eq!(dkg.epoch(), 0);
    }
}
