//! End-to-end DKG runs.
//!
//! Every test runs all parties in-process and audits the outcome by
//! reconstructing the group secret from share subsets.

use frostpss::crypto::curve::{base_mul, SecretScalar};
use frostpss::crypto::helpers::reconstruct_secret;
use frostpss::protocol::PartyState;
use frostpss::{Dkg, DkgConfig, DkgError, SchemeKind};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn shares(dkg: &Dkg, ids: &[u32]) -> Vec<(u32, SecretScalar)> {
    ids.iter()
        .map(|&id| {
            let share = dkg.party(id).and_then(|p| p.secret_share()).unwrap();
            (id, share)
        })
        .collect()
}

#[test]
fn test_two_of_three_keygen() {
    let mut rng = ChaCha20Rng::seed_from_u64(42);
    let mut dkg = Dkg::new(DkgConfig::new(2, 3)).unwrap();
    let public_key = dkg.run(&mut rng).unwrap();

    for party in dkg.parties() {
        assert_eq!(party.public_key(), Some(public_key));
        assert_eq!(party.state(), PartyState::PublicKeyComputed);
        assert_eq!(party.epoch(), 0);
    }

    let secret_12 = reconstruct_secret(&shares(&dkg, &[1, 2])).unwrap();
    let secret_23 = reconstruct_secret(&shares(&dkg, &[2, 3])).unwrap();
    let secret_13 = reconstruct_secret(&shares(&dkg, &[1, 3])).unwrap();
    assert_eq!(secret_12, secret_23);
    assert_eq!(secret_12, secret_13);
    assert_eq!(base_mul(&secret_12), public_key);
}

#[test]
fn test_fewer_than_threshold_shares_do_not_reconstruct() {
    let mut rng = ChaCha20Rng::seed_from_u64(43);
    let mut dkg = Dkg::new(DkgConfig::new(3, 5)).unwrap();
    let public_key = dkg.run(&mut rng).unwrap();

    let secret = reconstruct_secret(&shares(&dkg, &[1, 3, 5])).unwrap();
    assert_eq!(base_mul(&secret), public_key);

    let partial = reconstruct_secret(&shares(&dkg, &[2, 4])).unwrap();
    assert_ne!(partial, secret);
}

#[test]
fn test_verification_shares_match_secret_shares() {
    let mut rng = ChaCha20Rng::seed_from_u64(44);
    let mut dkg = Dkg::new(DkgConfig::new(2, 4)).unwrap();
    dkg.run(&mut rng).unwrap();

    for party in dkg.parties() {
        let share = party.secret_share().unwrap();
        assert_eq!(party.verification_share(), Some(base_mul(&share)));
    }
}

#[test]
fn test_pedersen_keygen() {
    let mut rng = ChaCha20Rng::seed_from_u64(45);
    let config = DkgConfig::new(3, 4).with_scheme(SchemeKind::Pedersen);
    let mut dkg = Dkg::new(config).unwrap();
    let public_key = dkg.run(&mut rng).unwrap();

    let secret = reconstruct_secret(&shares(&dkg, &[1, 2, 4])).unwrap();
    assert_eq!(base_mul(&secret), public_key);

    // Broadcast commitments hide the coefficients: they differ from the
    // masked coefficients each party also broadcast
    let party = dkg.party(1).unwrap();
    let peer = party.peer(2).unwrap();
    assert_eq!(peer.commitments().unwrap().len(), 3);
    assert_ne!(peer.commitments(), peer.masked_coefficients());
}

#[test]
fn test_parallel_keygen() {
    let mut rng = ChaCha20Rng::seed_from_u64(46);
    let config = DkgConfig::new(4, 7).with_parallel(true);
    let mut dkg = Dkg::new(config).unwrap();
    let public_key = dkg.run(&mut rng).unwrap();

    let secret = reconstruct_secret(&shares(&dkg, &[7, 2, 5, 3])).unwrap();
    assert_eq!(base_mul(&secret), public_key);
}

#[test]
fn test_n_of_n_and_one_of_n() {
    let mut rng = ChaCha20Rng::seed_from_u64(47);

    let mut all = Dkg::new(DkgConfig::new(3, 3)).unwrap();
    let public_key = all.run(&mut rng).unwrap();
    let secret = reconstruct_secret(&shares(&all, &[1, 2, 3])).unwrap();
    assert_eq!(base_mul(&secret), public_key);

    // With t = 1 every share is the secret itself
    let mut any = Dkg::new(DkgConfig::new(1, 3)).unwrap();
    let public_key = any.run(&mut rng).unwrap();
    for party in any.parties() {
        assert_eq!(party.verification_share(), Some(public_key));
    }
}

#[test]
fn test_single_party() {
    let mut rng = ChaCha20Rng::seed_from_u64(48);
    let mut dkg = Dkg::new(DkgConfig::new(1, 1)).unwrap();
    let public_key = dkg.run(&mut rng).unwrap();

    let party = dkg.party(1).unwrap();
    assert!(party.peer_ids().is_empty());
    assert_eq!(party.verification_share(), Some(public_key));
}

#[test]
fn test_invalid_configurations() {
    assert!(matches!(
        Dkg::new(DkgConfig::new(0, 3)),
        Err(DkgError::Configuration(_))
    ));
    assert!(matches!(
        Dkg::new(DkgConfig::new(4, 3)),
        Err(DkgError::Configuration(_))
    ));
}

#[test]
fn test_stepwise_rounds_match_run() {
    let mut stepwise = Dkg::new(DkgConfig::new(2, 3)).unwrap();
    let mut rng = ChaCha20Rng::seed_from_u64(49);
    stepwise.commitment_round(&mut rng).unwrap();
    for party in stepwise.parties() {
        assert_eq!(party.state(), PartyState::Broadcast);
    }
    stepwise.kosk_round().unwrap();
    stepwise.share_round().unwrap();
    stepwise.verification_round().unwrap();
    let a = stepwise.finalize().unwrap();

    let mut whole = Dkg::new(DkgConfig::new(2, 3)).unwrap();
    let b = whole.run(&mut ChaCha20Rng::seed_from_u64(49)).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_rounds_out_of_order() {
    let mut dkg = Dkg::new(DkgConfig::new(2, 3)).unwrap();
    let err = dkg.share_round().unwrap_err();
    assert!(matches!(
        err,
        DkgError::InvalidState {
            party: 1,
            state: PartyState::Init,
            ..
        }
    ));
    assert_eq!(dkg.kosk_round(), Err(DkgError::Aborted));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_every_threshold_subset_reconstructs_the_key(
        n in 1u32..=5,
        t_offset in 0u32..5,
        seed in any::<u64>(),
        pedersen in any::<bool>(),
    ) {
        let t = 1 + t_offset % n;
        let scheme = if pedersen { SchemeKind::Pedersen } else { SchemeKind::Feldman };
        let mut dkg = Dkg::new(DkgConfig::new(t, n).with_scheme(scheme)).unwrap();
        let public_key = dkg.run(&mut ChaCha20Rng::seed_from_u64(seed)).unwrap();

        // Every window of t consecutive ids, wrapping around
        for start in 1..=n {
            let ids: Vec<u32> = (0..t).map(|k| (start - 1 + k) % n + 1).collect();
            let secret = reconstruct_secret(&shares(&dkg, &ids)).unwrap();
            prop_assert_eq!(base_mul(&secret), public_key);
        }
    }
}
