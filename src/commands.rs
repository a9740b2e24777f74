use crate::config::DkgConfig;
use crate::crypto::curve::{base_mul, GroupPoint, SecretScalar};
use crate::crypto::helpers::reconstruct_secret;
use crate::protocol::commitment::SchemeKind;
use crate::protocol::dkg::Dkg;
use crate::protocol::transport::{Envelope, MessageTap, Payload};
use crate::CommandResult;
use anyhow::{bail, Context, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use secp256kfun::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Public info for one party after a run
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PartyInfo {
    pub index: u32,
    pub epoch: u64,
    pub verification_share: String,
}

/// Shareable public outcome of a keygen
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GroupInfo {
    #[serde(rename = "type")]
    pub event_type: String,
    pub group_public_key: String,
    pub threshold: u32,
    pub total_parties: u32,
    pub scheme: SchemeKind,
    pub parties: Vec<PartyInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RefreshSummary {
    #[serde(rename = "type")]
    pub event_type: String,
    pub group_public_key: String,
    pub epochs: u64,
    pub public_key_unchanged: bool,
    pub secret_preserved: bool,
    pub shares_rotated: bool,
    pub parties: Vec<PartyInfo>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TamperSummary {
    #[serde(rename = "type")]
    pub event_type: String,
    pub tampered_party: u32,
    pub coefficient: usize,
    pub aborted: bool,
    pub error: Option<String>,
}

/// Deterministic RNG when a seed is given, fresh entropy otherwise.
pub fn rng_from_seed(seed: Option<u64>) -> ChaCha20Rng {
    match seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::from_entropy(),
    }
}

fn point_hex(point: &GroupPoint) -> String {
    hex::encode(point.to_bytes())
}

fn party_infos(dkg: &Dkg) -> Vec<PartyInfo> {
    dkg.parties()
        .iter()
        .map(|party| PartyInfo {
            index: party.id(),
            epoch: party.epoch(),
            verification_share: party
                .verification_share()
                .map(|share| point_hex(&share))
                .unwrap_or_default(),
        })
        .collect()
}

/// `(id, share)` for every party that has one.
fn collect_shares(dkg: &Dkg) -> Vec<(u32, SecretScalar)> {
    dkg.parties()
        .iter()
        .filter_map(|party| party.secret_share().map(|share| (party.id(), share)))
        .collect()
}

fn push_header(out: &mut String, title: &str, config: &DkgConfig) {
    out.push_str(&format!("{}\n\n", title));
    out.push_str(&format!(
        "⚙️  {}-of-{} with {:?} commitments{}\n\n",
        config.threshold,
        config.n_parties,
        config.scheme,
        if config.parallel { ", parallel rounds" } else { "" }
    ));
}

pub fn keygen_core(config: DkgConfig, seed: Option<u64>) -> Result<CommandResult> {
    let mut out = String::new();
    push_header(&mut out, "🔑 Distributed Key Generation", &config);

    let mut rng = rng_from_seed(seed);
    let mut dkg = Dkg::new(config)?;
    let public_key = dkg.run(&mut rng).context("DKG failed")?;

    out.push_str("Round 1: every party committed to its polynomial and proved knowledge\n");
    out.push_str("         of its secret contribution (KOSK).\n");
    out.push_str("Round 2: every party sent each peer its evaluation point-to-point and\n");
    out.push_str("         checked the shares it received against the commitments.\n\n");

    out.push_str(&format!("Group public key: {}\n\n", point_hex(&public_key)));
    for party in dkg.parties() {
        if let Some(share) = party.verification_share() {
            out.push_str(&format!("  Party {} verification share: {}\n", party.id(), point_hex(&share)));
        }
    }
    out.push_str(&format!(
        "\n   Any {} of the {} shares reconstruct the group secret.\n",
        config.threshold, config.n_parties
    ));

    let info = GroupInfo {
        event_type: "keygen".to_string(),
        group_public_key: point_hex(&public_key),
        threshold: config.threshold,
        total_parties: config.n_parties,
        scheme: config.scheme,
        parties: party_infos(&dkg),
    };

    Ok(CommandResult {
        output: out,
        result: serde_json::to_string(&info)?,
    })
}

pub fn refresh_core(config: DkgConfig, epochs: u64, seed: Option<u64>) -> Result<CommandResult> {
    let mut out = String::new();
    push_header(&mut out, "🔄 Proactive Share Refresh", &config);

    let mut rng = rng_from_seed(seed);
    let mut dkg = Dkg::new(config)?;
    let public_key = dkg.run(&mut rng).context("DKG failed")?;

    let threshold = config.threshold as usize;
    let initial_shares = collect_shares(&dkg);
    let initial_secret = reconstruct_secret(&initial_shares[..threshold])?;
    out.push_str(&format!("Epoch 0 public key: {}\n", point_hex(&public_key)));

    let mut unchanged = true;
    for _ in 0..epochs {
        let refreshed = dkg.refresh(&mut rng).with_context(|| {
            format!("Refresh to epoch {} failed", dkg.epoch())
        })?;
        unchanged &= refreshed == public_key;
        out.push_str(&format!("Epoch {} public key: {}\n", dkg.epoch(), point_hex(&refreshed)));
    }

    let final_shares = collect_shares(&dkg);
    // The last t shares, a different subset from the one used for epoch 0
    let final_secret = reconstruct_secret(&final_shares[final_shares.len() - threshold..])?;
    let secret_preserved =
        final_secret == initial_secret && base_mul(&final_secret) == public_key;

    // With t = 1 the refresh polynomial is the zero polynomial and shares stay put
    let shares_rotated = initial_shares
        .iter()
        .zip(&final_shares)
        .all(|((_, before), (_, after))| before != after);

    out.push('\n');
    out.push_str(&format!("✓ Public key unchanged: {}\n", unchanged));
    out.push_str(&format!("✓ Secret preserved:     {}\n", secret_preserved));
    out.push_str(&format!("✓ Shares rotated:       {}\n", shares_rotated));

    let summary = RefreshSummary {
        event_type: "refresh".to_string(),
        group_public_key: point_hex(&public_key),
        epochs: dkg.epoch(),
        public_key_unchanged: unchanged,
        secret_preserved,
        shares_rotated,
        parties: party_infos(&dkg),
    };

    Ok(CommandResult {
        output: out,
        result: serde_json::to_string(&summary)?,
    })
}

/// Tap that adds `G` to commitment `coefficient` of every broadcast from `party`.
pub fn commitment_tamper(party: u32, coefficient: usize) -> MessageTap {
    Arc::new(move |envelope: &mut Envelope| {
        if envelope.from != party {
            return;
        }
        if let Payload::Commitments(points) = &mut envelope.payload {
            if let Some(point) = points.get_mut(coefficient) {
                let original = *point;
                *point = g!(original + G).normalize();
            }
        }
    })
}

pub fn tamper_core(
    config: DkgConfig,
    party: u32,
    coefficient: usize,
    seed: Option<u64>,
) -> Result<CommandResult> {
    config.validate()?;
    if party == 0 || party > config.n_parties {
        bail!("Party {} does not exist in a {}-party run", party, config.n_parties);
    }
    if coefficient >= config.threshold as usize {
        bail!(
            "Coefficient {} out of range, polynomials have {} coefficients",
            coefficient,
            config.threshold
        );
    }

    let mut out = String::new();
    push_header(&mut out, "🧪 Tampered Commitment", &config);
    out.push_str(&format!(
        "Commitment {} broadcast by party {} is shifted by G in flight.\n\n",
        coefficient, party
    ));

    let mut rng = rng_from_seed(seed);
    let mut dkg = Dkg::with_tap(config, Some(commitment_tamper(party, coefficient)))?;
    let error = match dkg.run(&mut rng) {
        Ok(public_key) => {
            out.push_str(&format!(
                "⚠️  Run completed with public key {}\n",
                point_hex(&public_key)
            ));
            None
        }
        Err(err) => {
            out.push_str(&format!("❌ Run aborted: {}\n", err));
            Some(err.to_string())
        }
    };

    let summary = TamperSummary {
        event_type: "tamper".to_string(),
        tampered_party: party,
        coefficient,
        aborted: dkg.is_aborted(),
        error,
    };

    Ok(CommandResult {
        output: out,
        result: serde_json::to_string(&summary)?,
    })
}
