//! Candidate slip generation.
//!
//! Starting from the master selection, each swappable leg is replaced with
//! probability `swap_probability` by one of its match's alternatives,
//! chosen in proportion to the alternative's confidence.

use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use super::{MatchOption, MatchProfile};
use crate::rng::{CancelFlag, RngHierarchy};
use crate::types::{CandidateSlip, EngineError, Leg, OutcomeKey};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Pool size including the master candidate.
    pub num_candidates: usize,
    pub swap_probability: f64,
    /// Draws attempted before giving up on filling the pool with distinct slips.
    pub max_attempts: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_candidates: 100,
            swap_probability: 0.3,
            max_attempts: 2_000,
        }
    }
}

/// Build the candidate pool. `pool[0]` is the pure master slip.
pub fn generate_candidates(
    profiles: &[MatchProfile],
    config: &GeneratorConfig,
    hierarchy: &RngHierarchy,
    cancel: &CancelFlag,
) -> Result<Vec<CandidateSlip>, EngineError> {
    if let Some((i, p)) = profiles.iter().enumerate().find(|(_, p)| p.options.is_empty()) {
        return Err(EngineError::validation(
            format!("matches[{i}]"),
            format!("match {} has no selectable options", p.match_id),
        ));
    }

    let target = config.num_candidates.max(1);
    let mut rng = hierarchy.rng_for("generator", "", 0);
    let mut pool: Vec<CandidateSlip> = Vec::with_capacity(target);
    let mut seen: HashSet<Vec<OutcomeKey>> = HashSet::new();
    let mut rejected = 0usize;

    let master: Vec<Leg> = profiles
        .iter()
        .filter_map(|p| p.master().map(|o| o.to_leg(&p.match_id)))
        .collect();
    admit(master, true, &mut pool, &mut seen, &mut rejected);

    let mut attempts = 0usize;
    while pool.len() < target && attempts < config.max_attempts {
        if attempts % 256 == 0 && cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        attempts += 1;
        let legs = profiles
            .iter()
            .map(|p| pick_option(p, config.swap_probability, &mut rng).to_leg(&p.match_id))
            .collect();
        admit(legs, false, &mut pool, &mut seen, &mut rejected);
    }

    if pool.is_empty() {
        return Err(EngineError::validation(
            "matches",
            "no candidate slip has valid odds on every leg",
        ));
    }
    if pool.len() < target {
        debug!(
            pool = pool.len(),
            target,
            attempts,
            "Distinct candidates exhausted before pool filled"
        );
    }

    info!(
        candidates = pool.len(),
        rejected,
        attempts,
        "Candidate pool generated"
    );
    Ok(pool)
}

/// Master option, or a confidence-weighted alternative when the leg swaps.
fn pick_option<'a>(profile: &'a MatchProfile, swap_probability: f64, rng: &mut StdRng) -> &'a MatchOption {
    let alternatives = profile.alternatives();
    let master = &profile.options[0];
    if !profile.swappable || alternatives.is_empty() || rng.gen::<f64>() >= swap_probability {
        return master;
    }
    let weights: Vec<f64> = alternatives
        .iter()
        .map(|a| {
            let w = a.swap_weight();
            if w.is_finite() && w > 0.0 {
                w
            } else {
                0.0
            }
        })
        .collect();
    let idx = match WeightedIndex::new(&weights) {
        Ok(dist) => dist.sample(rng),
        Err(_) => rng.gen_range(0..alternatives.len()),
    };
    &alternatives[idx]
}

/// Push a candidate unless a leg is unpriced or the leg set is a repeat.
fn admit(
    legs: Vec<Leg>,
    is_master: bool,
    pool: &mut Vec<CandidateSlip>,
    seen: &mut HashSet<Vec<OutcomeKey>>,
    rejected: &mut usize,
) {
    if let Some(bad) = legs.iter().find(|l| !(l.odds.is_finite() && l.odds > 1.0)) {
        warn!(
            match_id = %bad.match_id,
            selection = %bad.selection,
            odds = bad.odds,
            "Candidate rejected: leg without valid odds"
        );
        *rejected += 1;
        return;
    }
    let signature: Vec<OutcomeKey> = legs.iter().map(Leg::outcome).collect();
    if !seen.insert(signature) {
        return;
    }
    let candidate = CandidateSlip::from_legs(pool.len(), legs, is_master);
    debug!(candidate = %candidate, "Candidate admitted");
    pool.push(candidate);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
