//! Joint outcome scenarios across every match of a slip.
//!
//! Each match contributes a categorical distribution over the outcomes of
//! its master market, weighted by their estimated probabilities. Small
//! joint spaces are enumerated exactly; larger ones are sampled.

use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use super::{MatchOption, MatchProfile};
use crate::rng::{CancelFlag, RngHierarchy};
use crate::types::{EngineError, OutcomeKey, Scenario};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScenarioConfig {
    /// Joint draws when the space is too large to enumerate.
    pub iterations: usize,
    /// Largest joint space that is enumerated exactly.
    pub exhaustive_limit: usize,
    /// Scenarios below this joint probability are discarded.
    pub min_probability: f64,
    pub max_scenarios: usize,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            exhaustive_limit: 4096,
            min_probability: 0.001,
            max_scenarios: 1000,
        }
    }
}

/// Deduplicated, probability-ordered scenarios for one run.
#[derive(Debug, Clone)]
pub struct ScenarioSet {
    /// Match ids in the order of every scenario's `outcomes`.
    pub match_ids: Vec<String>,
    pub scenarios: Vec<Scenario>,
    pub exhaustive: bool,
}

impl ScenarioSet {
    /// Probability mass of the retained scenarios.
    pub fn total_probability(&self) -> f64 {
        self.scenarios.iter().map(|s| s.probability).sum()
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

const RESIDUAL_EPSILON: f64 = 1e-9;

/// Per-match outcome distribution.
struct Categorical {
    outcomes: Vec<OutcomeKey>,
    probabilities: Vec<f64>,
}

/// Selection label of the residual outcome: mass the listed options do not
/// account for. No candidate leg ever carries it.
pub const UNLISTED_OUTCOME: &str = "(unlisted)";

/// Outcomes of the master's market only: options from other markets are not
/// mutually exclusive with them.
///
/// Estimates are rescaled only when they over-count (Σ > 1). When they
/// under-count, the shortfall becomes an [`UNLISTED_OUTCOME`] so a market
/// listing only some outcomes cannot inflate coverage.
fn categorical(profile: &MatchProfile) -> Result<Categorical, EngineError> {
    let market = profile.master().map(|o| o.outcome().market);
    let options: Vec<&MatchOption> = profile
        .options
        .iter()
        .filter(|o| Some(o.outcome().market) == market)
        .collect();

    let total: f64 = options.iter().map(|o| o.estimated).sum();
    if !total.is_finite() || total <= 0.0 {
        return Err(EngineError::Computation(format!(
            "match {} has no outcome probability mass",
            profile.match_id
        )));
    }

    let scale = total.max(1.0);
    let mut outcomes: Vec<OutcomeKey> = options.iter().map(|o| o.outcome()).collect();
    let mut probabilities: Vec<f64> = options.iter().map(|o| o.estimated / scale).collect();

    let residual = 1.0 - total;
    if residual > RESIDUAL_EPSILON {
        let market = market.unwrap_or_default();
        outcomes.push(OutcomeKey::new(&market, UNLISTED_OUTCOME));
        probabilities.push(residual);
    }
    Ok(Categorical {
        outcomes,
        probabilities,
    })
}

fn scenario_hash(match_ids: &[String], outcomes: &[OutcomeKey]) -> String {
    let mut hasher = blake3::Hasher::new();
    for (id, o) in match_ids.iter().zip(outcomes) {
        hasher.update(id.as_bytes());
        hasher.update(&[0]);
        hasher.update(o.market.as_bytes());
        hasher.update(&[0]);
        hasher.update(o.selection.as_bytes());
        hasher.update(&[0xff]);
    }
    hasher.finalize().to_hex().to_string()
}

/// Build the scenario set for a slip's match profiles.
pub fn generate_scenarios(
    profiles: &[MatchProfile],
    config: &ScenarioConfig,
    hierarchy: &RngHierarchy,
    cancel: &CancelFlag,
) -> Result<ScenarioSet, EngineError> {
    let match_ids: Vec<String> = profiles.iter().map(|p| p.match_id.clone()).collect();
    let dists = profiles.iter().map(categorical).collect::<Result<Vec<_>, _>>()?;

    let space = dists
        .iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(d.outcomes.len()));
    let exhaustive = matches!(space, Some(n) if n <= config.exhaustive_limit);

    let mut seen = HashSet::new();
    let mut scenarios = Vec::new();
    let mut keep = |picks: &[usize]| {
        let probability: f64 = picks
            .iter()
            .zip(&dists)
            .map(|(i, d)| d.probabilities[*i])
            .product();
        if probability < config.min_probability {
            return;
        }
        let outcomes: Vec<OutcomeKey> = picks
            .iter()
            .zip(&dists)
            .map(|(i, d)| d.outcomes[*i].clone())
            .collect();
        let hash = scenario_hash(&match_ids, &outcomes);
        if seen.insert(hash.clone()) {
            scenarios.push(Scenario {
                outcomes,
                probability,
                hash,
            });
        }
    };

    if exhaustive {
        let mut picks = vec![0usize; dists.len()];
        'odometer: loop {
            keep(&picks);
            for pos in (0..picks.len()).rev() {
                picks[pos] += 1;
                if picks[pos] < dists[pos].outcomes.len() {
                    continue 'odometer;
                }
                picks[pos] = 0;
            }
            break;
        }
    } else {
        let samplers = dists
            .iter()
            .map(|d| WeightedIndex::new(&d.probabilities))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| EngineError::Computation(format!("scenario weights: {e}")))?;
        let mut rng = hierarchy.rng_for("scenario", "", 0);
        let mut picks = vec![0usize; dists.len()];
        for i in 0..config.iterations {
            if i % 1024 == 0 && cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            for (pick, sampler) in picks.iter_mut().zip(&samplers) {
                *pick = sampler.sample(&mut rng);
            }
            keep(&picks);
        }
    }

    let generated = scenarios.len();
    scenarios.sort_by(|a, b| {
        b.probability
            .total_cmp(&a.probability)
            .then_with(|| a.hash.cmp(&b.hash))
    });
    scenarios.truncate(config.max_scenarios);

    debug!(
        generated,
        retained = scenarios.len(),
        "Scenario set trimmed"
    );
    info!(
        scenarios = scenarios.len(),
        exhaustive,
        joint_space = ?space,
        "Scenarios generated"
    );

    Ok(ScenarioSet {
        match_ids,
        scenarios,
        exhaustive,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
