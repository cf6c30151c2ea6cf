//! Core engine: estimate → simulate → enumerate scenarios → generate
//! candidates → optimize coverage.

pub mod coverage;
pub mod generator;
pub mod probability;
pub mod scenarios;
pub mod simulator;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::rng::{CancelFlag, RngHierarchy};
use crate::types::{EngineError, Leg, MasterSlip, OutcomeKey};
use coverage::CoverageConfig;
use generator::GeneratorConfig;
use probability::ProbabilityEstimator;
use scenarios::ScenarioConfig;
use simulator::{simulate_outcome, SimulationConfig};

/// Engine tuning, one table per stage (`[engine.simulation]`, …).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub simulation: SimulationConfig,
    pub scenarios: ScenarioConfig,
    pub generator: GeneratorConfig,
    pub coverage: CoverageConfig,
}

// ---------------------------------------------------------------------------
// Match profiles
// ---------------------------------------------------------------------------

/// One selectable outcome of a match, priced and simulated.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOption {
    pub market: String,
    pub selection: String,
    pub odds: f64,
    pub implied: f64,
    /// Blended, clamped estimate.
    pub estimated: f64,
    /// Bernoulli success rate at `estimated`.
    pub simulated: f64,
    /// Caller-supplied confidence rating, if any.
    pub confidence: Option<f64>,
}

impl MatchOption {
    pub fn outcome(&self) -> OutcomeKey {
        OutcomeKey::new(&self.market, &self.selection)
    }

    /// Swap weight: supplied confidence when usable, else the estimate.
    pub fn swap_weight(&self) -> f64 {
        self.confidence
            .filter(|c| c.is_finite() && *c > 0.0)
            .unwrap_or(self.estimated)
    }

    pub fn to_leg(&self, match_id: &str) -> Leg {
        Leg {
            match_id: match_id.to_string(),
            market: self.market.clone(),
            selection: self.selection.clone(),
            odds: self.odds,
            implied_probability: self.implied,
            simulated_probability: self.simulated,
        }
    }
}

/// Every option a candidate may choose for one match. `options[0]` is the
/// master selection.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchProfile {
    pub match_id: String,
    pub swappable: bool,
    pub options: Vec<MatchOption>,
}

impl MatchProfile {
    pub fn master(&self) -> Option<&MatchOption> {
        self.options.first()
    }

    pub fn alternatives(&self) -> &[MatchOption] {
        self.options.get(1..).unwrap_or(&[])
    }
}

/// Estimate and simulate every distinct option of every match.
///
/// Options without usable odds are dropped here. Estimation is sequential
/// (it shares the per-run cache); simulation fans out across rayon workers
/// with one seeded stream per option.
pub fn profile_matches(
    slip: &MasterSlip,
    estimator: &mut ProbabilityEstimator,
    hierarchy: &RngHierarchy,
    config: &SimulationConfig,
    cancel: &CancelFlag,
) -> Result<Vec<MatchProfile>, EngineError> {
    let mut profiles = Vec::with_capacity(slip.matches.len());

    for m in &slip.matches {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let sel = &m.selected_market;
        let master = estimator.estimate(m, &sel.market_type, &sel.selection, sel.odds, sel.implied_probability)?;
        let mut options = vec![MatchOption {
            market: sel.market_type.clone(),
            selection: sel.selection.clone(),
            odds: sel.odds.unwrap_or(0.0),
            implied: master.implied,
            estimated: master.probability,
            simulated: master.probability,
            confidence: sel.confidence_rating,
        }];
        let mut seen = vec![sel.outcome()];

        for market in &m.full_markets {
            for opt in &market.options {
                let key = OutcomeKey::new(&market.market_name, opt.label());
                if seen.contains(&key) {
                    continue;
                }
                let Some(odds) = opt.valid_odds() else {
                    debug!(
                        match_id = %m.match_id,
                        outcome = %key,
                        odds = ?opt.odds,
                        "Skipping option without usable odds"
                    );
                    continue;
                };
                let est = estimator.estimate(m, &market.market_name, opt.label(), Some(odds), opt.implied_probability)?;
                options.push(MatchOption {
                    market: market.market_name.clone(),
                    selection: opt.label().to_string(),
                    odds,
                    implied: est.implied,
                    estimated: est.probability,
                    simulated: est.probability,
                    confidence: opt.confidence,
                });
                seen.push(key);
            }
        }

        profiles.push(MatchProfile {
            match_id: m.match_id.clone(),
            swappable: m.swappable,
            options,
        });
    }

    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let jobs: Vec<(usize, usize, String, f64)> = profiles
        .iter()
        .enumerate()
        .flat_map(|(mi, p)| {
            p.options.iter().enumerate().map(move |(oi, o)| {
                (mi, oi, format!("{}/{}", p.match_id, o.outcome()), o.estimated)
            })
        })
        .collect();

    let rates: Vec<(usize, usize, f64)> = jobs
        .par_iter()
        .map(|(mi, oi, key, p)| {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }
            let mut rng = hierarchy.rng_for("option", key, 0);
            let out = simulate_outcome(*p, &mut rng, config, None)?;
            Ok((*mi, *oi, out.success_rate))
        })
        .collect::<Result<_, EngineError>>()?;

    for (mi, oi, rate) in rates {
        profiles[mi].options[oi].simulated = rate;
    }

    info!(
        matches = profiles.len(),
        options = jobs.len(),
        cached_estimates = estimator.cached(),
        "Match options profiled"
    );

    Ok(profiles)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
