//! Greedy maximum-coverage selection.
//!
//! A candidate covers a scenario when each of its legs matches the
//! scenario's outcome for that match. The optimizer repeatedly picks the
//! candidate adding the most uncovered scenarios until the covered
//! probability mass reaches the target or no candidate adds anything.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::scenarios::ScenarioSet;
use crate::rng::CancelFlag;
use crate::types::{CandidateSlip, EngineError, RiskProfile, Scenario};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CoverageConfig {
    /// Target for the medium risk profile.
    pub target: f64,
    pub low_risk_target: f64,
    pub high_risk_target: f64,
    /// Upper bound on selected slips; `None` for no bound.
    pub max_selected: Option<usize>,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            target: 0.8,
            low_risk_target: 0.9,
            high_risk_target: 0.65,
            max_selected: None,
        }
    }
}

impl CoverageConfig {
    pub fn target_for(&self, profile: RiskProfile) -> f64 {
        match profile {
            RiskProfile::Low => self.low_risk_target,
            RiskProfile::Medium => self.target,
            RiskProfile::High => self.high_risk_target,
        }
    }
}

/// One greedy pick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageStep {
    /// Position of the picked candidate in the pool.
    pub candidate: usize,
    pub new_scenarios: usize,
    pub covered_scenarios: usize,
    pub covered_probability: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoverageResult {
    /// Pool positions of the selected candidates, in pick order.
    pub selected: Vec<usize>,
    pub steps: Vec<CoverageStep>,
    pub target: f64,
    /// Covered mass divided by the mass of all retained scenarios.
    pub achieved: f64,
    pub covered_scenarios: usize,
    pub total_scenarios: usize,
    pub target_reached: bool,
}

/// Whether `candidate` wins under `scenario`. Legs and outcomes must cover
/// the same matches in the same order.
pub fn covers(candidate: &CandidateSlip, match_ids: &[String], scenario: &Scenario) -> bool {
    candidate.legs.len() == scenario.outcomes.len()
        && candidate.legs.len() == match_ids.len()
        && candidate
            .legs
            .iter()
            .zip(match_ids)
            .zip(&scenario.outcomes)
            .all(|((leg, id), outcome)| leg.match_id == *id && leg.outcome() == *outcome)
}

/// Scenarios won by at least one of `slips`, as (count, share of mass).
pub fn measure(set: &ScenarioSet, slips: &[&CandidateSlip]) -> (usize, f64) {
    let total_mass = set.total_probability();
    let (count, mass) = set
        .scenarios
        .iter()
        .filter(|s| slips.iter().any(|c| covers(c, &set.match_ids, s)))
        .fold((0usize, 0.0), |(n, m), s| (n + 1, m + s.probability));
    let share = if total_mass > 0.0 { mass / total_mass } else { 0.0 };
    (count, share)
}

/// Pick candidates greedily. `confidence[i]` is the score of
/// `candidates[i]` and breaks ties after the new-coverage count.
pub fn optimize_coverage(
    set: &ScenarioSet,
    candidates: &[CandidateSlip],
    confidence: &[f64],
    target: f64,
    config: &CoverageConfig,
    cancel: &CancelFlag,
) -> Result<CoverageResult, EngineError> {
    if candidates.len() != confidence.len() {
        return Err(EngineError::Computation(format!(
            "{} candidates but {} confidence scores",
            candidates.len(),
            confidence.len()
        )));
    }

    let cover_sets: Vec<Vec<usize>> = candidates
        .par_iter()
        .map(|c| {
            set.scenarios
                .iter()
                .enumerate()
                .filter(|(_, s)| covers(c, &set.match_ids, s))
                .map(|(i, _)| i)
                .collect()
        })
        .collect();

    let total_mass = set.total_probability();
    let fraction = |mass: f64| if total_mass > 0.0 { mass / total_mass } else { 0.0 };
    let limit = config.max_selected.unwrap_or(usize::MAX);

    let mut covered = vec![false; set.len()];
    let mut covered_count = 0usize;
    let mut covered_mass = 0.0;
    let mut chosen = vec![false; candidates.len()];
    let mut selected = Vec::new();
    let mut steps = Vec::new();

    while fraction(covered_mass) < target && selected.len() < limit {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let gains: Vec<(usize, usize)> = cover_sets
            .par_iter()
            .enumerate()
            .filter(|(i, _)| !chosen[*i])
            .map(|(i, cs)| (i, cs.iter().filter(|s| !covered[**s]).count()))
            .collect();

        let best = gains.into_iter().filter(|(_, n)| *n > 0).min_by(|a, b| {
            b.1.cmp(&a.1)
                .then_with(|| confidence[b.0].total_cmp(&confidence[a.0]))
                .then_with(|| candidates[a.0].combined_odds.total_cmp(&candidates[b.0].combined_odds))
                .then_with(|| candidates[a.0].index.cmp(&candidates[b.0].index))
        });
        let Some((pick, new_scenarios)) = best else {
            break;
        };

        for s in &cover_sets[pick] {
            if !covered[*s] {
                covered[*s] = true;
                covered_count += 1;
                covered_mass += set.scenarios[*s].probability;
            }
        }
        chosen[pick] = true;
        selected.push(pick);
        steps.push(CoverageStep {
            candidate: pick,
            new_scenarios,
            covered_scenarios: covered_count,
            covered_probability: covered_mass,
        });
        debug!(
            candidate = candidates[pick].index,
            new_scenarios,
            covered = covered_count,
            coverage = format!("{:.1}%", fraction(covered_mass) * 100.0),
            "Coverage pick"
        );
    }

    if selected.is_empty() {
        // Nothing added coverage: fall back to the master slip on its own.
        let master = candidates
            .iter()
            .position(|c| c.is_master)
            .or(if candidates.is_empty() { None } else { Some(0) })
            .ok_or_else(|| EngineError::Computation("empty candidate pool".into()))?;
        for s in &cover_sets[master] {
            covered_count += 1;
            covered_mass += set.scenarios[*s].probability;
        }
        selected.push(master);
    }

    let achieved = fraction(covered_mass);
    let target_reached = achieved >= target;
    if !target_reached {
        warn!(
            target = format!("{:.0}%", target * 100.0),
            achieved = format!("{:.1}%", achieved * 100.0),
            selected = selected.len(),
            "Coverage target not reached; returning best partial coverage"
        );
    }
    info!(
        selected = selected.len(),
        covered = covered_count,
        scenarios = set.len(),
        achieved = format!("{:.1}%", achieved * 100.0),
        "Coverage optimized"
    );

    Ok(CoverageResult {
        selected,
        steps,
        target,
        achieved,
        covered_scenarios: covered_count,
        total_scenarios: set.len(),
        target_reached,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
