//! Edge, confidence and ranking of candidate slips.
//!
//! Edge is the simulated expected return per unit staked. Confidence is the
//! geometric mean of the simulated leg rates, penalized by how far the
//! simulation strays from the market's own view of each leg.

use rayon::prelude::*;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::risk::RiskConfig;
use crate::types::{CandidateSlip, EngineError, RiskCategory};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of the mean |simulated − implied| leg divergence.
    pub divergence_penalty: f64,
    pub risk: RiskConfig,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            divergence_penalty: 0.2,
            risk: RiskConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredSlip {
    pub candidate: CandidateSlip,
    /// simulated probability × combined odds − 1.
    pub edge: f64,
    /// In [0, 1].
    pub confidence: f64,
    pub risk: RiskCategory,
}

pub struct SlipScorer {
    config: ScoringConfig,
}

impl SlipScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn score(&self, candidate: &CandidateSlip) -> Result<ScoredSlip, EngineError> {
        if candidate.legs.is_empty() {
            return Err(EngineError::Computation(format!(
                "candidate {} has no legs",
                candidate.index
            )));
        }
        let n = candidate.legs.len() as f64;
        let divergence = candidate
            .legs
            .iter()
            .map(|l| (l.simulated_probability - l.implied_probability).abs())
            .sum::<f64>()
            / n;

        let edge = candidate.simulated_probability * candidate.combined_odds - 1.0;
        let raw = candidate.leg_confidence - self.config.divergence_penalty * divergence;
        if !edge.is_finite() || !raw.is_finite() {
            return Err(EngineError::Computation(format!(
                "non-finite score for candidate {} (edge={edge}, confidence={raw})",
                candidate.index
            )));
        }
        let confidence = raw.clamp(0.0, 1.0);

        Ok(ScoredSlip {
            candidate: candidate.clone(),
            edge,
            confidence,
            risk: self.config.risk.categorize(confidence),
        })
    }

    /// Score every candidate on the rayon pool. Output order follows input.
    pub fn score_all(&self, candidates: &[CandidateSlip]) -> Result<Vec<ScoredSlip>, EngineError> {
        let scored: Vec<ScoredSlip> = candidates
            .par_iter()
            .map(|c| self.score(c))
            .collect::<Result<_, _>>()?;
        debug!(scored = scored.len(), "Candidates scored");
        Ok(scored)
    }
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Order slips by confidence, then possible return at the full stake, then
/// generation index. Total and deterministic.
pub fn rank(slips: &mut [ScoredSlip], total_stake: Decimal) {
    let stake = total_stake.to_f64().unwrap_or(0.0);
    slips.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| {
                (stake * b.candidate.combined_odds).total_cmp(&(stake * a.candidate.combined_odds))
            })
            .then_with(|| a.candidate.index.cmp(&b.candidate.index))
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
