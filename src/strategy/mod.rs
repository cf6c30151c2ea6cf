//! Strategy layer: scoring, ranking, stake allocation and Kelly advice,
//! plus the `SlipBuilder` that runs a whole generation.

pub mod kelly;
pub mod risk;
pub mod scoring;
pub mod stake;

use rust_decimal::prelude::*;
use tracing::{error, info, warn};

use crate::engine::coverage::{measure, optimize_coverage};
use crate::engine::generator::generate_candidates;
use crate::engine::probability::{ProbabilityConfig, ProbabilityEstimator};
use crate::engine::scenarios::generate_scenarios;
use crate::engine::simulator::{simulate_outcome, Wager};
use crate::engine::{profile_matches, EngineConfig};
use crate::rng::{derive_run_seed, CancelFlag, RngHierarchy};
use crate::types::{
    CandidateSlip, CoverageSummary, EngineError, GeneratedSlip, GenerationResponse, MasterSlip,
    PortfolioComparison, SlipLeg, SlipRisk,
};
use kelly::{KellyCalculator, KellyConfig};
use scoring::{rank, ScoredSlip, ScoringConfig, SlipScorer};
use stake::{allocate, minor_units, StakeConfig};

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// Pipelines estimation → simulation → scenarios → candidates → scoring →
/// coverage → ranking → stakes → Kelly advice and payout risk for one
/// master slip.
///
/// Holds configuration only; every call to `generate` owns its own caches
/// and random streams, so one builder can serve concurrent requests.
#[derive(Debug, Clone, Default)]
pub struct SlipBuilder {
    pub engine: EngineConfig,
    pub probability: ProbabilityConfig,
    pub scoring: ScoringConfig,
    pub stake: StakeConfig,
    pub kelly: KellyConfig,
}

impl SlipBuilder {
    pub fn new(
        engine: EngineConfig,
        probability: ProbabilityConfig,
        scoring: ScoringConfig,
        stake: StakeConfig,
        kelly: KellyConfig,
    ) -> Self {
        Self {
            engine,
            probability,
            scoring,
            stake,
            kelly,
        }
    }

    /// Generate the hedged portfolio for `slip`.
    ///
    /// With `seed` set the output is fully reproducible; without it a seed
    /// is derived from the slip id and a run counter and echoed back.
    pub fn generate(
        &self,
        slip: &MasterSlip,
        seed: Option<u64>,
        cancel: &CancelFlag,
    ) -> Result<GenerationResponse, EngineError> {
        let result = self.run(slip, seed, cancel);
        match &result {
            Err(EngineError::Computation(msg)) => {
                error!(master_slip_id = %slip.id, error = %msg, "Generation failed")
            }
            Err(EngineError::Cancelled) => {
                warn!(master_slip_id = %slip.id, "Generation cancelled")
            }
            Err(EngineError::Validation { field, message }) => {
                info!(master_slip_id = %slip.id, field = %field, message = %message, "Master slip rejected")
            }
            Ok(_) => {}
        }
        result
    }

    fn run(
        &self,
        slip: &MasterSlip,
        seed: Option<u64>,
        cancel: &CancelFlag,
    ) -> Result<GenerationResponse, EngineError> {
        slip.validate()?;

        let seed = seed.unwrap_or_else(|| derive_run_seed(&slip.id));
        let hierarchy = RngHierarchy::new(seed);
        info!(
            master_slip_id = %slip.id,
            matches = slip.matches.len(),
            stake = %slip.stake,
            currency = %slip.currency,
            risk_profile = %slip.risk_profile,
            seed,
            "Generation started"
        );

        // Step 1 – estimate and simulate every option
        let mut estimator =
            ProbabilityEstimator::new(self.probability.clone(), self.engine.simulation.clone());
        let profiles = profile_matches(
            slip,
            &mut estimator,
            &hierarchy,
            &self.engine.simulation,
            cancel,
        )?;

        // Step 2 – joint scenarios
        let scenarios = generate_scenarios(&profiles, &self.engine.scenarios, &hierarchy, cancel)?;

        // Step 3 – candidate pool
        let pool = generate_candidates(&profiles, &self.engine.generator, &hierarchy, cancel)?;

        // Step 4 – score every candidate
        let scorer = SlipScorer::new(self.scoring.clone());
        let scored = scorer.score_all(&pool)?;
        let confidence: Vec<f64> = scored.iter().map(|s| s.confidence).collect();
        check_cancel(cancel)?;

        // Step 5 – coverage
        let target = self.engine.coverage.target_for(slip.risk_profile);
        let coverage = optimize_coverage(
            &scenarios,
            &pool,
            &confidence,
            target,
            &self.engine.coverage,
            cancel,
        )?;

        // Step 6 – rank the selection
        let mut selected: Vec<ScoredSlip> =
            coverage.selected.iter().map(|i| scored[*i].clone()).collect();
        rank(&mut selected, slip.stake);

        // Step 7 – stakes
        check_cancel(cancel)?;
        let ranked_confidence: Vec<f64> = selected.iter().map(|s| s.confidence).collect();
        let stakes = allocate(slip.stake, &slip.currency, &ranked_confidence, &self.stake)?;

        let mut summary = CoverageSummary {
            target: coverage.target,
            achieved: coverage.achieved,
            scenarios_considered: coverage.total_scenarios,
            scenarios_covered: coverage.covered_scenarios,
            target_reached: coverage.target_reached,
        };
        if stakes.len() < selected.len() {
            selected.truncate(stakes.len());
            let funded: Vec<&CandidateSlip> = selected.iter().map(|s| &s.candidate).collect();
            let (covered, achieved) = measure(&scenarios, &funded);
            warn!(
                master_slip_id = %slip.id,
                funded = selected.len(),
                coverage = format!("{:.1}%", achieved * 100.0),
                "Portfolio trimmed to the slips the stake can fund"
            );
            summary.scenarios_covered = covered;
            summary.achieved = achieved;
            summary.target_reached = achieved >= summary.target;
        }

        // Step 8 – assemble with Kelly advice and payout risk
        check_cancel(cancel)?;
        let kelly = KellyCalculator::new(self.kelly.clone());
        let dp = minor_units(&slip.currency);
        let mut generated = Vec::with_capacity(selected.len());
        for (s, stake) in selected.iter().zip(stakes) {
            generated.push(self.to_generated(slip, &hierarchy, s, stake, dp, &kelly)?);
        }
        let comparison = PortfolioComparison::from_slips(&generated);

        info!(
            master_slip_id = %slip.id,
            candidates = pool.len(),
            selected = generated.len(),
            coverage = format!("{:.1}%", summary.achieved * 100.0),
            target_reached = summary.target_reached,
            "Generation complete"
        );

        Ok(GenerationResponse {
            master_slip_id: slip.id.clone(),
            currency: slip.currency.clone(),
            seed,
            candidates_generated: pool.len(),
            coverage: summary,
            comparison,
            generated_slips: generated,
        })
    }

    fn to_generated(
        &self,
        slip: &MasterSlip,
        hierarchy: &RngHierarchy,
        scored: &ScoredSlip,
        stake: Decimal,
        dp: u32,
        kelly: &KellyCalculator,
    ) -> Result<GeneratedSlip, EngineError> {
        let c = &scored.candidate;
        let odds = Decimal::from_f64(c.combined_odds).ok_or_else(|| {
            EngineError::Computation(format!("combined odds not representable: {}", c.combined_odds))
        })?;
        let possible_return =
            (stake * odds).round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
        let wager = Wager {
            stake: stake.to_f64().ok_or_else(|| {
                EngineError::Computation(format!("stake not representable: {stake}"))
            })?,
            odds: c.combined_odds,
        };
        let mut rng = hierarchy.rng_for("slip-risk", &slip.id, c.index as u64);
        let outcome = simulate_outcome(
            c.simulated_probability,
            &mut rng,
            &self.engine.simulation,
            Some(wager),
        )?;
        let stats = outcome.risk.ok_or_else(|| {
            EngineError::Computation(format!("no payout statistics for candidate {}", c.index))
        })?;

        Ok(GeneratedSlip {
            slip_id: hierarchy.slip_id(&slip.id, c.index as u64),
            stake,
            total_odds: c.combined_odds,
            possible_return,
            confidence_score: scored.confidence,
            risk_level: scored.risk,
            edge: scored.edge,
            simulated_probability: c.simulated_probability,
            kelly_fraction: kelly.advise(scored),
            risk: SlipRisk {
                win_probability: outcome.success_rate,
                ci_lower: outcome.ci_lower,
                ci_upper: outcome.ci_upper,
                converged: outcome.converged,
                expected_payout: stats.mean_payout,
                payout_std: stats.std_payout,
                value_at_risk: stats.value_at_risk,
                conditional_var: stats.conditional_var,
                sharpe_ratio: stats.sharpe_ratio,
                sortino_ratio: stats.sortino_ratio,
                max_drawdown: stats.max_drawdown,
            },
            legs: c.legs.iter().map(SlipLeg::from).collect(),
        })
    }
}

fn check_cancel(cancel: &CancelFlag) -> Result<(), EngineError> {
    if cancel.is_cancelled() {
        Err(EngineError::Cancelled)
    } else {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
