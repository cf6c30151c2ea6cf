//! Monte Carlo outcome simulation.
//!
//! Two independent models:
//! - **Bernoulli**: repeated win/lose draws for one selection at a known
//!   probability, with a confidence interval, a convergence diagnostic and
//!   (given a wager) payout risk statistics.
//! - **Poisson**: goals per side drawn from expected-goals rates, either
//!   sampled or evaluated exactly on a truncated score grid.
//!
//! All randomness comes from the `StdRng` the caller passes in.

use rand::rngs::StdRng;
use rand::Rng;
use rand_distr::Distribution;
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Discrete, Normal, Poisson};

use crate::types::{EngineError, MatchStats};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Draws per simulated selection.
    pub iterations: usize,
    /// Confidence level for intervals and VaR (0.95 → 5% tail).
    pub confidence_level: f64,
    /// Highest goal count per side on the exact score grid.
    pub max_goals: u32,
    /// Multiplier applied to the home attack rate (0.1 = +10%).
    pub home_advantage: f64,
    pub min_lambda: f64,
    pub max_lambda: f64,
    /// Running-mean CV below which a run counts as converged.
    pub convergence_threshold: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            confidence_level: 0.95,
            max_goals: 5,
            home_advantage: 0.1,
            min_lambda: 0.2,
            max_lambda: 4.0,
            convergence_threshold: 0.01,
        }
    }
}

// ---------------------------------------------------------------------------
// Bernoulli mode
// ---------------------------------------------------------------------------

/// Stake and price used to turn win/lose draws into payouts.
#[derive(Debug, Clone, Copy)]
pub struct Wager {
    pub stake: f64,
    pub odds: f64,
}

/// Statistics of the simulated payout distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskStats {
    pub mean_payout: f64,
    pub std_payout: f64,
    /// Payout at the (1 − confidence level) quantile.
    pub value_at_risk: f64,
    /// Mean payout strictly inside the VaR tail.
    pub conditional_var: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    /// Largest peak-to-trough fall of cumulative profit.
    pub max_drawdown: f64,
    pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BernoulliOutcome {
    pub probability: f64,
    pub iterations: usize,
    pub success_rate: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    /// Coefficient of variation of the running mean over the last 10% of draws.
    pub convergence_cv: f64,
    pub converged: bool,
    pub risk: Option<RiskStats>,
}

/// Simulate `config.iterations` independent draws of an event with
/// probability `probability`.
pub fn simulate_outcome(
    probability: f64,
    rng: &mut StdRng,
    config: &SimulationConfig,
    wager: Option<Wager>,
) -> Result<BernoulliOutcome, EngineError> {
    if !probability.is_finite() || !(0.0..=1.0).contains(&probability) {
        return Err(EngineError::Computation(format!(
            "probability out of range: {probability}"
        )));
    }
    let n = config.iterations;
    if n == 0 {
        return Err(EngineError::Computation("zero simulation iterations".into()));
    }

    let draws: Vec<bool> = (0..n).map(|_| rng.gen::<f64>() < probability).collect();
    let wins = draws.iter().filter(|w| **w).count();
    let rate = wins as f64 / n as f64;

    let z = z_score(config.confidence_level)?;
    let margin = z * (rate * (1.0 - rate) / n as f64).sqrt();

    let indicator: Vec<f64> = draws.iter().map(|w| if *w { 1.0 } else { 0.0 }).collect();
    let convergence_cv = running_mean_cv(&indicator);

    let risk = wager.map(|w| {
        let payouts: Vec<f64> = draws
            .iter()
            .map(|win| if *win { w.stake * w.odds } else { 0.0 })
            .collect();
        risk_stats(&payouts, w.stake, config.confidence_level)
    });

    Ok(BernoulliOutcome {
        probability,
        iterations: n,
        success_rate: rate,
        ci_lower: (rate - margin).max(0.0),
        ci_upper: (rate + margin).min(1.0),
        convergence_cv,
        converged: convergence_cv < config.convergence_threshold,
        risk,
    })
}

/// CV of the running mean over the final 10% of a series. Series shorter
/// than 100 points, or with a zero mean tail, report infinite CV.
fn running_mean_cv(values: &[f64]) -> f64 {
    if values.len() < 100 {
        return f64::INFINITY;
    }
    let mut sum = 0.0;
    let running: Vec<f64> = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            sum += v;
            sum / (i + 1) as f64
        })
        .collect();
    let tail = &running[(running.len() * 9) / 10..];
    let (mean, std) = mean_std(tail);
    if mean == 0.0 {
        return f64::INFINITY;
    }
    std / mean
}

/// Population mean and standard deviation.
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

fn risk_stats(payouts: &[f64], stake: f64, confidence_level: f64) -> RiskStats {
    let (mean, std) = mean_std(payouts);

    let mut sorted = payouts.to_vec();
    sorted.sort_by(f64::total_cmp);
    let tail_idx = ((1.0 - confidence_level) * sorted.len() as f64) as usize;
    let value_at_risk = sorted.get(tail_idx).copied().unwrap_or(0.0);
    let conditional_var = if tail_idx > 0 {
        mean_std(&sorted[..tail_idx]).0
    } else {
        0.0
    };

    let excess = mean - stake;
    let sharpe_ratio = if std > 0.0 { excess / std } else { 0.0 };

    let downside: Vec<f64> = payouts.iter().copied().filter(|p| *p < mean).collect();
    let downside_std = mean_std(&downside).1;
    let sortino_ratio = if downside_std > 0.0 { excess / downside_std } else { 0.0 };

    let mut cumulative = 0.0;
    let mut peak = f64::NEG_INFINITY;
    let mut max_drawdown: f64 = 0.0;
    for p in payouts {
        cumulative += p - stake;
        peak = peak.max(cumulative);
        max_drawdown = max_drawdown.max(peak - cumulative);
    }

    let wins = payouts.iter().filter(|p| **p > stake).count();
    let win_rate = if payouts.is_empty() {
        0.0
    } else {
        wins as f64 / payouts.len() as f64
    };

    RiskStats {
        mean_payout: mean,
        std_payout: std,
        value_at_risk,
        conditional_var,
        sharpe_ratio,
        sortino_ratio,
        max_drawdown,
        win_rate,
    }
}

/// Two-sided z value for a confidence level (0.95 → ≈1.96).
pub fn z_score(confidence_level: f64) -> Result<f64, EngineError> {
    let level = confidence_level.clamp(0.5, 0.999_999);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| EngineError::Computation(format!("standard normal: {e}")))?;
    Ok(normal.inverse_cdf(1.0 - (1.0 - level) / 2.0))
}

// ---------------------------------------------------------------------------
// Poisson mode
// ---------------------------------------------------------------------------

/// Expected goals per side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExpectedGoals {
    pub home: f64,
    pub away: f64,
}

impl ExpectedGoals {
    /// Rates from explicit xG, else from attack/defense averages with the
    /// home advantage applied. `None` when neither is available.
    pub fn from_stats(stats: &MatchStats, config: &SimulationConfig) -> Option<Self> {
        let clamp = |l: f64| l.clamp(config.min_lambda, config.max_lambda);

        if let (Some(h), Some(a)) = (stats.home_xg, stats.away_xg) {
            if h.is_finite() && a.is_finite() {
                return Some(Self {
                    home: clamp(h),
                    away: clamp(a),
                });
            }
        }

        let home = stats.home_form.as_ref()?;
        let away = stats.away_form.as_ref()?;
        let home_lambda =
            (home.avg_goals_scored? + away.avg_goals_conceded?) / 2.0 * (1.0 + config.home_advantage);
        let away_lambda = (away.avg_goals_scored? + home.avg_goals_conceded?) / 2.0;
        if !home_lambda.is_finite() || !away_lambda.is_finite() {
            return None;
        }
        Some(Self {
            home: clamp(home_lambda),
            away: clamp(away_lambda),
        })
    }
}

/// Home/draw/away frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchProbabilities {
    pub home_win: f64,
    pub draw: f64,
    pub away_win: f64,
}

/// Goal-count sampler for one side.
pub fn goal_sampler(lambda: f64) -> Result<rand_distr::Poisson<f64>, EngineError> {
    rand_distr::Poisson::new(lambda)
        .map_err(|e| EngineError::Computation(format!("goal rate {lambda}: {e}")))
}

/// Sample `iterations` scorelines and count results.
pub fn simulate_goals(
    xg: ExpectedGoals,
    iterations: usize,
    rng: &mut StdRng,
) -> Result<MatchProbabilities, EngineError> {
    if iterations == 0 {
        return Err(EngineError::Computation("zero simulation iterations".into()));
    }
    let home_goals = goal_sampler(xg.home)?;
    let away_goals = goal_sampler(xg.away)?;
    let (mut home, mut draw, mut away) = (0usize, 0usize, 0usize);
    for _ in 0..iterations {
        let h = home_goals.sample(rng);
        let a = away_goals.sample(rng);
        match h.total_cmp(&a) {
            std::cmp::Ordering::Greater => home += 1,
            std::cmp::Ordering::Equal => draw += 1,
            std::cmp::Ordering::Less => away += 1,
        }
    }
    let n = iterations as f64;
    Ok(MatchProbabilities {
        home_win: home as f64 / n,
        draw: draw as f64 / n,
        away_win: away as f64 / n,
    })
}

fn goal_pmf(lambda: f64, max_goals: u32) -> Result<Vec<f64>, EngineError> {
    let dist = Poisson::new(lambda)
        .map_err(|e| EngineError::Computation(format!("goal rate {lambda}: {e}")))?;
    Ok((0..=u64::from(max_goals)).map(|k| dist.pmf(k)).collect())
}

/// Renormalized joint distribution of scorelines up to `max_goals` per side.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreGrid {
    /// `cells[h][a]` = P(home scores h, away scores a).
    cells: Vec<Vec<f64>>,
}

impl ScoreGrid {
    pub fn exact(xg: ExpectedGoals, max_goals: u32) -> Result<Self, EngineError> {
        let home = goal_pmf(xg.home, max_goals)?;
        let away = goal_pmf(xg.away, max_goals)?;
        let mut cells: Vec<Vec<f64>> = home
            .iter()
            .map(|ph| away.iter().map(|pa| ph * pa).collect())
            .collect();
        let total: f64 = cells.iter().flatten().sum();
        if total > 0.0 {
            for row in &mut cells {
                for cell in row.iter_mut() {
                    *cell /= total;
                }
            }
        }
        Ok(Self { cells })
    }

    fn sum_where(&self, pred: impl Fn(usize, usize) -> bool) -> f64 {
        self.cells
            .iter()
            .enumerate()
            .flat_map(|(h, row)| row.iter().enumerate().map(move |(a, p)| (h, a, *p)))
            .filter(|(h, a, _)| pred(*h, *a))
            .map(|(_, _, p)| p)
            .sum()
    }

    pub fn probability_of(&self, home_goals: usize, away_goals: usize) -> f64 {
        self.cells
            .get(home_goals)
            .and_then(|row| row.get(away_goals))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn home_win(&self) -> f64 {
        self.sum_where(|h, a| h > a)
    }

    pub fn draw(&self) -> f64 {
        self.sum_where(|h, a| h == a)
    }

    pub fn away_win(&self) -> f64 {
        self.sum_where(|h, a| h < a)
    }

    /// P(total goals > line), e.g. line 2.5.
    pub fn over(&self, line: f64) -> f64 {
        self.sum_where(|h, a| (h + a) as f64 > line)
    }

    pub fn under(&self, line: f64) -> f64 {
        self.sum_where(|h, a| ((h + a) as f64) < line)
    }

    pub fn both_teams_score(&self) -> f64 {
        self.sum_where(|h, a| h > 0 && a > 0)
    }

    pub fn result_probabilities(&self) -> MatchProbabilities {
        MatchProbabilities {
            home_win: self.home_win(),
            draw: self.draw(),
            away_win: self.away_win(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
