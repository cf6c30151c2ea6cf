//! Probability estimation for a single market option.
//!
//! Blends the market-implied probability with a statistical estimate
//! derived from match statistics, then clamps the result into a sane band.
//! Missing statistics degrade to a market-only estimate; they are never an
//! error.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::simulator::{ExpectedGoals, ScoreGrid, SimulationConfig};
use crate::types::{EngineError, Match, OutcomeKey};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbabilityConfig {
    /// Share of the market-implied probability in the blend.
    pub market_weight: f64,
    pub floor: f64,
    pub ceiling: f64,
    /// Weight of the normalized form-rating differential.
    pub form_weight: f64,
    pub momentum_weight: f64,
    pub h2h_weight: f64,
}

impl Default for ProbabilityConfig {
    fn default() -> Self {
        Self {
            market_weight: 0.6,
            floor: 0.05,
            ceiling: 0.95,
            form_weight: 0.4,
            momentum_weight: 0.1,
            h2h_weight: 0.3,
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome classification
// ---------------------------------------------------------------------------

/// What a selection label means for the final scoreline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutcomeKind {
    HomeWin,
    Draw,
    AwayWin,
    HomeOrDraw,
    DrawOrAway,
    HomeOrAway,
    Over(f64),
    Under(f64),
    BothTeamsScore,
    NotBothTeamsScore,
    CorrectScore(u32, u32),
    Unknown,
}

impl OutcomeKind {
    /// Classify a (market, selection) pair for the given fixture.
    pub fn classify(m: &Match, market: &str, selection: &str) -> Self {
        let market = market.trim().to_lowercase();
        let label = selection.trim().to_lowercase();
        let home = m.home_team.trim().to_lowercase();
        let away = m.away_team.trim().to_lowercase();

        if market.contains("btts") || market.contains("both teams") {
            return match label.as_str() {
                "yes" | "y" => OutcomeKind::BothTeamsScore,
                "no" | "n" => OutcomeKind::NotBothTeamsScore,
                _ => OutcomeKind::Unknown,
            };
        }
        if let Some(line) = parse_line(&label, "over") {
            return OutcomeKind::Over(line);
        }
        if let Some(line) = parse_line(&label, "under") {
            return OutcomeKind::Under(line);
        }
        match label.as_str() {
            "btts yes" | "btts" => return OutcomeKind::BothTeamsScore,
            "btts no" => return OutcomeKind::NotBothTeamsScore,
            "1" | "home" | "home win" => return OutcomeKind::HomeWin,
            "x" | "draw" | "tie" => return OutcomeKind::Draw,
            "2" | "away" | "away win" => return OutcomeKind::AwayWin,
            "1x" | "home or draw" => return OutcomeKind::HomeOrDraw,
            "x2" | "draw or away" => return OutcomeKind::DrawOrAway,
            "12" | "home or away" => return OutcomeKind::HomeOrAway,
            _ => {}
        }
        if !home.is_empty() && label == home {
            return OutcomeKind::HomeWin;
        }
        if !away.is_empty() && label == away {
            return OutcomeKind::AwayWin;
        }
        if let Some((h, a)) = label.split_once(['-', ':']) {
            if let (Ok(h), Ok(a)) = (h.trim().parse(), a.trim().parse()) {
                return OutcomeKind::CorrectScore(h, a);
            }
        }
        OutcomeKind::Unknown
    }

    fn from_grid(&self, grid: &ScoreGrid) -> Option<f64> {
        let p = match *self {
            OutcomeKind::HomeWin => grid.home_win(),
            OutcomeKind::Draw => grid.draw(),
            OutcomeKind::AwayWin => grid.away_win(),
            OutcomeKind::HomeOrDraw => grid.home_win() + grid.draw(),
            OutcomeKind::DrawOrAway => grid.draw() + grid.away_win(),
            OutcomeKind::HomeOrAway => grid.home_win() + grid.away_win(),
            OutcomeKind::Over(line) => grid.over(line),
            OutcomeKind::Under(line) => grid.under(line),
            OutcomeKind::BothTeamsScore => grid.both_teams_score(),
            OutcomeKind::NotBothTeamsScore => 1.0 - grid.both_teams_score(),
            OutcomeKind::CorrectScore(h, a) => grid.probability_of(h as usize, a as usize),
            OutcomeKind::Unknown => return None,
        };
        Some(p)
    }
}

fn parse_line(label: &str, prefix: &str) -> Option<f64> {
    label
        .strip_prefix(prefix)?
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|l| l.is_finite())
}

// ---------------------------------------------------------------------------
// Estimator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbabilityEstimate {
    pub implied: f64,
    pub statistical: Option<f64>,
    /// Blended and clamped estimate.
    pub probability: f64,
}

/// Per-run estimator. Results are memoized by (match, market, selection).
pub struct ProbabilityEstimator {
    config: ProbabilityConfig,
    simulation: SimulationConfig,
    cache: HashMap<(String, OutcomeKey), ProbabilityEstimate>,
}

impl ProbabilityEstimator {
    pub fn new(config: ProbabilityConfig, simulation: SimulationConfig) -> Self {
        Self {
            config,
            simulation,
            cache: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ProbabilityConfig {
        &self.config
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Estimate the probability that `selection` in `market` wins.
    ///
    /// `implied` overrides 1/odds when supplied and inside (0, 1).
    pub fn estimate(
        &mut self,
        m: &Match,
        market: &str,
        selection: &str,
        odds: Option<f64>,
        implied: Option<f64>,
    ) -> Result<ProbabilityEstimate, EngineError> {
        let key = (m.match_id.clone(), OutcomeKey::new(market, selection));
        if let Some(hit) = self.cache.get(&key) {
            return Ok(*hit);
        }

        let odds = odds.filter(|o| o.is_finite() && *o > 1.0).ok_or_else(|| {
            EngineError::validation(
                format!("{}.{}", m.match_id, key.1),
                format!("missing or invalid odds {odds:?}"),
            )
        })?;
        let implied = match implied {
            Some(p) if p > 0.0 && p < 1.0 => p,
            _ => 1.0 / odds,
        };

        let statistical = self.statistical(m, market, selection, implied);
        let blended = match statistical {
            Some(s) => {
                self.config.market_weight * implied + (1.0 - self.config.market_weight) * s
            }
            None => implied,
        };
        let probability = blended.clamp(self.config.floor, self.config.ceiling);

        debug!(
            match_id = %m.match_id,
            outcome = %key.1,
            implied = format!("{:.3}", implied),
            statistical = ?statistical.map(|s| format!("{s:.3}")),
            probability = format!("{:.3}", probability),
            "Probability estimated"
        );

        let estimate = ProbabilityEstimate {
            implied,
            statistical,
            probability,
        };
        self.cache.insert(key, estimate);
        Ok(estimate)
    }

    /// Statistical probability, if the selection is classifiable and the
    /// match carries enough statistics.
    fn statistical(&self, m: &Match, market: &str, selection: &str, implied: f64) -> Option<f64> {
        let kind = OutcomeKind::classify(m, market, selection);
        if kind == OutcomeKind::Unknown {
            return None;
        }

        if let Some(xg) = ExpectedGoals::from_stats(&m.stats, &self.simulation) {
            match ScoreGrid::exact(xg, self.simulation.max_goals) {
                Ok(grid) => return kind.from_grid(&grid).map(|p| p.clamp(0.0, 1.0)),
                Err(e) => warn!(match_id = %m.match_id, error = %e, "score grid unavailable"),
            }
        }

        self.form_adjusted(m, kind, implied)
    }

    /// Market-implied probability nudged by form, momentum and head-to-head.
    fn form_adjusted(&self, m: &Match, kind: OutcomeKind, implied: f64) -> Option<f64> {
        let home = m.stats.home_form.as_ref()?;
        let away = m.stats.away_form.as_ref()?;
        let (h, a) = (home.form_rating?, away.form_rating?);

        let differential = if h + a > 0.0 { (h - a) / (h + a) } else { 0.0 };
        let momentum = (home.momentum.unwrap_or(0.0) - away.momentum.unwrap_or(0.0)) / 2.0;
        let h2h = m
            .stats
            .head_to_head
            .as_ref()
            .filter(|h2h| h2h.total_meetings > 0)
            .map(|h2h| {
                let meetings = h2h.total_meetings as f64;
                (h2h.home_wins as f64 - h2h.away_wins as f64) / meetings * (meetings / 10.0).min(1.0)
            })
            .unwrap_or(0.0);

        let home_shift = self.config.form_weight * differential
            + self.config.momentum_weight * momentum
            + self.config.h2h_weight * h2h;

        let p = match kind {
            OutcomeKind::HomeWin => implied + home_shift,
            OutcomeKind::AwayWin => implied - home_shift,
            OutcomeKind::Draw => implied - self.config.form_weight * differential.abs(),
            _ => return None,
        };
        Some(p.clamp(0.0, 1.0))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
