//! Kelly criterion advisory sizing.
//!
//! Reports a fractional-Kelly share of bankroll for each ranked slip. The
//! figure is informational: stake allocation never reads it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::scoring::ScoredSlip;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KellyConfig {
    /// Fractional Kelly multiplier (0.25 = quarter-Kelly). Lower = more conservative.
    pub multiplier: f64,
    /// Maximum advised fraction of bankroll.
    pub max_fraction: f64,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            multiplier: 0.25, // Quarter-Kelly
            max_fraction: 0.05,
        }
    }
}

// ---------------------------------------------------------------------------
// Kelly calculator
// ---------------------------------------------------------------------------

pub struct KellyCalculator {
    config: KellyConfig,
}

impl KellyCalculator {
    pub fn new(config: KellyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &KellyConfig {
        &self.config
    }

    /// Full Kelly fraction for a bet at decimal `odds` won with
    /// probability `p`.
    ///
    /// f* = (b·p − q) / b, with b = odds − 1 and q = 1 − p.
    pub fn full_kelly(p: f64, odds: f64) -> f64 {
        let b = odds - 1.0;
        if b <= 0.0 || !p.is_finite() {
            return 0.0;
        }
        (b * p - (1.0 - p)) / b
    }

    /// Advised fraction: fractional Kelly, capped, zero when negative.
    pub fn fraction(&self, p: f64, odds: f64) -> f64 {
        let kelly = Self::full_kelly(p, odds);
        if kelly <= 0.0 {
            return 0.0;
        }
        (kelly * self.config.multiplier).min(self.config.max_fraction)
    }

    pub fn advise(&self, slip: &ScoredSlip) -> f64 {
        let c = &slip.candidate;
        let advised = self.fraction(c.simulated_probability, c.combined_odds);
        debug!(
            candidate = c.index,
            raw_kelly = format!("{:.2}%", Self::full_kelly(c.simulated_probability, c.combined_odds) * 100.0),
            advised = format!("{:.2}%", advised * 100.0),
            "Kelly advisory"
        );
        advised
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
