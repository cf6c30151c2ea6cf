//! Stake distribution across the ranked portfolio.
//!
//! A base share of the total stake is split evenly; the rest is split in
//! proportion to confidence^exponent. Amounts are rounded to the currency's
//! minor unit and the rounding residual goes to the first (top-ranked)
//! slip, so the allocation always sums to the total exactly.
//!
//! Every funded slip receives at least one minor unit. When the total is too
//! small for that, the lowest-ranked slips are left unfunded and the returned
//! allocation is shorter than the score list.

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::EngineError;
pub use crate::types::minor_units;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StakeConfig {
    /// Share of the stake split evenly across slips.
    pub base_fraction: f64,
    /// Exponent applied to confidence for the performance share.
    pub exponent: f64,
}

impl Default for StakeConfig {
    fn default() -> Self {
        Self {
            base_fraction: 0.30,
            exponent: 2.0,
        }
    }
}

fn to_decimal(value: f64, what: &str) -> Result<Decimal, EngineError> {
    Decimal::from_f64(value)
        .ok_or_else(|| EngineError::Computation(format!("{what} not representable: {value}")))
}

/// Split `total` across slips with the given confidence scores (in rank
/// order). Returns one positive amount per funded slip: a prefix of the
/// ranking, all of it unless the total cannot cover one minor unit each.
pub fn allocate(
    total: Decimal,
    currency: &str,
    confidences: &[f64],
    config: &StakeConfig,
) -> Result<Vec<Decimal>, EngineError> {
    if confidences.is_empty() {
        return Ok(Vec::new());
    }

    let dp = minor_units(currency);
    let unit = Decimal::new(1, dp);
    let affordable = (total / unit).floor().to_usize().unwrap_or(usize::MAX);
    let mut funded = confidences.len().min(affordable).max(1);

    loop {
        let stakes = split(total, dp, &confidences[..funded], config)?;
        if funded == 1 || stakes.iter().all(|s| *s >= unit) {
            if funded < confidences.len() {
                warn!(
                    requested = confidences.len(),
                    funded,
                    total = %total,
                    "Stake too small to fund every slip"
                );
            }
            return Ok(stakes);
        }
        funded -= 1;
    }
}

fn split(
    total: Decimal,
    dp: u32,
    confidences: &[f64],
    config: &StakeConfig,
) -> Result<Vec<Decimal>, EngineError> {
    let weights: Vec<f64> = confidences
        .iter()
        .map(|c| c.max(0.0).powf(config.exponent))
        .collect();
    let weight_sum: f64 = weights.iter().sum();
    if !weight_sum.is_finite() || weight_sum <= 0.0 {
        return Err(EngineError::Computation(format!(
            "stake weights sum to {weight_sum}"
        )));
    }

    let base_fraction = to_decimal(config.base_fraction.clamp(0.0, 1.0), "base fraction")?;
    let count = Decimal::from(confidences.len());
    let base_each = total * base_fraction / count;
    let performance_pool = total - total * base_fraction;

    let mut stakes = Vec::with_capacity(weights.len());
    for w in &weights {
        let share = to_decimal(w / weight_sum, "stake share")?;
        let amount = base_each + performance_pool * share;
        stakes.push(amount.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero));
    }

    let residual = total - stakes.iter().copied().sum::<Decimal>();
    if let Some(first) = stakes.first_mut() {
        *first += residual;
    }

    debug!(
        slips = stakes.len(),
        total = %total,
        residual = %residual,
        minor_units = dp,
        "Stakes allocated"
    );
    Ok(stakes)
}
