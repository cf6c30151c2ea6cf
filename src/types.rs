//! Shared types for the HEDGESLIP engine.
//!
//! These types form the data model used across all modules: the master
//! slip supplied by the caller, the legs and candidates derived from it,
//! and the response contract. They are plain values so that engine and
//! strategy modules can depend on them without circular references.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Markets
// ---------------------------------------------------------------------------

/// One priced outcome inside a market.
///
/// The label comes from `selection`, falling back to `score` (correct-score
/// markets) and then `handicap`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MarketOption {
    #[serde(default)]
    pub selection: Option<String>,
    #[serde(default)]
    pub score: Option<String>,
    #[serde(default)]
    pub handicap: Option<String>,
    /// Decimal odds. `None` or <= 1.0 makes the option unusable.
    #[serde(default)]
    pub odds: Option<f64>,
    #[serde(default)]
    pub implied_probability: Option<f64>,
    /// Caller-supplied confidence (0–1) used as a swap weight.
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl MarketOption {
    /// Display label for this option.
    pub fn label(&self) -> &str {
        self.selection
            .as_deref()
            .or(self.score.as_deref())
            .or(self.handicap.as_deref())
            .unwrap_or("Outcome")
    }

    /// Odds if they are usable for pricing (finite and > 1.0).
    pub fn valid_odds(&self) -> Option<f64> {
        valid_odds(self.odds)
    }

    /// Market-implied probability: the supplied value, else 1/odds.
    pub fn implied(&self) -> Option<f64> {
        implied_probability(self.implied_probability, self.valid_odds())
    }
}

/// An alternative market offered for a match (e.g. "Over/Under 2.5").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub market_name: String,
    #[serde(default)]
    pub options: Vec<MarketOption>,
}

/// The user's chosen market for a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedMarket {
    pub market_type: String,
    pub selection: String,
    #[serde(default)]
    pub odds: Option<f64>,
    #[serde(default)]
    pub implied_probability: Option<f64>,
    #[serde(default)]
    pub confidence_rating: Option<f64>,
}

impl SelectedMarket {
    pub fn valid_odds(&self) -> Option<f64> {
        valid_odds(self.odds)
    }

    pub fn implied(&self) -> Option<f64> {
        implied_probability(self.implied_probability, self.valid_odds())
    }

    pub fn outcome(&self) -> OutcomeKey {
        OutcomeKey::new(&self.market_type, &self.selection)
    }
}

fn valid_odds(odds: Option<f64>) -> Option<f64> {
    odds.filter(|o| o.is_finite() && *o > 1.0)
}

fn implied_probability(supplied: Option<f64>, odds: Option<f64>) -> Option<f64> {
    match supplied {
        Some(p) if p > 0.0 && p < 1.0 => Some(p),
        _ => odds.map(|o| 1.0 / o),
    }
}

/// Identity of one outcome within a match: market name plus selection label.
///
/// Comparison is exact on the normalized (trimmed, lower-cased) form so
/// "Home" and " home" describe the same outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OutcomeKey {
    pub market: String,
    pub selection: String,
}

impl OutcomeKey {
    pub fn new(market: &str, selection: &str) -> Self {
        Self {
            market: market.trim().to_lowercase(),
            selection: selection.trim().to_lowercase(),
        }
    }
}

impl fmt::Display for OutcomeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.market, self.selection)
    }
}

// ---------------------------------------------------------------------------
// Match statistics
// ---------------------------------------------------------------------------

/// Recent form for one side of a fixture. All fields are optional: the
/// estimator only uses what is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TeamForm {
    /// Form rating on a 0–10 scale.
    #[serde(default)]
    pub form_rating: Option<f64>,
    /// Momentum in [-1, 1] (negative = declining).
    #[serde(default)]
    pub momentum: Option<f64>,
    #[serde(default)]
    pub avg_goals_scored: Option<f64>,
    #[serde(default)]
    pub avg_goals_conceded: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HeadToHead {
    pub total_meetings: u32,
    #[serde(default)]
    pub home_wins: u32,
    #[serde(default)]
    pub draws: u32,
    #[serde(default)]
    pub away_wins: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MatchStats {
    #[serde(default)]
    pub home_form: Option<TeamForm>,
    #[serde(default)]
    pub away_form: Option<TeamForm>,
    #[serde(default)]
    pub head_to_head: Option<HeadToHead>,
    /// Explicit expected goals; take precedence over form averages.
    #[serde(default)]
    pub home_xg: Option<f64>,
    #[serde(default)]
    pub away_xg: Option<f64>,
}

impl MatchStats {
    pub fn is_empty(&self) -> bool {
        self.home_form.is_none()
            && self.away_form.is_none()
            && self.head_to_head.is_none()
            && self.home_xg.is_none()
            && self.away_xg.is_none()
    }
}

// ---------------------------------------------------------------------------
// Match & master slip
// ---------------------------------------------------------------------------

/// A fixture on the master slip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub match_id: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(default)]
    pub league: String,
    #[serde(default)]
    pub stats: MatchStats,
    pub selected_market: SelectedMarket,
    #[serde(default)]
    pub full_markets: Vec<Market>,
    /// Whether the generator may swap this leg.
    #[serde(default = "default_swappable")]
    pub swappable: bool,
}

fn default_swappable() -> bool {
    true
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} vs {} ({} {} @ {})",
            self.match_id,
            self.home_team,
            self.away_team,
            self.selected_market.market_type,
            self.selected_market.selection,
            self.selected_market
                .odds
                .map(|o| format!("{o:.2}"))
                .unwrap_or_else(|| "?".to_string()),
        )
    }
}

impl Match {
    /// Whether the selected (market, selection) is listed in `full_markets`.
    pub fn lists_selection(&self) -> bool {
        let wanted = self.selected_market.outcome();
        self.full_markets.iter().any(|m| {
            m.options
                .iter()
                .any(|o| OutcomeKey::new(&m.market_name, o.label()) == wanted)
        })
    }
}

/// Caller's appetite for risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    Low,
    #[default]
    Medium,
    High,
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskProfile::Low => write!(f, "low"),
            RiskProfile::Medium => write!(f, "medium"),
            RiskProfile::High => write!(f, "high"),
        }
    }
}

/// The user-authored slip a generation run starts from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterSlip {
    #[serde(rename = "master_slip_id")]
    pub id: String,
    pub stake: Decimal,
    pub currency: String,
    #[serde(default)]
    pub risk_profile: RiskProfile,
    pub matches: Vec<Match>,
}

impl MasterSlip {
    /// Check every input invariant. The first violation is reported with
    /// the path of the offending field.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.matches.is_empty() {
            return Err(EngineError::validation("matches", "master slip has no matches"));
        }
        if self.stake <= Decimal::ZERO {
            return Err(EngineError::validation(
                "stake",
                format!("stake must be positive, got {}", self.stake),
            ));
        }
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(EngineError::validation(
                "currency",
                format!("expected a 3-letter currency code, got {:?}", self.currency),
            ));
        }
        let dp = minor_units(&self.currency);
        if self.stake.normalize().scale() > dp {
            return Err(EngineError::validation(
                "stake",
                format!("{} {} has more than {dp} decimal places", self.stake, self.currency),
            ));
        }

        let mut seen = HashSet::new();
        for (i, m) in self.matches.iter().enumerate() {
            if !seen.insert(m.match_id.as_str()) {
                return Err(EngineError::validation(
                    format!("matches[{i}].match_id"),
                    format!("duplicate match id {}", m.match_id),
                ));
            }
            if m.selected_market.valid_odds().is_none() {
                return Err(EngineError::validation(
                    format!("matches[{i}].selected_market.odds"),
                    format!(
                        "match {} has no usable odds for its selected market (got {:?})",
                        m.match_id, m.selected_market.odds
                    ),
                ));
            }
            if !m.full_markets.is_empty() && !m.lists_selection() {
                return Err(EngineError::validation(
                    format!("matches[{i}].selected_market"),
                    format!(
                        "selection {} is not offered in the markets of match {}",
                        m.selected_market.outcome(),
                        m.match_id
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Odds of the master selection, multiplied across all matches.
    pub fn combined_odds(&self) -> f64 {
        self.matches
            .iter()
            .filter_map(|m| m.selected_market.valid_odds())
            .product()
    }
}

/// ISO 4217 minor-unit digits.
pub fn minor_units(currency: &str) -> u32 {
    match currency.to_ascii_uppercase().as_str() {
        "BIF" | "CLP" | "DJF" | "GNF" | "ISK" | "JPY" | "KMF" | "KRW" | "PYG" | "RWF" | "UGX"
        | "UYI" | "VND" | "VUV" | "XAF" | "XOF" | "XPF" => 0,
        "BHD" | "IQD" | "JOD" | "KWD" | "LYD" | "OMR" | "TND" => 3,
        _ => 2,
    }
}

// ---------------------------------------------------------------------------
// Derived entities
// ---------------------------------------------------------------------------

/// One match's chosen market, selection, and price within a slip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leg {
    pub match_id: String,
    pub market: String,
    pub selection: String,
    pub odds: f64,
    /// Market-implied probability of this selection.
    pub implied_probability: f64,
    /// Simulated success rate of this selection.
    pub simulated_probability: f64,
}

impl Leg {
    pub fn outcome(&self) -> OutcomeKey {
        OutcomeKey::new(&self.market, &self.selection)
    }
}

/// A complete outcome assignment across every match of the master slip.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Outcome per match, in master-slip order.
    pub outcomes: Vec<OutcomeKey>,
    /// Product of per-match outcome probabilities.
    pub probability: f64,
    /// Content hash of the outcome assignment.
    pub hash: String,
}

/// An alternative slip generated from the master.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSlip {
    /// Generation index; 0 is the pure master selection.
    pub index: usize,
    pub legs: Vec<Leg>,
    /// Product of leg odds.
    pub combined_odds: f64,
    /// Joint simulated probability that every leg wins.
    pub simulated_probability: f64,
    /// Geometric mean of the legs' simulated probabilities.
    pub leg_confidence: f64,
    pub is_master: bool,
}

impl CandidateSlip {
    /// Build a candidate from its legs, deriving the combined figures.
    pub fn from_legs(index: usize, legs: Vec<Leg>, is_master: bool) -> Self {
        let combined_odds = legs.iter().map(|l| l.odds).product();
        let simulated_probability = legs.iter().map(|l| l.simulated_probability).product();
        let leg_confidence = if legs.is_empty() {
            0.0
        } else {
            let log_sum: f64 = legs.iter().map(|l| l.simulated_probability.max(1e-12).ln()).sum();
            (log_sum / legs.len() as f64).exp()
        };
        Self {
            index,
            legs,
            combined_odds,
            simulated_probability,
            leg_confidence,
            is_master,
        }
    }

    /// Leg selections in match order (the candidate's identity).
    pub fn signature(&self) -> Vec<OutcomeKey> {
        self.legs.iter().map(Leg::outcome).collect()
    }
}

impl fmt::Display for CandidateSlip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let legs: Vec<String> = self
            .legs
            .iter()
            .map(|l| format!("{}:{}@{:.2}", l.match_id, l.selection, l.odds))
            .collect();
        write!(
            f,
            "#{} odds={:.2} p={:.4} [{}]",
            self.index,
            self.combined_odds,
            self.simulated_probability,
            legs.join(", "),
        )
    }
}

/// Coarse risk bucket derived from a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskCategory {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskCategory::Low => write!(f, "low"),
            RiskCategory::Medium => write!(f, "medium"),
            RiskCategory::High => write!(f, "high"),
        }
    }
}

// ---------------------------------------------------------------------------
// Response contract
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlipLeg {
    pub match_id: String,
    pub market: String,
    pub selection: String,
    pub odds: f64,
}

impl From<&Leg> for SlipLeg {
    fn from(leg: &Leg) -> Self {
        Self {
            match_id: leg.match_id.clone(),
            market: leg.market.clone(),
            selection: leg.selection.clone(),
            odds: leg.odds,
        }
    }
}

/// A ranked, staked slip in the final portfolio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedSlip {
    pub slip_id: Uuid,
    pub stake: Decimal,
    pub total_odds: f64,
    pub possible_return: Decimal,
    pub confidence_score: f64,
    pub risk_level: RiskCategory,
    pub edge: f64,
    pub simulated_probability: f64,
    /// Advisory fractional-Kelly share of bankroll; does not affect `stake`.
    pub kelly_fraction: f64,
    pub risk: SlipRisk,
    pub legs: Vec<SlipLeg>,
}

/// Simulated payout profile of one slip at its allocated stake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlipRisk {
    /// Empirical win rate over the simulated draws.
    pub win_probability: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub converged: bool,
    pub expected_payout: f64,
    pub payout_std: f64,
    pub value_at_risk: f64,
    pub conditional_var: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
}

impl fmt::Display for GeneratedSlip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stake={} odds={:.2} return={} conf={:.0}% risk={} edge={:+.3}",
            self.slip_id,
            self.stake,
            self.total_odds,
            self.possible_return,
            self.confidence_score * 100.0,
            self.risk_level,
            self.edge,
        )
    }
}

/// How much scenario probability mass the portfolio wins under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageSummary {
    pub target: f64,
    pub achieved: f64,
    pub scenarios_considered: usize,
    pub scenarios_covered: usize,
    /// False when the pool could not reach `target` (best partial coverage).
    pub target_reached: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub master_slip_id: String,
    pub currency: String,
    pub seed: u64,
    pub candidates_generated: usize,
    pub coverage: CoverageSummary,
    pub comparison: Option<PortfolioComparison>,
    pub generated_slips: Vec<GeneratedSlip>,
}

/// Side-by-side view of the portfolio's simulated payout profiles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioComparison {
    pub best_by_win_probability: Uuid,
    pub best_by_expected_payout: Uuid,
    pub best_by_sharpe_ratio: Uuid,
    pub average_win_probability: f64,
    pub average_expected_payout: f64,
    pub win_probability_range: (f64, f64),
}

impl PortfolioComparison {
    /// `None` for an empty portfolio. Ties go to the higher-ranked slip.
    pub fn from_slips(slips: &[GeneratedSlip]) -> Option<Self> {
        let first = slips.first()?;
        let best_by = |key: fn(&SlipRisk) -> f64| {
            slips
                .iter()
                .fold(first, |best, s| if key(&s.risk) > key(&best.risk) { s } else { best })
                .slip_id
        };
        let n = slips.len() as f64;
        let win_rates = slips.iter().map(|s| s.risk.win_probability);
        Some(Self {
            best_by_win_probability: best_by(|r| r.win_probability),
            best_by_expected_payout: best_by(|r| r.expected_payout),
            best_by_sharpe_ratio: best_by(|r| r.sharpe_ratio),
            average_win_probability: win_rates.clone().sum::<f64>() / n,
            average_expected_payout: slips.iter().map(|s| s.risk.expected_payout).sum::<f64>() / n,
            win_probability_range: (
                win_rates.clone().fold(f64::INFINITY, f64::min),
                win_rates.fold(f64::NEG_INFINITY, f64::max),
            ),
        })
    }
}

impl GenerationResponse {
    /// Sum of all allocated stakes.
    pub fn total_stake(&self) -> Decimal {
        self.generated_slips.iter().map(|s| s.stake).sum()
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Engine failures.
///
/// `Validation` is the caller's fault and names the offending field;
/// `Computation` is a numerical failure inside a run and must not leak
/// detail past the request boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Validation error ({field}): {message}")]
    Validation { field: String, message: String },

    #[error("Computation error: {0}")]
    Computation(String),

    #[error("Generation cancelled")]
    Cancelled,
}

impl EngineError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
