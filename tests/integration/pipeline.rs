//! End-to-end runs of `SlipBuilder` against realistic master slips.

use std::collections::HashSet;

use hedgeslip::engine::generator::{generate_candidates, GeneratorConfig};
use hedgeslip::engine::probability::{ProbabilityConfig, ProbabilityEstimator};
use hedgeslip::engine::simulator::SimulationConfig;
use hedgeslip::engine::MatchProfile;
use hedgeslip::rng::{CancelFlag, RngHierarchy};
use hedgeslip::strategy::risk::RiskConfig;
use hedgeslip::types::{EngineError, HeadToHead, MatchStats, RiskProfile};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::fixtures::{
    balanced_stats, fast_builder, five_match_slip, football_match, form, slip, two_match_slip,
};

fn validation_field(err: EngineError) -> String {
    match err {
        EngineError::Validation { field, .. } => field,
        other => panic!("expected validation error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Portfolio shape
// ---------------------------------------------------------------------------

#[test]
fn test_two_match_portfolio() {
    let resp = fast_builder()
        .generate(&two_match_slip(), Some(42), &CancelFlag::new())
        .unwrap();

    assert_eq!(resp.master_slip_id, "MS-2");
    assert_eq!(resp.currency, "EUR");
    assert_eq!(resp.seed, 42);
    assert!(resp.candidates_generated >= resp.generated_slips.len());
    assert!(!resp.generated_slips.is_empty());
    assert_eq!(resp.total_stake(), dec!(50));

    let ids: HashSet<_> = resp.generated_slips.iter().map(|s| s.slip_id).collect();
    assert_eq!(ids.len(), resp.generated_slips.len());

    for s in &resp.generated_slips {
        assert_eq!(s.legs.len(), 2);
        assert_eq!(s.legs[0].match_id, "m1");
        assert_eq!(s.legs[1].match_id, "m2");
        assert!(s.stake > Decimal::ZERO);
        assert!(s.possible_return.scale() <= 2);
    }
}

#[test]
fn test_five_match_portfolio() {
    let resp = fast_builder()
        .generate(&five_match_slip(), Some(99), &CancelFlag::new())
        .unwrap();

    assert_eq!(resp.total_stake(), dec!(120));
    assert!(resp.coverage.scenarios_considered > 0);
    assert!(resp.coverage.scenarios_covered <= resp.coverage.scenarios_considered);
    assert!((0.0..=1.0 + 1e-9).contains(&resp.coverage.achieved));
    assert_eq!(resp.coverage.target_reached, resp.coverage.achieved >= resp.coverage.target);

    let signatures: HashSet<Vec<(String, String)>> = resp
        .generated_slips
        .iter()
        .map(|s| {
            s.legs
                .iter()
                .map(|l| (l.market.to_lowercase(), l.selection.to_lowercase()))
                .collect()
        })
        .collect();
    assert_eq!(signatures.len(), resp.generated_slips.len(), "duplicate slips selected");
}

#[test]
fn test_total_odds_is_product_of_legs() {
    let resp = fast_builder()
        .generate(&five_match_slip(), Some(5), &CancelFlag::new())
        .unwrap();
    for s in &resp.generated_slips {
        let product: f64 = s.legs.iter().map(|l| l.odds).product();
        assert!((s.total_odds - product).abs() < 1e-9 * product.max(1.0));
    }
}

#[test]
fn test_ranking_and_risk_labels() {
    let resp = fast_builder()
        .generate(&five_match_slip(), Some(17), &CancelFlag::new())
        .unwrap();
    let risk = RiskConfig::default();
    for s in &resp.generated_slips {
        assert!((0.0..=1.0).contains(&s.confidence_score));
        assert_eq!(s.risk_level, risk.categorize(s.confidence_score));
        assert!((0.0..=0.05).contains(&s.kelly_fraction));
        assert!((s.edge - (s.simulated_probability * s.total_odds - 1.0)).abs() < 1e-9);
    }
    for w in resp.generated_slips.windows(2) {
        assert!(w[0].confidence_score >= w[1].confidence_score);
    }
}

// ---------------------------------------------------------------------------
// Determinism
// ---------------------------------------------------------------------------

#[test]
fn test_fixed_seed_is_byte_identical() {
    let builder = fast_builder();
    let a = builder.generate(&five_match_slip(), Some(2024), &CancelFlag::new()).unwrap();
    let b = builder.generate(&five_match_slip(), Some(2024), &CancelFlag::new()).unwrap();
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn test_unseeded_runs_echo_their_seed() {
    let builder = fast_builder();
    let first = builder.generate(&two_match_slip(), None, &CancelFlag::new()).unwrap();
    let replay = builder
        .generate(&two_match_slip(), Some(first.seed), &CancelFlag::new())
        .unwrap();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&replay).unwrap()
    );
}

// ---------------------------------------------------------------------------
// Worked examples and edge cases
// ---------------------------------------------------------------------------

#[test]
fn test_locked_slip_returns_master_only() {
    let mut master = two_match_slip();
    for m in &mut master.matches {
        m.swappable = false;
    }
    let resp = fast_builder().generate(&master, Some(1), &CancelFlag::new()).unwrap();

    assert_eq!(resp.candidates_generated, 1);
    assert_eq!(resp.generated_slips.len(), 1);
    let only = &resp.generated_slips[0];
    assert!((only.total_odds - 4.59).abs() < 1e-9);
    assert_eq!(only.stake, dec!(50));
    assert_eq!(only.possible_return, dec!(229.50));
    assert_eq!(only.legs[0].selection, "Home");
    assert_eq!(only.legs[1].selection, "Draw");
}

#[test]
fn test_zero_decimal_currency_stakes() {
    let mut master = five_match_slip();
    master.currency = "JPY".into();
    master.stake = dec!(10000);
    let resp = fast_builder().generate(&master, Some(8), &CancelFlag::new()).unwrap();

    assert_eq!(resp.total_stake(), dec!(10000));
    for s in &resp.generated_slips {
        assert_eq!(s.stake.fract(), Decimal::ZERO);
        assert_eq!(s.possible_return.fract(), Decimal::ZERO);
    }
}

#[test]
fn test_risk_profile_selects_target() {
    let builder = fast_builder();
    let mut targets = Vec::new();
    for profile in [RiskProfile::Low, RiskProfile::Medium, RiskProfile::High] {
        let mut master = two_match_slip();
        master.risk_profile = profile;
        let resp = builder.generate(&master, Some(3), &CancelFlag::new()).unwrap();
        targets.push(resp.coverage.target);
    }
    assert_eq!(targets, vec![0.9, 0.8, 0.65]);
}

#[test]
fn test_matches_without_stats_use_market_odds() {
    let master = slip(
        "MS-NOSTATS",
        dec!(25),
        "USD",
        vec![
            football_match("a", "Home", [1.8, 3.5, 4.5], MatchStats::default()),
            football_match("b", "Away", [3.1, 3.3, 2.3], MatchStats::default()),
        ],
    );
    let resp = fast_builder().generate(&master, Some(11), &CancelFlag::new()).unwrap();
    assert_eq!(resp.total_stake(), dec!(25));
}

#[test]
fn test_master_only_markets_keep_unlisted_mass() {
    let mut a = football_match("a", "Home", [2.0, 3.4, 3.6], MatchStats::default());
    let mut b = football_match("b", "Draw", [2.5, 3.0, 2.9], MatchStats::default());
    a.full_markets.clear();
    b.full_markets.clear();
    let master = slip("MS-BARE", dec!(20), "EUR", vec![a, b]);

    let resp = fast_builder().generate(&master, Some(21), &CancelFlag::new()).unwrap();
    assert_eq!(resp.generated_slips.len(), 1);
    assert_eq!(resp.coverage.scenarios_considered, 4);
    assert_eq!(resp.coverage.scenarios_covered, 1);
    // Only the master's own joint outcome is won: 1/2 × 1/3.
    assert!((resp.coverage.achieved - 1.0 / 6.0).abs() < 1e-9);
    assert!(!resp.coverage.target_reached);
}

#[test]
fn test_tiny_stake_never_goes_negative() {
    let mut master = five_match_slip();
    master.stake = dec!(0.05);
    let resp = fast_builder().generate(&master, Some(13), &CancelFlag::new()).unwrap();

    assert!(!resp.generated_slips.is_empty());
    assert!(resp.generated_slips.len() <= 5);
    assert!(resp.generated_slips.iter().all(|s| s.stake >= dec!(0.01)));
    assert_eq!(resp.total_stake(), dec!(0.05));
    assert!(resp.coverage.scenarios_covered <= resp.coverage.scenarios_considered);
}

#[test]
fn test_portfolio_comparison_points_into_portfolio() {
    let resp = fast_builder()
        .generate(&five_match_slip(), Some(31), &CancelFlag::new())
        .unwrap();
    let comparison = resp.comparison.clone().unwrap();
    let ids: HashSet<_> = resp.generated_slips.iter().map(|s| s.slip_id).collect();
    assert!(ids.contains(&comparison.best_by_win_probability));
    assert!(ids.contains(&comparison.best_by_expected_payout));
    assert!(ids.contains(&comparison.best_by_sharpe_ratio));

    let best = resp
        .generated_slips
        .iter()
        .map(|s| s.risk.win_probability)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(comparison.win_probability_range.1, best);
    for s in &resp.generated_slips {
        assert!(s.risk.value_at_risk >= 0.0);
        assert!(s.risk.conditional_var <= s.risk.value_at_risk + 1e-9);
    }
}

#[test]
fn test_cancelled_before_start() {
    let cancel = CancelFlag::new();
    cancel.cancel();
    let res = fast_builder().generate(&two_match_slip(), Some(1), &cancel);
    assert!(matches!(res, Err(EngineError::Cancelled)));
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn test_validation_errors_name_the_field() {
    let builder = fast_builder();
    let cancel = CancelFlag::new();

    let mut empty = two_match_slip();
    empty.matches.clear();
    assert_eq!(
        validation_field(builder.generate(&empty, Some(1), &cancel).unwrap_err()),
        "matches"
    );

    let mut zero_stake = two_match_slip();
    zero_stake.stake = Decimal::ZERO;
    assert_eq!(
        validation_field(builder.generate(&zero_stake, Some(1), &cancel).unwrap_err()),
        "stake"
    );

    let mut bad_odds = two_match_slip();
    bad_odds.matches[0].selected_market.odds = Some(1.0);
    assert_eq!(
        validation_field(builder.generate(&bad_odds, Some(1), &cancel).unwrap_err()),
        "matches[0].selected_market.odds"
    );

    let mut fine_stake = two_match_slip();
    fine_stake.stake = dec!(50.005);
    assert_eq!(
        validation_field(builder.generate(&fine_stake, Some(1), &cancel).unwrap_err()),
        "stake"
    );

    let mut duplicate = two_match_slip();
    duplicate.matches[1].match_id = "m1".into();
    assert_eq!(
        validation_field(builder.generate(&duplicate, Some(1), &cancel).unwrap_err()),
        "matches[1].match_id"
    );
}

#[test]
fn test_empty_option_list_rejected_by_generator() {
    let profiles = vec![MatchProfile {
        match_id: "m1".into(),
        swappable: true,
        options: Vec::new(),
    }];
    let res = generate_candidates(
        &profiles,
        &GeneratorConfig::default(),
        &RngHierarchy::new(1),
        &CancelFlag::new(),
    );
    assert!(matches!(res, Err(EngineError::Validation { .. })));
}

// ---------------------------------------------------------------------------
// Probability estimation
// ---------------------------------------------------------------------------

#[test]
fn test_lopsided_stats_still_clamped() {
    let stats = MatchStats {
        home_form: Some(form(10.0, 1.0, 4.0, 0.1)),
        away_form: Some(form(0.0, -1.0, 0.1, 4.0)),
        head_to_head: Some(HeadToHead {
            total_meetings: 20,
            home_wins: 20,
            draws: 0,
            away_wins: 0,
        }),
        ..Default::default()
    };
    let m = football_match("x", "Home", [1.01, 30.0, 80.0], stats);
    let mut estimator =
        ProbabilityEstimator::new(ProbabilityConfig::default(), SimulationConfig::default());

    let home = estimator.estimate(&m, "1X2", "Home", Some(1.01), None).unwrap();
    assert!(home.probability <= 0.95 + 1e-12);
    let away = estimator.estimate(&m, "1X2", "Away", Some(80.0), None).unwrap();
    assert!(away.probability >= 0.05 - 1e-12);
}

#[test]
fn test_estimates_are_memoized_per_run() {
    let m = football_match("x", "Draw", [2.4, 3.2, 3.0], balanced_stats());
    let mut estimator =
        ProbabilityEstimator::new(ProbabilityConfig::default(), SimulationConfig::default());
    let first = estimator.estimate(&m, "1X2", "Draw", Some(3.2), None).unwrap();
    let again = estimator.estimate(&m, "1x2", " draw ", Some(3.2), None).unwrap();
    assert_eq!(first, again);
    assert_eq!(estimator.cached(), 1);
}
