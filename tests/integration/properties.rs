//! Property tests for the invariants that must hold for any input.

use hedgeslip::engine::coverage::{optimize_coverage, CoverageConfig};
use hedgeslip::engine::probability::{ProbabilityConfig, ProbabilityEstimator};
use hedgeslip::engine::scenarios::ScenarioSet;
use hedgeslip::engine::simulator::SimulationConfig;
use hedgeslip::rng::CancelFlag;
use hedgeslip::strategy::risk::RiskConfig;
use hedgeslip::strategy::scoring::{ScoringConfig, SlipScorer};
use hedgeslip::strategy::stake::{allocate, minor_units, StakeConfig};
use hedgeslip::types::{CandidateSlip, Leg, MatchStats, OutcomeKey, RiskCategory, Scenario};
use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::fixtures::{football_match, form};

const SELECTIONS: [&str; 3] = ["Home", "Draw", "Away"];

fn leg(match_id: &str, selection: &str, odds: f64, simulated: f64) -> Leg {
    Leg {
        match_id: match_id.to_string(),
        market: "1X2".to_string(),
        selection: selection.to_string(),
        odds,
        implied_probability: 1.0 / odds,
        simulated_probability: simulated,
    }
}

fn leg_strategy() -> impl Strategy<Value = (f64, f64)> {
    (1.01f64..50.0, 0.01f64..0.99)
}

proptest! {
    #[test]
    fn prop_stakes_sum_to_total(
        units in 1i64..10_000_000,
        confidences in prop::collection::vec(0.01f64..1.0, 1..40),
        currency in prop::sample::select(vec!["EUR", "JPY", "KWD"]),
    ) {
        let total = Decimal::new(units, minor_units(currency));
        let stakes = allocate(total, currency, &confidences, &StakeConfig::default()).unwrap();
        prop_assert!(!stakes.is_empty() && stakes.len() <= confidences.len());
        prop_assert_eq!(stakes.iter().copied().sum::<Decimal>(), total);
    }

    #[test]
    fn prop_stakes_positive_and_whole_units(
        units in 1i64..500,
        confidences in prop::collection::vec(0.001f64..1.0, 1..60),
        currency in prop::sample::select(vec!["EUR", "JPY", "KWD"]),
        base_fraction in 0.0f64..=1.0,
    ) {
        let dp = minor_units(currency);
        let total = Decimal::new(units, dp);
        let config = StakeConfig { base_fraction, ..Default::default() };
        let stakes = allocate(total, currency, &confidences, &config).unwrap();
        prop_assert!(stakes.iter().all(|s| *s >= Decimal::new(1, dp)));
        prop_assert!(stakes.iter().all(|s| s.normalize().scale() <= dp));
        prop_assert_eq!(stakes.iter().copied().sum::<Decimal>(), total);
    }

    #[test]
    fn prop_combined_odds_is_leg_product(legs in prop::collection::vec(leg_strategy(), 1..8)) {
        let built: Vec<Leg> = legs
            .iter()
            .enumerate()
            .map(|(i, (odds, p))| leg(&format!("m{i}"), "Home", *odds, *p))
            .collect();
        let candidate = CandidateSlip::from_legs(0, built, true);
        let product: f64 = legs.iter().map(|(odds, _)| odds).product();
        prop_assert!((candidate.combined_odds - product).abs() <= 1e-9 * product);
    }

    #[test]
    fn prop_confidence_bounded_and_risk_consistent(
        legs in prop::collection::vec(leg_strategy(), 1..8),
        penalty in 0.0f64..2.0,
    ) {
        let built: Vec<Leg> = legs
            .iter()
            .enumerate()
            .map(|(i, (odds, p))| leg(&format!("m{i}"), "Draw", *odds, *p))
            .collect();
        let config = ScoringConfig { divergence_penalty: penalty, ..Default::default() };
        let risk = config.risk.clone();
        let scored = SlipScorer::new(config)
            .score(&CandidateSlip::from_legs(3, built, false))
            .unwrap();
        prop_assert!((0.0..=1.0).contains(&scored.confidence));
        prop_assert_eq!(scored.risk, risk.categorize(scored.confidence));
    }

    #[test]
    fn prop_risk_category_thresholds(confidence in 0.0f64..=1.0) {
        let expected = if confidence >= 0.75 {
            RiskCategory::Low
        } else if confidence >= 0.40 {
            RiskCategory::Medium
        } else {
            RiskCategory::High
        };
        prop_assert_eq!(RiskConfig::default().categorize(confidence), expected);
    }

    #[test]
    fn prop_estimates_within_bounds(
        odds in 1.01f64..200.0,
        home_rating in 0.0f64..10.0,
        away_rating in 0.0f64..10.0,
        momentum in -1.0f64..1.0,
        scored in 0.0f64..4.0,
        conceded in 0.0f64..4.0,
        pick in 0usize..3,
    ) {
        let stats = MatchStats {
            home_form: Some(form(home_rating, momentum, scored, conceded)),
            away_form: Some(form(away_rating, -momentum, conceded, scored)),
            ..Default::default()
        };
        let m = football_match("p", SELECTIONS[pick], [odds, odds, odds], stats);
        let mut estimator =
            ProbabilityEstimator::new(ProbabilityConfig::default(), SimulationConfig::default());
        let est = estimator.estimate(&m, "1X2", SELECTIONS[pick], Some(odds), None).unwrap();
        prop_assert!(est.probability >= 0.05 && est.probability <= 0.95);
    }

    #[test]
    fn prop_greedy_coverage_monotone(
        picks in prop::collection::vec(prop::collection::vec(0usize..3, 3), 1..20),
        weights in prop::collection::vec(0.001f64..1.0, 27),
        target in 0.1f64..1.0,
    ) {
        let match_ids: Vec<String> = (0..3).map(|i| format!("m{i}")).collect();

        // All 27 joint outcomes of three 1X2 matches.
        let mut scenarios = Vec::new();
        for a in 0..3 {
            for b in 0..3 {
                for c in 0..3 {
                    let outcomes = [a, b, c]
                        .iter()
                        .map(|s| OutcomeKey::new("1X2", SELECTIONS[*s]))
                        .collect();
                    scenarios.push(Scenario {
                        outcomes,
                        probability: weights[a * 9 + b * 3 + c],
                        hash: format!("{a}{b}{c}"),
                    });
                }
            }
        }
        let set = ScenarioSet { match_ids: match_ids.clone(), scenarios, exhaustive: true };

        let candidates: Vec<CandidateSlip> = picks
            .iter()
            .enumerate()
            .map(|(i, sel)| {
                let legs = sel
                    .iter()
                    .zip(&match_ids)
                    .map(|(s, id)| leg(id, SELECTIONS[*s], 2.0 + *s as f64, 0.4))
                    .collect();
                CandidateSlip::from_legs(i, legs, i == 0)
            })
            .collect();
        let confidence = vec![0.5; candidates.len()];

        let result = optimize_coverage(
            &set,
            &candidates,
            &confidence,
            target,
            &CoverageConfig::default(),
            &CancelFlag::new(),
        )
        .unwrap();

        prop_assert!(!result.selected.is_empty());
        prop_assert!(result.covered_scenarios <= result.total_scenarios);
        prop_assert!(result.achieved <= 1.0 + 1e-9);
        let mut previous = 0;
        for step in &result.steps {
            prop_assert!(step.new_scenarios > 0);
            prop_assert!(step.covered_scenarios > previous);
            prop_assert!(step.covered_scenarios <= result.total_scenarios);
            previous = step.covered_scenarios;
        }
    }
}
