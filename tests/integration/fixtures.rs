//! Shared fixtures: master slips with realistic markets and statistics.

use hedgeslip::strategy::SlipBuilder;
use hedgeslip::types::{
    HeadToHead, Market, MarketOption, Match, MasterSlip, MatchStats, RiskProfile, SelectedMarket,
    TeamForm,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub fn option(selection: &str, odds: f64) -> MarketOption {
    MarketOption {
        selection: Some(selection.to_string()),
        odds: Some(odds),
        ..Default::default()
    }
}

pub fn form(rating: f64, momentum: f64, scored: f64, conceded: f64) -> TeamForm {
    TeamForm {
        form_rating: Some(rating),
        momentum: Some(momentum),
        avg_goals_scored: Some(scored),
        avg_goals_conceded: Some(conceded),
    }
}

/// A fixture with a 1X2 market and a totals market. `selection` is taken
/// from the 1X2 market.
pub fn football_match(id: &str, selection: &str, odds_1x2: [f64; 3], stats: MatchStats) -> Match {
    let chosen = match selection {
        "Home" => odds_1x2[0],
        "Draw" => odds_1x2[1],
        _ => odds_1x2[2],
    };
    Match {
        match_id: id.to_string(),
        home_team: format!("{id} United"),
        away_team: format!("{id} City"),
        league: "fixture_league".to_string(),
        stats,
        selected_market: SelectedMarket {
            market_type: "1X2".to_string(),
            selection: selection.to_string(),
            odds: Some(chosen),
            implied_probability: None,
            confidence_rating: None,
        },
        full_markets: vec![
            Market {
                market_name: "1X2".to_string(),
                options: vec![
                    option("Home", odds_1x2[0]),
                    option("Draw", odds_1x2[1]),
                    option("Away", odds_1x2[2]),
                ],
            },
            Market {
                market_name: "Over/Under 2.5".to_string(),
                options: vec![option("Over 2.5", 1.9), option("Under 2.5", 1.95)],
            },
        ],
        swappable: true,
    }
}

pub fn strong_home_stats() -> MatchStats {
    MatchStats {
        home_form: Some(form(8.0, 0.4, 2.1, 0.8)),
        away_form: Some(form(4.5, -0.2, 1.0, 1.6)),
        head_to_head: Some(HeadToHead {
            total_meetings: 8,
            home_wins: 5,
            draws: 2,
            away_wins: 1,
        }),
        ..Default::default()
    }
}

pub fn balanced_stats() -> MatchStats {
    MatchStats {
        home_form: Some(form(6.0, 0.0, 1.3, 1.2)),
        away_form: Some(form(6.2, 0.1, 1.3, 1.1)),
        ..Default::default()
    }
}

pub fn slip(id: &str, stake: Decimal, currency: &str, matches: Vec<Match>) -> MasterSlip {
    MasterSlip {
        id: id.to_string(),
        stake,
        currency: currency.to_string(),
        risk_profile: RiskProfile::Medium,
        matches,
    }
}

/// Two legs priced 1.35 and 3.40: master odds 4.59.
pub fn two_match_slip() -> MasterSlip {
    slip(
        "MS-2",
        dec!(50),
        "EUR",
        vec![
            football_match("m1", "Home", [1.35, 4.8, 8.5], strong_home_stats()),
            football_match("m2", "Draw", [2.6, 3.40, 2.8], balanced_stats()),
        ],
    )
}

pub fn five_match_slip() -> MasterSlip {
    let mut no_stats = football_match("m5", "Away", [2.9, 3.3, 2.5], MatchStats::default());
    no_stats.full_markets.push(Market {
        market_name: "BTTS".to_string(),
        options: vec![option("Yes", 1.8), option("No", 2.0)],
    });
    slip(
        "MS-5",
        dec!(120),
        "GBP",
        vec![
            football_match("m1", "Home", [1.5, 4.2, 6.5], strong_home_stats()),
            football_match("m2", "Draw", [2.6, 3.4, 2.8], balanced_stats()),
            football_match("m3", "Home", [1.9, 3.6, 4.1], balanced_stats()),
            football_match("m4", "Away", [3.8, 3.5, 1.95], balanced_stats()),
            no_stats,
        ],
    )
}

/// Builder with a reduced iteration count to keep tests quick.
pub fn fast_builder() -> SlipBuilder {
    let mut builder = SlipBuilder::default();
    builder.engine.simulation.iterations = 2_000;
    builder.engine.scenarios.iterations = 4_000;
    builder
}
