//! Configuration loading from TOML.
//!
//! Reads `config.toml` into strongly-typed structs. Every section has
//! defaults, so a partial file (or none at all) yields a working setup.

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::engine::probability::ProbabilityConfig;
use crate::engine::EngineConfig;
use crate::strategy::kelly::KellyConfig;
use crate::strategy::scoring::ScoringConfig;
use crate::strategy::stake::StakeConfig;
use crate::strategy::SlipBuilder;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub probability: ProbabilityConfig,
    pub scoring: ScoringConfig,
    pub stake: StakeConfig,
    pub kelly: KellyConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Wall-clock budget for one generation request.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Failed to load config file: {}", path.display()))
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values outside the ranges the engine can work with.
    pub fn validate(&self) -> Result<()> {
        let unit = |v: f64| (0.0..=1.0).contains(&v);

        let p = &self.probability;
        ensure!(
            unit(p.market_weight),
            "probability.market_weight must be in [0, 1], got {}",
            p.market_weight
        );
        ensure!(
            unit(p.floor) && unit(p.ceiling) && p.floor <= p.ceiling,
            "probability.floor ({}) and ceiling ({}) must satisfy 0 <= floor <= ceiling <= 1",
            p.floor,
            p.ceiling
        );

        let sim = &self.engine.simulation;
        ensure!(sim.iterations > 0, "engine.simulation.iterations must be positive");
        ensure!(
            sim.confidence_level > 0.0 && sim.confidence_level < 1.0,
            "engine.simulation.confidence_level must be in (0, 1), got {}",
            sim.confidence_level
        );
        ensure!(
            sim.min_lambda > 0.0 && sim.min_lambda <= sim.max_lambda,
            "engine.simulation needs 0 < min_lambda ({}) <= max_lambda ({})",
            sim.min_lambda,
            sim.max_lambda
        );

        let sc = &self.engine.scenarios;
        ensure!(sc.iterations > 0, "engine.scenarios.iterations must be positive");
        ensure!(sc.max_scenarios > 0, "engine.scenarios.max_scenarios must be positive");

        let gen = &self.engine.generator;
        ensure!(gen.num_candidates > 0, "engine.generator.num_candidates must be positive");
        ensure!(
            unit(gen.swap_probability),
            "engine.generator.swap_probability must be in [0, 1], got {}",
            gen.swap_probability
        );

        let cov = &self.engine.coverage;
        for (name, target) in [
            ("target", cov.target),
            ("low_risk_target", cov.low_risk_target),
            ("high_risk_target", cov.high_risk_target),
        ] {
            ensure!(
                target > 0.0 && target <= 1.0,
                "engine.coverage.{name} must be in (0, 1], got {target}"
            );
        }

        let risk = &self.scoring.risk;
        ensure!(
            unit(risk.medium_threshold) && unit(risk.low_threshold)
                && risk.medium_threshold <= risk.low_threshold,
            "scoring.risk needs 0 <= medium_threshold ({}) <= low_threshold ({}) <= 1",
            risk.medium_threshold,
            risk.low_threshold
        );

        ensure!(
            unit(self.stake.base_fraction),
            "stake.base_fraction must be in [0, 1], got {}",
            self.stake.base_fraction
        );
        ensure!(
            unit(self.kelly.max_fraction),
            "kelly.max_fraction must be in [0, 1], got {}",
            self.kelly.max_fraction
        );
        Ok(())
    }

    /// Engine pipeline configured from this file.
    pub fn slip_builder(&self) -> SlipBuilder {
        SlipBuilder::new(
            self.engine.clone(),
            self.probability.clone(),
            self.scoring.clone(),
            self.stake.clone(),
            self.kelly.clone(),
        )
    }
}
