//! HEDGESLIP: hedged betting-slip portfolio generator
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod api;
pub mod config;
pub mod engine;
pub mod rng;
pub mod strategy;
pub mod types;
