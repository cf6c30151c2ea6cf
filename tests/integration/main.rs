//! Integration tests for the full generation pipeline.

mod fixtures;
mod pipeline;
mod properties;
