//! Application layer - use cases and orchestration.
//!
//! This layer classifies log lines, drives tally runs, and formats their
//! results.

pub mod accumulator;
pub mod classifier;
pub mod formatter;
pub mod tally_service;

pub use formatter::{format_report, format_state, OutputFormat, StateView};
pub use tally_service::TallyService;
