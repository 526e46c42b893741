//! # censuskv-observability
//!
//! Structured logging for CensusKV.
//!
//! Human-readable text or JSON logs on stderr, so command reports on stdout
//! stay machine-readable. Log levels configurable per component.

pub mod tracing_setup;

pub use tracing_setup::{init_tracing, LogConfig};
