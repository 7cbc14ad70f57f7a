//! Real-time last-mile dispatch: candidate generation, six-factor scoring,
//! batch route sequencing, size-adaptive assignment optimization, surge
//! detection and reassignment for a rider/order delivery marketplace.
//!
//! The cycle orchestrator ([`engine::AssignmentEngine`]) is the crate's
//! single entry point: callers push state in via `update_state` and pull an
//! [`engine::AssignmentCycleResult`] out via `execute_cycle`. Every other
//! module is a pure component the orchestrator composes per cycle.

pub mod batch;
pub mod candidates;
pub mod config;
pub mod engine;
pub mod error;
pub mod eta;
pub mod geo;
pub mod model;
pub mod optimizer;
pub mod reassignment;
pub mod scoring;
pub mod surge;
pub mod telemetry;

pub use config::EngineConfig;
pub use engine::{AssignmentCycleResult, AssignmentEngine};
pub use error::ConfigError;
