//! Crate-wide error taxonomy.
//!
//! Per the engine's propagation policy, the only fatal error class is an
//! invalid configuration: everything else the engine can encounter during a
//! cycle (infeasible candidates, optimizer timeouts, unknown ids) is folded
//! back into the normal result types instead of raised here.

use thiserror::Error;

/// Errors that can occur while building an [`crate::config::EngineConfig`].
///
/// Construction is the only fallible, fatal operation in the crate: once a
/// config has been built it is immutable and assumed valid for the lifetime
/// of any [`crate::engine::AssignmentEngine`] built from it.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// The six scoring weights (`w1..w6`) must sum to 1.0 within +/-0.01.
    #[error("scoring weights sum to {actual}, expected 1.0 +/- 0.01")]
    WeightsDoNotSumToOne { actual: f64 },

    /// Surge ratios must satisfy `soft < hard < crisis`.
    #[error("surge ratios must be strictly increasing (soft < hard < crisis), got soft={soft}, hard={hard}, crisis={crisis}")]
    SurgeRatiosNotIncreasing { soft: f64, hard: f64, crisis: f64 },

    /// Candidate-generation radii must satisfy `initial < expanded < max`.
    #[error("candidate radii must be strictly increasing (initial < expanded < max), got initial={initial}, expanded={expanded}, max={max}")]
    RadiiNotIncreasing {
        initial: f64,
        expanded: f64,
        max: f64,
    },

    /// A numeric field that must be non-negative was given a negative value.
    #[error("field '{field}' must be non-negative, got {value}")]
    NegativeValue { field: &'static str, value: f64 },
}
