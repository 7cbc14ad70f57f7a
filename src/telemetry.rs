//! Telemetry (ambient): cycle and engine-level metric snapshots.
//!
//! Grounded on the teacher's `telemetry`/`telemetry_json` modules (structured
//! metric snapshots emitted per tick) and the wider pack's use of `tracing`
//! for structured, leveled event emission alongside these snapshot types.

use std::collections::HashMap;

use crate::eta::EtaCacheStats;
use crate::model::SurgeState;

/// Aggregate metrics for one completed cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleMetrics {
    pub avg_cost: f64,
    pub total_sla_slack_minutes: f64,
    /// rider id -> load/capacity ratio by item count.
    pub rider_utilization: HashMap<String, f64>,
}

/// Running counters for the reassignment engine (C8), accumulated across
/// the engine's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReassignmentStats {
    pub triggers_detected: u64,
    pub applied: u64,
    pub denied_by_cap_or_interval: u64,
    pub denied_by_suppression: u64,
}

/// Snapshot returned by `AssignmentEngine::get_metrics`.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineMetrics {
    pub cycle_count: u64,
    pub last_cycle_id: Option<String>,
    pub surge_state: Option<SurgeState>,
    pub reassignment_stats: ReassignmentStats,
    pub total_assignments: u64,
    pub eta_cache_stats: EtaCacheStats,
}
