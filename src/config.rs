//! Immutable engine configuration, built via a staged, fallible builder.
//!
//! Mirrors the teacher's `ScenarioParams::with_*` staged-construction idiom,
//! generalized to a `build()` that validates the invariants spec.md §3 and
//! §7 require to be fatal at construction time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The six scoring weights, `w1..w6` in spec order. Must sum to 1.0 +/- 0.01.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub w1_time: f64,
    pub w2_sla_risk: f64,
    pub w3_distance: f64,
    pub w4_batch_disruption: f64,
    pub w5_workload: f64,
    pub w6_affinity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            w1_time: 0.25,
            w2_sla_risk: 0.25,
            w3_distance: 0.2,
            w4_batch_disruption: 0.1,
            w5_workload: 0.1,
            w6_affinity: 0.1,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.w1_time
            + self.w2_sla_risk
            + self.w3_distance
            + self.w4_batch_disruption
            + self.w5_workload
            + self.w6_affinity
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateConfig {
    pub initial_radius_km: f64,
    pub expanded_radius_km: f64,
    pub max_radius_km: f64,
    pub radius_expansion_minutes_threshold: f64,
}

impl Default for CandidateConfig {
    fn default() -> Self {
        Self {
            initial_radius_km: 5.0,
            expanded_radius_km: 10.0,
            max_radius_km: 20.0,
            radius_expansion_minutes_threshold: 20.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchingConfig {
    pub max_batch_size_bike: usize,
    pub max_batch_size_car: usize,
    pub max_batch_size_van: usize,
    pub max_batch_duration_minutes: f64,
    pub two_opt_iteration_limit: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_batch_size_bike: 3,
            max_batch_size_car: 6,
            max_batch_size_van: 12,
            max_batch_duration_minutes: 90.0,
            two_opt_iteration_limit: 100,
        }
    }
}

impl BatchingConfig {
    pub fn max_for(&self, vehicle: crate::model::VehicleType) -> usize {
        use crate::model::VehicleType::*;
        match vehicle {
            Bike => self.max_batch_size_bike,
            Car => self.max_batch_size_car,
            Van => self.max_batch_size_van,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReassignmentConfig {
    pub max_reassignment_attempts: u32,
    pub suppression_radius_meters: f64,
    pub trigger_eta_spike_minutes: f64,
    pub trigger_high_priority_sla_cutoff_minutes: f64,
    /// Minimum seconds between reassignment attempts for one order.
    pub min_reassignment_interval_seconds: i64,
}

impl Default for ReassignmentConfig {
    fn default() -> Self {
        Self {
            max_reassignment_attempts: 3,
            suppression_radius_meters: 500.0,
            trigger_eta_spike_minutes: 15.0,
            trigger_high_priority_sla_cutoff_minutes: 20.0,
            min_reassignment_interval_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurgeConfig {
    pub soft_surge_ratio: f64,
    pub hard_surge_ratio: f64,
    pub crisis_ratio: f64,
    pub preposition_lookback_minutes: f64,
    pub batch_size_increment: usize,
    pub radius_expansion_factor: f64,
}

impl Default for SurgeConfig {
    fn default() -> Self {
        Self {
            soft_surge_ratio: 1.2,
            hard_surge_ratio: 1.5,
            crisis_ratio: 2.0,
            preposition_lookback_minutes: 15.0,
            batch_size_increment: 1,
            radius_expansion_factor: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtaConfig {
    pub traffic_api_refresh_seconds: u64,
    pub rider_model_retrain_cron: String,
    /// Building type -> service time minutes.
    pub service_time_defaults: HashMap<String, f64>,
    pub eta_cache_minutes: f64,
}

impl Default for EtaConfig {
    fn default() -> Self {
        let mut service_time_defaults = HashMap::new();
        service_time_defaults.insert("restaurant_pickup".to_string(), 5.0);
        service_time_defaults.insert("dark_store_pickup".to_string(), 3.0);
        service_time_defaults.insert("apartment_delivery".to_string(), 4.0);
        service_time_defaults.insert("ground_floor_delivery".to_string(), 1.0);
        service_time_defaults.insert("house_delivery".to_string(), 2.0);
        service_time_defaults.insert("commercial_delivery".to_string(), 3.0);
        Self {
            traffic_api_refresh_seconds: 300,
            rider_model_retrain_cron: "0 3 * * *".to_string(),
            service_time_defaults,
            eta_cache_minutes: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FatigueConfig {
    pub max_continuous_driving_minutes: f64,
    pub mandatory_break_minutes: f64,
    pub max_shift_driving_minutes: f64,
}

impl Default for FatigueConfig {
    fn default() -> Self {
        Self {
            max_continuous_driving_minutes: 120.0,
            mandatory_break_minutes: 15.0,
            max_shift_driving_minutes: 480.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlaConfig {
    pub near_breach_threshold_minutes: f64,
    pub breach_escalation_alert_threshold_pct: f64,
    pub sla_risk_sigmoid_scale: f64,
}

impl Default for SlaConfig {
    fn default() -> Self {
        Self {
            near_breach_threshold_minutes: 10.0,
            breach_escalation_alert_threshold_pct: 0.1,
            sla_risk_sigmoid_scale: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CycleConfig {
    /// Caller cadence only; the engine does not use this internally.
    pub cycle_interval_seconds: u64,
    pub max_orders_per_cycle: usize,
    pub max_riders_per_assignment: usize,
    pub optimizer_timeout_seconds: f64,
    pub hungarian_threshold: usize,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            cycle_interval_seconds: 10,
            max_orders_per_cycle: 5_000,
            max_riders_per_assignment: 5_000,
            optimizer_timeout_seconds: 1.5,
            hungarian_threshold: 10_000,
        }
    }
}

/// Immutable, validated engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub cycle: CycleConfig,
    pub weights: ScoringWeights,
    pub candidates: CandidateConfig,
    pub batching: BatchingConfig,
    pub reassignment: ReassignmentConfig,
    pub surge: SurgeConfig,
    pub eta: EtaConfig,
    pub fatigue: FatigueConfig,
    pub sla: SlaConfig,
    pub avg_speed_kmh: f64,
}

impl EngineConfig {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig::builder()
            .build()
            .expect("default configuration is always valid")
    }
}

/// Staged accumulator for [`EngineConfig`]. Call `.build()` to validate and
/// produce the immutable configuration; the builder itself is never reused
/// after a successful build.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    cycle: CycleConfig,
    weights: ScoringWeights,
    candidates: CandidateConfig,
    batching: BatchingConfig,
    reassignment: ReassignmentConfig,
    surge: SurgeConfig,
    eta: EtaConfig,
    fatigue: FatigueConfig,
    sla: SlaConfig,
    avg_speed_kmh: f64,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self {
            cycle: CycleConfig::default(),
            weights: ScoringWeights::default(),
            candidates: CandidateConfig::default(),
            batching: BatchingConfig::default(),
            reassignment: ReassignmentConfig::default(),
            surge: SurgeConfig::default(),
            eta: EtaConfig::default(),
            fatigue: FatigueConfig::default(),
            sla: SlaConfig::default(),
            avg_speed_kmh: 25.0,
        }
    }
}

impl ConfigBuilder {
    pub fn with_weights(mut self, weights: ScoringWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_cycle(mut self, cycle: CycleConfig) -> Self {
        self.cycle = cycle;
        self
    }

    pub fn with_candidates(mut self, candidates: CandidateConfig) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_batching(mut self, batching: BatchingConfig) -> Self {
        self.batching = batching;
        self
    }

    pub fn with_reassignment(mut self, reassignment: ReassignmentConfig) -> Self {
        self.reassignment = reassignment;
        self
    }

    pub fn with_surge(mut self, surge: SurgeConfig) -> Self {
        self.surge = surge;
        self
    }

    pub fn with_eta(mut self, eta: EtaConfig) -> Self {
        self.eta = eta;
        self
    }

    pub fn with_fatigue(mut self, fatigue: FatigueConfig) -> Self {
        self.fatigue = fatigue;
        self
    }

    pub fn with_sla(mut self, sla: SlaConfig) -> Self {
        self.sla = sla;
        self
    }

    pub fn with_avg_speed_kmh(mut self, speed: f64) -> Self {
        self.avg_speed_kmh = speed;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 0.01 {
            return Err(ConfigError::WeightsDoNotSumToOne { actual: sum });
        }

        let s = &self.surge;
        if !(s.soft_surge_ratio < s.hard_surge_ratio && s.hard_surge_ratio < s.crisis_ratio) {
            return Err(ConfigError::SurgeRatiosNotIncreasing {
                soft: s.soft_surge_ratio,
                hard: s.hard_surge_ratio,
                crisis: s.crisis_ratio,
            });
        }

        let c = &self.candidates;
        if !(c.initial_radius_km < c.expanded_radius_km && c.expanded_radius_km < c.max_radius_km)
        {
            return Err(ConfigError::RadiiNotIncreasing {
                initial: c.initial_radius_km,
                expanded: c.expanded_radius_km,
                max: c.max_radius_km,
            });
        }

        macro_rules! require_non_negative {
            ($field:expr, $name:literal) => {
                if $field < 0.0 {
                    return Err(ConfigError::NegativeValue {
                        field: $name,
                        value: $field,
                    });
                }
            };
        }
        require_non_negative!(self.avg_speed_kmh, "avg_speed_kmh");
        require_non_negative!(self.reassignment.suppression_radius_meters, "suppression_radius_meters");
        require_non_negative!(self.fatigue.max_continuous_driving_minutes, "max_continuous_driving_minutes");
        require_non_negative!(self.fatigue.max_shift_driving_minutes, "max_shift_driving_minutes");
        require_non_negative!(self.eta.eta_cache_minutes, "eta_cache_minutes");

        Ok(EngineConfig {
            cycle: self.cycle,
            weights: self.weights,
            candidates: self.candidates,
            batching: self.batching,
            reassignment: self.reassignment,
            surge: self.surge,
            eta: self.eta,
            fatigue: self.fatigue,
            sla: self.sla,
            avg_speed_kmh: self.avg_speed_kmh,
        })
    }
}
