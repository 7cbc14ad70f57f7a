//! Surge handler (C7): demand/supply ratio classification, scoring-weight
//! and batching modifiers, and preposition target selection.
//!
//! No direct teacher precedent exists for surge pricing bands (the
//! teacher's `pricing::SurgeMultiplier` computes a continuous fare
//! multiplier rather than a discrete action-recommendation state); the
//! threshold-table shape here follows the teacher's `pricing.rs` banding
//! idiom (ordered ratio cutoffs, each tied to a fixed outcome) generalized
//! from a single multiplier to a [`SurgeLevel`] plus an action-token list.

use std::collections::HashMap;

use crate::config::{ScoringWeights, SurgeConfig};
use crate::model::{ActionToken, Location, Order, Rider, SurgeLevel, SurgeState};

/// Compute the demand/supply surge state for the current cycle.
/// `active_batch_capacity` is the maximum `vehicle.max_items` across the
/// current rider population.
pub fn detect_surge(
    pending_order_count: usize,
    available_riders: usize,
    active_batch_capacity: u32,
    surge: &SurgeConfig,
) -> SurgeState {
    let available_capacity = available_riders as f64 * active_batch_capacity as f64;
    let ratio = pending_order_count as f64 / available_capacity.max(1.0);

    let (level, recommended_actions): (SurgeLevel, Vec<ActionToken>) =
        if ratio < surge.soft_surge_ratio {
            (SurgeLevel::Normal, Vec::new())
        } else if ratio < surge.hard_surge_ratio {
            (
                SurgeLevel::SoftSurge,
                vec![
                    "increase_batch_sizes_by_1",
                    "expand_candidate_radius_50pct",
                    "reduce_fairness_weight",
                ],
            )
        } else if ratio < surge.crisis_ratio {
            (
                SurgeLevel::HardSurge,
                vec![
                    "enable_preposioning",
                    "hold_sla_orders",
                    "increase_batch_sizes",
                    "expand_search_radius",
                ],
            )
        } else {
            (
                SurgeLevel::Crisis,
                vec![
                    "escalate_sla_windows",
                    "notify_customers",
                    "activate_emergency_protocol",
                    "request_additional_supply",
                ],
            )
        };

    SurgeState {
        level,
        demand_supply_ratio: ratio,
        pending_order_count,
        available_capacity,
        recommended_actions,
    }
}

/// Apply the soft/hard surge scoring-weight and batch-size modifiers for
/// `level` to `weights` and the batch-size increment, in place. Crisis
/// carries no weight modifier of its own (see [`should_use_greedy_solver`]).
pub fn apply_surge_weight_modifiers(
    level: SurgeLevel,
    weights: &mut ScoringWeights,
    surge: &SurgeConfig,
) {
    match level {
        SurgeLevel::Normal => {}
        SurgeLevel::SoftSurge => {
            weights.w5_workload *= 0.5;
            weights.w2_sla_risk = (weights.w2_sla_risk * 1.2).min(1.0);
        }
        SurgeLevel::HardSurge | SurgeLevel::Crisis => {
            weights.w5_workload = 0.0;
            weights.w2_sla_risk = 0.5;
            weights.w1_time = 0.3;
            weights.w3_distance = 0.2;
        }
    }
    let _ = surge;
}

/// Batch-size delta (added to the vehicle-type batch cap) for `level`.
pub fn batch_size_delta(level: SurgeLevel, surge: &SurgeConfig) -> usize {
    match level {
        SurgeLevel::Normal => 0,
        SurgeLevel::SoftSurge => surge.batch_size_increment,
        SurgeLevel::HardSurge | SurgeLevel::Crisis => 2 * surge.batch_size_increment,
    }
}

/// Candidate-radius multiplier for `level`.
pub fn radius_multiplier(level: SurgeLevel, surge: &SurgeConfig) -> f64 {
    match level {
        SurgeLevel::Normal => 1.0,
        SurgeLevel::SoftSurge => surge.radius_expansion_factor,
        SurgeLevel::HardSurge | SurgeLevel::Crisis => surge.radius_expansion_factor.powi(2),
    }
}

/// Crisis directive: skip the size-adaptive optimizer selection and run
/// the greedy solver unconditionally.
pub fn should_use_greedy_solver(level: SurgeLevel) -> bool {
    level == SurgeLevel::Crisis
}

/// Normal-priority orders whose deadline is more than 30 minutes out,
/// deferred this cycle under hard surge.
pub fn held_orders(orders: &[&Order], now_ms: i64) -> Vec<String> {
    orders
        .iter()
        .filter(|o| {
            o.priority == crate::model::Priority::Normal && o.sla_deadline > now_ms + 30 * 60_000
        })
        .map(|o| o.id.clone())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrepositionTarget {
    pub zone_key: String,
    pub centroid: Location,
    pub rider_id: String,
}

/// Cluster pending orders' pickup locations into 0.5x0.5 degree buckets,
/// take the centroids of the top-N most populated buckets, and pair each
/// with an idle rider (N = min(idle riders, buckets)).
pub fn preposition_targets(pending_orders: &[&Order], idle_riders: &[&Rider]) -> Vec<PrepositionTarget> {
    let mut buckets: HashMap<String, Vec<Location>> = HashMap::new();
    for order in pending_orders {
        buckets
            .entry(order.pickup.location.zone_key())
            .or_default()
            .push(order.pickup.location);
    }

    let mut ranked: Vec<(String, Location, usize)> = buckets
        .into_iter()
        .map(|(zone_key, locations)| {
            let count = locations.len();
            let sum_lat: f64 = locations.iter().map(|l| l.lat).sum();
            let sum_lng: f64 = locations.iter().map(|l| l.lng).sum();
            let centroid = Location::new(sum_lat / count as f64, sum_lng / count as f64);
            (zone_key, centroid, count)
        })
        .collect();
    ranked.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.0.cmp(&b.0)));

    let n = idle_riders.len().min(ranked.len());
    ranked
        .into_iter()
        .take(n)
        .zip(idle_riders.iter().take(n))
        .map(|((zone_key, centroid, _count), rider)| PrepositionTarget {
            zone_key,
            centroid,
            rider_id: rider.id.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::collections::HashSet;

    fn cfg() -> SurgeConfig {
        SurgeConfig::default()
    }

    #[test]
    fn low_ratio_is_normal() {
        let state = detect_surge(5, 10, 5, &cfg());
        assert_eq!(state.level, SurgeLevel::Normal);
        assert!(state.recommended_actions.is_empty());
    }

    #[test]
    fn soft_threshold_boundary() {
        // ratio = 60 / 50 = 1.2 exactly at the soft cutoff.
        let state = detect_surge(60, 10, 5, &cfg());
        assert_eq!(state.level, SurgeLevel::SoftSurge);
        assert_eq!(
            state.recommended_actions,
            vec![
                "increase_batch_sizes_by_1",
                "expand_candidate_radius_50pct",
                "reduce_fairness_weight"
            ]
        );
    }

    #[test]
    fn hard_threshold_boundary() {
        // ratio = 75 / 50 = 1.5 exactly at the hard cutoff.
        let state = detect_surge(75, 10, 5, &cfg());
        assert_eq!(state.level, SurgeLevel::HardSurge);
        assert!(state.recommended_actions.contains(&"enable_preposioning"));
    }

    #[test]
    fn crisis_threshold_boundary() {
        // ratio = 100 / 50 = 2.0 exactly at the crisis cutoff.
        let state = detect_surge(100, 10, 5, &cfg());
        assert_eq!(state.level, SurgeLevel::Crisis);
        assert!(should_use_greedy_solver(state.level));
    }

    #[test]
    fn soft_weight_modifiers_halve_workload() {
        let mut weights = ScoringWeights::default();
        apply_surge_weight_modifiers(SurgeLevel::SoftSurge, &mut weights, &cfg());
        assert!((weights.w5_workload - 0.05).abs() < 1e-9);
    }

    #[test]
    fn hard_weight_modifiers_zero_workload() {
        let mut weights = ScoringWeights::default();
        apply_surge_weight_modifiers(SurgeLevel::HardSurge, &mut weights, &cfg());
        assert_eq!(weights.w5_workload, 0.0);
        assert_eq!(weights.w1_time, 0.3);
    }

    fn order(id: &str, priority: Priority, sla_deadline: i64, lat: f64, lng: f64) -> Order {
        Order {
            id: id.to_string(),
            status: OrderStatus::PendingAssignment,
            created_at: 0,
            sla_deadline,
            pickup: Pickup {
                location: Location::new(lat, lng),
                address: "pickup".to_string(),
                store_id: "s".to_string(),
                estimated_pickup_wait_minutes: 2.0,
                window: None,
            },
            delivery: Delivery {
                location: Location::new(lat, lng),
                address: "delivery".to_string(),
                customer_id: "c".to_string(),
                window: None,
            },
            payload: Payload {
                weight_kg: 1.0,
                volume_liters: 1.0,
                item_count: 1,
                requires_cold_chain: false,
                fragile: false,
                vehicle_requirement: VehicleRequirement::Any,
            },
            priority,
            assignment_attempts: 0,
            assigned_rider_id: None,
        }
    }

    #[test]
    fn held_orders_excludes_high_priority_and_near_deadline() {
        let orders = vec![
            order("far", Priority::Normal, 60 * 60_000, 0.0, 0.0),
            order("near", Priority::Normal, 10 * 60_000, 0.0, 0.0),
            order("urgent", Priority::Critical, 60 * 60_000, 0.0, 0.0),
        ];
        let refs: Vec<&Order> = orders.iter().collect();
        let held = held_orders(&refs, 0);
        assert_eq!(held, vec!["far".to_string()]);
    }

    fn idle_rider(id: &str) -> Rider {
        Rider {
            id: id.to_string(),
            status: RiderStatus::Active,
            location: Location::new(0.0, 0.0),
            vehicle: Vehicle {
                vehicle_type: VehicleType::Bike,
                max_weight_kg: 20.0,
                max_volume_liters: 50.0,
                max_items: 10,
                capabilities: HashSet::new(),
            },
            shift: Shift {
                start_time: 0,
                end_time: 8 * 3_600_000,
                continuous_driving_minutes: 0.0,
                total_shift_driving_minutes: 0.0,
            },
            load: Load::default(),
            performance: Performance::default(),
            current_assignments: Vec::new(),
            current_route: Vec::new(),
        }
    }

    #[test]
    fn preposition_targets_pairs_busiest_buckets_with_idle_riders() {
        let orders = vec![
            order("o1", Priority::Normal, 60 * 60_000, 10.1, 10.1),
            order("o2", Priority::Normal, 60 * 60_000, 10.2, 10.2),
            order("o3", Priority::Normal, 60 * 60_000, -40.0, -40.0),
        ];
        let refs: Vec<&Order> = orders.iter().collect();
        let r1 = idle_rider("r1");
        let idle = vec![&r1];
        let targets = preposition_targets(&refs, &idle);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].zone_key, Location::new(10.1, 10.1).zone_key());
        assert_eq!(targets[0].rider_id, "r1");
    }

    #[test]
    fn preposition_targets_empty_when_no_idle_riders() {
        let orders = vec![order("o1", Priority::Normal, 60 * 60_000, 0.1, 0.1)];
        let refs: Vec<&Order> = orders.iter().collect();
        let targets = preposition_targets(&refs, &[]);
        assert!(targets.is_empty());
    }
}
