//! Candidate generator (C3): adaptive-radius geographic filter followed by
//! six hard-constraint checks.

use std::collections::HashMap;

use crate::config::{CandidateConfig, FatigueConfig};
use crate::geo::{travel_time_minutes, within_radius};
use crate::model::{Order, Rider, VehicleCapability, VehicleRequirement};

/// Stable identifier for a failed hard-constraint check.
pub type ConstraintFailure = &'static str;

/// Result of candidate generation for one order.
#[derive(Debug, Clone)]
pub struct CandidateResult {
    pub order_id: String,
    pub candidate_rider_ids: Vec<String>,
    pub failure_reason: Option<&'static str>,
}

/// Evaluate the six hard constraints for one (order, rider) pair.
/// Returns the set of failed check identifiers; empty means the rider
/// passes.
pub fn hard_constraint_failures(
    order: &Order,
    rider: &Rider,
    now_ms: i64,
    fatigue: &FatigueConfig,
    avg_speed_kmh: f64,
) -> Vec<ConstraintFailure> {
    let mut failures = Vec::new();

    if rider.remaining_weight_kg() < order.payload.weight_kg
        || rider.remaining_volume_liters() < order.payload.volume_liters
        || (rider.remaining_items() as f64) < order.payload.item_count as f64
    {
        failures.push("capacity_exceeded");
    }

    let mut vehicle_ok = match order.payload.vehicle_requirement {
        VehicleRequirement::Any => true,
        VehicleRequirement::Bike => rider.vehicle.vehicle_type == crate::model::VehicleType::Bike,
        VehicleRequirement::Car => rider.vehicle.vehicle_type == crate::model::VehicleType::Car,
        VehicleRequirement::Van => rider.vehicle.vehicle_type == crate::model::VehicleType::Van,
        VehicleRequirement::Refrigerated => rider.vehicle.has_capability(VehicleCapability::ColdChain),
    };
    if order.payload.fragile && !rider.vehicle.has_capability(VehicleCapability::Fragile) {
        vehicle_ok = false;
    }
    if order.payload.requires_cold_chain && !rider.vehicle.has_capability(VehicleCapability::ColdChain)
    {
        vehicle_ok = false;
    }
    if !vehicle_ok {
        failures.push("vehicle_incompatible");
    }

    let to_pickup_minutes =
        travel_time_minutes(rider.location, order.pickup.location, avg_speed_kmh, 1.0) as f64;
    let to_delivery_minutes = travel_time_minutes(
        order.pickup.location,
        order.delivery.location,
        avg_speed_kmh,
        1.0,
    ) as f64;
    let round_trip_minutes = to_pickup_minutes
        + order.pickup.estimated_pickup_wait_minutes
        + to_delivery_minutes
        + 3.0;
    let minutes_until_shift_end = (rider.shift.end_time - now_ms) as f64 / 60_000.0;
    if minutes_until_shift_end - round_trip_minutes < 5.0 {
        failures.push("shift_end_time");
    }

    if rider.shift.continuous_driving_minutes >= fatigue.max_continuous_driving_minutes
        || rider.shift.total_shift_driving_minutes >= fatigue.max_shift_driving_minutes
    {
        failures.push("fatigue_limit_exceeded");
    }

    let optimistic_trip_minutes = to_pickup_minutes + to_delivery_minutes;
    let optimistic_arrival_ms = now_ms + (optimistic_trip_minutes * 60_000.0).round() as i64;
    if optimistic_arrival_ms > order.sla_deadline {
        failures.push("sla_infeasible");
    }

    if !rider.is_candidate_eligible() {
        failures.push("rider_offline_or_unavailable");
    }

    failures
}

/// Generate the candidate rider list for one pending order.
pub fn generate_candidates(
    order: &Order,
    riders: &HashMap<String, Rider>,
    now_ms: i64,
    candidate_config: &CandidateConfig,
    fatigue: &FatigueConfig,
    avg_speed_kmh: f64,
) -> CandidateResult {
    let sla_minutes_remaining = order.sla_minutes_remaining(now_ms);

    let locations: Vec<(&str, crate::model::Location)> = riders
        .iter()
        .map(|(id, rider)| (id.as_str(), rider.location))
        .collect();

    let geo_matches = if sla_minutes_remaining < candidate_config.radius_expansion_minutes_threshold
    {
        within_radius(
            locations.clone(),
            order.pickup.location,
            candidate_config.max_radius_km,
        )
    } else {
        let initial = within_radius(
            locations.clone(),
            order.pickup.location,
            candidate_config.initial_radius_km,
        );
        if !initial.is_empty() {
            initial
        } else {
            let expanded = within_radius(
                locations.clone(),
                order.pickup.location,
                candidate_config.expanded_radius_km,
            );
            if !expanded.is_empty() {
                expanded
            } else {
                within_radius(locations, order.pickup.location, candidate_config.max_radius_km)
            }
        }
    };

    if geo_matches.is_empty() {
        return CandidateResult {
            order_id: order.id.clone(),
            candidate_rider_ids: Vec::new(),
            failure_reason: Some("no_riders_in_service_radius"),
        };
    }

    let candidate_rider_ids: Vec<String> = geo_matches
        .into_iter()
        .filter_map(|geo_match| {
            let rider = riders.get(geo_match.id)?;
            let failures =
                hard_constraint_failures(order, rider, now_ms, fatigue, avg_speed_kmh);
            failures.is_empty().then(|| geo_match.id.to_string())
        })
        .collect();

    if candidate_rider_ids.is_empty() {
        return CandidateResult {
            order_id: order.id.clone(),
            candidate_rider_ids,
            failure_reason: Some("all_riders_failed_constraints"),
        };
    }

    CandidateResult {
        order_id: order.id.clone(),
        candidate_rider_ids,
        failure_reason: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CandidateConfig, FatigueConfig};
    use crate::model::*;
    use std::collections::{HashMap, HashSet};

    fn sample_rider(id: &str, lat: f64, lng: f64) -> Rider {
        Rider {
            id: id.to_string(),
            status: RiderStatus::Active,
            location: Location::new(lat, lng),
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

    fn sample_order(id: &str, sla_minutes: f64) -> Order {
        Order {
            id: id.to_string(),
            status: OrderStatus::PendingAssignment,
            created_at: 0,
            sla_deadline: (sla_minutes * 60_000.0) as i64,
            pickup: Pickup {
                location: Location::new(12.9716, 77.5946),
                address: "pickup".to_string(),
                store_id: "s1".to_string(),
                estimated_pickup_wait_minutes: 2.0,
                window: None,
            },
            delivery: Delivery {
                location: Location::new(12.975, 77.601),
                address: "delivery".to_string(),
                customer_id: "c1".to_string(),
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
            priority: Priority::Normal,
            assignment_attempts: 0,
            assigned_rider_id: None,
        }
    }

    #[test]
    fn empty_rider_pool_fails_with_no_riders_reason() {
        let order = sample_order("o1", 60.0);
        let riders = HashMap::new();
        let result = generate_candidates(
            &order,
            &riders,
            0,
            &CandidateConfig::default(),
            &FatigueConfig::default(),
            25.0,
        );
        assert_eq!(result.failure_reason, Some("no_riders_in_service_radius"));
    }

    #[test]
    fn nearby_eligible_rider_is_a_candidate() {
        let order = sample_order("o1", 60.0);
        let mut riders = HashMap::new();
        riders.insert("r1".to_string(), sample_rider("r1", 12.972, 77.591));
        let result = generate_candidates(
            &order,
            &riders,
            0,
            &CandidateConfig::default(),
            &FatigueConfig::default(),
            25.0,
        );
        assert_eq!(result.candidate_rider_ids, vec!["r1".to_string()]);
        assert!(result.failure_reason.is_none());
    }

    #[test]
    fn heavy_payload_fails_all_riders() {
        let mut order = sample_order("o1", 60.0);
        order.payload.weight_kg = 1000.0;
        let mut riders = HashMap::new();
        riders.insert("r1".to_string(), sample_rider("r1", 12.972, 77.591));
        let result = generate_candidates(
            &order,
            &riders,
            0,
            &CandidateConfig::default(),
            &FatigueConfig::default(),
            25.0,
        );
        assert_eq!(result.failure_reason, Some("all_riders_failed_constraints"));
    }

    #[test]
    fn fatigue_limit_excludes_rider() {
        let order = sample_order("o1", 60.0);
        let mut rider = sample_rider("r1", 12.972, 77.591);
        rider.shift.continuous_driving_minutes = 120.0;
        let fatigue = FatigueConfig::default();
        let failures = hard_constraint_failures(&order, &rider, 0, &fatigue, 25.0);
        assert!(failures.contains(&"fatigue_limit_exceeded"));
    }

    #[test]
    fn offline_rider_always_fails() {
        let order = sample_order("o1", 60.0);
        let mut rider = sample_rider("r1", 12.972, 77.591);
        rider.status = RiderStatus::Offline;
        let failures =
            hard_constraint_failures(&order, &rider, 0, &FatigueConfig::default(), 25.0);
        assert!(failures.contains(&"rider_offline_or_unavailable"));
    }

    #[test]
    fn radius_candidate_count_is_monotonic() {
        let order = sample_order("o1", 60.0);
        let mut riders = HashMap::new();
        riders.insert("near".to_string(), sample_rider("near", 12.972, 77.591));
        riders.insert("far".to_string(), sample_rider("far", 13.5, 78.2));
        let small_cfg = CandidateConfig {
            initial_radius_km: 1.0,
            expanded_radius_km: 2.0,
            max_radius_km: 3.0,
            ..CandidateConfig::default()
        };
        let large_cfg = CandidateConfig {
            initial_radius_km: 1.0,
            expanded_radius_km: 2.0,
            max_radius_km: 200.0,
            ..CandidateConfig::default()
        };
        let small = generate_candidates(
            &order,
            &riders,
            0,
            &small_cfg,
            &FatigueConfig::default(),
            25.0,
        );
        let large = generate_candidates(
            &order,
            &riders,
            0,
            &large_cfg,
            &FatigueConfig::default(),
            25.0,
        );
        assert!(large.candidate_rider_ids.len() >= small.candidate_rider_ids.len());
    }
}
