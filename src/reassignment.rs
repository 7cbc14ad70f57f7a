//! Reassignment engine (C8): trigger detection and per-order guards for
//! pulling a live assignment back to `pending_assignment`.

use std::collections::HashMap;

use crate::config::ReassignmentConfig;
use crate::eta::EtaModel;
use crate::geo::distance_km;
use crate::model::{Assignment, Order, Priority, Rider, RiderStatus};

/// One detected reassignment trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct ReassignmentTrigger {
    pub order_id: String,
    pub kind: TriggerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    RiderOffline,
    EtaSpike,
    HighPriorityArrival,
    /// Non-fatal hint: an active rider came online with no assignments.
    NewRiderOnline,
}

const HIGH_PRIORITY_PROXIMITY_KM: f64 = 3.0;

/// Detect all reassignment triggers for the current cycle.
pub fn detect_triggers(
    orders: &HashMap<String, Order>,
    riders: &HashMap<String, Rider>,
    assignments: &HashMap<String, Assignment>,
    now_ms: i64,
    config: &ReassignmentConfig,
    eta_model: &mut EtaModel,
) -> Vec<ReassignmentTrigger> {
    let mut triggers = Vec::new();

    for assignment in assignments.values() {
        let Some(order) = orders.get(&assignment.order_id) else {
            continue;
        };
        let Some(rider) = riders.get(&assignment.rider_id) else {
            triggers.push(ReassignmentTrigger {
                order_id: order.id.clone(),
                kind: TriggerKind::RiderOffline,
            });
            continue;
        };
        if rider.status == RiderStatus::Offline {
            triggers.push(ReassignmentTrigger {
                order_id: order.id.clone(),
                kind: TriggerKind::RiderOffline,
            });
            continue;
        }

        let current_eta_minutes = eta_model
            .estimate_eta(rider.location, order.delivery.location, now_ms, Some(&rider.id), None)
            .estimated_duration_minutes;
        let original_eta_minutes =
            (assignment.estimated_delivery_at - assignment.assigned_at) as f64 / 60_000.0;
        if current_eta_minutes - original_eta_minutes > config.trigger_eta_spike_minutes {
            triggers.push(ReassignmentTrigger {
                order_id: order.id.clone(),
                kind: TriggerKind::EtaSpike,
            });
        }
    }

    let urgent_pickups: Vec<crate::model::Location> = orders
        .values()
        .filter(|o| {
            let urgent = o.priority == Priority::Critical
                || (o.priority == Priority::High && o.status == crate::model::OrderStatus::PendingAssignment);
            urgent
                && o.sla_minutes_remaining(now_ms) <= config.trigger_high_priority_sla_cutoff_minutes
        })
        .map(|o| o.pickup.location)
        .collect();

    if !urgent_pickups.is_empty() {
        for assignment in assignments.values() {
            let Some(order) = orders.get(&assignment.order_id) else {
                continue;
            };
            if order.priority != Priority::Normal {
                continue;
            }
            let Some(rider) = riders.get(&assignment.rider_id) else {
                continue;
            };
            let near_urgent = urgent_pickups
                .iter()
                .any(|&pickup| distance_km(rider.location, pickup) <= HIGH_PRIORITY_PROXIMITY_KM);
            if near_urgent {
                triggers.push(ReassignmentTrigger {
                    order_id: order.id.clone(),
                    kind: TriggerKind::HighPriorityArrival,
                });
            }
        }
    }

    for rider in riders.values() {
        if rider.status == RiderStatus::Active && rider.current_assignments.is_empty() {
            triggers.push(ReassignmentTrigger {
                order_id: String::new(),
                kind: TriggerKind::NewRiderOnline,
            });
        }
    }

    triggers
}

/// Whether `order_id`'s assignment may be reassigned: attempt count below
/// the cap and at least 30s since its last recorded reassignment.
pub fn can_reassign(assignment: &Assignment, now_ms: i64, config: &ReassignmentConfig) -> bool {
    if assignment.reassignment_count >= config.max_reassignment_attempts {
        return false;
    }
    match assignment.last_reassigned_at {
        Some(last) => (now_ms - last) >= config.min_reassignment_interval_seconds * 1000,
        None => true,
    }
}

/// Whether the current rider is close enough to the pickup to be
/// considered "already committed" and should not be disturbed.
pub fn is_reassignment_suppressed(
    rider_location: crate::model::Location,
    pickup_location: crate::model::Location,
    config: &ReassignmentConfig,
) -> bool {
    let suppression_km = config.suppression_radius_meters / 1000.0;
    distance_km(rider_location, pickup_location) < suppression_km
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use std::collections::HashSet;

    fn rider(id: &str, status: RiderStatus, lat: f64, lng: f64) -> Rider {
        Rider {
            id: id.to_string(),
            status,
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

    fn order(id: &str, priority: Priority, status: OrderStatus, sla_deadline: i64) -> Order {
        Order {
            id: id.to_string(),
            status,
            created_at: 0,
            sla_deadline,
            pickup: Pickup {
                location: Location::new(0.0, 0.0),
                address: "pickup".to_string(),
                store_id: "s".to_string(),
                estimated_pickup_wait_minutes: 2.0,
                window: None,
            },
            delivery: Delivery {
                location: Location::new(0.01, 0.0),
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

    fn assignment(order_id: &str, rider_id: &str) -> Assignment {
        Assignment {
            id: format!("a_{order_id}"),
            order_id: order_id.to_string(),
            rider_id: rider_id.to_string(),
            assigned_at: 0,
            cycle_id: "cycle_0".to_string(),
            cost_breakdown: CostBreakdown {
                time_cost: 0.0,
                sla_risk_cost: 0.0,
                distance_cost: 0.0,
                batch_disruption_cost: 0.0,
                workload_cost: 0.0,
                affinity_cost: 0.0,
                total: 0.0,
            },
            estimated_pickup_at: 5 * 60_000,
            estimated_delivery_at: 15 * 60_000,
            sla_deadline: 60 * 60_000,
            sla_slack_minutes: 45.0,
            reassignment_count: 0,
            status: AssignmentStatus::Dispatched,
            last_reassigned_at: None,
        }
    }

    #[test]
    fn offline_rider_triggers_reassignment() {
        let mut orders = HashMap::new();
        orders.insert("o1".to_string(), order("o1", Priority::Normal, OrderStatus::Assigned, 60 * 60_000));
        let mut riders = HashMap::new();
        riders.insert("r1".to_string(), rider("r1", RiderStatus::Offline, 0.0, 0.0));
        let mut assignments = HashMap::new();
        assignments.insert("o1".to_string(), assignment("o1", "r1"));

        let mut eta_model = EtaModel::with_seed(crate::config::EtaConfig::default(), Some(1));
        let triggers = detect_triggers(
            &orders,
            &riders,
            &assignments,
            0,
            &ReassignmentConfig::default(),
            &mut eta_model,
        );
        assert!(triggers
            .iter()
            .any(|t| t.order_id == "o1" && t.kind == TriggerKind::RiderOffline));
    }

    #[test]
    fn missing_rider_triggers_offline() {
        let mut orders = HashMap::new();
        orders.insert("o1".to_string(), order("o1", Priority::Normal, OrderStatus::Assigned, 60 * 60_000));
        let riders = HashMap::new();
        let mut assignments = HashMap::new();
        assignments.insert("o1".to_string(), assignment("o1", "ghost"));

        let mut eta_model = EtaModel::with_seed(crate::config::EtaConfig::default(), Some(1));
        let triggers = detect_triggers(
            &orders,
            &riders,
            &assignments,
            0,
            &ReassignmentConfig::default(),
            &mut eta_model,
        );
        assert!(triggers
            .iter()
            .any(|t| t.order_id == "o1" && t.kind == TriggerKind::RiderOffline));
    }

    #[test]
    fn can_reassign_respects_attempt_cap_and_interval() {
        let config = ReassignmentConfig::default();
        let mut a = assignment("o1", "r1");
        assert!(can_reassign(&a, 0, &config));

        a.reassignment_count = config.max_reassignment_attempts;
        assert!(!can_reassign(&a, 0, &config));

        a.reassignment_count = 0;
        a.last_reassigned_at = Some(0);
        assert!(!can_reassign(&a, 10_000, &config));
        assert!(can_reassign(&a, 31_000, &config));
    }

    #[test]
    fn suppression_blocks_nearby_riders() {
        let config = ReassignmentConfig::default();
        let close = Location::new(0.0001, 0.0);
        let far = Location::new(0.1, 0.0);
        let pickup = Location::new(0.0, 0.0);
        assert!(is_reassignment_suppressed(close, pickup, &config));
        assert!(!is_reassignment_suppressed(far, pickup, &config));
    }

    #[test]
    fn new_rider_online_is_a_non_fatal_hint() {
        let orders = HashMap::new();
        let mut riders = HashMap::new();
        riders.insert("r1".to_string(), rider("r1", RiderStatus::Active, 0.0, 0.0));
        let assignments = HashMap::new();
        let mut eta_model = EtaModel::with_seed(crate::config::EtaConfig::default(), Some(1));
        let triggers = detect_triggers(
            &orders,
            &riders,
            &assignments,
            0,
            &ReassignmentConfig::default(),
            &mut eta_model,
        );
        assert!(triggers.iter().any(|t| t.kind == TriggerKind::NewRiderOnline));
    }
}
