//! Scorer (C4): six-factor weighted cost for one (order, rider) pairing.
//!
//! The affinity and reposition-style factors generalize the teacher's
//! `matching::policy::score_driver_for_rider` (pickup time cost, reposition
//! cost, imbalance penalty, hotspot bonus) into the spec's six named,
//! independently weighted factors.

use crate::config::{ScoringWeights, SlaConfig};
use crate::eta::EtaModel;
use crate::geo::distance_km;
use crate::model::{CostBreakdown, Order, Rider};

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + x.exp())
}

/// Minimum-detour insertion cost (km, plus a fixed per-insertion minute
/// penalty) of adding `pickup` into `rider`'s current ordered route.
/// Returns `None` if the rider's route has fewer than two stops.
fn insertion_cost(rider: &Rider, pickup: crate::model::Location) -> Option<f64> {
    let route = &rider.current_route;
    if route.len() < 2 {
        return None;
    }
    let mut best: Option<f64> = None;
    for window in route.windows(2) {
        let prev = window[0].location;
        let next = window[1].location;
        let detour = distance_km(prev, pickup) + distance_km(pickup, next) - distance_km(prev, next);
        let cost = detour + 10.0;
        best = Some(best.map_or(cost, |b: f64| b.min(cost)));
    }
    best
}

/// Score one (order, rider) pairing: six independently-weighted factors
/// summed into a total cost (lower is better; affinity is the one signed,
/// reward-shaped factor).
pub fn score_assignment(
    order: &Order,
    rider: &Rider,
    now_ms: i64,
    weights: &ScoringWeights,
    sla: &SlaConfig,
    eta_model: &mut EtaModel,
) -> CostBreakdown {
    // 1. Time cost.
    let time_cost = if rider.current_assignments.is_empty() {
        let eta_pickup = eta_model
            .estimate_eta(rider.location, order.pickup.location, now_ms, Some(&rider.id), None)
            .estimated_duration_minutes;
        let eta_delivery = eta_model
            .estimate_eta(
                order.pickup.location,
                order.delivery.location,
                now_ms,
                Some(&rider.id),
                None,
            )
            .estimated_duration_minutes;
        ((eta_pickup + eta_delivery) / 120.0).clamp(0.0, 1.0)
    } else {
        let cost = insertion_cost(rider, order.pickup.location).unwrap_or_else(|| {
            distance_km(rider.location, order.pickup.location) + 10.0
        });
        (cost / 60.0).clamp(0.0, 1.0)
    };

    // 2. SLA-risk cost.
    let eta_to_delivery = eta_model
        .estimate_eta(
            rider.location,
            order.delivery.location,
            now_ms,
            Some(&rider.id),
            None,
        )
        .estimated_duration_minutes;
    let slack_minutes =
        (order.sla_deadline - now_ms) as f64 / 60_000.0 - eta_to_delivery;
    let sla_risk_cost = sigmoid(slack_minutes / sla.sla_risk_sigmoid_scale).clamp(0.0, 1.0);

    // 3. Distance cost.
    let distance_cost =
        (distance_km(rider.location, order.pickup.location) / 20.0).clamp(0.0, 1.0);

    // 4. Batch disruption cost.
    let batch_disruption_cost = if rider.current_route.is_empty() {
        0.0
    } else {
        (rider.current_assignments.len() as f64 * 0.2).min(1.0)
    };

    // 5. Workload imbalance cost.
    let load_score = 0.7 * (rider.load.weight_kg / rider.vehicle.max_weight_kg.max(1e-9))
        + 0.3 * (rider.load.item_count as f64 / rider.vehicle.max_items.max(1) as f64);
    let workload_cost = if load_score < 0.7 {
        0.0
    } else {
        ((load_score - 0.7) / 0.3).min(1.0)
    };

    // 6. Affinity cost (signed reward).
    let zone_key = order.pickup.location.zone_key();
    let affinity = 0.5 * rider.performance.zone_familiarity(&zone_key)
        + 0.3 * rider.performance.avg_delivery_success_rate
        + 0.2 * (rider.performance.avg_speed_multiplier - 0.9).max(0.0);
    let affinity_cost = -affinity;

    let total = weights.w1_time * time_cost
        + weights.w2_sla_risk * sla_risk_cost
        + weights.w3_distance * distance_cost
        + weights.w4_batch_disruption * batch_disruption_cost
        + weights.w5_workload * workload_cost
        + weights.w6_affinity * affinity_cost;

    CostBreakdown {
        time_cost,
        sla_risk_cost,
        distance_cost,
        batch_disruption_cost,
        workload_cost,
        affinity_cost,
        total,
    }
}
