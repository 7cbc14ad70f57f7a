//! Batch optimizer (C5): cheapest-insertion construction followed by 2-opt
//! improvement over a rider's pickup sequence, capacity-checked against the
//! vehicle.
//!
//! No direct teacher precedent exists for route sequencing (the teacher's
//! simulation assigns one trip per rider at a time); the construction/
//! improvement split follows the general insertion-heuristic shape
//! documented in the VRP reference material under `other_examples/` while
//! using this crate's own [`crate::geo::distance_km`] and the teacher's
//! plain-struct, capacity-checked-before-build idiom.

use crate::config::BatchingConfig;
use crate::geo::distance_km;
use crate::model::{Order, Rider, RouteStop, StopType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchRejection {
    TooManyOrders { count: usize, max: usize },
    CapacityExceeded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchResult {
    pub stops: Vec<RouteStop>,
    pub total_distance_km: f64,
    pub total_duration_minutes: f64,
    pub orders_sequence: Vec<String>,
}

fn aggregate_payload_fits(rider: &Rider, orders: &[&Order]) -> bool {
    let total_weight: f64 = orders.iter().map(|o| o.payload.weight_kg).sum();
    let total_volume: f64 = orders.iter().map(|o| o.payload.volume_liters).sum();
    let total_items: u32 = orders.iter().map(|o| o.payload.item_count).sum();
    total_weight <= rider.remaining_weight_kg()
        && total_volume <= rider.remaining_volume_liters()
        && total_items <= rider.remaining_items()
}

/// Total pickup-to-pickup route distance (km) for a given order-id sequence.
fn sequence_distance_km(rider: &Rider, orders_by_id: &[&Order], sequence: &[usize]) -> f64 {
    let mut total = 0.0;
    let mut prev = rider.location;
    for &idx in sequence {
        let pickup = orders_by_id[idx].pickup.location;
        total += distance_km(prev, pickup);
        prev = pickup;
    }
    total
}

/// Build the sequence of pickups via cheapest insertion, then improve with
/// 2-opt, and emit the paired pickup/delivery stop list.
pub fn optimize_batch(
    rider: &Rider,
    orders: &[Order],
    config: &BatchingConfig,
) -> Result<BatchResult, BatchRejection> {
    let max_batch = config.max_for(rider.vehicle.vehicle_type);
    if orders.len() > max_batch {
        return Err(BatchRejection::TooManyOrders {
            count: orders.len(),
            max: max_batch,
        });
    }

    let refs: Vec<&Order> = orders.iter().collect();
    if !aggregate_payload_fits(rider, &refs) {
        return Err(BatchRejection::CapacityExceeded);
    }

    if orders.is_empty() {
        return Ok(BatchResult {
            stops: Vec::new(),
            total_distance_km: 0.0,
            total_duration_minutes: 0.0,
            orders_sequence: Vec::new(),
        });
    }

    // 1. Seed with the order whose pickup is nearest the rider.
    let mut remaining: Vec<usize> = (0..orders.len()).collect();
    let seed_idx = remaining
        .iter()
        .copied()
        .min_by(|&a, &b| {
            distance_km(rider.location, orders[a].pickup.location)
                .partial_cmp(&distance_km(rider.location, orders[b].pickup.location))
                .unwrap()
        })
        .unwrap();
    remaining.retain(|&i| i != seed_idx);
    let mut sequence = vec![seed_idx];

    // 2. Cheapest insertion for the rest.
    while !remaining.is_empty() {
        let mut best: Option<(usize, usize, f64)> = None; // (remaining index, insert position, detour)
        for (ri, &order_idx) in remaining.iter().enumerate() {
            let pickup = orders[order_idx].pickup.location;
            for pos in 0..=sequence.len() {
                let prev_loc = if pos == 0 {
                    rider.location
                } else {
                    orders[sequence[pos - 1]].pickup.location
                };
                let next_loc = sequence.get(pos).map(|&idx| orders[idx].pickup.location);
                let detour = match next_loc {
                    Some(next_loc) => {
                        distance_km(prev_loc, pickup) + distance_km(pickup, next_loc)
                            - distance_km(prev_loc, next_loc)
                    }
                    None => distance_km(prev_loc, pickup),
                };
                if best.is_none() || detour < best.unwrap().2 {
                    best = Some((ri, pos, detour));
                }
            }
        }
        let (ri, pos, _) = best.unwrap();
        let order_idx = remaining.remove(ri);
        sequence.insert(pos, order_idx);
    }

    // 3. 2-opt improvement.
    let mut iterations = 0;
    loop {
        if iterations >= config.two_opt_iteration_limit {
            break;
        }
        let mut improved = false;
        let current_distance = sequence_distance_km(rider, &refs, &sequence);
        'outer: for i in 0..sequence.len() {
            for j in (i + 2)..sequence.len() {
                let mut candidate = sequence.clone();
                candidate[i + 1..=j].reverse();
                let candidate_distance = sequence_distance_km(rider, &refs, &candidate);
                iterations += 1;
                if candidate_distance + 1e-9 < current_distance {
                    sequence = candidate;
                    improved = true;
                    break 'outer;
                }
                if iterations >= config.two_opt_iteration_limit {
                    break 'outer;
                }
            }
        }
        if !improved {
            break;
        }
    }

    // 4. Build the paired pickup/delivery stop list with real coordinates.
    let mut stops = Vec::with_capacity(sequence.len() * 2);
    let mut total_duration_minutes = 0.0;
    for (seq_idx, &order_idx) in sequence.iter().enumerate() {
        let order = orders[order_idx];
        if seq_idx > 0 {
            total_duration_minutes += 10.0; // inter-order hop
        }
        total_duration_minutes += order.pickup.estimated_pickup_wait_minutes + 10.0 + 3.0;

        stops.push(RouteStop {
            stop_type: StopType::Pickup,
            order_id: order.id.clone(),
            location: order.pickup.location,
            sequence_index: seq_idx * 2,
            estimated_arrival: None,
            estimated_departure: None,
        });
        stops.push(RouteStop {
            stop_type: StopType::Delivery,
            order_id: order.id.clone(),
            location: order.delivery.location,
            sequence_index: seq_idx * 2 + 1,
            estimated_arrival: None,
            estimated_departure: None,
        });
    }

    let total_distance_km = sequence_distance_km(rider, &refs, &sequence);
    let orders_sequence = sequence.iter().map(|&idx| orders[idx].id.clone()).collect();

    Ok(BatchResult {
        stops,
        total_distance_km,
        total_duration_minutes,
        orders_sequence,
    })
}
