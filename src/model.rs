//! Shared data model: locations, orders, riders, routes and assignments.
//!
//! Orders and riders are held by the engine in two `id -> T` mappings keyed
//! by stable string ids (see [`crate::engine::AssignmentEngine`]); this
//! module defines the entities themselves, free of any engine-owned
//! bookkeeping (caches, counters, history).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A point on the globe in decimal degrees.
///
/// Invariants: `lat` in `[-90, 90]`, `lng` in `[-180, 180]`. Distance between
/// two locations is computed with the great-circle (haversine) formula; see
/// [`crate::geo::distance_km`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Zone bucket key used for affinity scoring and surge preposition
    /// clustering: `zone_{floor(lat/0.5)}_{floor(lng/0.5)}`.
    pub fn zone_key(&self) -> String {
        format!(
            "zone_{}_{}",
            (self.lat / 0.5).floor() as i64,
            (self.lng / 0.5).floor() as i64
        )
    }
}

/// Lifecycle status of an order.
///
/// `pending_assignment -> assigned -> picked_up -> delivered`, with side
/// branches to `cancelled`. Only `pending_assignment` orders enter a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingAssignment,
    Assigned,
    PickedUp,
    Delivered,
    Cancelled,
}

/// Vehicle requirement an order's payload imposes on a candidate rider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleRequirement {
    Any,
    Bike,
    Car,
    Van,
    Refrigerated,
}

/// Order priority; affects reassignment trigger eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    High,
    Critical,
}

/// An optional open/close service window (unix millis).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub open_at: i64,
    pub close_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pickup {
    pub location: Location,
    pub address: String,
    pub store_id: String,
    pub estimated_pickup_wait_minutes: f64,
    pub window: Option<TimeWindow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Delivery {
    pub location: Location,
    pub address: String,
    pub customer_id: String,
    pub window: Option<TimeWindow>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Payload {
    pub weight_kg: f64,
    pub volume_liters: f64,
    pub item_count: u32,
    pub requires_cold_chain: bool,
    pub fragile: bool,
    pub vehicle_requirement: VehicleRequirement,
}

/// A delivery order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub status: OrderStatus,
    /// Unix millis the order was created.
    pub created_at: i64,
    /// Unix millis the order's SLA deadline expires.
    pub sla_deadline: i64,
    pub pickup: Pickup,
    pub delivery: Delivery,
    pub payload: Payload,
    pub priority: Priority,
    pub assignment_attempts: u32,
    pub assigned_rider_id: Option<String>,
}

impl Order {
    /// Minutes remaining until `sla_deadline`, relative to `now` (unix millis).
    pub fn sla_minutes_remaining(&self, now: i64) -> f64 {
        (self.sla_deadline - now) as f64 / 60_000.0
    }
}

/// Rider operating status. Riders with status `offline` or `break` are
/// excluded from candidacy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiderStatus {
    Active,
    OnDelivery,
    Break,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Bike,
    Car,
    Van,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleCapability {
    Standard,
    Fragile,
    ColdChain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub vehicle_type: VehicleType,
    pub max_weight_kg: f64,
    pub max_volume_liters: f64,
    pub max_items: u32,
    pub capabilities: HashSet<VehicleCapability>,
}

impl Vehicle {
    pub fn has_capability(&self, cap: VehicleCapability) -> bool {
        self.capabilities.contains(&cap)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Shift {
    /// Unix millis.
    pub start_time: i64,
    /// Unix millis.
    pub end_time: i64,
    pub continuous_driving_minutes: f64,
    pub total_shift_driving_minutes: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Load {
    pub weight_kg: f64,
    pub volume_liters: f64,
    pub item_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Performance {
    /// zone key -> familiarity score in [0, 1].
    pub zone_familiarity_scores: std::collections::HashMap<String, f64>,
    pub avg_delivery_success_rate: f64,
    pub avg_speed_multiplier: f64,
    pub total_deliveries: u64,
}

impl Default for Performance {
    fn default() -> Self {
        Self {
            zone_familiarity_scores: std::collections::HashMap::new(),
            avg_delivery_success_rate: 0.9,
            avg_speed_multiplier: 1.0,
            total_deliveries: 0,
        }
    }
}

impl Performance {
    pub fn zone_familiarity(&self, zone_key: &str) -> f64 {
        *self.zone_familiarity_scores.get(zone_key).unwrap_or(&0.0)
    }
}

/// One stop (pickup or delivery) in a rider's route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopType {
    Pickup,
    Delivery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteStop {
    pub stop_type: StopType,
    pub order_id: String,
    pub location: Location,
    pub sequence_index: usize,
    /// Unix millis, if estimated.
    pub estimated_arrival: Option<i64>,
    /// Unix millis, if estimated.
    pub estimated_departure: Option<i64>,
}

/// A delivery rider (and their vehicle, shift, load and performance state).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    pub id: String,
    pub status: RiderStatus,
    pub location: Location,
    pub vehicle: Vehicle,
    pub shift: Shift,
    pub load: Load,
    pub performance: Performance,
    /// Order ids in assignment order; position is the stop's `sequence_index`.
    pub current_assignments: Vec<String>,
    pub current_route: Vec<RouteStop>,
}

impl Rider {
    pub fn is_candidate_eligible(&self) -> bool {
        matches!(self.status, RiderStatus::Active | RiderStatus::OnDelivery)
    }

    pub fn remaining_weight_kg(&self) -> f64 {
        (self.vehicle.max_weight_kg - self.load.weight_kg).max(0.0)
    }

    pub fn remaining_volume_liters(&self) -> f64 {
        (self.vehicle.max_volume_liters - self.load.volume_liters).max(0.0)
    }

    pub fn remaining_items(&self) -> u32 {
        self.vehicle.max_items.saturating_sub(self.load.item_count)
    }
}

/// Status of a dispatched assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Dispatched,
    Accepted,
    Rejected,
    Reassigned,
    Completed,
}

/// A breakdown of the six weighted scoring factors for one (order, rider)
/// pairing, plus the weighted total.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub time_cost: f64,
    pub sla_risk_cost: f64,
    pub distance_cost: f64,
    pub batch_disruption_cost: f64,
    pub workload_cost: f64,
    pub affinity_cost: f64,
    pub total: f64,
}

/// A live assignment of an order to a rider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: String,
    pub order_id: String,
    pub rider_id: String,
    /// Unix millis.
    pub assigned_at: i64,
    pub cycle_id: String,
    pub cost_breakdown: CostBreakdown,
    /// Unix millis.
    pub estimated_pickup_at: i64,
    /// Unix millis.
    pub estimated_delivery_at: i64,
    /// Unix millis.
    pub sla_deadline: i64,
    pub sla_slack_minutes: f64,
    pub reassignment_count: u32,
    pub status: AssignmentStatus,
    /// Unix millis of the last reassignment, if any; used for the 30s guard.
    pub last_reassigned_at: Option<i64>,
}

/// Demand/supply classification recomputed at the start of every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurgeLevel {
    Normal,
    SoftSurge,
    HardSurge,
    Crisis,
}

/// Opaque, stable recommended-action token (see spec §6).
pub type ActionToken = &'static str;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurgeState {
    pub level: SurgeLevel,
    pub demand_supply_ratio: f64,
    pub pending_order_count: usize,
    pub available_capacity: f64,
    pub recommended_actions: Vec<ActionToken>,
}

/// One emitted assignment decision for a cycle result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentDecision {
    pub order_id: String,
    pub rider_id: String,
    pub sequence_index: usize,
    pub cost: f64,
}
