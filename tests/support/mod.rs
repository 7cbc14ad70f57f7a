//! Shared fixture builders for integration tests, mirroring the plain
//! constructor-function style the teacher uses under its own `tests/support`.

use std::collections::{HashMap, HashSet};

use dispatch_core::model::{
    Delivery, Load, Location, Order, OrderStatus, Payload, Performance, Pickup, Priority, Rider,
    RiderStatus, Shift, Vehicle, VehicleRequirement, VehicleType,
};

pub fn bike(id: &str, lat: f64, lng: f64) -> Rider {
    rider(id, VehicleType::Bike, lat, lng, 20.0, 10)
}

pub fn rider(
    id: &str,
    vehicle_type: VehicleType,
    lat: f64,
    lng: f64,
    max_weight_kg: f64,
    max_items: u32,
) -> Rider {
    Rider {
        id: id.to_string(),
        status: RiderStatus::Active,
        location: Location::new(lat, lng),
        vehicle: Vehicle {
            vehicle_type,
            max_weight_kg,
            max_volume_liters: 50.0,
            max_items,
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

pub fn order(id: &str, sla_minutes: f64, pickup: Location, delivery: Location) -> Order {
    order_with_weight(id, sla_minutes, pickup, delivery, 1.0)
}

pub fn order_with_weight(
    id: &str,
    sla_minutes: f64,
    pickup: Location,
    delivery: Location,
    weight_kg: f64,
) -> Order {
    Order {
        id: id.to_string(),
        status: OrderStatus::PendingAssignment,
        created_at: 0,
        sla_deadline: (sla_minutes * 60_000.0) as i64,
        pickup: Pickup {
            location: pickup,
            address: "pickup".to_string(),
            store_id: "s1".to_string(),
            estimated_pickup_wait_minutes: 2.0,
            window: None,
        },
        delivery: Delivery {
            location: delivery,
            address: "delivery".to_string(),
            customer_id: "c1".to_string(),
            window: None,
        },
        payload: Payload {
            weight_kg,
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

pub fn riders_map(riders: Vec<Rider>) -> HashMap<String, Rider> {
    riders.into_iter().map(|r| (r.id.clone(), r)).collect()
}

pub fn orders_map(orders: Vec<Order>) -> HashMap<String, Order> {
    orders.into_iter().map(|o| (o.id.clone(), o)).collect()
}
