//! Cycle orchestrator (C9): ties candidate generation, scoring,
//! optimization, surge detection and reassignment into one atomic
//! `execute_cycle` step.
//!
//! The owning-two-HashMaps-plus-history shape generalizes the teacher's
//! `Simulation` struct (which owns its ECS `World` and a `SimulationClock`
//! tick counter); here cycles replace ticks and plain `HashMap<String, T>`
//! replaces the ECS world, per this crate's data-model decision (see
//! the top-level design notes). `execute_cycle` takes `&mut self`, so the
//! borrow checker rules out concurrent cycles on one engine outright.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::candidates::{generate_candidates, CandidateResult};
use crate::config::{CandidateConfig, EngineConfig, ScoringWeights};
use crate::eta::EtaModel;
use crate::model::{
    Assignment, AssignmentDecision, AssignmentStatus, Order, OrderStatus, Rider, RiderStatus,
    SurgeLevel, SurgeState,
};
use crate::optimizer::{AdaptiveOptimizer, CostMatrix, GreedySolver, CostSolver};
use crate::reassignment::{can_reassign, detect_triggers, is_reassignment_suppressed, TriggerKind};
use crate::scoring::score_assignment;
use crate::surge::{apply_surge_weight_modifiers, detect_surge, radius_multiplier};
use crate::telemetry::{CycleMetrics, EngineMetrics, ReassignmentStats};

/// Result of one `execute_cycle` invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentCycleResult {
    pub cycle_id: String,
    pub timestamp: i64,
    pub decisions: Vec<AssignmentDecision>,
    pub success_count: usize,
    pub failure_count: usize,
    pub metrics: CycleMetrics,
}

/// Read-only snapshot of engine state, returned by `get_state`.
#[derive(Debug, Clone, Copy)]
pub struct AssignmentEngineState<'a> {
    pub orders: &'a HashMap<String, Order>,
    pub riders: &'a HashMap<String, Rider>,
    pub assignments: &'a HashMap<String, Assignment>,
}

/// Owns orders, riders and live assignments; drives cycles over them.
pub struct AssignmentEngine {
    config: EngineConfig,
    orders: HashMap<String, Order>,
    riders: HashMap<String, Rider>,
    /// Keyed by order id; the latest (possibly reassigned) assignment.
    assignments: HashMap<String, Assignment>,
    eta_model: EtaModel,
    cycle_counter: u64,
    cycle_history: Vec<AssignmentCycleResult>,
    reassignment_stats: ReassignmentStats,
    total_assignments_ever: u64,
    last_surge_state: Option<SurgeState>,
}

impl AssignmentEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_seed(config, None)
    }

    pub fn with_seed(config: EngineConfig, eta_seed: Option<u64>) -> Self {
        let eta_model = EtaModel::with_seed(config.eta.clone(), eta_seed);
        Self {
            config,
            orders: HashMap::new(),
            riders: HashMap::new(),
            assignments: HashMap::new(),
            eta_model,
            cycle_counter: 0,
            cycle_history: Vec::new(),
            reassignment_stats: ReassignmentStats::default(),
            total_assignments_ever: 0,
            last_surge_state: None,
        }
    }

    /// Replace the engine's view of orders and riders. Callers hand
    /// ownership of the passed mappings to the engine for the duration of
    /// the next cycle.
    pub fn update_state(&mut self, orders: HashMap<String, Order>, riders: HashMap<String, Rider>) {
        self.orders = orders;
        self.riders = riders;
    }

    pub fn get_state(&self) -> AssignmentEngineState<'_> {
        AssignmentEngineState {
            orders: &self.orders,
            riders: &self.riders,
            assignments: &self.assignments,
        }
    }

    pub fn get_metrics(&self) -> EngineMetrics {
        EngineMetrics {
            cycle_count: self.cycle_counter,
            last_cycle_id: self.cycle_history.last().map(|c| c.cycle_id.clone()),
            surge_state: self.last_surge_state.clone(),
            reassignment_stats: self.reassignment_stats,
            total_assignments: self.total_assignments_ever,
            eta_cache_stats: self.eta_model.cache_stats(),
        }
    }

    fn active_batch_capacity(&self) -> u32 {
        self.riders
            .values()
            .map(|r| r.vehicle.max_items)
            .max()
            .unwrap_or(0)
    }

    fn adjusted_candidate_config(&self, level: SurgeLevel) -> CandidateConfig {
        let multiplier = radius_multiplier(level, &self.config.surge);
        let base = self.config.candidates;
        CandidateConfig {
            initial_radius_km: base.initial_radius_km * multiplier,
            expanded_radius_km: base.expanded_radius_km * multiplier,
            max_radius_km: base.max_radius_km * multiplier,
            radius_expansion_minutes_threshold: base.radius_expansion_minutes_threshold,
        }
    }

    /// Run one full assignment cycle. `now_ms` is the unix-millis instant
    /// the whole cycle (ETA model included) treats as "now".
    pub fn execute_cycle(&mut self, now_ms: i64) -> AssignmentCycleResult {
        // 1. Cycle id.
        let cycle_id = format!("cycle_{now_ms}_{}", self.cycle_counter);
        self.cycle_counter += 1;

        // 2. Surge state.
        let available_riders = self
            .riders
            .values()
            .filter(|r| r.is_candidate_eligible())
            .count();
        let pending_count = self
            .orders
            .values()
            .filter(|o| o.status == OrderStatus::PendingAssignment)
            .count();
        let surge_state = detect_surge(
            pending_count,
            available_riders,
            self.active_batch_capacity(),
            &self.config.surge,
        );
        debug!(cycle_id = %cycle_id, level = ?surge_state.level, ratio = surge_state.demand_supply_ratio, "surge state computed");
        self.last_surge_state = Some(surge_state.clone());

        // 3. Select pending orders.
        let pending_order_ids: Vec<String> = self
            .orders
            .iter()
            .filter(|(_, o)| o.status == OrderStatus::PendingAssignment)
            .map(|(id, _)| id.clone())
            .collect();

        if pending_order_ids.is_empty() {
            let result = AssignmentCycleResult {
                cycle_id,
                timestamp: now_ms,
                decisions: Vec::new(),
                success_count: 0,
                failure_count: 0,
                metrics: CycleMetrics {
                    avg_cost: 0.0,
                    total_sla_slack_minutes: 0.0,
                    rider_utilization: self.rider_utilization(),
                },
            };
            self.cycle_history.push(result.clone());
            return result;
        }

        // 4. Candidate generation, per pending order.
        let candidate_config = self.adjusted_candidate_config(surge_state.level);
        let candidate_results: HashMap<String, CandidateResult> = pending_order_ids
            .iter()
            .map(|order_id| {
                let order = &self.orders[order_id];
                let result = generate_candidates(
                    order,
                    &self.riders,
                    now_ms,
                    &candidate_config,
                    &self.config.fatigue,
                    self.config.avg_speed_kmh,
                );
                (order_id.clone(), result)
            })
            .collect();

        // 5. Score every (order, candidate) pair.
        let mut weights = self.config.weights;
        apply_surge_weight_modifiers(surge_state.level, &mut weights, &self.config.surge);

        let mut rider_ids: Vec<String> = Vec::new();
        let mut seen_riders = std::collections::HashSet::new();
        for result in candidate_results.values() {
            for rider_id in &result.candidate_rider_ids {
                if seen_riders.insert(rider_id.clone()) {
                    rider_ids.push(rider_id.clone());
                }
            }
        }

        let mut matrix = CostMatrix::new(pending_order_ids.clone(), rider_ids.clone());
        let mut pair_costs: HashMap<(String, String), crate::model::CostBreakdown> = HashMap::new();
        for (order_idx, order_id) in pending_order_ids.iter().enumerate() {
            let order = &self.orders[order_id];
            let Some(result) = candidate_results.get(order_id) else {
                continue;
            };
            for rider_id in &result.candidate_rider_ids {
                let rider = &self.riders[rider_id];
                let breakdown = score_assignment(
                    order,
                    rider,
                    now_ms,
                    &weights,
                    &self.config.sla,
                    &mut self.eta_model,
                );
                let Some(rider_idx) = rider_ids.iter().position(|id| id == rider_id) else {
                    continue;
                };
                matrix.set_cost(order_idx, rider_idx, breakdown.total);
                pair_costs.insert((order_id.clone(), rider_id.clone()), breakdown);
            }
        }

        // 6. Solve.
        let adaptive = AdaptiveOptimizer::new(
            self.config.cycle.hungarian_threshold,
            self.config.cycle.optimizer_timeout_seconds,
        );
        let solve_result = if crate::surge::should_use_greedy_solver(surge_state.level) {
            warn!(cycle_id = %cycle_id, "crisis surge: forcing greedy solver");
            GreedySolver.solve(&matrix)
        } else {
            adaptive.solve(&matrix)
        };

        // 7. Apply assignments.
        let mut decisions = Vec::with_capacity(solve_result.assignments.len());
        let mut total_sla_slack_minutes = 0.0;
        for (order_id, rider_id) in &solve_result.assignments {
            let breakdown = pair_costs
                .get(&(order_id.clone(), rider_id.clone()))
                .copied()
                .unwrap_or(crate::model::CostBreakdown {
                    time_cost: 0.0,
                    sla_risk_cost: 0.0,
                    distance_cost: 0.0,
                    batch_disruption_cost: 0.0,
                    workload_cost: 0.0,
                    affinity_cost: 0.0,
                    total: 0.0,
                });
            let cost = breakdown.total;

            let (pickup_eta, delivery_eta) = {
                let rider = &self.riders[rider_id];
                let order = &self.orders[order_id];
                let pickup_eta = self
                    .eta_model
                    .estimate_eta(rider.location, order.pickup.location, now_ms, Some(rider_id), None)
                    .estimated_duration_minutes;
                let delivery_eta = self
                    .eta_model
                    .estimate_eta(
                        order.pickup.location,
                        order.delivery.location,
                        now_ms,
                        Some(rider_id),
                        None,
                    )
                    .estimated_duration_minutes;
                (pickup_eta, delivery_eta)
            };

            let sequence_index = {
                let rider = self.riders.get_mut(rider_id).expect("candidate rider must exist");
                let sequence_index = rider.current_assignments.len();
                rider.current_assignments.push(order_id.clone());
                sequence_index
            };

            let estimated_pickup_at = now_ms + (pickup_eta * 60_000.0).round() as i64;
            let estimated_delivery_at =
                now_ms + ((pickup_eta + delivery_eta) * 60_000.0).round() as i64;

            let sla_slack_minutes = {
                let order = &self.orders[order_id];
                order.sla_minutes_remaining(now_ms) - (pickup_eta + delivery_eta)
            };
            total_sla_slack_minutes += sla_slack_minutes;

            let (prior_reassignment_count, prior_last_reassigned_at) = self
                .assignments
                .get(order_id)
                .map(|a| (a.reassignment_count, a.last_reassigned_at))
                .unwrap_or((0, None));

            let sla_deadline = {
                let order = &self.orders[order_id];
                order.sla_deadline
            };

            self.assignments.insert(
                order_id.clone(),
                Assignment {
                    id: format!("assignment_{order_id}_{rider_id}_{now_ms}"),
                    order_id: order_id.clone(),
                    rider_id: rider_id.clone(),
                    assigned_at: now_ms,
                    cycle_id: cycle_id.clone(),
                    cost_breakdown: breakdown,
                    estimated_pickup_at,
                    estimated_delivery_at,
                    sla_deadline,
                    sla_slack_minutes,
                    reassignment_count: prior_reassignment_count,
                    status: AssignmentStatus::Dispatched,
                    last_reassigned_at: prior_last_reassigned_at,
                },
            );
            self.total_assignments_ever += 1;

            {
                let order = self.orders.get_mut(order_id).expect("order must exist");
                order.status = OrderStatus::Assigned;
                order.assigned_rider_id = Some(rider_id.clone());
                order.assignment_attempts += 1;
            }

            decisions.push(AssignmentDecision {
                order_id: order_id.clone(),
                rider_id: rider_id.clone(),
                sequence_index,
                cost,
            });
        }

        let success_count = decisions.len();
        let failure_count = pending_order_ids.len() - success_count;

        // 8. Reassignment triggers.
        let triggers = detect_triggers(
            &self.orders,
            &self.riders,
            &self.assignments,
            now_ms,
            &self.config.reassignment,
            &mut self.eta_model,
        );
        self.reassignment_stats.triggers_detected += triggers.len() as u64;
        for trigger in &triggers {
            if trigger.kind == TriggerKind::NewRiderOnline || trigger.order_id.is_empty() {
                continue;
            }
            let Some(assignment) = self.assignments.get(&trigger.order_id) else {
                continue;
            };
            if !can_reassign(assignment, now_ms, &self.config.reassignment) {
                self.reassignment_stats.denied_by_cap_or_interval += 1;
                continue;
            }
            if trigger.kind != TriggerKind::RiderOffline {
                let Some(rider) = self.riders.get(&assignment.rider_id) else {
                    continue;
                };
                let Some(order) = self.orders.get(&trigger.order_id) else {
                    continue;
                };
                if is_reassignment_suppressed(
                    rider.location,
                    order.pickup.location,
                    &self.config.reassignment,
                ) {
                    self.reassignment_stats.denied_by_suppression += 1;
                    continue;
                }
            }

            let rider_id = assignment.rider_id.clone();
            if let Some(assignment) = self.assignments.get_mut(&trigger.order_id) {
                assignment.reassignment_count += 1;
                assignment.last_reassigned_at = Some(now_ms);
                assignment.status = AssignmentStatus::Reassigned;
            }
            if let Some(order) = self.orders.get_mut(&trigger.order_id) {
                order.status = OrderStatus::PendingAssignment;
                order.assigned_rider_id = None;
            }
            if let Some(rider) = self.riders.get_mut(&rider_id) {
                rider.current_assignments.retain(|id| id != &trigger.order_id);
            }
            self.reassignment_stats.applied += 1;
            info!(order_id = %trigger.order_id, kind = ?trigger.kind, "reassignment applied");
        }

        // 9. Aggregate metrics.
        let avg_cost = if success_count > 0 {
            decisions.iter().map(|d| d.cost).sum::<f64>() / success_count as f64
        } else {
            0.0
        };

        let result = AssignmentCycleResult {
            cycle_id,
            timestamp: now_ms,
            decisions,
            success_count,
            failure_count,
            metrics: CycleMetrics {
                avg_cost,
                total_sla_slack_minutes,
                rider_utilization: self.rider_utilization(),
            },
        };

        // 10. History.
        self.cycle_history.push(result.clone());
        result
    }

    fn rider_utilization(&self) -> HashMap<String, f64> {
        self.riders
            .iter()
            .map(|(id, rider)| {
                let ratio = if rider.vehicle.max_items == 0 {
                    0.0
                } else {
                    rider.load.item_count as f64 / rider.vehicle.max_items as f64
                };
                (id.clone(), ratio)
            })
            .collect()
    }

    pub fn cycle_history(&self) -> &[AssignmentCycleResult] {
        &self.cycle_history
    }
}

/// Riders eligible for preposition targeting: active and idle (no current
/// assignments).
pub fn idle_riders(riders: &HashMap<String, Rider>) -> Vec<&Rider> {
    riders
        .values()
        .filter(|r| r.status == RiderStatus::Active && r.current_assignments.is_empty())
        .collect()
}

/// Pending-order refs convenience used by the surge handler's preposition
/// clustering, which takes borrowed slices rather than owned maps.
pub fn pending_order_refs(orders: &HashMap<String, Order>) -> Vec<&Order> {
    orders
        .values()
        .filter(|o| o.status == OrderStatus::PendingAssignment)
        .collect()
}
