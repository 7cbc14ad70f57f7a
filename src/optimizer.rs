//! Assignment optimizer (C6): size-adaptive bipartite minimum-cost matching
//! over a dense cost matrix.
//!
//! The exact solver is a direct generalization of the teacher's
//! `matching::hungarian::HungarianMatching`: the same `I64Weights` adapter
//! over `pathfinding::kuhn_munkres` (which performs maximum-weight
//! assignment), driven here by a cost matrix scored across the whole
//! pending-order population rather than one driver score per rider. The
//! `MatchingAlgorithm` trait's "one capability, pluggable strategies"
//! shape (see `matching::algorithm`) is carried forward as [`CostSolver`].

use std::collections::HashMap;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use pathfinding::kuhn_munkres::{kuhn_munkres, Weights};

/// Sentinel cost marking an infeasible (order, rider) pair in a dense cost
/// matrix. Any value at or above this is treated as "not assignable".
pub const SENTINEL_COST: f64 = 1e10;

/// Scale factor converting f64 costs to the i64 weights `kuhn_munkres`
/// expects, matching the teacher's `HungarianMatching::score_to_weight`.
const SCALE: f64 = 1_000_000.0;

/// Dense cost matrix: `costs[i][j]` is the scorer cost of `(orders[i],
/// riders[j])`, or >= [`SENTINEL_COST`] if the pair is infeasible.
#[derive(Debug, Clone)]
pub struct CostMatrix {
    pub orders: Vec<String>,
    pub riders: Vec<String>,
    pub costs: Vec<Vec<f64>>,
}

impl CostMatrix {
    pub fn new(orders: Vec<String>, riders: Vec<String>) -> Self {
        let costs = vec![vec![SENTINEL_COST; riders.len()]; orders.len()];
        Self {
            orders,
            riders,
            costs,
        }
    }

    pub fn set_cost(&mut self, order_idx: usize, rider_idx: usize, cost: f64) {
        self.costs[order_idx][rider_idx] = cost;
    }

    pub fn problem_size(&self) -> usize {
        self.orders.len() * self.riders.len()
    }
}

/// Which of the three strategies produced a [`SolveResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Exact,
    Auction,
    Greedy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveResult {
    /// order id -> rider id.
    pub assignments: HashMap<String, String>,
    pub total_cost: f64,
    pub algorithm: Algorithm,
}

/// One cost-minimizing bipartite matching strategy.
pub trait CostSolver {
    fn solve(&self, matrix: &CostMatrix) -> SolveResult;
}

fn cost_to_weight(cost: f64) -> i64 {
    let w = (-cost * SCALE).round();
    if w >= i64::MAX as f64 {
        i64::MAX
    } else if w <= i64::MIN as f64 {
        i64::MIN
    } else {
        w as i64
    }
}

struct I64Weights(Vec<Vec<i64>>);

impl Weights<i64> for I64Weights {
    fn rows(&self) -> usize {
        self.0.len()
    }

    fn columns(&self) -> usize {
        self.0.first().map_or(0, |r| r.len())
    }

    fn at(&self, row: usize, col: usize) -> i64 {
        self.0[row][col]
    }

    fn neg(&self) -> Self {
        I64Weights(
            self.0
                .iter()
                .map(|r| r.iter().map(|&x| x.saturating_neg()).collect())
                .collect(),
        )
    }
}

/// Exact O(n^3) bipartite minimum-cost matching (Hungarian / Kuhn-Munkres
/// with potentials). Pads the matrix to a square of side `max(n, m)` with
/// the sentinel cost and discards padded pairs from the result.
#[derive(Debug, Default)]
pub struct ExactSolver;

impl CostSolver for ExactSolver {
    fn solve(&self, matrix: &CostMatrix) -> SolveResult {
        let n = matrix.orders.len();
        let m = matrix.riders.len();
        if n == 0 || m == 0 {
            return SolveResult {
                assignments: HashMap::new(),
                total_cost: 0.0,
                algorithm: Algorithm::Exact,
            };
        }
        let side = n.max(m);
        let mut weights = vec![vec![cost_to_weight(SENTINEL_COST); side]; side];
        for i in 0..n {
            for j in 0..m {
                weights[i][j] = cost_to_weight(matrix.costs[i][j]);
            }
        }
        let (_total_weight, assignment) = kuhn_munkres(&I64Weights(weights));

        let mut assignments = HashMap::new();
        let mut total_cost = 0.0;
        for (order_idx, &rider_idx) in assignment.iter().enumerate() {
            if order_idx < n && rider_idx < m && matrix.costs[order_idx][rider_idx] < SENTINEL_COST
            {
                assignments.insert(
                    matrix.orders[order_idx].clone(),
                    matrix.riders[rider_idx].clone(),
                );
                total_cost += matrix.costs[order_idx][rider_idx];
            }
        }

        SolveResult {
            assignments,
            total_cost,
            algorithm: Algorithm::Exact,
        }
    }
}

/// Auction algorithm (Bertsekas): approximate minimum-cost assignment with
/// an epsilon-scaling bidding process. Converges within `max_iterations`;
/// returns whichever assignments it has settled on.
#[derive(Debug, Clone)]
pub struct AuctionSolver {
    pub epsilon: f64,
    pub max_iterations: usize,
}

impl Default for AuctionSolver {
    fn default() -> Self {
        Self {
            epsilon: 0.01,
            max_iterations: 1000,
        }
    }
}

impl CostSolver for AuctionSolver {
    fn solve(&self, matrix: &CostMatrix) -> SolveResult {
        let n = matrix.orders.len();
        let m = matrix.riders.len();
        if n == 0 || m == 0 {
            return SolveResult {
                assignments: HashMap::new(),
                total_cost: 0.0,
                algorithm: Algorithm::Auction,
            };
        }

        // Work in "value" space (higher is better) so this is a maximization
        // auction: value = SENTINEL_COST - cost, infeasible pairs get value 0.
        let value = |i: usize, j: usize| -> f64 {
            let cost = matrix.costs[i][j];
            if cost >= SENTINEL_COST {
                0.0
            } else {
                SENTINEL_COST - cost
            }
        };

        let mut prices = vec![0.0_f64; m];
        let mut assigned_rider: Vec<Option<usize>> = vec![None; n];
        let mut owner: Vec<Option<usize>> = vec![None; m];

        for _ in 0..self.max_iterations {
            let unassigned: Vec<usize> = (0..n).filter(|&i| assigned_rider[i].is_none()).collect();
            if unassigned.is_empty() {
                break;
            }
            for order_idx in unassigned {
                let mut best_value = f64::NEG_INFINITY;
                let mut second_value = f64::NEG_INFINITY;
                let mut best_rider = None;
                for rider_idx in 0..m {
                    let net = value(order_idx, rider_idx) - prices[rider_idx];
                    if net > best_value {
                        second_value = best_value;
                        best_value = net;
                        best_rider = Some(rider_idx);
                    } else if net > second_value {
                        second_value = net;
                    }
                }
                let Some(rider_idx) = best_rider else {
                    continue;
                };
                if value(order_idx, rider_idx) <= 0.0 {
                    continue; // no feasible rider for this order
                }
                let bid_increment = (best_value - second_value).max(0.0) + self.epsilon;
                prices[rider_idx] += bid_increment;

                if let Some(prev_owner) = owner[rider_idx] {
                    assigned_rider[prev_owner] = None;
                }
                owner[rider_idx] = Some(order_idx);
                assigned_rider[order_idx] = Some(rider_idx);
            }
        }

        let mut assignments = HashMap::new();
        let mut total_cost = 0.0;
        for (order_idx, rider_idx) in assigned_rider.into_iter().enumerate() {
            if let Some(rider_idx) = rider_idx {
                if matrix.costs[order_idx][rider_idx] < SENTINEL_COST {
                    assignments.insert(
                        matrix.orders[order_idx].clone(),
                        matrix.riders[rider_idx].clone(),
                    );
                    total_cost += matrix.costs[order_idx][rider_idx];
                }
            }
        }

        SolveResult {
            assignments,
            total_cost,
            algorithm: Algorithm::Auction,
        }
    }
}

/// Greedy nearest-rider-per-order assignment with no uniqueness constraint
/// on riders: an explicit approximation for crisis-scale problems.
#[derive(Debug, Default)]
pub struct GreedySolver;

impl CostSolver for GreedySolver {
    fn solve(&self, matrix: &CostMatrix) -> SolveResult {
        let mut assignments = HashMap::new();
        let mut total_cost = 0.0;
        for (order_idx, order_id) in matrix.orders.iter().enumerate() {
            if let Some((rider_idx, &cost)) = matrix.costs[order_idx]
                .iter()
                .enumerate()
                .filter(|(_, &cost)| cost < SENTINEL_COST)
                .min_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            {
                assignments.insert(order_id.clone(), matrix.riders[rider_idx].clone());
                total_cost += cost;
            }
        }
        SolveResult {
            assignments,
            total_cost,
            algorithm: Algorithm::Greedy,
        }
    }
}

/// Size-adaptive dispatcher: exact below `hungarian_threshold`, auction
/// below 50,000, greedy above. Bounds the exact solver to
/// `optimizer_timeout_seconds`, falling through to the auction solver on
/// timeout (orders left unassigned remain pending and are retried next
/// cycle).
#[derive(Debug, Clone)]
pub struct AdaptiveOptimizer {
    pub hungarian_threshold: usize,
    pub optimizer_timeout: Duration,
}

const AUCTION_THRESHOLD: usize = 50_000;

impl AdaptiveOptimizer {
    pub fn new(hungarian_threshold: usize, optimizer_timeout_seconds: f64) -> Self {
        Self {
            hungarian_threshold,
            optimizer_timeout: Duration::from_secs_f64(optimizer_timeout_seconds.max(0.0)),
        }
    }

    pub fn solve(&self, matrix: &CostMatrix) -> SolveResult {
        let size = matrix.problem_size();
        if size == 0 {
            return SolveResult {
                assignments: HashMap::new(),
                total_cost: 0.0,
                algorithm: Algorithm::Exact,
            };
        }
        if size <= self.hungarian_threshold {
            return self.solve_exact_with_timeout(matrix);
        }
        if size <= AUCTION_THRESHOLD {
            return AuctionSolver::default().solve(matrix);
        }
        GreedySolver.solve(matrix)
    }

    /// Runs the exact solver on a worker thread bounded by
    /// `optimizer_timeout`; falls back to the auction solver if it does not
    /// complete in time.
    fn solve_exact_with_timeout(&self, matrix: &CostMatrix) -> SolveResult {
        let matrix_clone = matrix.clone();
        let (tx, rx) = mpsc::channel();
        let handle = std::thread::spawn(move || {
            let result = ExactSolver.solve(&matrix_clone);
            let _ = tx.send(result);
        });

        match rx.recv_timeout(self.optimizer_timeout) {
            Ok(result) => {
                let _ = handle.join();
                result
            }
            Err(_) => {
                tracing::warn!(
                    problem_size = matrix.problem_size(),
                    "exact optimizer exceeded timeout, falling back to auction solver"
                );
                AuctionSolver::default().solve(matrix)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix_3x3() -> CostMatrix {
        let mut matrix = CostMatrix::new(
            vec!["o0".into(), "o1".into(), "o2".into()],
            vec!["r0".into(), "r1".into(), "r2".into()],
        );
        let costs = [[0.5, 0.8, 0.7], [0.6, 0.4, 0.5], [0.9, 0.3, 0.6]];
        for i in 0..3 {
            for j in 0..3 {
                matrix.set_cost(i, j, costs[i][j]);
            }
        }
        matrix
    }

    #[test]
    fn exact_solver_finds_optimal_assignment() {
        let matrix = matrix_3x3();
        let result = ExactSolver.solve(&matrix);
        assert_eq!(result.assignments.len(), 3);
        assert!((result.total_cost - 1.3).abs() < 1e-6, "got {}", result.total_cost);
    }

    #[test]
    fn exact_solver_beats_or_matches_greedy() {
        let matrix = matrix_3x3();
        let exact = ExactSolver.solve(&matrix);
        let greedy = GreedySolver.solve(&matrix);
        assert!(exact.total_cost <= greedy.total_cost + 1e-9);
    }

    #[test]
    fn sentinel_pairs_are_never_selected() {
        let mut matrix = CostMatrix::new(vec!["o0".into()], vec!["r0".into(), "r1".into()]);
        matrix.set_cost(0, 0, SENTINEL_COST);
        matrix.set_cost(0, 1, 0.2);
        let result = ExactSolver.solve(&matrix);
        assert_eq!(result.assignments.get("o0"), Some(&"r1".to_string()));
    }

    #[test]
    fn greedy_ignores_rider_uniqueness() {
        let mut matrix = CostMatrix::new(
            vec!["o0".into(), "o1".into()],
            vec!["r0".into()],
        );
        matrix.set_cost(0, 0, 0.1);
        matrix.set_cost(1, 0, 0.2);
        let result = GreedySolver.solve(&matrix);
        assert_eq!(result.assignments.get("o0"), Some(&"r0".to_string()));
        assert_eq!(result.assignments.get("o1"), Some(&"r0".to_string()));
    }

    #[test]
    fn auction_solver_respects_sentinel() {
        let matrix = matrix_3x3();
        let result = AuctionSolver::default().solve(&matrix);
        for rider in result.assignments.values() {
            assert!(matrix.riders.contains(rider));
        }
    }

    #[test]
    fn empty_matrix_yields_empty_result() {
        let matrix = CostMatrix::new(Vec::new(), Vec::new());
        let result = AdaptiveOptimizer::new(10_000, 1.5).solve(&matrix);
        assert!(result.assignments.is_empty());
    }

    #[test]
    fn adaptive_optimizer_uses_exact_for_small_problems() {
        let matrix = matrix_3x3();
        let result = AdaptiveOptimizer::new(10_000, 1.5).solve(&matrix);
        assert_eq!(result.algorithm, Algorithm::Exact);
        assert!((result.total_cost - 1.3).abs() < 1e-6);
    }
}
