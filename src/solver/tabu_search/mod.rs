pub mod diversification;
pub mod neighborhood;
pub mod repair;
pub mod search;
pub mod tabu;

use tracing::{debug, span, warn, Level};

use crate::config::constant::{
    ASPIRATION_THRESHOLD, SEED, TABU_ITERATIONS, TABU_LEN_LOWER, TABU_LEN_UPPER,
};
use crate::domain::solution::RouteSolution;
use crate::evaluation::fitness::{find_fitness, trace_route};
use crate::routing::RoutingProblem;
use crate::solver::{Deadline, RouteSolver, SearchLimits, SolveOutcome, SolverStatus};

pub use neighborhood::*;
pub use repair::*;
pub use search::*;
pub use tabu::*;

/// Visited locations in order, depot excluded, with their fitness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub route: Vec<usize>,
    pub fitness: i64,
    pub feasible: bool,
}

impl Route {
    pub fn evaluate(problem: &RoutingProblem, route: Vec<usize>) -> Self {
        let (fitness, feasible) = find_fitness(problem, &route);
        Route {
            route,
            fitness,
            feasible,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TabuParams {
    pub max_iterations: usize,
    pub tabu_len_lower: usize,
    pub tabu_len_upper: usize,
    /// Meters.
    pub aspiration_threshold: i64,
    pub seed: u64,
}

impl Default for TabuParams {
    fn default() -> Self {
        TabuParams {
            max_iterations: TABU_ITERATIONS,
            tabu_len_lower: TABU_LEN_LOWER,
            tabu_len_upper: TABU_LEN_UPPER,
            aspiration_threshold: ASPIRATION_THRESHOLD,
            seed: SEED,
        }
    }
}

/// Cheapest insertion followed by tabu search, then a second insertion pass
/// to use budget freed by the search.
#[derive(Debug, Clone, Default)]
pub struct TabuRouteSolver {
    pub params: TabuParams,
}

impl TabuRouteSolver {
    pub fn new(params: TabuParams) -> Self {
        TabuRouteSolver { params }
    }
}

impl RouteSolver for TabuRouteSolver {
    fn solve(&self, problem: &RoutingProblem, limits: &SearchLimits) -> SolveOutcome {
        let solve_span = span!(Level::DEBUG, "tabu_solve", locations = problem.len());
        let _solve_guard = solve_span.enter();

        if !problem.is_consistent() {
            warn!("Rejecting inconsistent routing problem");
            return SolveOutcome::failed(SolverStatus::Invalid);
        }

        let mut deadline = Deadline::start(limits);
        let mut route = Vec::new();
        if cheapest_insertion(problem, &mut route, &deadline).is_none() {
            return SolveOutcome::failed(SolverStatus::FailTimeout);
        }
        deadline.record_solution();
        let mut best = Route::evaluate(problem, route);

        if best.route.len() >= 2 && !deadline.should_stop() {
            best = improve(problem, best, &self.params, &mut deadline);
            let mut route = best.route.clone();
            if cheapest_insertion(problem, &mut route, &deadline).is_some_and(|n| n > 0) {
                best = Route::evaluate(problem, route);
            }
        }

        strip_idle_reloads(problem, &mut best.route);
        let best = Route::evaluate(problem, best.route);
        if !best.feasible {
            warn!("Search ended on an infeasible route, discarding it");
            return SolveOutcome::failed(SolverStatus::Fail);
        }

        let served = problem.served_orders(&best.route);
        if served.is_empty() && problem.orders().next().is_some() {
            debug!("No order fits the vehicle");
            return SolveOutcome::failed(SolverStatus::Fail);
        }

        let trace = trace_route(problem, &best.route);
        let mut visited = vec![false; problem.len()];
        for &loc in &best.route {
            visited[loc] = true;
        }
        let dropped: Vec<usize> = (1..problem.len()).filter(|&loc| !visited[loc]).collect();
        debug!(
            "Route serves {} orders over {} m, {} locations dropped",
            served.len(),
            trace.distance,
            dropped.len()
        );

        SolveOutcome {
            status: SolverStatus::Success,
            solution: Some(RouteSolution {
                stops: trace.stops,
                dropped,
                objective: best.fitness,
                distance: trace.distance,
                time: trace.time,
                load: trace.load,
            }),
        }
    }
}
