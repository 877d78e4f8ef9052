use std::iter::once;

use crate::config::constant::OVERLOAD_PENALTY;
use crate::domain::solution::RouteStop;
use crate::evaluation::penalty::{penalty, Excess};
use crate::routing::{LocationKind, RoutingProblem};

/// Cumulative dimensions of a route, starting and ending at the depot.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteTrace {
    pub stops: Vec<RouteStop>,
    /// Sum of arc costs, reload penalties included.
    pub cost: i64,
    /// Meters driven.
    pub distance: i64,
    pub time: i64,
    /// Grams delivered.
    pub load: i64,
    pub excess: Excess,
}

/// Walks `route` (visited locations, depot excluded) and accumulates every
/// dimension. Weight and volume reset at reload stops.
pub fn trace_route(problem: &RoutingProblem, route: &[usize]) -> RouteTrace {
    let depot = problem.depot();
    let mut stops = Vec::with_capacity(route.len() + 2);
    stops.push(RouteStop {
        location: depot,
        load: 0,
        volume: 0,
        time: 0,
        distance: 0,
    });

    let (mut load, mut volume, mut delivered) = (0i64, 0i64, 0i64);
    let (mut cost, mut distance, mut time) = (0i64, 0i64, 0i64);
    let mut excess = Excess::default();
    let mut prev = depot;
    for &loc in route.iter().chain(once(&depot)) {
        cost = cost.saturating_add(problem.arc_cost(prev, loc));
        distance = distance.saturating_add(problem.distance(prev, loc));
        time = time.saturating_add(problem.transit_time(prev, loc));

        match problem.kinds[loc] {
            LocationKind::Order(_) => {
                load = load.saturating_add(problem.weight_demand[loc]);
                volume = volume.saturating_add(problem.volume_demand[loc]);
                delivered = delivered.saturating_add(problem.weight_demand[loc]);
            }
            LocationKind::Reload => {
                excess.weight += (load - problem.capacity).max(0);
                excess.volume += (volume - problem.volume_capacity).max(0);
                load = (load.min(problem.capacity) + problem.weight_demand[loc]).max(0);
                volume = (volume.min(problem.volume_capacity) + problem.volume_demand[loc]).max(0);
            }
            LocationKind::Depot => {
                excess.weight += (load - problem.capacity).max(0);
                excess.volume += (volume - problem.volume_capacity).max(0);
            }
        }

        stops.push(RouteStop {
            location: loc,
            load,
            volume,
            time,
            distance,
        });
        prev = loc;
    }

    excess.distance = (cost - problem.distance_bound).max(0);
    excess.time = (time - problem.time_bound).max(0);

    RouteTrace {
        stops,
        cost,
        distance,
        time,
        load: delivered,
        excess,
    }
}

/// Arc cost of the closed route.
pub fn find_distance(problem: &RoutingProblem, route: &[usize]) -> i64 {
    let depot = problem.depot();
    once(&depot)
        .chain(route.iter())
        .zip(route.iter().chain(once(&depot)))
        .map(|(&from, &to)| problem.arc_cost(from, to))
        .fold(0, i64::saturating_add)
}

/// Penalties of the locations `route` leaves out.
pub fn drop_cost(problem: &RoutingProblem, route: &[usize]) -> i64 {
    let mut visited = vec![false; problem.len()];
    for &loc in route {
        visited[loc] = true;
    }
    problem
        .drop_penalty
        .iter()
        .zip(visited)
        .filter(|(_, seen)| !seen)
        .filter_map(|(penalty, _)| *penalty)
        .fold(0, i64::saturating_add)
}

/// Objective of a route: arc cost plus drop penalties plus overload penalty.
/// Returns the fitness and whether every bound holds.
pub fn find_fitness(problem: &RoutingProblem, route: &[usize]) -> (i64, bool) {
    let trace = trace_route(problem, route);
    let fitness = trace
        .cost
        .saturating_add(drop_cost(problem, route))
        .saturating_add(penalty(&trace.excess, OVERLOAD_PENALTY));
    (fitness, trace.excess.is_feasible())
}
