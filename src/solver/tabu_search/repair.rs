use rayon::prelude::*;
use tracing::{debug, trace};

use crate::evaluation::fitness::find_distance;
use crate::routing::{LocationKind, RoutingProblem};
use crate::solver::Deadline;

/// Per-trip loads and totals of a route, indexed by insertion position.
///
/// Position `p` sits between `route[p - 1]` (or the depot) and `route[p]`
/// (or the depot).
struct RouteProfile {
    /// Trip that an insertion at `p` joins.
    segment_at: Vec<usize>,
    /// Load of that trip up to `p`.
    head_weight: Vec<i64>,
    head_volume: Vec<i64>,
    segment_weight: Vec<i64>,
    segment_volume: Vec<i64>,
    cost: i64,
    time: i64,
}

impl RouteProfile {
    fn new(problem: &RoutingProblem, route: &[usize]) -> Self {
        let mut segment_at = vec![0];
        let mut head_weight = vec![0];
        let mut head_volume = vec![0];
        let mut segment_weight = Vec::new();
        let mut segment_volume = Vec::new();
        let (mut segment, mut weight, mut volume) = (0, 0i64, 0i64);
        let mut time = 0i64;

        let mut prev = problem.depot();
        for &loc in route {
            time = time.saturating_add(problem.transit_time(prev, loc));
            if problem.kinds[loc] == LocationKind::Reload {
                segment_weight.push(weight);
                segment_volume.push(volume);
                segment += 1;
                weight = 0;
                volume = 0;
            } else {
                weight += problem.weight_demand[loc];
                volume += problem.volume_demand[loc];
            }
            segment_at.push(segment);
            head_weight.push(weight);
            head_volume.push(volume);
            prev = loc;
        }
        let cost = find_distance(problem, route);
        time = time.saturating_add(problem.transit_time(prev, problem.depot()));
        segment_weight.push(weight);
        segment_volume.push(volume);

        RouteProfile {
            segment_at,
            head_weight,
            head_volume,
            segment_weight,
            segment_volume,
            cost,
            time,
        }
    }
}

/// Cheapest feasible way to add one order to the route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct Insertion {
    delta: i64,
    order: usize,
    position: usize,
    /// Reload copy placed right before the order, opening a new trip.
    reload: Option<usize>,
}

fn neighbours(route: &[usize], depot: usize, position: usize) -> (usize, usize) {
    let prev = if position == 0 { depot } else { route[position - 1] };
    let next = route.get(position).copied().unwrap_or(depot);
    (prev, next)
}

fn best_insertion(
    problem: &RoutingProblem,
    route: &[usize],
    profile: &RouteProfile,
    order: usize,
    free_reload: Option<usize>,
) -> Option<Insertion> {
    let depot = problem.depot();
    let weight = problem.weight_demand[order];
    let volume = problem.volume_demand[order];
    if weight > problem.capacity || volume > problem.volume_capacity {
        return None;
    }

    let mut best: Option<Insertion> = None;
    for position in 0..=route.len() {
        let (prev, next) = neighbours(route, depot, position);
        let base_cost = problem.arc_cost(prev, next);
        let base_time = problem.transit_time(prev, next);
        let segment = profile.segment_at[position];

        let delta = problem.arc_cost(prev, order) + problem.arc_cost(order, next) - base_cost;
        let delta_time =
            problem.transit_time(prev, order) + problem.transit_time(order, next) - base_time;
        if profile.segment_weight[segment] + weight <= problem.capacity
            && profile.segment_volume[segment] + volume <= problem.volume_capacity
            && profile.cost + delta <= problem.distance_bound
            && profile.time + delta_time <= problem.time_bound
        {
            let candidate = Insertion {
                delta,
                order,
                position,
                reload: None,
            };
            best = Some(best.map_or(candidate, |b| b.min(candidate)));
        }

        let Some(reload) = free_reload else {
            continue;
        };
        let delta = problem.arc_cost(prev, reload)
            + problem.arc_cost(reload, order)
            + problem.arc_cost(order, next)
            - base_cost;
        let delta_time = problem.transit_time(prev, reload)
            + problem.transit_time(reload, order)
            + problem.transit_time(order, next)
            - base_time;
        let tail_weight = profile.segment_weight[segment] - profile.head_weight[position];
        let tail_volume = profile.segment_volume[segment] - profile.head_volume[position];
        if tail_weight + weight <= problem.capacity
            && tail_volume + volume <= problem.volume_capacity
            && profile.cost + delta <= problem.distance_bound
            && profile.time + delta_time <= problem.time_bound
        {
            let candidate = Insertion {
                delta,
                order,
                position,
                reload: Some(reload),
            };
            best = Some(best.map_or(candidate, |b| b.min(candidate)));
        }
    }
    best
}

/// Adds unrouted orders one at a time at their cheapest feasible position
/// until none fits. Returns the number inserted, or `None` if the deadline
/// passed before the first insertion round finished.
pub fn cheapest_insertion(
    problem: &RoutingProblem,
    route: &mut Vec<usize>,
    deadline: &Deadline,
) -> Option<usize> {
    let mut routed = vec![false; problem.len()];
    for &loc in route.iter() {
        routed[loc] = true;
    }

    let mut inserted = 0;
    let mut rounds = 0;
    loop {
        if deadline.expired() {
            debug!("Insertion stopped by the time limit after {} orders", inserted);
            return if rounds == 0 { None } else { Some(inserted) };
        }
        rounds += 1;

        let profile = RouteProfile::new(problem, route);
        let free_reload = problem.reloads().find(|&r| !routed[r]);
        let pending: Vec<usize> = problem.orders().filter(|&o| !routed[o]).collect();

        let chosen = pending
            .par_iter()
            .filter_map(|&order| best_insertion(problem, route, &profile, order, free_reload))
            .min();

        let Some(insertion) = chosen else {
            break;
        };
        trace!("Insert {:?}", insertion);
        route.insert(insertion.position, insertion.order);
        routed[insertion.order] = true;
        if let Some(reload) = insertion.reload {
            route.insert(insertion.position, reload);
            routed[reload] = true;
        }
        inserted += 1;
    }

    debug!("Insertion placed {} orders, route length {}", inserted, route.len());
    Some(inserted)
}

/// Removes reload copies that no longer split two non-empty trips.
pub fn strip_idle_reloads(problem: &RoutingProblem, route: &mut Vec<usize>) {
    let depot = problem.depot();
    let mut ind = 0;
    while ind < route.len() {
        let loc = route[ind];
        if problem.kinds[loc] == LocationKind::Reload {
            let (prev, next) = (
                if ind == 0 { depot } else { route[ind - 1] },
                route.get(ind + 1).copied().unwrap_or(depot),
            );
            if problem.kinds[prev].is_depot_like() || problem.kinds[next].is_depot_like() {
                route.remove(ind);
                continue;
            }
        }
        ind += 1;
    }
}
