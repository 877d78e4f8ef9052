use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::config::constant::ORDER_DROP_PENALTY;
use crate::distance::DistanceMatrix;
use crate::domain::types::{Fleet, Node, Request};

/// Arc length used between intersections with no path. Larger than any
/// distance bound the encoder produces.
pub const UNREACHABLE_M: i64 = 1_000_000_000_000;

/// Role of a location in a routing problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationKind {
    Depot,
    /// Copy of the depot where the vehicle unloads and starts a new trip.
    Reload,
    /// Index into the outstanding demand the problem was built from.
    Order(usize),
}

impl LocationKind {
    pub fn is_depot_like(&self) -> bool {
        matches!(self, LocationKind::Depot | LocationKind::Reload)
    }
}

/// Single-vehicle routing problem with weight, volume, distance and time
/// dimensions. Location 0 is always the depot.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingProblem {
    pub kinds: Vec<LocationKind>,
    /// Intersection each location sits on.
    pub nodes: Vec<u64>,
    /// Meters, row major.
    distance: Vec<i64>,
    /// Minutes, row major. Includes the service time of the origin.
    time: Vec<i64>,
    /// Grams. Reloads carry `-capacity`.
    pub weight_demand: Vec<i64>,
    /// Cubic millimeters. Reloads carry `-cargo_volume`.
    pub volume_demand: Vec<i64>,
    /// Cost of leaving a location out. `None` marks the depot.
    pub drop_penalty: Vec<Option<i64>>,
    pub capacity: i64,
    pub volume_capacity: i64,
    /// Remaining distance budget in meters.
    pub distance_bound: i64,
    /// Remaining time budget in minutes.
    pub time_bound: i64,
    /// Cost of an arc between two distinct depot-like locations.
    pub reload_penalty: i64,
}

impl RoutingProblem {
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn depot(&self) -> usize {
        0
    }

    /// Road distance between two locations.
    pub fn distance(&self, from: usize, to: usize) -> i64 {
        self.distance[from * self.len() + to]
    }

    /// Arc cost seen by the objective and the distance dimension.
    pub fn arc_cost(&self, from: usize, to: usize) -> i64 {
        if from != to && self.kinds[from].is_depot_like() && self.kinds[to].is_depot_like() {
            self.reload_penalty
        } else {
            self.distance(from, to)
        }
    }

    pub fn transit_time(&self, from: usize, to: usize) -> i64 {
        self.time[from * self.len() + to]
    }

    pub fn orders(&self) -> impl Iterator<Item = usize> + '_ {
        self.kinds
            .iter()
            .enumerate()
            .filter(|(_, kind)| matches!(kind, LocationKind::Order(_)))
            .map(|(ind, _)| ind)
    }

    pub fn reloads(&self) -> impl Iterator<Item = usize> + '_ {
        self.kinds
            .iter()
            .enumerate()
            .filter(|(_, kind)| **kind == LocationKind::Reload)
            .map(|(ind, _)| ind)
    }

    /// Outstanding-demand indices of the given locations, in route order.
    pub fn served_orders(&self, locations: &[usize]) -> Vec<usize> {
        locations
            .iter()
            .filter_map(|&loc| match self.kinds.get(loc) {
                Some(LocationKind::Order(i)) => Some(*i),
                _ => None,
            })
            .collect()
    }

    /// Structural consistency of the arrays. Violations are encoder bugs.
    pub fn is_consistent(&self) -> bool {
        let n = self.len();
        n > 0
            && self.kinds[0] == LocationKind::Depot
            && self.nodes.len() == n
            && self.distance.len() == n * n
            && self.time.len() == n * n
            && self.weight_demand.len() == n
            && self.volume_demand.len() == n
            && self.drop_penalty.len() == n
            && self.drop_penalty[0].is_none()
    }
}

/// Everything the encoder needs from the caller.
pub struct EncodeInput<'a> {
    pub demand: &'a [Request],
    pub depot: &'a Node,
    pub fleet: &'a Fleet,
    pub sdm: &'a DistanceMatrix,
    /// Defaults to the vehicle's maximum distance in meters.
    pub reload_penalty: Option<i64>,
}

/// Number of trips the multi-trip model allows for: one more than the load
/// factor of the heavier dimension.
pub fn reload_count(demand: &[Request], capacity: u64, cargo_volume: u64) -> usize {
    let weight: u64 = demand.iter().map(|r| r.weight).fold(0, u64::saturating_add);
    let volume: u64 = demand.iter().map(|r| r.volume).fold(0, u64::saturating_add);
    let by_weight = weight as f64 / capacity as f64;
    let by_volume = volume as f64 / cargo_volume as f64;
    (by_weight.max(by_volume) + 1.0).floor() as usize
}

/// One trip: depot plus orders, no reloads.
pub fn encode_single_trip(input: &EncodeInput) -> RoutingProblem {
    encode(input, 0)
}

/// Depot, `reload_count - 1` reload copies, then orders. Reload copies are
/// capped at one per order.
pub fn encode_multi_trip(input: &EncodeInput) -> RoutingProblem {
    let profile = &input.fleet.profile;
    let reloads = reload_count(input.demand, profile.vehicle_capacity, profile.cargo_volume());
    let copies = reloads.saturating_sub(1).min(input.demand.len());
    encode(input, copies)
}

fn encode(input: &EncodeInput, reload_copies: usize) -> RoutingProblem {
    let profile = &input.fleet.profile;
    let capacity = profile.vehicle_capacity as i64;
    let volume_capacity = profile.cargo_volume().min(i64::MAX as u64) as i64;
    let depot_itsc = input.depot.closest_itsc.unwrap_or(input.depot.id);

    let mut kinds = vec![LocationKind::Depot];
    let mut nodes = vec![depot_itsc];
    let mut weight_demand = vec![0];
    let mut volume_demand = vec![0];
    let mut drop_penalty = vec![None];

    for _ in 0..reload_copies {
        kinds.push(LocationKind::Reload);
        nodes.push(depot_itsc);
        weight_demand.push(-capacity);
        volume_demand.push(-volume_capacity);
        drop_penalty.push(Some(0));
    }
    for (ind, request) in input.demand.iter().enumerate() {
        kinds.push(LocationKind::Order(ind));
        nodes.push(request.destination_itsc);
        weight_demand.push(request.weight.min(i64::MAX as u64) as i64);
        volume_demand.push(request.volume.min(i64::MAX as u64) as i64);
        drop_penalty.push(Some(ORDER_DROP_PENALTY));
    }

    let n = kinds.len();
    let speed = profile.speed_m_per_min();
    let service = profile.service_time;
    let mut distance = vec![0i64; n * n];
    let mut time = vec![0i64; n * n];
    for i in 0..n {
        let row = input.sdm.index_of(nodes[i]);
        for j in 0..n {
            if i == j {
                continue;
            }
            let meters = match (row, input.sdm.index_of(nodes[j])) {
                (Some(a), Some(b)) => {
                    let km = input.sdm.get(a, b);
                    if km.is_finite() {
                        (km * 1000.0).round() as i64
                    } else {
                        UNREACHABLE_M
                    }
                }
                _ => UNREACHABLE_M,
            };
            distance[i * n + j] = meters;
            time[i * n + j] = (service + meters as f64 / speed) as i64;
        }
    }

    let max_distance_m = (profile.max_distance * 1000.0).round() as i64;
    let problem = RoutingProblem {
        kinds,
        nodes,
        distance,
        time,
        weight_demand,
        volume_demand,
        drop_penalty,
        capacity,
        volume_capacity,
        distance_bound: (input.fleet.distance_left * 1000.0).floor() as i64,
        time_bound: input.fleet.time_left.floor() as i64,
        reload_penalty: input.reload_penalty.unwrap_or(max_distance_m),
    };
    assert!(problem.is_consistent(), "routing problem arrays out of step");

    debug!(
        "Encoded problem: {} orders, {} reloads, bounds {} m / {} min",
        input.demand.len(),
        reload_copies,
        problem.distance_bound,
        problem.time_bound
    );
    trace!("Locations: {:?}", problem.kinds);
    problem
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{NodeType, VehicleProfile};
    use crate::network::Network;

    fn bike() -> VehicleProfile {
        VehicleProfile {
            name: "bike".to_string(),
            vehicle_capacity: 1000,
            cargo_length: 100,
            cargo_width: 100,
            cargo_height: 100,
            average_speed: 12.0,
            max_distance: 50.0,
            max_time: 480.0,
            service_time: 2.0,
            emissions: None,
        }
    }

    fn request(id: usize, itsc: u64, weight: u64, side: u64) -> Request {
        Request {
            id,
            origin: 100,
            destination: 200 + id as u64,
            destination_itsc: itsc,
            weight,
            length: side,
            width: side,
            height: side,
            volume: side * side * side,
            itsc_distance: 0.0,
        }
    }

    /// Line 0 - 1 - 2 - 3 with 1 km links, plus an isolated node 9.
    fn line() -> (Network, Node) {
        let mut net = Network::new();
        for id in 0..4 {
            net.add_intersection(id, id as f64 * 0.009, 0.0).unwrap();
        }
        net.add_intersection(9, 1.0, 1.0).unwrap();
        for id in 0..3 {
            net.add_link(id, id + 1, 1.0, false).unwrap();
        }
        net.build_sdm().unwrap();
        let depot = Node {
            id: 100,
            name: "L".to_string(),
            x: 0.0,
            y: 0.0,
            node_type: NodeType::LoadPoint,
            closest_itsc: Some(0),
        };
        (net, depot)
    }

    #[test]
    fn single_trip_layout_and_matrices() {
        let (net, depot) = line();
        let fleet = Fleet::new(bike());
        let demand = vec![request(0, 1, 500, 10), request(1, 3, 300, 20)];
        let problem = encode_single_trip(&EncodeInput {
            demand: &demand,
            depot: &depot,
            fleet: &fleet,
            sdm: net.sdm().unwrap(),
            reload_penalty: None,
        });

        assert_eq!(
            problem.kinds,
            vec![LocationKind::Depot, LocationKind::Order(0), LocationKind::Order(1)]
        );
        assert_eq!(problem.distance(0, 1), 1000);
        assert_eq!(problem.distance(1, 2), 2000);
        assert_eq!(problem.distance(2, 2), 0);
        // 2 min service + 1000 m at 200 m/min
        assert_eq!(problem.transit_time(0, 1), 7);
        assert_eq!(problem.transit_time(1, 1), 0);
        assert_eq!(problem.weight_demand, vec![0, 500, 300]);
        assert_eq!(problem.volume_demand, vec![0, 1000, 8000]);
        assert_eq!(
            problem.drop_penalty,
            vec![None, Some(ORDER_DROP_PENALTY), Some(ORDER_DROP_PENALTY)]
        );
        assert_eq!(problem.distance_bound, 50_000);
        assert_eq!(problem.time_bound, 480);
    }

    #[test]
    fn multi_trip_adds_reload_copies() {
        let (net, depot) = line();
        let fleet = Fleet::new(bike());
        // 2.3 capacities of weight -> 3 trips -> 2 reload copies
        let demand = vec![
            request(0, 1, 900, 10),
            request(1, 2, 900, 10),
            request(2, 3, 500, 10),
        ];
        let problem = encode_multi_trip(&EncodeInput {
            demand: &demand,
            depot: &depot,
            fleet: &fleet,
            sdm: net.sdm().unwrap(),
            reload_penalty: None,
        });

        assert_eq!(problem.len(), 6);
        assert_eq!(problem.reloads().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(problem.weight_demand[1], -1000);
        assert_eq!(problem.volume_demand[2], -1_000_000);
        assert_eq!(problem.drop_penalty[1], Some(0));
        assert_eq!(problem.kinds[3], LocationKind::Order(0));
        assert_eq!(problem.arc_cost(0, 1), 50_000);
        assert_eq!(problem.arc_cost(1, 2), 50_000);
        assert_eq!(problem.arc_cost(1, 1), 0);
        assert_eq!(problem.arc_cost(1, 3), 1000);
        assert_eq!(problem.served_orders(&[3, 1, 5]), vec![0, 2]);
    }

    #[test]
    fn reload_count_uses_heavier_dimension() {
        let demand = vec![request(0, 1, 100, 100), request(1, 1, 100, 100)];
        // weight 0.2 capacities, volume 2.0 capacities
        assert_eq!(reload_count(&demand, 1000, 1_000_000), 3);
        assert_eq!(reload_count(&[], 1000, 1_000_000), 1);
    }

    #[test]
    fn reload_count_saturates_on_huge_demand() {
        let mut heavy = request(0, 1, u64::MAX, 1);
        heavy.volume = u64::MAX;
        let demand = vec![heavy.clone(), heavy];
        assert!(reload_count(&demand, 1000, 1_000_000) > 1);
    }

    #[test]
    fn unreachable_arcs_exceed_every_bound() {
        let (net, depot) = line();
        let fleet = Fleet::new(bike());
        let demand = vec![request(0, 9, 10, 1)];
        let problem = encode_single_trip(&EncodeInput {
            demand: &demand,
            depot: &depot,
            fleet: &fleet,
            sdm: net.sdm().unwrap(),
            reload_penalty: Some(7),
        });

        assert_eq!(problem.distance(0, 1), UNREACHABLE_M);
        assert!(problem.distance(0, 1) > problem.distance_bound);
        assert!(problem.transit_time(0, 1) > problem.time_bound);
        assert!(problem.is_consistent());
    }

    #[test]
    fn bounds_follow_remaining_budget() {
        let (net, depot) = line();
        let mut fleet = Fleet::new(bike());
        fleet.consume(12.3456, 100.5);
        let problem = encode_single_trip(&EncodeInput {
            demand: &[],
            depot: &depot,
            fleet: &fleet,
            sdm: net.sdm().unwrap(),
            reload_penalty: None,
        });
        assert_eq!(problem.len(), 1);
        assert_eq!(problem.distance_bound, 37_654);
        assert_eq!(problem.time_bound, 379);
    }
}
