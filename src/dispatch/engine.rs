use tracing::{debug, info, info_span, warn};

use crate::config::DispatchSettings;
use crate::dispatch::types::{DispatchOutcome, DispatchState, ExhaustReason, Trip, TripPolicy};
use crate::distance::DistanceMatrix;
use crate::domain::solution::RouteSolution;
use crate::domain::types::{Fleet, Node, Request, VehicleProfile};
use crate::routing::{encode_multi_trip, encode_single_trip, EncodeInput, LocationKind, RoutingProblem};
use crate::solver::{RouteSolver, SolverStatus};

/// Plans routes for one vehicle class at a time, one vehicle after the other.
pub struct Dispatcher<'a> {
    solver: &'a dyn RouteSolver,
    sdm: &'a DistanceMatrix,
    depot: &'a Node,
    settings: &'a DispatchSettings,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        solver: &'a dyn RouteSolver,
        sdm: &'a DistanceMatrix,
        depot: &'a Node,
        settings: &'a DispatchSettings,
    ) -> Self {
        Dispatcher {
            solver,
            sdm,
            depot,
            settings,
        }
    }

    /// Serves `demand` with vehicles of `profile`, adding vehicles until the
    /// demand is gone or `max_vehicles` (default: the policy's cap) is reached.
    /// Whatever is left is reported as unserved.
    pub fn dispatch(
        &self,
        profile: &VehicleProfile,
        demand: Vec<Request>,
        max_vehicles: Option<usize>,
    ) -> DispatchOutcome {
        let span = info_span!("dispatch", vehicle = %profile.name, orders = demand.len());
        let _guard = span.enter();

        let cap = max_vehicles.unwrap_or_else(|| self.settings.vehicle_cap());
        let limits = self.settings.search_limits();
        let mut fleet = Fleet::new(profile.clone());
        let mut outstanding = demand;
        let mut routes: Vec<Trip> = Vec::new();
        let mut trace = vec![DispatchState::Idle];
        let mut planned = false;

        let reason = loop {
            if outstanding.is_empty() {
                break ExhaustReason::DemandCleared;
            }
            if !fleet.within_margin(self.settings.budget_margin) {
                debug!("Vehicle {} reached its budget margin", fleet.count);
                if fleet.count >= cap {
                    break ExhaustReason::VehicleCap;
                }
                fleet.add_vehicle();
                continue;
            }

            planned = true;
            trace.push(DispatchState::Planning {
                vehicle: fleet.count,
                outstanding: outstanding.len(),
            });
            let problem = self.encode(&outstanding, &fleet);
            let outcome = self.solver.solve(&problem, &limits);

            let solution = match (outcome.status, outcome.solution) {
                (SolverStatus::Success, Some(solution))
                    if !problem.served_orders(&solution.locations()).is_empty() =>
                {
                    Some(solution)
                }
                _ => None,
            };

            match solution {
                Some(solution) => {
                    let (trip, served) = record_trip(&problem, &solution, &outstanding, fleet.count);
                    fleet.consume(trip.distance_km, trip.time_min);
                    debug!(
                        "Vehicle {} route: {} orders, {:.3} km, {} min",
                        fleet.count,
                        trip.served.len(),
                        trip.distance_km,
                        trip.time_min
                    );
                    trace.push(DispatchState::Solved {
                        vehicle: fleet.count,
                        served: trip.served.len(),
                    });
                    routes.push(trip);
                    outstanding = remove_served(outstanding, &served);

                    if self.settings.policy == TripPolicy::SingleTrip && !outstanding.is_empty() {
                        if fleet.count >= cap {
                            break ExhaustReason::VehicleCap;
                        }
                        fleet.add_vehicle();
                    }
                }
                None => {
                    debug!("Vehicle {} closed, solver status {}", fleet.count, outcome.status);
                    trace.push(DispatchState::Escalating {
                        vehicle: fleet.count,
                        status: outcome.status,
                    });
                    if fleet.count >= cap {
                        break ExhaustReason::VehicleCap;
                    }
                    fleet.add_vehicle();
                }
            }
        };
        trace.push(DispatchState::Exhausted(reason));

        let distance_km: f64 = routes.iter().map(|t| t.distance_km).sum();
        let time_min: f64 = routes.iter().map(|t| t.time_min).sum();
        let vehicles_used = if planned { fleet.count } else { 0 };
        if outstanding.is_empty() {
            info!(
                "{}: all demand served by {} vehicles, {:.2} km",
                profile.name, vehicles_used, distance_km
            );
        } else {
            warn!(
                "{}: {} orders unserved after {} vehicles",
                profile.name,
                outstanding.len(),
                vehicles_used
            );
        }

        DispatchOutcome {
            vehicle_class: profile.name.clone(),
            vehicles_used,
            routes,
            unserved: outstanding,
            distance_km,
            time_min,
            co2_kg: profile.co2_kg(distance_km),
            trace,
        }
    }

    fn encode(&self, outstanding: &[Request], fleet: &Fleet) -> RoutingProblem {
        let input = EncodeInput {
            demand: outstanding,
            depot: self.depot,
            fleet,
            sdm: self.sdm,
            reload_penalty: self.settings.reload_penalty_m,
        };
        match self.settings.policy {
            TripPolicy::SingleTrip => encode_single_trip(&input),
            TripPolicy::MultiTrip => encode_multi_trip(&input),
        }
    }
}

/// Builds the trip record of a solved route. Also returns the indices of the
/// served orders in `outstanding`.
fn record_trip(
    problem: &RoutingProblem,
    solution: &RouteSolution,
    outstanding: &[Request],
    vehicle: usize,
) -> (Trip, Vec<usize>) {
    let locations = solution.locations();
    let served = problem.served_orders(&locations);
    let reloads = locations
        .iter()
        .filter(|&&loc| problem.kinds[loc] == LocationKind::Reload)
        .count();

    let trip = Trip {
        vehicle,
        served: served.iter().map(|&i| outstanding[i].id).collect(),
        path: locations.iter().map(|&loc| problem.nodes[loc]).collect(),
        trips: reloads + 1,
        distance_km: solution.distance as f64 / 1000.0,
        time_min: solution.time as f64,
        load: served
            .iter()
            .map(|&i| outstanding[i].weight)
            .fold(0, u64::saturating_add),
        volume: served
            .iter()
            .map(|&i| outstanding[i].volume)
            .fold(0, u64::saturating_add),
    };
    (trip, served)
}

fn remove_served(outstanding: Vec<Request>, served: &[usize]) -> Vec<Request> {
    let mut is_served = vec![false; outstanding.len()];
    for &i in served {
        is_served[i] = true;
    }
    outstanding
        .into_iter()
        .zip(is_served)
        .filter(|(_, gone)| !gone)
        .map(|(request, _)| request)
        .collect()
}
