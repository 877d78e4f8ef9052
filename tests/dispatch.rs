use cbsim::config::DispatchSettings;
use cbsim::dispatch::{DispatchState, Dispatcher, ExhaustReason, TripPolicy};
use cbsim::domain::types::{Node, NodeType, Request, VehicleProfile};
use cbsim::network::Network;
use cbsim::solver::TabuRouteSolver;

/// Straight street of four intersections 1 km apart, load point on the first.
fn street() -> (Network, Node) {
    let mut net = Network::grid(1, 4, 1.0).unwrap();
    net.build_sdm().unwrap();
    let depot = Node {
        id: 100,
        name: "hub".to_string(),
        x: 0.0,
        y: 0.0,
        node_type: NodeType::LoadPoint,
        closest_itsc: Some(0),
    };
    (net, depot)
}

fn bike(capacity: u64) -> VehicleProfile {
    VehicleProfile {
        name: "bike".to_string(),
        vehicle_capacity: capacity,
        cargo_length: 1000,
        cargo_width: 1000,
        cargo_height: 1000,
        average_speed: 15.0,
        max_distance: 100.0,
        max_time: 1000.0,
        service_time: 1.0,
        emissions: None,
    }
}

fn order(id: usize, itsc: u64, weight: u64) -> Request {
    Request {
        id,
        origin: 0,
        destination: 10 + itsc,
        destination_itsc: itsc,
        weight,
        length: 100,
        width: 100,
        height: 100,
        volume: 1_000_000,
        itsc_distance: 0.0,
    }
}

#[test]
fn single_trip_splits_demand_over_two_bikes() {
    let (net, depot) = street();
    let settings = DispatchSettings {
        policy: TripPolicy::SingleTrip,
        time_limit_secs: 30,
        ..DispatchSettings::default()
    };
    let solver = TabuRouteSolver::default();
    let dispatcher = Dispatcher::new(&solver, net.sdm().unwrap(), &depot, &settings);

    let demand = vec![order(0, 1, 500), order(1, 2, 500), order(2, 3, 500)];
    let outcome = dispatcher.dispatch(&bike(1000), demand, None);

    assert!(outcome.unserved.is_empty());
    assert_eq!(outcome.vehicles_used, 2);
    let served: Vec<usize> = outcome.routes.iter().map(|t| t.served.len()).collect();
    assert_eq!(served, vec![2, 1]);
    assert!(outcome.routes.iter().all(|t| t.load <= 1000));
    assert!(outcome.routes.iter().all(|t| t.path.first() == Some(&0) && t.path.last() == Some(&0)));
    // 1 -> 2 and back is the cheapest pair, the 3 km order rides alone
    assert_eq!(outcome.routes[0].distance_km, 4.0);
    assert_eq!(outcome.routes[1].distance_km, 6.0);
    assert_eq!(
        outcome.final_state(),
        Some(&DispatchState::Exhausted(ExhaustReason::DemandCleared))
    );
}

#[test]
fn multi_trip_bike_keeps_planning_within_budget() {
    let (net, depot) = street();
    let settings = DispatchSettings {
        time_limit_secs: 30,
        ..DispatchSettings::default()
    };
    let solver = TabuRouteSolver::default();
    let dispatcher = Dispatcher::new(&solver, net.sdm().unwrap(), &depot, &settings);

    let demand = vec![order(0, 1, 600), order(1, 2, 600), order(2, 3, 600)];
    let outcome = dispatcher.dispatch(&bike(1000), demand, None);

    // one reload copy fits two orders into the first route, the vehicle
    // still has budget for a second route
    assert!(outcome.unserved.is_empty());
    assert_eq!(outcome.vehicles_used, 1);
    assert_eq!(outcome.routes.len(), 2);
    assert!(outcome.routes.iter().all(|t| t.vehicle == 1));
    assert_eq!(outcome.routes[0].served.len(), 2);
    assert_eq!(outcome.routes[0].trips, 2);
    assert_eq!(outcome.trip_count(), 3);
}

#[test]
fn oversized_orders_end_at_the_shift_cap() {
    let (net, depot) = street();
    let settings = DispatchSettings {
        time_limit_secs: 30,
        ..DispatchSettings::default()
    };
    let solver = TabuRouteSolver::default();
    let dispatcher = Dispatcher::new(&solver, net.sdm().unwrap(), &depot, &settings);

    let demand = vec![order(0, 1, 5000), order(1, 2, 7000)];
    let outcome = dispatcher.dispatch(&bike(1000), demand, None);

    assert_eq!(outcome.vehicles_used, settings.max_shifts);
    assert_eq!(outcome.unserved.len(), 2);
    assert!(outcome.routes.is_empty());
    let escalations = outcome
        .trace
        .iter()
        .filter(|s| matches!(s, DispatchState::Escalating { .. }))
        .count();
    assert_eq!(escalations, settings.max_shifts);
    assert_eq!(
        outcome.final_state(),
        Some(&DispatchState::Exhausted(ExhaustReason::VehicleCap))
    );
}

fn parcel(id: usize, itsc: u64) -> Request {
    Request {
        id,
        origin: 0,
        destination: 10 + itsc,
        destination_itsc: itsc,
        weight: 100,
        length: 80,
        width: 80,
        height: 80,
        volume: 512_000,
        itsc_distance: 0.0,
    }
}

/// Bay of one liter: a single 80 mm parcel fills half of it. Weight never binds.
fn small_bay_bike() -> VehicleProfile {
    VehicleProfile {
        cargo_length: 100,
        cargo_width: 100,
        cargo_height: 100,
        max_time: 60.0,
        ..bike(10_000)
    }
}

#[test]
fn volume_and_shift_time_bind_before_weight() {
    let (net, depot) = street();
    let vehicle = small_bay_bike();
    let cargo = vehicle.cargo_volume();
    let solver = TabuRouteSolver::default();

    for policy in [TripPolicy::SingleTrip, TripPolicy::MultiTrip] {
        let settings = DispatchSettings {
            policy,
            time_limit_secs: 30,
            ..DispatchSettings::default()
        };
        let dispatcher = Dispatcher::new(&solver, net.sdm().unwrap(), &depot, &settings);
        let demand = (0..6).map(|id| parcel(id, 1 + id as u64 % 3)).collect();
        let outcome = dispatcher.dispatch(&vehicle, demand, None);

        assert_eq!(outcome.served_count() + outcome.unserved.len(), 6);
        assert!(outcome.served_count() > 0);
        for trip in &outcome.routes {
            // two parcels never share a bay
            assert!(trip.served.len() <= trip.trips);
            assert!(trip.volume <= trip.trips as u64 * cargo);
            assert!(trip.load <= trip.trips as u64 * vehicle.vehicle_capacity);
            if policy == TripPolicy::SingleTrip {
                assert_eq!(trip.trips, 1);
                assert!(trip.volume <= cargo);
            }
        }
        for vehicle_id in 1..=outcome.vehicles_used {
            let shift: f64 = outcome
                .routes
                .iter()
                .filter(|t| t.vehicle == vehicle_id)
                .map(|t| t.time_min)
                .sum();
            assert!(shift <= vehicle.max_time, "{:?} shift {} min", policy, shift);
        }
    }
}
