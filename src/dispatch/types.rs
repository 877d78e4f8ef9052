use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::types::Request;
use crate::solver::SolverStatus;

/// How a vehicle's shift is cut into trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripPolicy {
    /// One trip per vehicle; the next trip uses a fresh vehicle.
    SingleTrip,
    /// Reload copies of the depot let one vehicle do several trips, and the
    /// vehicle keeps planning while its budget margin allows.
    #[default]
    MultiTrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExhaustReason {
    DemandCleared,
    VehicleCap,
}

/// States of the dispatch loop, recorded in order for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchState {
    Idle,
    Planning { vehicle: usize, outstanding: usize },
    Solved { vehicle: usize, served: usize },
    Escalating { vehicle: usize, status: SolverStatus },
    Exhausted(ExhaustReason),
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchState::Idle => write!(f, "idle"),
            DispatchState::Planning { vehicle, outstanding } => {
                write!(f, "planning vehicle {} ({} outstanding)", vehicle, outstanding)
            }
            DispatchState::Solved { vehicle, served } => {
                write!(f, "vehicle {} served {}", vehicle, served)
            }
            DispatchState::Escalating { vehicle, status } => {
                write!(f, "vehicle {} closed after {}", vehicle, status)
            }
            DispatchState::Exhausted(reason) => write!(f, "exhausted: {:?}", reason),
        }
    }
}

/// One solved route of one vehicle. In the multi-trip model a route may
/// contain several trips separated by reloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    /// 1-based vehicle number within the fleet.
    pub vehicle: usize,
    /// Request ids in delivery order.
    pub served: Vec<usize>,
    /// Intersections visited, depot first and last.
    pub path: Vec<u64>,
    /// Number of depot departures in the route.
    pub trips: usize,
    pub distance_km: f64,
    pub time_min: f64,
    /// Grams.
    pub load: u64,
    /// Cubic millimeters.
    pub volume: u64,
}

/// Result of dispatching one vehicle class over a demand list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub vehicle_class: String,
    pub vehicles_used: usize,
    pub routes: Vec<Trip>,
    pub unserved: Vec<Request>,
    pub distance_km: f64,
    pub time_min: f64,
    pub co2_kg: f64,
    pub trace: Vec<DispatchState>,
}

impl DispatchOutcome {
    pub fn served_count(&self) -> usize {
        self.routes.iter().map(|r| r.served.len()).sum()
    }

    pub fn trip_count(&self) -> usize {
        self.routes.iter().map(|r| r.trips).sum()
    }

    pub fn final_state(&self) -> Option<&DispatchState> {
        self.trace.last()
    }
}
