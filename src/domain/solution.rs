use serde::{Deserialize, Serialize};

/// A visited location with the cumulative values on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteStop {
    pub location: usize,
    /// Grams carried since the last depot/reload visit.
    pub load: i64,
    /// Cubic millimeters since the last depot/reload visit.
    pub volume: i64,
    /// Minutes since the start of the route.
    pub time: i64,
    /// Meters since the start of the route.
    pub distance: i64,
}

/// Single-vehicle route returned by a solver. Starts and ends at the depot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSolution {
    pub stops: Vec<RouteStop>,
    /// Locations left out of the route (orders and unused reloads).
    pub dropped: Vec<usize>,
    pub objective: i64,
    /// Meters, excluding reload penalties.
    pub distance: i64,
    /// Minutes.
    pub time: i64,
    /// Total delivered weight in grams.
    pub load: i64,
}

impl RouteSolution {
    pub fn locations(&self) -> Vec<usize> {
        self.stops.iter().map(|stop| stop.location).collect()
    }
}
