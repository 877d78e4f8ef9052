/// Amount by which a route breaks each dimension bound.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Excess {
    /// Grams over capacity, summed over trips.
    pub weight: i64,
    /// Cubic millimeters over cargo volume, summed over trips.
    pub volume: i64,
    /// Meters over the distance bound.
    pub distance: i64,
    /// Minutes over the time bound.
    pub time: i64,
}

impl Excess {
    pub fn is_feasible(&self) -> bool {
        *self == Excess::default()
    }
}

/// Overload penalty added to the fitness of infeasible routes. Volume counts
/// in cubic centimeters so that it weighs like the other dimensions.
pub fn penalty(excess: &Excess, penalty_value: i64) -> i64 {
    let units = excess
        .weight
        .saturating_add(excess.volume / 1000 + (excess.volume % 1000).signum())
        .saturating_add(excess.distance)
        .saturating_add(excess.time);
    units.saturating_mul(penalty_value)
}
