pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::*;

pub mod constant {
    pub(crate) const SOLVER_TIMEOUT_SECS: u64 = 600;
    pub(crate) const SOLUTION_LIMIT: usize = 2000;
    pub(crate) const MAX_SHIFTS: usize = 5;
    pub(crate) const MAX_SINGLE_TRIP_VEHICLES: usize = 50;
    pub(crate) const BUDGET_MARGIN: f64 = 0.95;
    pub(crate) const ORDER_DROP_PENALTY: i64 = 9_999_999_999;
    pub(crate) const OVERLOAD_PENALTY: i64 = 20;
    pub(crate) const TABU_ITERATIONS: usize = 1000;
    pub(crate) const TABU_LEN_LOWER: usize = 11;
    pub(crate) const TABU_LEN_UPPER: usize = 29;
    pub(crate) const ASPIRATION_THRESHOLD: i64 = 20;
    pub(crate) const SEED: u64 = 64;
    pub(crate) const TRIALS: usize = 10;
    pub(crate) const CONFIG_PATH: &str = "cbsim.json";
    pub(crate) const RESULTS_DIR: &str = "results";
    pub(crate) const RESULTS_CSV: &str = "trials.csv";
    pub(crate) const PROBABILITY_TOLERANCE: f64 = 1e-6;
    pub(crate) const SIGNIFICANCE_LEVEL: f64 = 0.05;
}
