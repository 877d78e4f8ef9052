use std::env;
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::constant::{
    BUDGET_MARGIN, CONFIG_PATH, MAX_SHIFTS, MAX_SINGLE_TRIP_VEHICLES, RESULTS_DIR, SEED,
    SIGNIFICANCE_LEVEL, SOLUTION_LIMIT, SOLVER_TIMEOUT_SECS, TRIALS,
};
use crate::config::ConfigError;
use crate::demand::DemandConfig;
use crate::dispatch::TripPolicy;
use crate::domain::types::VehicleProfile;
use crate::network::BoundingBox;
use crate::solver::SearchLimits;

/// Runtime settings of an experiment, read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub vehicles: Vec<VehicleProfile>,
    pub scenarios: Vec<ScenarioConfig>,
    pub demand: DemandConfig,
    pub network: NetworkSettings,
    #[serde(default)]
    pub dispatch: DispatchSettings,
    #[serde(default = "default_trials")]
    pub trials: usize,
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// SQLite url. Falls back to the `DATABASE_URL` env var.
    #[serde(default)]
    pub database_url: Option<String>,
    /// Scenario pairs whose per-trial distances are tested against each other.
    #[serde(default)]
    pub comparisons: Vec<ComparisonConfig>,
    #[serde(default = "default_alpha")]
    pub alpha: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonConfig {
    pub baseline: String,
    pub alternative: String,
}

/// Ordered fleet stages. Demand left over by one stage is offered to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub name: String,
    pub stages: Vec<StageConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Name of a vehicle profile.
    pub vehicle: String,
    /// Overrides the trip policy's vehicle cap for this stage.
    #[serde(default)]
    pub max_vehicles: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    #[serde(flatten)]
    pub source: SourceSettings,
    /// Business table. Without one the network carries no delivery targets.
    #[serde(default)]
    pub businesses: Option<PathBuf>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    pub load_point: LoadPointSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSettings {
    Json { path: PathBuf },
    Grid { rows: usize, cols: usize, spacing_km: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadPointSettings {
    #[serde(default = "default_load_point_name")]
    pub name: String,
    /// Longitude.
    pub x: f64,
    /// Latitude.
    pub y: f64,
}

/// Knobs of the dispatch loop and the solver calls it makes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSettings {
    pub policy: TripPolicy,
    pub budget_margin: f64,
    pub time_limit_secs: u64,
    pub solution_limit: usize,
    pub max_shifts: usize,
    pub max_single_trip_vehicles: usize,
    /// Cost in meters of moving between two depot copies. Defaults to the
    /// vehicle's maximum distance.
    pub reload_penalty_m: Option<i64>,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        DispatchSettings {
            policy: TripPolicy::default(),
            budget_margin: BUDGET_MARGIN,
            time_limit_secs: SOLVER_TIMEOUT_SECS,
            solution_limit: SOLUTION_LIMIT,
            max_shifts: MAX_SHIFTS,
            max_single_trip_vehicles: MAX_SINGLE_TRIP_VEHICLES,
            reload_penalty_m: None,
        }
    }
}

impl DispatchSettings {
    pub fn search_limits(&self) -> SearchLimits {
        SearchLimits {
            time_limit: Duration::from_secs(self.time_limit_secs),
            solution_limit: self.solution_limit,
        }
    }

    /// Vehicle cap of the configured policy.
    pub fn vehicle_cap(&self) -> usize {
        match self.policy {
            TripPolicy::MultiTrip => self.max_shifts,
            TripPolicy::SingleTrip => self.max_single_trip_vehicles,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.budget_margin > 0.0 && self.budget_margin <= 1.0) {
            return Err(ConfigError::NonPositive {
                field: "dispatch.budget_margin",
                value: self.budget_margin,
            });
        }
        for (field, value) in [
            ("dispatch.solution_limit", self.solution_limit),
            ("dispatch.max_shifts", self.max_shifts),
            ("dispatch.max_single_trip_vehicles", self.max_single_trip_vehicles),
        ] {
            if value == 0 {
                return Err(ConfigError::NonPositive { field, value: 0.0 });
            }
        }
        if let Some(penalty) = self.reload_penalty_m.filter(|p| *p < 0) {
            return Err(ConfigError::NonPositive {
                field: "dispatch.reload_penalty_m",
                value: penalty as f64,
            });
        }
        Ok(())
    }
}

fn default_trials() -> usize {
    TRIALS
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_seed() -> u64 {
    SEED
}

fn default_alpha() -> f64 {
    SIGNIFICANCE_LEVEL
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(RESULTS_DIR)
}

fn default_load_point_name() -> String {
    "load point".to_string()
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
        let mut config: ExperimentConfig = serde_json::from_str(&content)?;
        if config.database_url.is_none() {
            config.database_url = env::var("DATABASE_URL").ok();
        }
        config.validate()?;
        info!(
            "Loaded experiment config from {}: {} vehicle classes, {} scenarios, {} trials",
            path.display(),
            config.vehicles.len(),
            config.scenarios.len(),
            config.trials
        );
        Ok(config)
    }

    /// Loads the file named by `CBSIM_CONFIG` (`.env` is honoured), or
    /// `cbsim.json` in the working directory.
    pub fn from_env() -> Result<Self, Box<dyn Error>> {
        dotenv().ok();
        let path = env::var("CBSIM_CONFIG").unwrap_or_else(|_| {
            warn!("CBSIM_CONFIG not set, using {}", CONFIG_PATH);
            CONFIG_PATH.to_string()
        });
        Self::load(Path::new(&path))
    }

    pub fn vehicle(&self, name: &str) -> Result<&VehicleProfile, ConfigError> {
        self.vehicles
            .iter()
            .find(|v| v.name == name)
            .ok_or_else(|| ConfigError::UnknownVehicleClass(name.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for vehicle in &self.vehicles {
            vehicle.validate()?;
        }
        if self.trials == 0 {
            return Err(ConfigError::NonPositive { field: "trials", value: 0.0 });
        }
        if self.workers == 0 {
            return Err(ConfigError::NonPositive { field: "workers", value: 0.0 });
        }
        if self.scenarios.is_empty() {
            return Err(ConfigError::EmptyScenario("<none>".to_string()));
        }
        for scenario in &self.scenarios {
            if scenario.stages.is_empty() {
                return Err(ConfigError::EmptyScenario(scenario.name.clone()));
            }
            for stage in &scenario.stages {
                self.vehicle(&stage.vehicle)?;
                if stage.max_vehicles == Some(0) {
                    return Err(ConfigError::NonPositive {
                        field: "stages.max_vehicles",
                        value: 0.0,
                    });
                }
            }
        }
        if let SourceSettings::Grid { rows, cols, spacing_km } = self.network.source {
            if rows == 0 || cols == 0 || !(spacing_km.is_finite() && spacing_km > 0.0) {
                return Err(ConfigError::NonPositive {
                    field: "network.spacing_km",
                    value: spacing_km,
                });
            }
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(ConfigError::InvalidSignificance(self.alpha));
        }
        for pair in &self.comparisons {
            for name in [&pair.baseline, &pair.alternative] {
                if !self.scenarios.iter().any(|s| &s.name == name) {
                    return Err(ConfigError::UnknownScenario(name.clone()));
                }
            }
        }
        self.demand.validate()?;
        self.dispatch.validate()
    }
}
