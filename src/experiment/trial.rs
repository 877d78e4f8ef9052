use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span};

use crate::config::{ConfigError, ExperimentConfig, ScenarioConfig};
use crate::demand::generate_requests;
use crate::dispatch::{DispatchOutcome, Dispatcher};
use crate::domain::types::{Node, Request};
use crate::network::Network;
use crate::solver::RouteSolver;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: usize,
    pub outcome: DispatchOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub scenario: String,
    pub stages: Vec<StageReport>,
}

impl ScenarioReport {
    pub fn distance_km(&self) -> f64 {
        self.stages.iter().map(|s| s.outcome.distance_km).sum()
    }

    pub fn time_min(&self) -> f64 {
        self.stages.iter().map(|s| s.outcome.time_min).sum()
    }

    pub fn vehicles(&self) -> usize {
        self.stages.iter().map(|s| s.outcome.vehicles_used).sum()
    }

    pub fn co2_kg(&self) -> f64 {
        self.stages.iter().map(|s| s.outcome.co2_kg).sum()
    }

    /// Orders still unserved after the last stage.
    pub fn unserved(&self) -> usize {
        self.stages.last().map_or(0, |s| s.outcome.unserved.len())
    }
}

/// Everything one trial produced. Serialized as the trial snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialReport {
    pub trial: usize,
    pub seed: u64,
    pub timestamp: DateTime<Utc>,
    pub demand: Vec<Request>,
    pub scenarios: Vec<ScenarioReport>,
}

/// One line of the results table: one stage of one scenario of one trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub timestamp: String,
    pub trial: usize,
    pub seed: u64,
    pub scenario: String,
    pub stage: usize,
    pub vehicle_class: String,
    pub vehicles_used: usize,
    pub trips: usize,
    pub distance_km: f64,
    pub time_min: f64,
    pub served: usize,
    pub unserved: usize,
    pub co2_kg: f64,
}

impl TrialReport {
    pub fn rows(&self) -> Vec<ResultRow> {
        let timestamp = self.timestamp.to_rfc3339();
        self.scenarios
            .iter()
            .flat_map(|scenario| {
                let timestamp = timestamp.clone();
                scenario.stages.iter().map(move |stage| ResultRow {
                    timestamp: timestamp.clone(),
                    trial: self.trial,
                    seed: self.seed,
                    scenario: scenario.scenario.clone(),
                    stage: stage.stage,
                    vehicle_class: stage.outcome.vehicle_class.clone(),
                    vehicles_used: stage.outcome.vehicles_used,
                    trips: stage.outcome.trip_count(),
                    distance_km: stage.outcome.distance_km,
                    time_min: stage.outcome.time_min,
                    served: stage.outcome.served_count(),
                    unserved: stage.outcome.unserved.len(),
                    co2_kg: stage.outcome.co2_kg,
                })
            })
            .collect()
    }
}

/// Runs the stages of a scenario in order. Each stage gets what the previous
/// one left unserved.
pub fn run_scenario(
    dispatcher: &Dispatcher,
    scenario: &ScenarioConfig,
    config: &ExperimentConfig,
    demand: Vec<Request>,
) -> Result<ScenarioReport, ConfigError> {
    let span = info_span!("scenario", name = %scenario.name);
    let _guard = span.enter();

    let mut remaining = demand;
    let mut stages = Vec::with_capacity(scenario.stages.len());
    for (stage, stage_config) in scenario.stages.iter().enumerate() {
        let profile = config.vehicle(&stage_config.vehicle)?;
        let outcome = dispatcher.dispatch(profile, remaining, stage_config.max_vehicles);
        remaining = outcome.unserved.clone();
        stages.push(StageReport { stage, outcome });
    }

    Ok(ScenarioReport {
        scenario: scenario.name.clone(),
        stages,
    })
}

/// Samples one demand set with `seed` and runs every scenario on it.
pub fn run_trial(
    trial: usize,
    seed: u64,
    net: &Network,
    sender: &Node,
    config: &ExperimentConfig,
    solver: &dyn RouteSolver,
) -> Result<TrialReport, ConfigError> {
    let span = info_span!("trial", trial, seed);
    let _guard = span.enter();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let demand = generate_requests(net, sender, &config.demand, &mut rng)?;
    let sdm = net.sdm().ok_or(ConfigError::MissingDistanceMatrix)?;
    let dispatcher = Dispatcher::new(solver, sdm, sender, &config.dispatch);

    let scenarios = config
        .scenarios
        .iter()
        .map(|scenario| run_scenario(&dispatcher, scenario, config, demand.clone()))
        .collect::<Result<Vec<_>, _>>()?;

    info!("Trial {} done: {} requests, {} scenarios", trial, demand.len(), scenarios.len());
    Ok(TrialReport {
        trial,
        seed,
        timestamp: Utc::now(),
        demand,
        scenarios,
    })
}
