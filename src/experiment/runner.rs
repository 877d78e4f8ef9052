use std::error::Error;
use std::sync::Arc;

use futures::future::join_all;
use itertools::Itertools;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span};

use crate::config::{ConfigError, ExperimentConfig};
use crate::database::db_connection;
use crate::experiment::aggregator::{Aggregator, TrialMessage};
use crate::experiment::hypothesis::{compare_scenarios, ScenarioComparison};
use crate::experiment::statistics::{summarize_scenarios, ScenarioSummary};
use crate::experiment::trial::{run_trial, ResultRow};
use crate::experiment::BoxError;
use crate::network::Network;
use crate::solver::RouteSolver;

#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentSummary {
    pub rows: Vec<ResultRow>,
    pub scenarios: Vec<ScenarioSummary>,
    pub comparisons: Vec<ScenarioComparison>,
}

/// Trials handled by `worker` when trials are dealt round-robin.
pub fn assign_trials(worker: usize, workers: usize, trials: usize) -> Vec<usize> {
    (0..trials).skip(worker).step_by(workers.max(1)).collect()
}

fn boxed(e: BoxError) -> Box<dyn Error> {
    e
}

/// Runs `config.trials` independent trials on a pool of blocking workers.
/// Reports flow through a channel into a single aggregator that owns the
/// result files. A failing worker is logged and reported after everything
/// else has been flushed.
pub async fn run_experiment(
    config: Arc<ExperimentConfig>,
    network: Arc<Network>,
    solver: Arc<dyn RouteSolver>,
) -> Result<ExperimentSummary, Box<dyn Error>> {
    let sender = network
        .load_points()
        .next()
        .cloned()
        .ok_or(ConfigError::MissingLoadPoint)?;
    if network.sdm().is_none() {
        return Err(ConfigError::MissingDistanceMatrix.into());
    }

    let pool = match &config.database_url {
        Some(url) => Some(db_connection(url).await.map_err(boxed)?),
        None => None,
    };
    let aggregator = Aggregator::new(&config.output_dir, pool).map_err(boxed)?;
    let workers = config.workers.clamp(1, config.trials.max(1));
    let (tx, rx) = mpsc::channel::<TrialMessage>(workers * 2);
    let aggregator_handle = tokio::spawn(aggregator.run(rx));

    info!(
        "Running {} trials on {} workers, {} scenarios",
        config.trials,
        workers,
        config.scenarios.len()
    );

    let handles = (0..workers)
        .map(|worker| {
            let trials = assign_trials(worker, workers, config.trials);
            let config = Arc::clone(&config);
            let network = Arc::clone(&network);
            let solver = Arc::clone(&solver);
            let sender = sender.clone();
            let tx = tx.clone();
            tokio::task::spawn_blocking(move || -> Result<usize, BoxError> {
                let span = info_span!("worker", worker);
                let _guard = span.enter();
                // private copy, nothing is shared between workers but the solver
                let net: Network = (*network).clone();
                for &trial in &trials {
                    let seed = config.seed + trial as u64;
                    let report = run_trial(trial, seed, &net, &sender, &config, solver.as_ref())?;
                    tx.blocking_send(TrialMessage::Report(Box::new(report)))
                        .map_err(|_| "aggregator stopped before the trial was stored")?;
                }
                Ok(trials.len())
            })
        })
        .collect_vec();

    let mut failures = Vec::new();
    for (worker, result) in join_all(handles).await.into_iter().enumerate() {
        match result {
            Ok(Ok(done)) => debug!("Worker {} finished {} trials", worker, done),
            Ok(Err(e)) => {
                error!("Worker {} failed: {}", worker, e);
                failures.push(format!("worker {}: {}", worker, e));
            }
            Err(e) => {
                error!("Worker {} panicked: {}", worker, e);
                failures.push(format!("worker {}: {}", worker, e));
            }
        }
    }

    // the aggregator may already be gone if it failed
    let _ = tx.send(TrialMessage::Stop).await;
    drop(tx);
    let rows = aggregator_handle.await?.map_err(boxed)?;

    if !failures.is_empty() {
        return Err(format!("{} worker(s) failed: {}", failures.len(), failures.join("; ")).into());
    }

    let scenarios = summarize_scenarios(&rows);
    let comparisons = compare_scenarios(&rows, &config.comparisons, config.alpha);
    Ok(ExperimentSummary {
        rows,
        scenarios,
        comparisons,
    })
}
