pub mod aggregator;
pub mod hypothesis;
pub mod runner;
pub mod snapshot;
pub mod statistics;
pub mod trial;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub use aggregator::{Aggregator, TrialMessage};
pub use hypothesis::{compare_scenarios, saved_distance, ScenarioComparison, StatsError};
pub use runner::{assign_trials, run_experiment, ExperimentSummary};
pub use snapshot::{read_snapshot, snapshot_path, write_snapshot};
pub use statistics::{summarize, summarize_scenarios, ScenarioSummary, Summary};
pub use trial::{run_scenario, run_trial, ResultRow, ScenarioReport, StageReport, TrialReport};
