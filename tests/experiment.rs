use std::fs;
use std::path::Path;
use std::sync::Arc;

use cbsim::config::{ComparisonConfig, ExperimentConfig};
use cbsim::dispatch::Dispatcher;
use cbsim::experiment::{read_snapshot, run_experiment, run_scenario, run_trial, snapshot_path, write_snapshot};
use cbsim::setup::setup;
use cbsim::solver::{RouteSolver, TabuRouteSolver};

const BUSINESSES: &str = "NAME,AMENITY,SHOP,TOURISM,OFFICE,X,Y
Cafe Rynek,cafe,,,,0.0027,0.0054
Bistro,restaurant,,,,0.0081,0.0027
Bank Polski,bank,,,,0.0054,0.0081
Apteka,pharmacy,,,,0.0081,0.0081
Bar Mleczny,fast_food,,,,0.0,0.0081
";

fn config(dir: &Path, trials: usize) -> ExperimentConfig {
    let businesses = dir.join("businesses.csv");
    fs::write(&businesses, BUSINESSES).unwrap();

    let json = format!(
        r#"{{
        "vehicles": [
            {{"name": "bike", "vehicle_capacity": 20000, "cargo_length": 600,
             "cargo_width": 500, "cargo_height": 500, "average_speed": 15,
             "max_distance": 40, "max_time": 480, "service_time": 2}},
            {{"name": "van", "vehicle_capacity": 800000, "cargo_length": 2500,
             "cargo_width": 1500, "cargo_height": 1500, "average_speed": 25,
             "max_distance": 200, "max_time": 480, "service_time": 3,
             "emissions": {{"consumption": 9.0, "emission_factor": 2.64}}}}
        ],
        "scenarios": [
            {{"name": "vans", "stages": [{{"vehicle": "van"}}]}},
            {{"name": "bike then vans",
             "stages": [{{"vehicle": "bike", "max_vehicles": 1}}, {{"vehicle": "van"}}]}}
        ],
        "demand": {{
            "probabilities": {{"F_D": 0.6, "O_S": 0.4}},
            "weight": {{"law": 0, "location": 500, "scale": 4000}},
            "dimensions": {{"law": 0, "location": 100, "scale": 300}},
            "request_count": {{"fixed": 12}}
        }},
        "network": {{
            "kind": "grid", "rows": 4, "cols": 4, "spacing_km": 0.3,
            "businesses": {businesses:?},
            "load_point": {{"name": "hub", "x": 0.0, "y": 0.0}}
        }},
        "dispatch": {{"time_limit_secs": 10}},
        "trials": {trials},
        "workers": 2,
        "seed": 7,
        "output_dir": {output:?}
    }}"#,
        businesses = businesses.to_string_lossy(),
        trials = trials,
        output = dir.join("results").to_string_lossy(),
    );
    let config: ExperimentConfig = serde_json::from_str(&json).unwrap();
    config.validate().unwrap();
    config
}

#[test]
fn same_seed_same_trial() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), 1);
    let (net, hub) = setup(&config.network).unwrap();
    let solver = TabuRouteSolver::default();

    let a = run_trial(0, 7, &net, &hub, &config, &solver).unwrap();
    let b = run_trial(0, 7, &net, &hub, &config, &solver).unwrap();

    assert_eq!(a.demand.len(), 12);
    assert_eq!(a.demand, b.demand);
    assert_eq!(a.scenarios, b.scenarios);

    let c = run_trial(1, 8, &net, &hub, &config, &solver).unwrap();
    assert_ne!(a.demand, c.demand);
}

#[test]
fn snapshot_replays_to_the_same_routes() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), 1);
    let (net, hub) = setup(&config.network).unwrap();
    let solver = TabuRouteSolver::default();

    let report = run_trial(0, 7, &net, &hub, &config, &solver).unwrap();
    fs::create_dir_all(&config.output_dir).unwrap();
    let path = write_snapshot(&config.output_dir, &report).unwrap();
    assert_eq!(path, snapshot_path(&config.output_dir, 0));

    let restored = read_snapshot(&path).unwrap();
    assert_eq!(restored.seed, 7);
    assert_eq!(restored.scenarios.len(), 2);

    let dispatcher = Dispatcher::new(&solver, net.sdm().unwrap(), &hub, &config.dispatch);
    let replay = run_scenario(&dispatcher, &config.scenarios[0], &config, restored.demand).unwrap();
    let paths = |stages: &[cbsim::experiment::StageReport]| -> Vec<Vec<u64>> {
        stages
            .iter()
            .flat_map(|s| s.outcome.routes.iter().map(|t| t.path.clone()))
            .collect()
    };
    assert_eq!(paths(&replay.stages), paths(&restored.scenarios[0].stages));
}

#[test]
fn leftovers_flow_to_the_next_stage() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), 1);
    let (net, hub) = setup(&config.network).unwrap();
    let report = run_trial(0, 7, &net, &hub, &config, &TabuRouteSolver::default()).unwrap();

    let mixed = &report.scenarios[1];
    assert_eq!(mixed.stages.len(), 2);
    let bike = &mixed.stages[0].outcome;
    let van = &mixed.stages[1].outcome;
    assert!(bike.vehicles_used <= 1);
    assert_eq!(bike.served_count() + van.served_count() + van.unserved.len(), 12);
    assert_eq!(bike.co2_kg, 0.0);
    assert_eq!(mixed.unserved(), van.unserved.len());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn experiment_persists_every_trial() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), 3);
    config.database_url = Some(format!("sqlite:{}", dir.path().join("cbsim.sqlite").display()));
    config.comparisons.push(ComparisonConfig {
        baseline: "vans".to_string(),
        alternative: "bike then vans".to_string(),
    });
    let (net, _) = setup(&config.network).unwrap();
    let output_dir = config.output_dir.clone();

    let solver: Arc<dyn RouteSolver> = Arc::new(TabuRouteSolver::default());
    let summary = run_experiment(Arc::new(config), Arc::new(net), solver).await.unwrap();

    // 3 trials x (1 + 2) stages
    assert_eq!(summary.rows.len(), 9);
    assert_eq!(summary.scenarios.len(), 2);
    assert!(summary.scenarios.iter().all(|s| s.distance_km.count == 3));
    assert_eq!(summary.comparisons.len(), 1);
    assert_eq!(summary.comparisons[0].saved_km.count, 3);
    assert_eq!(summary.comparisons[0].baseline, "vans");

    let csv = fs::read_to_string(output_dir.join("trials.csv")).unwrap();
    assert_eq!(csv.lines().count(), 10);
    for trial in 0..3 {
        let snapshot = read_snapshot(&snapshot_path(&output_dir, trial)).unwrap();
        assert_eq!(snapshot.seed, 7 + trial as u64);
    }
}
