use std::error::Error;
use std::sync::Arc;

use colored::*;
use tracing::{info, span, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::ExperimentConfig;
use crate::experiment::{run_experiment, ExperimentSummary, ScenarioComparison};
use crate::setup::setup;
use crate::solver::{RouteSolver, TabuRouteSolver};

/// Initialize tracing and environment
fn init_tracing_and_env() {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            fmt::layer()
                .with_span_events(fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE)
                .pretty(),
        )
        .init();
}

pub async fn run() -> Result<(), Box<dyn Error>> {
    init_tracing_and_env();
    let config = ExperimentConfig::from_env()?;

    info!(
        "Starting experiment: {} trials, {} scenarios, {} vehicle classes",
        config.trials,
        config.scenarios.len(),
        config.vehicles.len()
    );

    let network = {
        let span = span!(Level::INFO, "network");
        let _guard = span.enter();
        let (network, load_point) = setup(&config.network)?;
        info!(
            "Load point '{}' attached to intersection {:?}",
            load_point.name, load_point.closest_itsc
        );
        network
    };

    let solver: Arc<dyn RouteSolver> = Arc::new(TabuRouteSolver::default());
    let summary = run_experiment(Arc::new(config), Arc::new(network), solver).await?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &ExperimentSummary) {
    println!(
        "{}",
        format!("Results: {} rows", summary.rows.len()).bold()
    );
    for scenario in &summary.scenarios {
        println!("{}", scenario.scenario.cyan().bold());
        let lines = [
            ("distance [km]", &scenario.distance_km),
            ("time [min]", &scenario.time_min),
            ("vehicles", &scenario.vehicles),
            ("CO2 [kg]", &scenario.co2_kg),
            ("unserved", &scenario.unserved),
        ];
        for (label, s) in lines {
            let line = format!(
                "  {:<14} mean {:>10.3}  std {:>9.3}  min {:>10.3}  max {:>10.3}  cv {:>6.3}",
                label, s.mean, s.std, s.min, s.max, s.cv
            );
            if label == "unserved" && s.max > 0.0 {
                println!("{}", line.red());
            } else {
                println!("{}", line.green());
            }
        }
    }
    for c in &summary.comparisons {
        print_comparison(c);
    }
}

fn print_comparison(c: &ScenarioComparison) {
    println!(
        "{}",
        format!("{} vs {}", c.baseline, c.alternative).cyan().bold()
    );
    println!(
        "  saved [km]     mean {:>10.3}  std {:>9.3}  min {:>10.3}  max {:>10.3}",
        c.saved_km.mean, c.saved_km.std, c.saved_km.min, c.saved_km.max
    );
    if let Some(needed) = c.required_trials {
        let line = format!("  trials needed  {} (ran {})", needed, c.saved_km.count);
        if needed > c.saved_km.count {
            println!("{}", line.yellow());
        } else {
            println!("{}", line.green());
        }
    }
    if let Some(n) = c.normality {
        println!(
            "  normality      chi2 {:.3} < {:.3} (df {}): {}",
            n.chi2, n.critical, n.df, n.normal
        );
    }
    if let Some(v) = c.variances {
        println!("  variances      F {:.3} < {:.3}: {}", v.f, v.critical, v.equal);
    }
    if let Some(m) = c.means {
        let line = format!(
            "  means ({:?})   t {:.3} < {:.3} (df {}): {}",
            m.kind, m.t, m.critical, m.df, m.equal
        );
        if m.equal {
            println!("{}", line.yellow());
        } else {
            println!("{}", line.green());
        }
    }
}
