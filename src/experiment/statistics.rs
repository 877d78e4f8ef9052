use std::collections::BTreeMap;

use itertools::{Itertools, MinMaxResult};
use serde::Serialize;

use crate::experiment::trial::ResultRow;

/// Descriptive statistics of one metric over all trials. `std` and `var` are
/// population figures.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    /// Coefficient of variation, `std / mean`. Zero when the mean is zero.
    pub cv: f64,
    pub var: f64,
}

pub fn summarize(values: &[f64]) -> Option<Summary> {
    let (min, max) = match values.iter().copied().minmax_by(f64::total_cmp) {
        MinMaxResult::NoElements => return None,
        MinMaxResult::OneElement(v) => (v, v),
        MinMaxResult::MinMax(lo, hi) => (lo, hi),
    };
    let count = values.len();
    let mean = values.iter().sum::<f64>() / count as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    let std = var.sqrt();
    let cv = if mean == 0.0 { 0.0 } else { std / mean };

    Some(Summary {
        count,
        min,
        max,
        mean,
        std,
        cv,
        var,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioSummary {
    pub scenario: String,
    pub distance_km: Summary,
    pub time_min: Summary,
    pub vehicles: Summary,
    pub co2_kg: Summary,
    pub unserved: Summary,
}

#[derive(Default)]
struct TrialTotals {
    distance_km: f64,
    time_min: f64,
    vehicles: f64,
    co2_kg: f64,
    unserved: f64,
    last_stage: usize,
}

/// Sums the stages of each (scenario, trial) pair, then summarizes every
/// metric per scenario across trials. Scenarios come out sorted by name.
pub fn summarize_scenarios(rows: &[ResultRow]) -> Vec<ScenarioSummary> {
    let mut per_trial: BTreeMap<(&str, usize), TrialTotals> = BTreeMap::new();
    for row in rows {
        let totals = per_trial.entry((row.scenario.as_str(), row.trial)).or_default();
        totals.distance_km += row.distance_km;
        totals.time_min += row.time_min;
        totals.vehicles += row.vehicles_used as f64;
        totals.co2_kg += row.co2_kg;
        // leftovers of the last stage are what the scenario failed to serve
        if row.stage >= totals.last_stage {
            totals.last_stage = row.stage;
            totals.unserved = row.unserved as f64;
        }
    }

    let by_scenario = per_trial
        .into_iter()
        .map(|((scenario, _), totals)| (scenario, totals))
        .into_group_map();

    by_scenario
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(b.0))
        .filter_map(|(scenario, trials)| {
            let metric = |f: fn(&TrialTotals) -> f64| {
                summarize(&trials.iter().map(f).collect::<Vec<_>>())
            };
            Some(ScenarioSummary {
                scenario: scenario.to_string(),
                distance_km: metric(|t| t.distance_km)?,
                time_min: metric(|t| t.time_min)?,
                vehicles: metric(|t| t.vehicles)?,
                co2_kg: metric(|t| t.co2_kg)?,
                unserved: metric(|t| t.unserved)?,
            })
        })
        .collect()
}
