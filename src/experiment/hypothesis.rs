//! Significance tests over per-trial totals: how many trials a metric needs,
//! whether it looks normal, and whether two scenarios differ.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor, Normal, StudentsT};
use tracing::{debug, warn};

use crate::config::ComparisonConfig;
use crate::experiment::statistics::{summarize, Summary};
use crate::experiment::trial::ResultRow;

#[derive(Debug, Clone, PartialEq)]
pub enum StatsError {
    TooFewSamples { needed: usize, got: usize },
    ZeroMean,
    ZeroVariance,
    Distribution(String),
}

impl fmt::Display for StatsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsError::TooFewSamples { needed, got } => {
                write!(f, "need at least {} samples, got {}", needed, got)
            }
            StatsError::ZeroMean => write!(f, "relative error is undefined for a zero mean"),
            StatsError::ZeroVariance => write!(f, "sample variance is zero"),
            StatsError::Distribution(e) => write!(f, "invalid distribution parameters: {}", e),
        }
    }
}

impl Error for StatsError {}

fn distribution_error(e: impl fmt::Display) -> StatsError {
    StatsError::Distribution(e.to_string())
}

fn needs(values: &[f64], needed: usize) -> Result<Summary, StatsError> {
    match summarize(values) {
        Some(s) if s.count >= needed => Ok(s),
        _ => Err(StatsError::TooFewSamples {
            needed,
            got: values.len(),
        }),
    }
}

/// Trials needed so the sample mean lies within `alpha * mean` of the true
/// mean with one-sided confidence `1 - alpha`.
pub fn required_samples(summary: &Summary, alpha: f64) -> Result<usize, StatsError> {
    if summary.mean == 0.0 {
        return Err(StatsError::ZeroMean);
    }
    let u = Normal::new(0.0, 1.0)
        .map_err(distribution_error)?
        .inverse_cdf(1.0 - alpha);
    let error = alpha * summary.mean;
    Ok((u * u * summary.var / (error * error)).round() as usize)
}

/// Bin count of Sturges' rule.
pub fn sturges(n: usize) -> usize {
    1 + (n.max(1) as f64).log2().floor() as usize
}

/// Counts `values` into `bins` equal-width bins spanning min to max. The last
/// bin is closed. Returns counts and the `bins + 1` edges.
pub fn histogram(values: &[f64], bins: usize) -> (Vec<usize>, Vec<f64>) {
    let bins = bins.max(1);
    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let (lo, hi) = if !lo.is_finite() {
        (0.0, 1.0)
    } else if lo == hi {
        (lo - 0.5, hi + 0.5)
    } else {
        (lo, hi)
    };
    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins)
        .map(|i| if i == bins { hi } else { lo + i as f64 * width })
        .collect();

    let mut counts = vec![0; bins];
    for &v in values {
        let bin = (((v - lo) / width).floor() as usize).min(bins - 1);
        counts[bin] += 1;
    }
    (counts, edges)
}

/// Pearson chi-square goodness of fit against a normal law fitted to the
/// sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalityTest {
    pub chi2: f64,
    pub critical: f64,
    pub df: usize,
    pub normal: bool,
}

pub fn chi_square_normality(values: &[f64], alpha: f64) -> Result<NormalityTest, StatsError> {
    // mean and std are estimated, so k bins leave k - 3 degrees of freedom
    let summary = needs(values, 8)?;
    if summary.std == 0.0 {
        return Err(StatsError::ZeroVariance);
    }
    let bins = sturges(values.len());
    let df = bins - 3;
    let (counts, edges) = histogram(values, bins);
    let fitted = Normal::new(summary.mean, summary.std).map_err(distribution_error)?;

    let n = values.len() as f64;
    let chi2 = counts
        .iter()
        .zip(edges.windows(2))
        .map(|(&observed, edge)| {
            let expected = n * (fitted.cdf(edge[1]) - fitted.cdf(edge[0]));
            let diff = observed as f64 - expected;
            match (expected > 0.0, observed) {
                (true, _) => diff * diff / expected,
                (false, 0) => 0.0,
                (false, _) => f64::INFINITY,
            }
        })
        .sum::<f64>();
    let critical = ChiSquared::new(df as f64)
        .map_err(distribution_error)?
        .inverse_cdf(1.0 - alpha);

    Ok(NormalityTest {
        chi2,
        critical,
        df,
        normal: chi2 < critical,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sample {
    First,
    Second,
}

/// Two-sided F test for equal variances, larger variance on top.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VarianceTest {
    pub f: f64,
    pub critical: f64,
    /// Which sample has the smaller variance.
    pub smaller: Sample,
    pub equal: bool,
}

pub fn equal_variance_test(xs: &[f64], ys: &[f64], alpha: f64) -> Result<VarianceTest, StatsError> {
    let x = needs(xs, 2)?;
    let y = needs(ys, 2)?;
    let (top, bottom, smaller) = if x.var >= y.var {
        (x, y, Sample::Second)
    } else {
        (y, x, Sample::First)
    };
    if bottom.var == 0.0 {
        return Err(StatsError::ZeroVariance);
    }
    let f = top.var / bottom.var;
    let critical = FisherSnedecor::new((top.count - 1) as f64, (bottom.count - 1) as f64)
        .map_err(distribution_error)?
        .inverse_cdf(1.0 - alpha / 2.0);

    Ok(VarianceTest {
        f,
        critical,
        smaller,
        equal: f < critical,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TTestKind {
    /// Student's test with pooled variance.
    Pooled,
    /// Welch's test with separate variances.
    Welch,
}

/// Two-sided t test for equal means.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MeanTest {
    pub kind: TTestKind,
    pub t: f64,
    pub critical: f64,
    pub df: f64,
    pub equal: bool,
}

fn t_test(kind: TTestKind, t: f64, df: f64, alpha: f64) -> Result<MeanTest, StatsError> {
    if !t.is_finite() {
        return Err(StatsError::ZeroVariance);
    }
    let critical = StudentsT::new(0.0, 1.0, df)
        .map_err(distribution_error)?
        .inverse_cdf(1.0 - alpha / 2.0);
    Ok(MeanTest {
        kind,
        t,
        critical,
        df,
        equal: t < critical,
    })
}

pub fn pooled_t_test(xs: &[f64], ys: &[f64], alpha: f64) -> Result<MeanTest, StatsError> {
    let x = needs(xs, 2)?;
    let y = needs(ys, 2)?;
    let (nx, ny) = (x.count as f64, y.count as f64);
    let df = nx + ny - 2.0;
    let pooled = ((nx - 1.0) * x.var + (ny - 1.0) * y.var) / df;
    let t = (x.mean - y.mean).abs() / (pooled * (1.0 / nx + 1.0 / ny)).sqrt();
    t_test(TTestKind::Pooled, t, df, alpha)
}

pub fn welch_t_test(xs: &[f64], ys: &[f64], alpha: f64) -> Result<MeanTest, StatsError> {
    let x = needs(xs, 2)?;
    let y = needs(ys, 2)?;
    let (nx, ny) = (x.count as f64, y.count as f64);
    let (sx, sy) = (x.var / nx, y.var / ny);
    let t = (x.mean - y.mean).abs() / (sx + sy).sqrt();
    let df = ((sx + sy).powi(2) / (sx * sx / (nx - 1.0) + sy * sy / (ny - 1.0))).round();
    t_test(TTestKind::Welch, t, df, alpha)
}

/// Pooled test when the F test accepts equal variances, Welch otherwise.
pub fn compare_means(xs: &[f64], ys: &[f64], alpha: f64) -> Result<(VarianceTest, MeanTest), StatsError> {
    let variances = equal_variance_test(xs, ys, alpha)?;
    let means = if variances.equal {
        pooled_t_test(xs, ys, alpha)?
    } else {
        welch_t_test(xs, ys, alpha)?
    };
    Ok((variances, means))
}

/// Total distance of `scenario` per trial, all stages summed.
pub fn trial_distances(rows: &[ResultRow], scenario: &str) -> BTreeMap<usize, f64> {
    let mut totals = BTreeMap::new();
    for row in rows.iter().filter(|r| r.scenario == scenario) {
        *totals.entry(row.trial).or_insert(0.0) += row.distance_km;
    }
    totals
}

/// Kilometers `alternative` saves over `baseline`, per trial both ran.
pub fn saved_distance(rows: &[ResultRow], baseline: &str, alternative: &str) -> Vec<f64> {
    let alternative = trial_distances(rows, alternative);
    trial_distances(rows, baseline)
        .into_iter()
        .filter_map(|(trial, base)| alternative.get(&trial).map(|alt| base - alt))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioComparison {
    pub baseline: String,
    pub alternative: String,
    pub saved_km: Summary,
    /// Trials needed to pin the mean saving down to `alpha` relative error.
    pub required_trials: Option<usize>,
    pub normality: Option<NormalityTest>,
    pub variances: Option<VarianceTest>,
    pub means: Option<MeanTest>,
}

fn logged<T>(result: Result<T, StatsError>, what: &str, pair: &ComparisonConfig) -> Option<T> {
    result
        .map_err(|e| warn!("{} of '{}' vs '{}' skipped: {}", what, pair.baseline, pair.alternative, e))
        .ok()
}

/// Runs every configured comparison on the distance totals of `rows`. Pairs
/// without a common trial are skipped.
pub fn compare_scenarios(rows: &[ResultRow], pairs: &[ComparisonConfig], alpha: f64) -> Vec<ScenarioComparison> {
    pairs
        .iter()
        .filter_map(|pair| {
            let saved = saved_distance(rows, &pair.baseline, &pair.alternative);
            let Some(saved_km) = summarize(&saved) else {
                warn!("No common trials for '{}' vs '{}'", pair.baseline, pair.alternative);
                return None;
            };
            let xs: Vec<f64> = trial_distances(rows, &pair.baseline).into_values().collect();
            let ys: Vec<f64> = trial_distances(rows, &pair.alternative).into_values().collect();
            let tests = logged(compare_means(&xs, &ys, alpha), "mean test", pair);
            let comparison = ScenarioComparison {
                baseline: pair.baseline.clone(),
                alternative: pair.alternative.clone(),
                required_trials: logged(required_samples(&saved_km, alpha), "sample size", pair),
                normality: logged(chi_square_normality(&saved, alpha), "normality test", pair),
                variances: tests.map(|(v, _)| v),
                means: tests.map(|(_, m)| m),
                saved_km,
            };
            debug!("{:?}", comparison);
            Some(comparison)
        })
        .collect()
}
