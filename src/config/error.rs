use std::error::Error;
use std::fmt;

use crate::domain::types::NodeType;

/// Malformed vehicle profiles, demand laws or experiment settings.
///
/// Raised while validating input, before any trial starts.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    NonPositive { field: &'static str, value: f64 },
    UnknownLaw(u8),
    InvalidScale(f64),
    InvalidLocation(f64),
    InvalidProbability { category: NodeType, value: f64 },
    ProbabilitySum(f64),
    MissingCategoryWeight(NodeType),
    UnknownCategory(String),
    UnknownVehicleClass(String),
    EmptyScenario(String),
    UnknownScenario(String),
    InvalidSignificance(f64),
    InvalidLink { from: u64, to: u64, weight: f64 },
    UnknownNode(u64),
    DuplicateNode(u64),
    NoIntersections,
    MissingLoadPoint,
    MissingDistanceMatrix,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NonPositive { field, value } => {
                write!(f, "{} must be positive, got {}", field, value)
            }
            ConfigError::UnknownLaw(law) => write!(
                f,
                "unknown distribution law {} (expected 0 uniform, 1 normal, 2 exponential)",
                law
            ),
            ConfigError::InvalidScale(scale) => {
                write!(f, "distribution scale must be finite and >= 0, got {}", scale)
            }
            ConfigError::InvalidLocation(location) => {
                write!(f, "distribution location must be finite, got {}", location)
            }
            ConfigError::InvalidProbability { category, value } => {
                write!(f, "probability for {:?} must be in [0, 1], got {}", category, value)
            }
            ConfigError::ProbabilitySum(sum) => {
                write!(f, "category probabilities must sum to 1, got {}", sum)
            }
            ConfigError::MissingCategoryWeight(category) => write!(
                f,
                "category {:?} is present among candidate nodes but has no probability",
                category
            ),
            ConfigError::UnknownCategory(code) => write!(f, "unknown node category '{}'", code),
            ConfigError::UnknownVehicleClass(name) => {
                write!(f, "scenario references unknown vehicle class '{}'", name)
            }
            ConfigError::EmptyScenario(name) => write!(f, "scenario '{}' has no stages", name),
            ConfigError::UnknownScenario(name) => {
                write!(f, "comparison references unknown scenario '{}'", name)
            }
            ConfigError::InvalidSignificance(alpha) => {
                write!(f, "significance level must be in (0, 1), got {}", alpha)
            }
            ConfigError::InvalidLink { from, to, weight } => write!(
                f,
                "link {} -> {} has invalid weight {} (must be finite and >= 0)",
                from, to, weight
            ),
            ConfigError::UnknownNode(id) => write!(f, "link references unknown node {}", id),
            ConfigError::DuplicateNode(id) => write!(f, "node {} is defined twice", id),
            ConfigError::NoIntersections => {
                write!(f, "network has no intersections to attach nodes to")
            }
            ConfigError::MissingLoadPoint => write!(f, "network has no load point"),
            ConfigError::MissingDistanceMatrix => {
                write!(f, "distance matrix has not been built for this network")
            }
        }
    }
}

impl Error for ConfigError {}
