pub mod tabu_search;

use std::fmt;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::domain::solution::RouteSolution;
use crate::routing::RoutingProblem;

pub use tabu_search::TabuRouteSolver;

/// Result code of a solver call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolverStatus {
    NotSolved,
    Success,
    /// No feasible route serves any order.
    Fail,
    /// The time limit ran out before a first solution.
    FailTimeout,
    /// The problem is malformed.
    Invalid,
}

impl fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SolverStatus::NotSolved => "not solved",
            SolverStatus::Success => "success",
            SolverStatus::Fail => "fail",
            SolverStatus::FailTimeout => "fail (timeout)",
            SolverStatus::Invalid => "invalid",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    /// Wall-clock budget of one call.
    pub time_limit: Duration,
    /// Number of improving solutions after which the search stops.
    pub solution_limit: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub status: SolverStatus,
    pub solution: Option<RouteSolution>,
}

impl SolveOutcome {
    pub fn failed(status: SolverStatus) -> Self {
        SolveOutcome {
            status,
            solution: None,
        }
    }
}

/// Single-vehicle route optimizer. Implementations must only return routes
/// that respect every dimension bound of the problem.
pub trait RouteSolver: Send + Sync {
    fn solve(&self, problem: &RoutingProblem, limits: &SearchLimits) -> SolveOutcome;
}

/// Wall-clock and solution-count budget of a running search.
#[derive(Debug, Clone)]
pub struct Deadline {
    start: Instant,
    limits: SearchLimits,
    solutions: usize,
}

impl Deadline {
    pub fn start(limits: &SearchLimits) -> Self {
        Deadline {
            start: Instant::now(),
            limits: *limits,
            solutions: 0,
        }
    }

    pub fn expired(&self) -> bool {
        self.start.elapsed() >= self.limits.time_limit
    }

    pub fn record_solution(&mut self) {
        self.solutions += 1;
    }

    pub fn solutions_exhausted(&self) -> bool {
        self.solutions >= self.limits.solution_limit
    }

    /// True once either limit is reached.
    pub fn should_stop(&self) -> bool {
        self.expired() || self.solutions_exhausted()
    }
}
