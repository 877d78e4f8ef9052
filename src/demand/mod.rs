pub mod generator;
pub mod stochastic;

pub use generator::{eligible_candidates, generate_requests, DemandConfig, RequestCount};
pub use stochastic::{Law, Sampler, Stochastic};
