pub mod engine;
pub mod types;

pub use engine::Dispatcher;
pub use types::{DispatchOutcome, DispatchState, ExhaustReason, Trip, TripPolicy};
