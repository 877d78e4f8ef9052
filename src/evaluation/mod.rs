pub mod fitness;
pub mod penalty;

pub use fitness::{drop_cost, find_distance, find_fitness, trace_route, RouteTrace};
pub use penalty::{penalty, Excess};
