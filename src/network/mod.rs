pub mod business;
pub mod graph;
pub mod source;

pub use graph::{haversine_km, BoundingBox, Network};
pub use source::{JsonNetworkSource, NetworkSource};
