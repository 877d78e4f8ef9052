pub mod matrix;

pub use matrix::{create_dm, DistanceMatrix};
