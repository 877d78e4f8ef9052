pub mod app;
pub mod config;
pub mod database;
pub mod demand;
pub mod dispatch;
pub mod distance;
pub mod domain;
pub mod evaluation;
pub mod experiment;
pub mod network;
pub mod routing;
pub mod setup;
pub mod solver;
pub mod utils;
