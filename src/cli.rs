//! Command line interface for running the simulation pipeline.

pub mod build;
pub mod run;
pub mod secondaries;
pub mod simulate;
pub mod utils;
