//! The `askaryan` crate simulates the radio pulses emitted by neutrino-induced
//! particle showers in polar ice and their detection by antenna stations.

pub mod config;
pub mod constants;
pub mod detector;
pub mod error;
pub mod events;
pub mod fourier;
pub mod geometry;
pub mod io;
pub mod medium;
pub mod num;
pub mod particles;
pub mod propagation;
pub mod random;
pub mod response;
pub mod secondaries;
pub mod signal;
pub mod simulation;
pub mod units;
pub mod weights;

#[cfg(feature = "cli")]
pub mod cli;
