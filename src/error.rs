//! Error handling.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors that can occur while setting up or running a simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Output file {} already exists", .0.to_string_lossy())]
    OutputExists(PathBuf),
    #[error("Missing resource: {0}")]
    Resource(String),
    #[error("Ray tracing failed: {0}")]
    RayTracing(String),
    #[error("Pulse synthesis failed: {0}")]
    Synthesis(String),
    #[error("Particle transport failed: {0}")]
    Transport(String),
    #[error("Invalid input data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml_ng::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type for fallible simulation operations.
pub type Result<T> = std::result::Result<T, SimulationError>;

#[cfg(not(feature = "for-testing"))]
#[macro_export]
macro_rules! exit_with_error {
    ($($print_arg:tt)*) => {{
        eprintln!($($print_arg)*);
        quit::with_code(1);
    }};
}

#[cfg(feature = "for-testing")]
#[macro_export]
macro_rules! exit_with_error {
    ($($print_arg:tt)*) => {{
        panic!($($print_arg)*);
    }};
}

#[macro_export]
macro_rules! exit_on_error {
    ($result:expr, $($print_arg:tt)*) => {
        match $result {
            Ok(value) => value,
            Err(err) => {
                $crate::exit_with_error!($($print_arg)*, err)
            }
        }
    };
}

#[macro_export]
macro_rules! exit_on_false {
    ($logic:expr, $($print_arg:tt)*) => {
        if $logic {
            true
        } else {
            $crate::exit_with_error!($($print_arg)*)
        }
    };
}

#[macro_export]
macro_rules! exit_on_none {
    ($option:expr, $($print_arg:tt)*) => {
        $option.unwrap_or_else(|| $crate::exit_with_error!($($print_arg)*))
    };
}
