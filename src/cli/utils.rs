//! Utilities for creating the command line interface.

use crate::{
    exit_on_error, exit_on_false,
    io::{OverwriteMode, Verbosity},
};
use clap::ArgMatches;
use indicatif::ProgressStyle;
use lazy_static::lazy_static;
use std::{path::PathBuf, str::FromStr};

lazy_static! {
    static ref DEFAULT_PROGRESS_STYLE: ProgressStyle = ProgressStyle::default_bar()
        .template("Progress: {bar:40}  {percent}% | ETA: {eta}")
        .unwrap_or_else(|_| ProgressStyle::default_bar());
}

pub fn parse_value_string<T>(argument_name: &str, value_string: &str) -> T
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    exit_on_error!(
        value_string.parse(),
        "Error: Could not parse value for {0}: {1}",
        argument_name
    )
}

/// Parses the value of the given optional argument, falling back to
/// `default_value` if it was not specified.
pub fn get_value_from_parseable_argument_with_default<T>(
    arguments: &ArgMatches,
    argument_name: &str,
    default_value: T,
) -> T
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    arguments
        .value_of(argument_name)
        .map_or(default_value, |value_string| {
            parse_value_string(argument_name, value_string)
        })
}

/// Like `get_value_from_parseable_argument_with_default`, but exits with an
/// error if the value is negative or not finite.
pub fn get_non_negative_float_value_with_default(
    arguments: &ArgMatches,
    argument_name: &str,
    default_value: f64,
) -> f64 {
    let value = get_value_from_parseable_argument_with_default(arguments, argument_name, default_value);
    exit_on_false!(
        value.is_finite() && value >= 0.0,
        "Error: {} must be finite and non-negative",
        argument_name
    );
    value
}

pub fn get_path_from_required_argument(arguments: &ArgMatches, argument_name: &str) -> PathBuf {
    exit_on_error!(
        PathBuf::from_str(
            arguments
                .value_of(argument_name)
                .expect("No value for required argument")
        ),
        "Error: Could not interpret path to {}: {}",
        argument_name
    )
}

pub fn get_path_from_optional_argument(
    arguments: &ArgMatches,
    argument_name: &str,
) -> Option<PathBuf> {
    arguments
        .value_of(argument_name)
        .map(|_| get_path_from_required_argument(arguments, argument_name))
}

pub fn overwrite_mode_from_arguments(arguments: &ArgMatches) -> OverwriteMode {
    if arguments.is_present("overwrite") {
        OverwriteMode::Always
    } else {
        OverwriteMode::Never
    }
}

/// Determines the verbosity from the `verbose` and (if supported) `progress`
/// arguments.
pub fn parse_verbosity(arguments: &ArgMatches, support_progress: bool) -> Verbosity {
    if support_progress && arguments.is_present("progress") {
        Verbosity::Progress(DEFAULT_PROGRESS_STYLE.clone())
    } else if arguments.is_present("verbose") {
        Verbosity::Messages
    } else {
        Verbosity::Quiet
    }
}

/// Sets up logging to standard error.
///
/// The level defaults to `info` when messages should be printed and `warn`
/// otherwise, and can be overridden with the `RUST_LOG` environment variable.
/// Repeated calls leave the first logger in place.
pub fn initialize_logger(verbosity: &Verbosity) {
    let default_filter = if verbosity.print_messages() {
        "info"
    } else {
        "warn"
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .try_init();
}
