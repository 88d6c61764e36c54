//! Function for running the command line program.

use super::{
    build, secondaries::run_secondaries_subcommand, simulate::run_simulate_subcommand,
};
use crate::io::utils::IOContext;
use clap::ArgMatches;
use std::time::Instant;

/// Runs the `askaryan` command line program.
pub fn run() {
    let arguments = build::build().get_matches();
    run_with_args(arguments, IOContext::new());
}

/// Runs the `askaryan` command line program with the given parsed arguments.
pub fn run_with_args(arguments: ArgMatches, mut io_context: IOContext) {
    let start_instant = Instant::now();

    if let Some(simulate_arguments) = arguments.subcommand_matches("simulate") {
        run_simulate_subcommand(simulate_arguments, &mut io_context);
    }
    if let Some(secondaries_arguments) = arguments.subcommand_matches("secondaries") {
        run_secondaries_subcommand(secondaries_arguments, &mut io_context);
    }

    if arguments.is_present("timing") {
        println!("Elapsed time: {} s", start_instant.elapsed().as_secs_f64());
    }
}
