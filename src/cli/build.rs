//! Function for building the command line hierarchy.

use super::{secondaries::create_secondaries_subcommand, simulate::create_simulate_subcommand};
use clap::{self, Arg, Command};

/// Build the `askaryan` command line hierarchy.
pub fn build() -> Command<'static> {
    let command_name = "askaryan";
    Command::new(command_name)
        .version(clap::crate_version!())
        .about(clap::crate_description!())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .disable_help_subcommand(true)
        .arg(
            Arg::new("timing")
                .short('t')
                .long("timing")
                .help("Display elapsed time when done"),
        )
        .subcommand(create_simulate_subcommand(command_name))
        .subcommand(create_secondaries_subcommand(command_name))
}
