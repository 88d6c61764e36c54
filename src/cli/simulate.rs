//! Command line interface for simulating the detector response to a set of
//! showers.

use super::utils;
use crate::{
    config::SimulationConfig,
    exit_on_error,
    io::utils::IOContext,
    simulation::{self, SimulationOutcome},
    units::KM,
};
use clap::{Arg, ArgMatches, Command};

/// Creates a subcommand for running a simulation.
pub fn create_simulate_subcommand(_parent_command_name: &'static str) -> Command<'static> {
    let command_name = "simulate";

    Command::new(command_name)
        .about("Simulate the detector response to a set of neutrino-induced showers")
        .long_about(
            "Simulate the detector response to a set of neutrino-induced showers.\n\
             Radio pulses are propagated from every shower to every antenna of the\n\
             detector, and the triggers are evaluated for every causally independent\n\
             group of arriving pulses. The results are written to OUTPUT_FILE.",
        )
        .arg(
            Arg::new("input-file")
                .value_name("INPUT_FILE")
                .help("Path to the file with the input showers")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::new("detector-file")
                .value_name("DETECTOR_FILE")
                .help("Path to the JSON file describing the detector")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::new("output-file")
                .value_name("OUTPUT_FILE")
                .help("Path of the output file to produce")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .require_equals(true)
                .value_name("CONFIG_FILE")
                .help(
                    "Path to a YAML file with configuration values overriding the defaults",
                )
                .takes_value(true),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .require_equals(true)
                .value_name("SEED")
                .help("Seed for the random number generator [default: from configuration]")
                .takes_value(true),
        )
        .arg(
            Arg::new("save-all")
                .long("save-all")
                .help("Also save showers that did not trigger the detector"),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .help("Automatically overwrite any existing output file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Print status messages related to the simulation"),
        )
        .arg(
            Arg::new("progress")
                .short('p')
                .long("progress")
                .help("Show progress bar for the simulation (implies `verbose`)"),
        )
}

/// Runs the actions for the `simulate` subcommand using the given arguments.
pub fn run_simulate_subcommand(arguments: &ArgMatches, io_context: &mut IOContext) {
    let verbosity = utils::parse_verbosity(arguments, true);
    utils::initialize_logger(&verbosity);

    let input_file_path = utils::get_path_from_required_argument(arguments, "input-file");
    let detector_file_path = utils::get_path_from_required_argument(arguments, "detector-file");
    let output_file_path = utils::get_path_from_required_argument(arguments, "output-file");
    let config_file_path = utils::get_path_from_optional_argument(arguments, "config");

    let mut config = exit_on_error!(
        SimulationConfig::from_file(config_file_path.as_deref()),
        "Error: Could not read configuration: {}"
    );
    if arguments.is_present("save-all") {
        config.save_all = true;
    }
    if let Some(seed_string) = arguments.value_of("seed") {
        config.seed = Some(utils::parse_value_string("seed", seed_string));
    }

    io_context.set_overwrite_mode(utils::overwrite_mode_from_arguments(arguments));

    let outcome = exit_on_error!(
        simulation::simulate_files(
            &input_file_path,
            &detector_file_path,
            &output_file_path,
            config,
            io_context,
            &verbosity,
            Some(chrono::Local::now().to_rfc3339()),
        ),
        "Error: Simulation failed: {}"
    );

    print_summary(&outcome);
}

fn print_summary(outcome: &SimulationOutcome) {
    match outcome.effective_volume.as_ref() {
        Some(effective_volume) => println!(
            "Triggered event groups: {} (weighted {:.4})\n\
             Veff = {:.4e} m^3 = {:.4e} km^3\n\
             Veff = {:.4e} m^3 sr = {:.4e} km^3 sr",
            effective_volume.n_triggered,
            effective_volume.n_triggered_weighted,
            effective_volume.veff,
            effective_volume.veff / KM.powi(3),
            effective_volume.veff_sr,
            effective_volume.veff_sr / KM.powi(3)
        ),
        None => println!("Triggered showers: {}", outcome.n_triggered_showers),
    }
}
