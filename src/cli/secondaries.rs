//! Command line interface for extracting the showers induced by the
//! secondaries of propagated leptons.

use super::utils;
use crate::{
    error::Result,
    exit_on_error,
    io::utils::{self as io_utils, IOContext},
    secondaries::{self, LeptonState, RecordedTransporter, SecondaryFilterConfig},
    units::PEV,
};
use clap::{Arg, ArgMatches, Command};
use log::info;
use serde::Serialize;
use std::{fs, path::Path};

/// Creates a subcommand for computing lepton secondaries.
pub fn create_secondaries_subcommand(_parent_command_name: &'static str) -> Command<'static> {
    let command_name = "secondaries";

    Command::new(command_name)
        .about("Compute the showers induced along the tracks of propagated leptons")
        .long_about(
            "Compute the showers induced along the tracks of propagated leptons.\n\
             The transport output is replayed from TRANSPORT_FILE, a JSON list holding\n\
             one list of secondaries per propagation. The leptons are read from\n\
             LEPTONS_FILE, and the resulting shower lists are written as JSON to\n\
             OUTPUT_FILE.",
        )
        .arg(
            Arg::new("transport-file")
                .value_name("TRANSPORT_FILE")
                .help("Path to the JSON file with the recorded transport output")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::new("leptons-file")
                .value_name("LEPTONS_FILE")
                .help("Path to the JSON file with the leptons to propagate")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::new("output-file")
                .value_name("OUTPUT_FILE")
                .help("Path of the JSON output file to produce")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::new("min-shower-energy")
                .long("min-shower-energy")
                .require_equals(true)
                .value_name("ENERGY")
                .help("Minimum energy of a shower to be kept [PeV]")
                .takes_value(true)
                .default_value("0.5"),
        )
        .arg(
            Arg::new("compact-distance")
                .long("compact-distance")
                .require_equals(true)
                .value_name("DISTANCE")
                .help("Distance below which consecutive showers are merged [m]")
                .takes_value(true)
                .default_value("0.1"),
        )
        .arg(
            Arg::new("no-decay-muons")
                .long("no-decay-muons")
                .help("Do not propagate muons produced in tau decays"),
        )
        .arg(
            Arg::new("decays")
                .long("decays")
                .help("Output the decay distance and energy of each lepton instead of its showers"),
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
                .help("Print status messages"),
        )
}

/// Runs the actions for the `secondaries` subcommand using the given arguments.
pub fn run_secondaries_subcommand(arguments: &ArgMatches, io_context: &mut IOContext) {
    let verbosity = utils::parse_verbosity(arguments, false);
    utils::initialize_logger(&verbosity);

    let transport_file_path = utils::get_path_from_required_argument(arguments, "transport-file");
    let leptons_file_path = utils::get_path_from_required_argument(arguments, "leptons-file");
    let output_file_path = utils::get_path_from_required_argument(arguments, "output-file");

    io_context.set_overwrite_mode(utils::overwrite_mode_from_arguments(arguments));
    exit_on_error!(
        io_utils::check_write_allowed(&output_file_path, io_context.overwrite_mode()),
        "Error: {}"
    );

    let config = SecondaryFilterConfig {
        min_shower_energy: utils::get_non_negative_float_value_with_default(
            arguments,
            "min-shower-energy",
            secondaries::DEFAULT_MIN_SHOWER_ENERGY / PEV,
        ) * PEV,
        compact_distance: utils::get_non_negative_float_value_with_default(
            arguments,
            "compact-distance",
            secondaries::DEFAULT_COMPACT_DISTANCE,
        ),
        propagate_decay_muons: !arguments.is_present("no-decay-muons"),
        ..SecondaryFilterConfig::default()
    };

    let mut transporter = exit_on_error!(
        RecordedTransporter::from_file(&transport_file_path),
        "Error: Could not read transport output: {}"
    );
    let leptons = exit_on_error!(
        read_leptons(&leptons_file_path),
        "Error: Could not read leptons: {}"
    );
    info!("Propagating {} leptons", leptons.len());

    if arguments.is_present("decays") {
        let decays = exit_on_error!(
            secondaries::decays(
                &mut transporter,
                &leptons,
                secondaries::DEFAULT_DECAY_LOW_ENERGY,
                config.propagation_length,
                secondaries::DEFAULT_MAX_DECAY_ATTEMPTS,
            ),
            "Error: Could not compute decays: {}"
        );
        exit_on_error!(
            write_json(&output_file_path, &decays, io_context),
            "Error: Could not write output file: {}"
        );
    } else {
        let showers = exit_on_error!(
            secondaries::secondaries_array(&mut transporter, &leptons, &config),
            "Error: Could not compute secondaries: {}"
        );
        info!(
            "Found {} showers",
            showers.iter().map(Vec::len).sum::<usize>()
        );
        exit_on_error!(
            write_json(&output_file_path, &showers, io_context),
            "Error: Could not write output file: {}"
        );
    }
}

fn read_leptons(file_path: &Path) -> Result<Vec<LeptonState>> {
    let text = io_utils::read_text_file(file_path)?;
    Ok(serde_json::from_str(&text)?)
}

fn write_json<T: Serialize>(output_file_path: &Path, value: &T, io_context: &IOContext) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    let atomic_output_file = io_context.create_atomic_output_file(output_file_path.to_path_buf())?;
    fs::write(atomic_output_file.temporary_path(), text)?;
    io_context.close_atomic_output_file(atomic_output_file)?;
    Ok(())
}
