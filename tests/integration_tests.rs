mod common;

use askaryan::io::table::Value;
use common::run;
use std::fs;

const ZERO_SIGNAL_CONFIG: &str = "seed: 3\nweights:\n  weight_mode: none\nsignal:\n  zerosignal: true\n";

def_test!(
OUT[input = "input.dat", detector = "detector.json", output = "output.dat"]
fn simulation_writes_output_with_run_metadata {
    common::write_input_file(input);
    common::write_detector_file(detector);
    run(["simulate", input, detector, output, "--seed=7"]);
    common::assert_file_exists(output);

    let table = common::read_output_file(output);
    assert_eq!(
        table.attribute("trigger_names").and_then(Value::as_text),
        Some(&["simple_threshold".to_string(), "majority".to_string()][..])
    );
    assert!(table.text_attribute("config").unwrap().contains("seed: 7"));
    assert!(table.text_attribute("creation_date").is_some());
    assert_eq!(table.float_attribute("n_events"), Some(2.0));
    assert!(table.float_attribute("Vrms").unwrap() > 0.0);

    let n_saved = table.bool_dataset("triggered").unwrap().len();
    assert_eq!(table.float_dataset("weights").unwrap().len(), n_saved);
    assert_eq!(table.int_dataset("event_group_ids").unwrap().len(), n_saved);
});

def_test!(
OUT[input = "input.dat", detector = "detector.json", config = "config.yaml", output = "output.dat"]
fn zero_signal_saves_nothing_by_default {
    common::write_input_file(input);
    common::write_detector_file(detector);
    common::write_text_file(config, ZERO_SIGNAL_CONFIG);
    let config_argument = format!("--config={}", config);
    run(["simulate", input, detector, output, config_argument.as_str()]);

    let table = common::read_output_file(output);
    assert_eq!(table.bool_dataset("triggered").unwrap().len(), 0);
    assert_eq!(table.float_dataset("weights").unwrap().len(), 0);
});

def_test!(
OUT[input = "input.dat", detector = "detector.json", config = "config.yaml", output = "output.dat"]
fn saving_all_keeps_untriggered_showers {
    common::write_input_file(input);
    common::write_detector_file(detector);
    common::write_text_file(config, ZERO_SIGNAL_CONFIG);
    let config_argument = format!("--config={}", config);
    run([
        "simulate",
        input,
        detector,
        output,
        config_argument.as_str(),
        "--save-all",
    ]);

    let table = common::read_output_file(output);
    assert_eq!(
        table.bool_dataset("triggered").unwrap().as_slice().unwrap(),
        &[false, false]
    );
    let station = table.group("station_11").unwrap();
    assert_eq!(
        station.bool_dataset("triggered").unwrap().as_slice().unwrap(),
        &[false, false]
    );
    assert_eq!(station.float_dataset("travel_times").unwrap().shape()[0], 2);
});

def_test!(
OUT[input = "input.dat", detector = "detector.json", config = "config.yaml", output = "output.dat"]
fn existing_output_is_overwritten_when_requested {
    common::write_input_file(input);
    common::write_detector_file(detector);
    common::write_text_file(config, ZERO_SIGNAL_CONFIG);
    common::write_text_file(output, "stale");
    let config_argument = format!("--config={}", config);
    run([
        "simulate",
        input,
        detector,
        output,
        config_argument.as_str(),
        "--overwrite",
    ]);

    let table = common::read_output_file(output);
    assert!(table.has_dataset("triggered"));
});

#[test]
#[should_panic]
fn existing_output_is_not_overwritten_by_default() {
    let test = common::Test::new("existing_output_is_not_overwritten_by_default");
    let input = test.output_path("input.dat");
    let detector = test.output_path("detector.json");
    let output = test.output_path("output.dat");
    common::write_input_file(&input);
    common::write_detector_file(&detector);
    common::write_text_file(&output, "stale");
    run([
        "simulate",
        path_str!(input),
        path_str!(detector),
        path_str!(output),
    ]);
}

const TAU: &str = r#"[{"code": 15, "energy": 1e17, "position": [0.0, 0.0, 0.0], "direction": [0.0, 0.0, -1.0]}]"#;

const TAU_TRACKS: &str = r#"[
  [
    {"type_code": 1000000007, "energy": 9.0e16, "parent_energy": 9.9e16, "position": [0.0, 0.0, -100.0]},
    {"type_code": 211, "energy": 5.0e15, "position": [0.0, 0.0, -200.0]},
    {"type_code": 13, "energy": 2.0e16, "position": [0.0, 0.0, -200.0]}
  ],
  [
    {"type_code": 1000000002, "energy": 1.0e16, "parent_energy": 2.0e16, "position": [0.0, 0.0, -150.0]}
  ]
]"#;

fn shower_names(output: &str) -> Vec<String> {
    let text = fs::read_to_string(output).unwrap();
    let showers: serde_json::Value = serde_json::from_str(&text).unwrap();
    showers[0]
        .as_array()
        .unwrap()
        .iter()
        .map(|shower| shower["name"].as_str().unwrap().to_string())
        .collect()
}

def_test!(
OUT[transport = "transport.json", leptons = "leptons.json", output = "showers.json"]
fn secondaries_include_decay_muon_showers {
    common::write_text_file(transport, TAU_TRACKS);
    common::write_text_file(leptons, TAU);
    run(["secondaries", transport, leptons, output]);
    common::assert_file_exists(output);
    assert_eq!(shower_names(output), vec!["hadrons", "pi+", "brems"]);
});

def_test!(
OUT[transport = "transport.json", leptons = "leptons.json", output = "showers.json"]
fn secondaries_without_decay_muons_skip_muon_track {
    common::write_text_file(transport, TAU_TRACKS);
    common::write_text_file(leptons, TAU);
    run(["secondaries", transport, leptons, output, "--no-decay-muons"]);
    assert_eq!(shower_names(output), vec!["hadrons", "pi+"]);
});

def_test!(
OUT[transport = "transport.json", leptons = "leptons.json", output = "showers.json"]
fn secondaries_energy_threshold_drops_small_showers {
    common::write_text_file(transport, TAU_TRACKS);
    common::write_text_file(leptons, TAU);
    run([
        "secondaries",
        transport,
        leptons,
        output,
        "--no-decay-muons",
        "--min-shower-energy=6",
    ]);
    assert_eq!(shower_names(output), vec!["hadrons"]);
});
