use askaryan::{
    cli, exit_on_error,
    io::{table::DataTable, utils::IOContext, Endianness},
};
use lazy_static::lazy_static;
use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};

#[macro_export]
macro_rules! def_test {
    (
        OUT[$($out_ident:ident = $out_str:expr),*]
        fn $name:ident $test_body:expr
    ) => {
        #[test]
        fn $name() {
            let test = common::Test::new(stringify!($name));

            $( let $out_ident = test.output_path($out_str); )*

            let test_body = |$( $out_ident, )*| $test_body;

            test_body(
                $( path_str!($out_ident), )*
            );
        }
    };
}

#[macro_export]
macro_rules! path_str {
    ($path:expr) => {
        $path.to_string_lossy().as_ref()
    };
}

/// Depth of the shower vertices [m].
pub const VERTEX_DEPTH: f64 = -500.0;
/// Distance from the vertices to the antenna [m].
pub const DISTANCE: f64 = 300.0;

pub fn run<I, T>(args: I)
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    cli::run::run_with_args(COMMAND.clone().get_matches_from(args), IOContext::new());
}

pub fn assert_file_exists<P: AsRef<Path>>(file_path: P) {
    let file_path = file_path.as_ref();
    let exists = file_path.exists();
    assert!(
        exists,
        "File {} does not exist",
        file_path.to_string_lossy()
    );
}

/// Writes a detector with a single station holding one channel, placed on
/// the Cherenkov cone of a horizontal shower at the vertex depth.
pub fn write_detector_file<P: AsRef<Path>>(file_path: P) {
    let cherenkov_angle = f64::acos(1.0 / 1.78);
    let x = -DISTANCE * cherenkov_angle.cos();
    let z = VERTEX_DEPTH + DISTANCE * cherenkov_angle.sin();
    let text = format!(
        r#"{{
  "stations": [
    {{
      "station_id": 11,
      "position": [0.0, 0.0, 0.0],
      "sampling_frequency": 2.0,
      "number_of_samples": 512,
      "channels": [{{"channel_id": 0, "position": [{}, 0.0, {}]}}]
    }}
  ]
}}"#,
        x, z
    );
    exit_on_error!(
        fs::write(file_path, text),
        "Error: Could not write detector file: {}"
    );
}

/// Writes an input file with two hadronic showers in separate event groups,
/// one horizontal and one vertical.
pub fn write_input_file<P: AsRef<Path>>(file_path: P) {
    use askaryan::io::table::Value;

    let mut table = DataTable::new();
    table.set_dataset("event_group_ids", Value::int_1d(vec![0, 1]));
    table.set_dataset("flavors", Value::int_1d(vec![14, 14]));
    table.set_dataset("energies", Value::float_1d(vec![1e18, 1e18]));
    table.set_dataset("interaction_type", Value::Text(vec!["nc".to_string(); 2]));
    table.set_dataset("xx", Value::float_1d(vec![0.0, 0.0]));
    table.set_dataset("yy", Value::float_1d(vec![0.0, 0.0]));
    table.set_dataset("zz", Value::float_1d(vec![VERTEX_DEPTH, VERTEX_DEPTH]));
    table.set_dataset(
        "zeniths",
        Value::float_1d(vec![0.5 * std::f64::consts::PI, 0.0]),
    );
    table.set_dataset("azimuths", Value::float_1d(vec![0.0, 0.0]));
    table.set_dataset("inelasticity", Value::float_1d(vec![0.5, 0.5]));
    table.set_dataset("n_interaction", Value::int_1d(vec![1, 1]));
    table.set_dataset("shower_type", Value::Text(vec!["had".to_string(); 2]));
    table.set_dataset("shower_energies", Value::float_1d(vec![1e18, 1e18]));
    table.set_attribute("rmin", Value::float_scalar(0.0));
    table.set_attribute("rmax", Value::float_scalar(1000.0));
    table.set_attribute("zmin", Value::float_scalar(-1000.0));
    table.set_attribute("zmax", Value::float_scalar(0.0));
    table.set_attribute("n_events", Value::float_scalar(2.0));
    exit_on_error!(
        table.write_to_file(file_path.as_ref(), Endianness::native()),
        "Error: Could not write input file: {}"
    );
}

pub fn write_text_file<P: AsRef<Path>>(file_path: P, text: &str) {
    exit_on_error!(
        fs::write(file_path, text),
        "Error: Could not write file: {}"
    );
}

pub fn read_output_file<P: AsRef<Path>>(file_path: P) -> DataTable {
    exit_on_error!(
        DataTable::read_from_file(file_path.as_ref()),
        "Error: Could not read output file: {}"
    )
}

#[derive(Debug, Clone)]
pub struct Test {
    output_dir: PathBuf,
}

impl Test {
    pub fn new<S: AsRef<str>>(name: S) -> Self {
        let name = name.as_ref();
        let output_dir = exit_on_error!(
            CONTEXT.prepared_output_dir(name),
            "Error: Could not prepare output directory for test {}: {}",
            name
        );
        Self { output_dir }
    }

    pub fn output_path<S: AsRef<str>>(&self, file_name: S) -> PathBuf {
        self.output_dir().join(file_name.as_ref())
    }

    fn output_dir(&self) -> &Path {
        self.output_dir.as_path()
    }
}

#[derive(Debug, Clone)]
pub struct TestContext {
    base_output_dir: PathBuf,
}

impl TestContext {
    const BASE_OUTPUT_DIR_PATH_COMPONENTS: [&'static str; 3] = ["tests", "data", "output"];

    fn new() -> Self {
        let base_output_dir: PathBuf = Self::BASE_OUTPUT_DIR_PATH_COMPONENTS.iter().collect();
        Self { base_output_dir }
    }

    pub fn output_dir<S: AsRef<str>>(&self, test_name: S) -> PathBuf {
        self.base_output_dir().join(test_name.as_ref())
    }

    pub fn prepared_output_dir<S: AsRef<str>>(&self, test_name: S) -> io::Result<PathBuf> {
        let output_dir = self.output_dir(test_name);
        Self::clear_output_dir(&output_dir)
            .and_then(|_| Self::create_output_dir(&output_dir).map(|_| output_dir))
    }

    fn clear_output_dir<P: AsRef<Path>>(output_dir: P) -> io::Result<()> {
        let output_dir = output_dir.as_ref();
        if output_dir.exists() {
            fs::remove_dir_all(output_dir)
        } else {
            Ok(())
        }
    }

    fn create_output_dir<P: AsRef<Path>>(output_dir: P) -> io::Result<()> {
        fs::create_dir_all(output_dir)
    }

    fn base_output_dir(&self) -> &Path {
        self.base_output_dir.as_path()
    }
}

lazy_static! {
    pub static ref CONTEXT: TestContext = TestContext::new();
    static ref COMMAND: clap::Command<'static> = cli::build::build().no_binary_name(true);
}
