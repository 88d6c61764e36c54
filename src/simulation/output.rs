//! Aggregation of trigger outcomes and per-station results into the output
//! dataset.

use super::{field::ChannelAssembly, fsi};
use crate::{
    events::{InputDataset, SimulationVolume},
    io::table::{DataTable, Value},
    propagation::RayPathParameters,
    response::SampleProperties,
};
use log::{info, warn};
use ndarray::{s, Array2, Array3, Array4, ArrayD};
use std::collections::{BTreeMap, HashMap};

/// Name of the output group holding the results for the given station.
pub fn station_group_name(station_id: i64) -> String {
    format!("station_{}", station_id)
}

/// Per-shower trigger outcomes, with one boolean column for each registered
/// trigger type.
#[derive(Clone, Debug, PartialEq)]
pub struct ShowerTriggers {
    multiple_triggers: Array2<bool>,
    triggered: Vec<bool>,
}

impl ShowerTriggers {
    fn new(n_showers: usize, n_triggers: usize) -> Self {
        Self {
            multiple_triggers: Array2::from_elem((n_showers, n_triggers), false),
            triggered: vec![false; n_showers],
        }
    }

    fn append_column(&mut self) {
        let (n_showers, n_triggers) = self.multiple_triggers.dim();
        let mut extended = Array2::from_elem((n_showers, n_triggers + 1), false);
        extended
            .slice_mut(s![.., ..n_triggers])
            .assign(&self.multiple_triggers);
        self.multiple_triggers = extended;
    }

    fn set(&mut self, shower_idx: usize, column: usize, fired: bool) {
        if fired {
            self.multiple_triggers[[shower_idx, column]] = true;
            self.triggered[shower_idx] = true;
        }
    }

    /// Outcome of every trigger type for every shower.
    pub fn multiple_triggers(&self) -> &Array2<bool> {
        &self.multiple_triggers
    }

    /// Whether any trigger fired for each shower.
    pub fn triggered(&self) -> &[bool] {
        &self.triggered
    }

    /// Returns the trigger matrix in output form, which has a single false
    /// column if no trigger type was ever registered.
    pub fn output_multiple_triggers(&self) -> Array2<bool> {
        if self.multiple_triggers.ncols() == 0 {
            Array2::from_elem((self.triggered.len(), 1), false)
        } else {
            self.multiple_triggers.clone()
        }
    }
}

/// Registry of the trigger types observed during a run, together with the
/// global and per-station outcomes of each trigger for each shower.
#[derive(Clone, Debug)]
pub struct TriggerRegistry {
    n_showers: usize,
    trigger_names: Vec<String>,
    columns: HashMap<String, usize>,
    global: ShowerTriggers,
    stations: BTreeMap<i64, ShowerTriggers>,
}

impl TriggerRegistry {
    /// Creates an empty registry for the given number of showers and
    /// stations.
    pub fn new(n_showers: usize, station_ids: &[i64]) -> Self {
        Self {
            n_showers,
            trigger_names: Vec::new(),
            columns: HashMap::new(),
            global: ShowerTriggers::new(n_showers, 0),
            stations: station_ids
                .iter()
                .map(|&station_id| (station_id, ShowerTriggers::new(n_showers, 0)))
                .collect(),
        }
    }

    /// Returns the column of the given trigger type, registering it if it
    /// has not been seen before.
    ///
    /// Registering a new type appends a column that is false for every
    /// shower to all existing outcome tables.
    pub fn register_trigger_type(&mut self, name: &str) -> usize {
        if let Some(&column) = self.columns.get(name) {
            return column;
        }
        let column = self.trigger_names.len();
        self.trigger_names.push(name.to_string());
        self.columns.insert(name.to_string(), column);
        self.global.append_column();
        self.stations
            .values_mut()
            .for_each(ShowerTriggers::append_column);
        column
    }

    /// Records the outcome of a trigger for the given showers at the given
    /// station.
    ///
    /// Outcomes are combined with logical OR, so a bit that has been set
    /// once stays set.
    pub fn record_outcome(
        &mut self,
        station_id: i64,
        shower_indices: &[usize],
        trigger_name: &str,
        fired: bool,
    ) {
        let column = self.register_trigger_type(trigger_name);
        let n_showers = self.n_showers;
        let n_triggers = self.trigger_names.len();
        let station = self
            .stations
            .entry(station_id)
            .or_insert_with(|| ShowerTriggers::new(n_showers, n_triggers));
        for &shower_idx in shower_indices {
            station.set(shower_idx, column, fired);
            self.global.set(shower_idx, column, fired);
        }
    }

    pub fn trigger_names(&self) -> &[String] {
        &self.trigger_names
    }

    pub fn n_triggers(&self) -> usize {
        self.trigger_names.len()
    }

    pub fn global(&self) -> &ShowerTriggers {
        &self.global
    }

    pub fn station(&self, station_id: i64) -> Option<&ShowerTriggers> {
        self.stations.get(&station_id)
    }
}

/// Result of a triggered readout of a station.
#[derive(Clone, Debug, PartialEq)]
pub struct EventRecord {
    pub event_group_id: i64,
    /// Sub-event id within the event group.
    pub event_id: i64,
    /// Maximum absolute voltage of each channel.
    pub maximum_amplitudes: Vec<fsi>,
    /// Maximum voltage envelope of each channel.
    pub maximum_amplitudes_envelope: Vec<fsi>,
    pub triggered: bool,
    /// Outcome of each trigger type, indexed by registry column.
    pub multiple_triggers: Vec<bool>,
}

/// Ray path and field quantities for every shower, channel and ray solution
/// of a station.
///
/// Entries for solutions that do not exist keep their sentinel values: NaN
/// for floating-point quantities, -1 for integer quantities and 1 for the
/// focusing factor.
#[derive(Clone, Debug)]
pub struct StationMeta {
    pub launch_vectors: Array4<fsi>,
    pub receive_vectors: Array4<fsi>,
    pub polarization: Array4<fsi>,
    pub c0: Array3<fsi>,
    pub c1: Array3<fsi>,
    pub reflection: Array3<i64>,
    pub reflection_case: Array3<i64>,
    pub solution_type: Array3<i64>,
    pub travel_times: Array3<fsi>,
    pub travel_distances: Array3<fsi>,
    pub focusing_factor: Array3<fsi>,
    /// Maximum envelope amplitude and signal time for each shower and ray,
    /// present only when requested.
    pub amplitudes_per_ray: Option<(Array3<fsi>, Array3<fsi>)>,
}

impl StationMeta {
    pub fn new(n_showers: usize, n_channels: usize, n_solutions: usize, amp_per_ray_solution: bool) -> Self {
        let shape = (n_showers, n_channels, n_solutions);
        let vector_shape = (n_showers, n_channels, n_solutions, 3);
        Self {
            launch_vectors: Array4::from_elem(vector_shape, fsi::NAN),
            receive_vectors: Array4::from_elem(vector_shape, fsi::NAN),
            polarization: Array4::from_elem(vector_shape, fsi::NAN),
            c0: Array3::from_elem(shape, fsi::NAN),
            c1: Array3::from_elem(shape, fsi::NAN),
            reflection: Array3::from_elem(shape, -1),
            reflection_case: Array3::from_elem(shape, -1),
            solution_type: Array3::from_elem(shape, -1),
            travel_times: Array3::from_elem(shape, fsi::NAN),
            travel_distances: Array3::from_elem(shape, fsi::NAN),
            focusing_factor: Array3::ones(shape),
            amplitudes_per_ray: if amp_per_ray_solution {
                Some((Array3::zeros(shape), Array3::zeros(shape)))
            } else {
                None
            },
        }
    }

    fn n_solutions(&self) -> usize {
        self.c0.dim().2
    }

    /// Stores the quantities of every ray solution of the given channel
    /// assembly.
    pub fn record_channel(&mut self, shower_idx: usize, channel_idx: usize, assembly: &ChannelAssembly) {
        for record in &assembly.records {
            let sol = record.ray_solution_idx;
            if sol >= self.n_solutions() {
                warn!(
                    "Ignoring ray solution {} beyond the expected maximum of {}",
                    sol,
                    self.n_solutions()
                );
                continue;
            }
            let idx = [shower_idx, channel_idx, sol];
            self.c0[idx] = record.parameters.c0;
            self.c1[idx] = record.parameters.c1;
            self.reflection[idx] = record.parameters.reflection;
            self.reflection_case[idx] = record.parameters.reflection_case;
            self.solution_type[idx] = record.parameters.solution_type;
            self.launch_vectors
                .slice_mut(s![shower_idx, channel_idx, sol, ..])
                .assign(&ndarray::arr1(&record.launch_vector.to_array()));
            if let Some(receive_vector) = &record.receive_vector {
                self.receive_vectors
                    .slice_mut(s![shower_idx, channel_idx, sol, ..])
                    .assign(&ndarray::arr1(&receive_vector.to_array()));
            }
            if let Some(polarization) = &record.polarization {
                self.polarization
                    .slice_mut(s![shower_idx, channel_idx, sol, ..])
                    .assign(&ndarray::arr1(&polarization.to_array()));
            }
            if let Some(travel_time) = record.travel_time {
                self.travel_times[idx] = travel_time;
            }
            if let Some(path_length) = record.path_length {
                self.travel_distances[idx] = path_length;
            }
            if let Some(focusing_factor) = record.focusing_factor {
                self.focusing_factor[idx] = focusing_factor;
            }
        }
    }

    /// Stores the signal properties of a single field sample, if amplitudes
    /// per ray solution are recorded.
    pub fn record_sample_properties(
        &mut self,
        shower_idx: usize,
        channel_idx: usize,
        ray_solution_idx: usize,
        properties: &SampleProperties,
    ) {
        if ray_solution_idx >= self.n_solutions() {
            return;
        }
        if let Some((max_amplitudes, times)) = self.amplitudes_per_ray.as_mut() {
            let idx = [shower_idx, channel_idx, ray_solution_idx];
            max_amplitudes[idx] = properties.max_amplitude_envelope;
            times[idx] = properties.signal_time;
        }
    }

    /// Adds the arrays to the given table, keeping only the showers selected
    /// by the mask.
    fn write_to(&self, table: &mut DataTable, save_mask: &[bool]) {
        let mut set_float = |name: &str, values: ArrayD<fsi>| {
            table.set_dataset(name, Value::Float(values).select_rows(save_mask))
        };
        set_float("launch_vectors", self.launch_vectors.clone().into_dyn());
        set_float("receive_vectors", self.receive_vectors.clone().into_dyn());
        set_float("polarization", self.polarization.clone().into_dyn());
        set_float("ray_tracing_C0", self.c0.clone().into_dyn());
        set_float("ray_tracing_C1", self.c1.clone().into_dyn());
        set_float("travel_times", self.travel_times.clone().into_dyn());
        set_float("travel_distances", self.travel_distances.clone().into_dyn());
        set_float("focusing_factor", self.focusing_factor.clone().into_dyn());
        if let Some((max_amplitudes, times)) = &self.amplitudes_per_ray {
            set_float("max_amp_shower_and_ray", max_amplitudes.clone().into_dyn());
            set_float("time_shower_and_ray", times.clone().into_dyn());
        }
        for (name, values) in [
            ("ray_tracing_reflection", &self.reflection),
            ("ray_tracing_reflection_case", &self.reflection_case),
            ("ray_tracing_solution_type", &self.solution_type),
        ] {
            table.set_dataset(
                name,
                Value::Int(values.clone().into_dyn()).select_rows(save_mask),
            );
        }
    }
}

/// Ray path parameters stored in the output of a previous run, used to
/// reconstruct ray solutions without solving for them again.
#[derive(Clone, Debug)]
pub struct StoredRayTracing {
    c0: ArrayD<fsi>,
    c1: ArrayD<fsi>,
    reflection: ArrayD<i64>,
    reflection_case: ArrayD<i64>,
    solution_type: ArrayD<i64>,
    travel_times: Option<ArrayD<fsi>>,
    travel_distances: Option<ArrayD<fsi>>,
}

/// A stored ray path together with its stored length and travel time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StoredRaySolution {
    pub parameters: RayPathParameters,
    pub path_length: Option<fsi>,
    pub travel_time: Option<fsi>,
}

impl StoredRayTracing {
    /// Extracts the stored ray tracing results from a station group.
    ///
    /// Returns `None` if the group lacks any of the required arrays or if
    /// their number of showers differs from `n_showers`.
    pub fn from_station_group(group: &DataTable, n_showers: usize) -> Option<Self> {
        let float = |name: &str| group.float_dataset(name).ok().cloned();
        let int = |name: &str| group.int_dataset(name).ok().cloned();
        let stored = Self {
            c0: float("ray_tracing_C0")?,
            c1: float("ray_tracing_C1")?,
            reflection: int("ray_tracing_reflection")?,
            reflection_case: int("ray_tracing_reflection_case")?,
            solution_type: int("ray_tracing_solution_type")?,
            travel_times: float("travel_times"),
            travel_distances: float("travel_distances"),
        };
        let shape = stored.c0.shape().to_vec();
        if shape.len() != 3
            || shape[0] != n_showers
            || [&stored.reflection, &stored.reflection_case, &stored.solution_type]
                .iter()
                .any(|values| values.shape() != shape.as_slice())
            || stored.c1.shape() != shape.as_slice()
        {
            return None;
        }
        Some(stored)
    }

    /// Returns the stored solutions for the given shower and channel, in
    /// their original order.
    pub fn solutions(&self, shower_idx: usize, channel_idx: usize) -> Vec<StoredRaySolution> {
        let shape = self.c0.shape();
        if channel_idx >= shape[1] {
            return Vec::new();
        }
        let finite = |values: &Option<ArrayD<fsi>>, idx: &[usize]| {
            values
                .as_ref()
                .and_then(|values| values.get(idx).copied())
                .filter(|value| value.is_finite())
        };
        (0..shape[2])
            .filter_map(|sol| {
                let idx = [shower_idx, channel_idx, sol];
                let c0 = self.c0[&idx[..]];
                if c0.is_nan() {
                    return None;
                }
                Some(StoredRaySolution {
                    parameters: RayPathParameters {
                        c0,
                        c1: self.c1[&idx[..]],
                        solution_type: self.solution_type[&idx[..]],
                        reflection: self.reflection[&idx[..]],
                        reflection_case: self.reflection_case[&idx[..]],
                    },
                    path_length: finite(&self.travel_distances, &idx),
                    travel_time: finite(&self.travel_times, &idx),
                })
            })
            .collect()
    }
}

/// Results accumulated for a single station.
#[derive(Clone, Debug)]
pub struct StationOutput {
    pub station_id: i64,
    pub channel_ids: Vec<i64>,
    /// Antenna positions relative to the station [m].
    pub antenna_positions: Vec<[fsi; 3]>,
    pub n_samples: usize,
    pub meta: StationMeta,
    pub events: Vec<EventRecord>,
}

impl StationOutput {
    fn to_table(&self, triggers: Option<&ShowerTriggers>, n_triggers: usize, n_showers: usize, save_mask: &[bool]) -> DataTable {
        let mut table = DataTable::new();
        self.meta.write_to(&mut table, save_mask);

        let fallback;
        let triggers = match triggers {
            Some(triggers) => triggers,
            None => {
                fallback = ShowerTriggers::new(n_showers, n_triggers);
                &fallback
            }
        };
        table.set_dataset(
            "triggered",
            Value::bool_1d(triggers.triggered().to_vec()).select_rows(save_mask),
        );
        table.set_dataset(
            "multiple_triggers",
            Value::Bool(triggers.output_multiple_triggers().into_dyn()).select_rows(save_mask),
        );

        let n_events = self.events.len();
        let n_channels = self.channel_ids.len();
        let n_columns = usize::max(n_triggers, 1);
        let mut maximum_amplitudes = Array2::zeros((n_events, n_channels));
        let mut maximum_amplitudes_envelope = Array2::zeros((n_events, n_channels));
        let mut multiple_triggers_per_event = Array2::from_elem((n_events, n_columns), false);
        for (row, event) in self.events.iter().enumerate() {
            for (channel_idx, (&amplitude, &envelope)) in event
                .maximum_amplitudes
                .iter()
                .zip(event.maximum_amplitudes_envelope.iter())
                .enumerate()
                .take(n_channels)
            {
                maximum_amplitudes[[row, channel_idx]] = amplitude;
                maximum_amplitudes_envelope[[row, channel_idx]] = envelope;
            }
            for (column, &fired) in event.multiple_triggers.iter().enumerate().take(n_columns) {
                multiple_triggers_per_event[[row, column]] = fired;
            }
        }
        table.set_dataset(
            "event_group_ids",
            Value::int_1d(self.events.iter().map(|event| event.event_group_id).collect()),
        );
        table.set_dataset(
            "event_ids",
            Value::int_1d(self.events.iter().map(|event| event.event_id).collect()),
        );
        table.set_dataset("maximum_amplitudes", Value::Float(maximum_amplitudes.into_dyn()));
        table.set_dataset(
            "maximum_amplitudes_envelope",
            Value::Float(maximum_amplitudes_envelope.into_dyn()),
        );
        table.set_dataset(
            "triggered_per_event",
            Value::bool_1d(self.events.iter().map(|event| event.triggered).collect()),
        );
        table.set_dataset(
            "multiple_triggers_per_event",
            Value::Bool(multiple_triggers_per_event.into_dyn()),
        );

        let positions: Vec<fsi> = self.antenna_positions.iter().flatten().copied().collect();
        if let Ok(positions) = Array2::from_shape_vec((n_channels, 3), positions) {
            table.set_attribute("antenna_positions", Value::Float(positions.into_dyn()));
        }
        table.set_attribute("channel_ids", Value::int_1d(self.channel_ids.clone()));
        table.set_attribute("n_samples", Value::int_scalar(self.n_samples as i64));
        table
    }
}

/// Selects the showers to write to the output.
///
/// Unless every shower is saved, all showers of an event group are kept if
/// any shower of the group triggered.
pub fn save_mask(input: &InputDataset, triggered: &[bool], save_all: bool) -> Vec<bool> {
    if save_all {
        return vec![true; input.n_showers()];
    }
    let mut mask = vec![false; input.n_showers()];
    for group in input.event_groups() {
        if group.shower_indices.iter().any(|&idx| triggered[idx]) {
            group.shower_indices.iter().for_each(|&idx| mask[idx] = true);
        }
    }
    mask
}

/// Global quantities of a run written as output attributes.
#[derive(Clone, Debug, PartialEq)]
pub struct RunAttributes {
    pub detector_description: String,
    pub noise_temperature: Option<fsi>,
    pub vrms: fsi,
    pub dt: fsi,
    pub bandwidth: fsi,
    pub n_samples: usize,
    pub config_yaml: String,
    pub creation_date: Option<String>,
}

/// Assembles the output dataset from the input and the accumulated results.
pub fn build_output_table(
    input: &InputDataset,
    weights: &[fsi],
    registry: &TriggerRegistry,
    stations: &[StationOutput],
    attributes: &RunAttributes,
    save_all: bool,
) -> DataTable {
    let n_showers = input.n_showers();
    let global = registry.global();
    let mask = save_mask(input, global.triggered(), save_all);
    let mut table = DataTable::new();

    table.set_dataset("weights", Value::float_1d(weights.to_vec()).select_rows(&mask));
    table.set_dataset(
        "triggered",
        Value::bool_1d(global.triggered().to_vec()).select_rows(&mask),
    );
    table.set_dataset(
        "multiple_triggers",
        Value::Bool(global.output_multiple_triggers().into_dyn()).select_rows(&mask),
    );
    table.set_dataset(
        "shower_realization",
        Value::int_1d(input.realization_ids()).select_rows(&mask),
    );
    if !input.table().has_dataset("shower_ids") {
        table.set_dataset(
            "shower_ids",
            Value::int_1d(input.showers().iter().map(|shower| shower.shower_id).collect())
                .select_rows(&mask),
        );
    }

    for station in stations {
        table.set_group(
            &station_group_name(station.station_id),
            station.to_table(
                registry.station(station.station_id),
                registry.n_triggers(),
                n_showers,
                &mask,
            ),
        );
    }

    table.set_attribute("trigger_names", Value::Text(registry.trigger_names().to_vec()));
    table.set_attribute("detector", Value::text(&attributes.detector_description));
    if let Some(noise_temperature) = attributes.noise_temperature {
        table.set_attribute("Tnoise", Value::float_scalar(noise_temperature));
    }
    table.set_attribute("Vrms", Value::float_scalar(attributes.vrms));
    table.set_attribute("dt", Value::float_scalar(attributes.dt));
    table.set_attribute("bandwidth", Value::float_scalar(attributes.bandwidth));
    table.set_attribute("n_samples", Value::int_scalar(attributes.n_samples as i64));
    table.set_attribute("config", Value::text(&attributes.config_yaml));
    table.set_attribute("askaryan_version", Value::text(env!("CARGO_PKG_VERSION")));
    if let Some(creation_date) = &attributes.creation_date {
        table.set_attribute("creation_date", Value::text(creation_date));
    }

    let input_table = input.table();
    for (name, values) in input_table.datasets() {
        if !name.starts_with("station_") && !table.has_dataset(name) {
            table.set_dataset(name, values.select_rows(&mask));
        }
    }
    for (name, value) in input_table.attributes() {
        if !table.has_attribute(name) {
            table.set_attribute(name, value.clone());
        }
    }
    table
}

/// Effective volume of the detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EffectiveVolume {
    /// Number of event groups with at least one triggered shower.
    pub n_triggered: usize,
    /// Summed weight of the triggered event groups.
    pub n_triggered_weighted: fsi,
    /// Effective volume [m^3].
    pub veff: fsi,
    /// Effective volume integrated over the full solid angle [m^3 sr].
    pub veff_sr: fsi,
}

/// Computes the effective volume, counting each event group once with the
/// weight of its first triggered shower.
///
/// Returns `None` if the input does not describe the simulation volume.
pub fn effective_volume(input: &InputDataset, weights: &[fsi], triggered: &[bool]) -> Option<EffectiveVolume> {
    let volume = match input.simulation_volume() {
        Some(volume) => volume,
        None => {
            warn!("Input has no simulation volume attributes, cannot compute Veff");
            return None;
        }
    };
    let mut n_triggered = 0;
    let mut n_triggered_weighted = 0.0;
    for group in input.event_groups() {
        if let Some(&idx) = group.shower_indices.iter().find(|&&idx| triggered[idx]) {
            n_triggered += 1;
            n_triggered_weighted += weights[idx];
        }
    }
    let veff = SimulationVolume::volume(&volume) * n_triggered_weighted / input.n_events();
    info!(
        "Triggered event groups: {} (weighted {:.3}), Veff = {:.6e} m^3",
        n_triggered, n_triggered_weighted, veff
    );
    Some(EffectiveVolume {
        n_triggered,
        n_triggered_weighted,
        veff,
        veff_sr: veff * 4.0 * std::f64::consts::PI,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::PI,
        events::tests::create_input_table,
        io::Endianness,
        simulation::field::SolutionRecord,
        geometry::Vec3,
    };
    use approx::assert_abs_diff_eq;

    fn input(event_group_ids: Vec<i64>) -> InputDataset {
        let vertices = vec![[0.0, 0.0, -100.0]; event_group_ids.len()];
        let mut table = create_input_table(event_group_ids, &vertices, 0.5);
        table.set_attribute("rmin", Value::float_scalar(0.0));
        table.set_attribute("rmax", Value::float_scalar(1000.0));
        table.set_attribute("zmin", Value::float_scalar(-1000.0));
        table.set_attribute("zmax", Value::float_scalar(0.0));
        table.set_attribute("n_events", Value::float_scalar(10.0));
        InputDataset::from_table(table).unwrap()
    }

    #[test]
    fn later_false_outcomes_do_not_clear_triggers() {
        let mut registry = TriggerRegistry::new(3, &[1, 2]);
        registry.record_outcome(1, &[0, 1], "simple_threshold", true);
        registry.record_outcome(2, &[0, 1], "simple_threshold", false);
        registry.record_outcome(1, &[0], "simple_threshold", false);
        assert_eq!(registry.global().triggered(), &[true, true, false]);
        assert_eq!(registry.station(1).unwrap().triggered(), &[true, true, false]);
        assert_eq!(registry.station(2).unwrap().triggered(), &[false, false, false]);
    }

    #[test]
    fn global_trigger_is_or_over_stations() {
        let mut registry = TriggerRegistry::new(4, &[1, 2]);
        registry.record_outcome(1, &[0], "a", true);
        registry.record_outcome(2, &[2], "b", true);
        registry.record_outcome(2, &[3], "a", false);
        for shower_idx in 0..4 {
            let any_station = [1, 2]
                .iter()
                .any(|&id| registry.station(id).unwrap().triggered()[shower_idx]);
            assert_eq!(registry.global().triggered()[shower_idx], any_station);
        }
    }

    #[test]
    fn new_trigger_type_is_backfilled_with_false() {
        let mut registry = TriggerRegistry::new(2, &[1]);
        registry.record_outcome(1, &[0], "first", true);
        registry.record_outcome(1, &[1], "second", true);
        assert_eq!(registry.trigger_names(), &["first".to_string(), "second".to_string()]);
        let matrix = registry.global().multiple_triggers();
        assert_eq!(matrix.dim(), (2, 2));
        assert!(matrix[[0, 0]]);
        assert!(!matrix[[0, 1]]);
        assert!(!matrix[[1, 0]]);
        assert!(matrix[[1, 1]]);
        assert_eq!(registry.station(1).unwrap().multiple_triggers(), matrix);
    }

    #[test]
    fn registering_known_trigger_keeps_columns() {
        let mut registry = TriggerRegistry::new(1, &[]);
        assert_eq!(registry.register_trigger_type("a"), 0);
        assert_eq!(registry.register_trigger_type("b"), 1);
        assert_eq!(registry.register_trigger_type("a"), 0);
        assert_eq!(registry.n_triggers(), 2);
    }

    #[test]
    fn outcome_for_unknown_station_creates_it_with_all_columns() {
        let mut registry = TriggerRegistry::new(2, &[]);
        registry.record_outcome(5, &[0], "a", false);
        registry.record_outcome(7, &[1], "b", true);
        assert_eq!(registry.station(5).unwrap().multiple_triggers().dim(), (2, 2));
        assert_eq!(registry.station(7).unwrap().triggered(), &[false, true]);
    }

    #[test]
    fn triggers_without_registered_types_have_one_false_column() {
        let registry = TriggerRegistry::new(3, &[1]);
        let output = registry.global().output_multiple_triggers();
        assert_eq!(output.dim(), (3, 1));
        assert!(output.iter().all(|&fired| !fired));
        assert!(registry.trigger_names().is_empty());
    }

    #[test]
    fn whole_event_group_is_saved_if_any_shower_triggered() {
        let input = input(vec![0, 0, 1, 2, 2]);
        let mask = save_mask(&input, &[false, true, false, false, false], false);
        assert_eq!(mask, vec![true, true, false, false, false]);
        assert_eq!(
            save_mask(&input, &[false; 5], true),
            vec![true; 5]
        );
    }

    #[test]
    fn meta_keeps_sentinels_for_missing_solutions() {
        let mut meta = StationMeta::new(2, 1, 2, false);
        let assembly = ChannelAssembly {
            records: vec![SolutionRecord {
                ray_solution_idx: 0,
                parameters: RayPathParameters {
                    c0: 0.5,
                    c1: 1.5,
                    solution_type: 1,
                    reflection: 0,
                    reflection_case: 1,
                },
                launch_vector: Vec3::new(0.0, 0.0, 1.0),
                receive_vector: None,
                polarization: None,
                travel_time: Some(10.0),
                path_length: Some(2.0),
                focusing_factor: None,
            }],
            samples: Vec::new(),
        };
        meta.record_channel(1, 0, &assembly);
        assert_eq!(meta.c0[[1, 0, 0]], 0.5);
        assert_eq!(meta.solution_type[[1, 0, 0]], 1);
        assert_eq!(meta.travel_times[[1, 0, 0]], 10.0);
        assert_eq!(meta.launch_vectors[[1, 0, 0, 2]], 1.0);
        assert!(meta.receive_vectors[[1, 0, 0, 0]].is_nan());
        assert!(meta.c0[[1, 0, 1]].is_nan());
        assert_eq!(meta.solution_type[[1, 0, 1]], -1);
        assert_eq!(meta.focusing_factor[[1, 0, 0]], 1.0);
        assert!(meta.c0[[0, 0, 0]].is_nan());
    }

    #[test]
    fn stored_ray_tracing_is_read_back_from_station_group() {
        let input = input(vec![0, 1]);
        let mut meta = StationMeta::new(2, 1, 2, false);
        let parameters = RayPathParameters {
            c0: 0.25,
            c1: 3.0,
            solution_type: 3,
            reflection: 0,
            reflection_case: 2,
        };
        meta.record_channel(
            0,
            0,
            &ChannelAssembly {
                records: vec![SolutionRecord {
                    ray_solution_idx: 1,
                    parameters,
                    launch_vector: Vec3::new(1.0, 0.0, 0.0),
                    receive_vector: None,
                    polarization: None,
                    travel_time: Some(42.0),
                    path_length: None,
                    focusing_factor: None,
                }],
                samples: Vec::new(),
            },
        );
        let station = StationOutput {
            station_id: 3,
            channel_ids: vec![0],
            antenna_positions: vec![[0.0, 0.0, -10.0]],
            n_samples: 8,
            meta,
            events: Vec::new(),
        };
        let group = station.to_table(None, 0, 2, &[true, true]);
        let stored = StoredRayTracing::from_station_group(&group, input.n_showers()).unwrap();
        assert_eq!(
            stored.solutions(0, 0),
            vec![StoredRaySolution {
                parameters,
                path_length: None,
                travel_time: Some(42.0)
            }]
        );
        assert!(stored.solutions(1, 0).is_empty());
        assert!(stored.solutions(0, 5).is_empty());
        assert!(StoredRayTracing::from_station_group(&group, 3).is_none());
    }

    #[test]
    fn effective_volume_counts_each_group_once() {
        let input = input(vec![0, 0, 1, 2]);
        let weights = [0.5, 0.25, 1.0, 1.0];
        let triggered = [false, true, true, false];
        let result = effective_volume(&input, &weights, &triggered).unwrap();
        assert_eq!(result.n_triggered, 2);
        assert_abs_diff_eq!(result.n_triggered_weighted, 1.25);
        let volume = PI * 1000.0 * 1000.0 * 1000.0;
        assert_abs_diff_eq!(result.veff, volume * 1.25 / 10.0, epsilon = 1e-3);
        assert_abs_diff_eq!(result.veff_sr, result.veff * 4.0 * PI, epsilon = 1e-3);
    }

    #[test]
    fn output_round_trip_preserves_weights_and_triggers() {
        let input = input(vec![0, 0, 1, 2]);
        let weights = vec![0.9, 0.8, 0.7, 0.6];
        let mut registry = TriggerRegistry::new(4, &[1]);
        registry.record_outcome(1, &[1], "simple_threshold", true);
        registry.record_outcome(1, &[3], "simple_threshold", true);
        let attributes = RunAttributes {
            detector_description: "{}".to_string(),
            noise_temperature: Some(300.0),
            vrms: 1e-5,
            dt: 0.2,
            bandwidth: 0.4,
            n_samples: 256,
            config_yaml: "seed: 1\n".to_string(),
            creation_date: None,
        };
        let table = build_output_table(&input, &weights, &registry, &[], &attributes, false);

        let directory = tempfile::tempdir().unwrap();
        let path = directory.path().join("output.askt");
        table.write_to_file(&path, Endianness::native()).unwrap();
        let read_back = DataTable::read_from_file(&path).unwrap();

        assert_eq!(read_back, table);
        assert_eq!(
            read_back.float_dataset("weights").unwrap().as_slice().unwrap(),
            &[0.9, 0.8, 0.6]
        );
        assert_eq!(
            read_back.bool_dataset("triggered").unwrap().as_slice().unwrap(),
            &[false, true, true]
        );
        assert_eq!(read_back.int_dataset("event_group_ids").unwrap().len(), 3);
        assert_eq!(read_back.float_attribute("n_events"), Some(10.0));
        assert_eq!(read_back.text_attribute("detector"), Some("{}"));
    }
}
