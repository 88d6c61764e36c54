//! Simulation of the radio signals of neutrino-induced showers and their
//! detection by the stations of a detector.

pub mod field;
pub mod output;
pub mod splitting;

use self::{
    field::{FieldAssembler, FieldAssemblyConfig},
    output::{
        build_output_table, effective_volume, station_group_name, EffectiveVolume, EventRecord,
        RunAttributes, StationMeta, StationOutput, StoredRayTracing, TriggerRegistry,
    },
    splitting::split_into_sub_events,
};
use crate::{
    config::{SimulationConfig, TriggerConfig},
    constants::{K_BOLTZMANN, RECEIVER_IMPEDANCE},
    detector::{Detector, JsonDetector},
    error::{Result, SimulationError},
    events::InputDataset,
    geometry::Point3,
    io::{
        table::DataTable,
        utils::{check_write_allowed, IOContext},
        Endianness, Verbosity,
    },
    medium::{self, IceModel},
    num,
    propagation::{self, RaySolution, RayTracer},
    response::{self, DetectorSimulation, StationLayout},
    signal::{self, PulseSynthesizer},
    units::HZ,
    weights::{self, WeightCalculator},
};
use indicatif::ProgressIterator;
use log::{debug, info};
use ndarray::Array1;
use std::{collections::BTreeMap, path::Path};

/// Floating-point precision to use for simulation.
#[allow(non_camel_case_types)]
pub type fsi = f64;

/// Number of frequencies used for integrating the signal chain response.
pub const N_FILTER_FREQUENCIES: usize = 10000;

/// Position in the nested traversal over event groups, showers, stations
/// and channels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IterationContext {
    pub event_group_id: i64,
    pub shower_idx: usize,
    pub shower_id: i64,
    pub station_idx: usize,
    pub station_id: i64,
    pub channel_idx: usize,
    pub channel_id: i64,
}

/// Noise level of the detector and the derived quantities of its signal
/// chain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseLevel {
    /// Noise temperature [K], if the noise level was derived from one.
    pub noise_temperature: Option<fsi>,
    /// RMS noise voltage [V].
    pub vrms: fsi,
    /// RMS noise voltage referred back to the electric field [V/m].
    pub vrms_efield: fsi,
    /// Integral of the squared signal chain response [GHz].
    pub bandwidth: fsi,
    /// Maximum of the signal chain response.
    pub amplification: fsi,
}

impl NoiseLevel {
    /// Computes the noise level from the response of the given channel up
    /// to the Nyquist frequency of the internal sampling.
    pub fn compute(
        trigger_config: &TriggerConfig,
        detector_simulation: &dyn DetectorSimulation,
        station_id: i64,
        channel_id: i64,
        dt: fsi,
    ) -> Result<Self> {
        let frequencies = Array1::linspace(0.0, 0.5 / dt, N_FILTER_FREQUENCIES);
        let filter = detector_simulation.filter(station_id, channel_id, &frequencies);
        let power: Vec<fsi> = filter.iter().map(|value| value.norm_sqr()).collect();
        let bandwidth = num::trapz(&power, &frequencies.to_vec());
        let amplification = filter
            .iter()
            .fold(0.0, |max, value| fsi::max(max, value.norm()));
        if amplification <= 0.0 {
            return Err(SimulationError::Config(
                "Signal chain response vanishes at all frequencies".to_string(),
            ));
        }

        let (noise_temperature, vrms) = match (trigger_config.noise_temperature, trigger_config.vrms) {
            (Some(temperature), None) => (
                Some(temperature),
                fsi::sqrt(temperature * RECEIVER_IMPEDANCE * K_BOLTZMANN * bandwidth / HZ),
            ),
            (None, Some(vrms)) => (None, vrms),
            _ => {
                return Err(SimulationError::Config(
                    "Exactly one of noise temperature and Vrms must be set".to_string(),
                ))
            }
        };
        info!(
            "Noise level: Vrms = {:.3e} V, bandwidth = {:.1} MHz, amplification = {:.3}",
            vrms,
            bandwidth * 1e3,
            amplification
        );
        Ok(Self {
            noise_temperature,
            vrms,
            vrms_efield: vrms / amplification,
            bandwidth,
            amplification,
        })
    }
}

/// Geometry and sampling of a station.
#[derive(Clone, Debug, PartialEq)]
pub struct StationSetup {
    pub station_id: i64,
    pub channel_ids: Vec<i64>,
    /// Absolute channel positions.
    pub receivers: Vec<Point3<fsi>>,
    /// Channel positions relative to the station.
    pub antenna_positions: Vec<[fsi; 3]>,
    /// Number of samples of the simulated fields.
    pub n_samples: usize,
    /// Nyquist frequency of the station digitizer [GHz].
    pub max_frequency: fsi,
}

impl StationSetup {
    /// Collects the setup of the given station, with field traces covering
    /// the duration of the recorded traces at sample spacing `dt`.
    pub fn new(detector: &dyn Detector, station_id: i64, dt: fsi) -> Result<Self> {
        let channel_ids = detector.channel_ids(station_id)?;
        let receivers = (0..channel_ids.len())
            .map(|channel_idx| detector.channel_position(station_id, channel_idx))
            .collect::<Result<Vec<_>>>()?;
        let antenna_positions = (0..channel_ids.len())
            .map(|channel_idx| {
                detector
                    .relative_position(station_id, channel_idx)
                    .map(|position| position.to_array())
            })
            .collect::<Result<Vec<_>>>()?;
        let sampling_frequency = detector.sampling_frequency(station_id)?;
        let duration = detector.number_of_samples(station_id)? as fsi / sampling_frequency;
        Ok(Self {
            station_id,
            channel_ids,
            receivers,
            antenna_positions,
            n_samples: 2 * (duration / dt / 2.0).ceil() as usize,
            max_frequency: 0.5 * sampling_frequency,
        })
    }
}

/// External services used by the simulation.
pub struct SimulationServices {
    pub ice_model: Box<dyn IceModel>,
    pub ray_tracer: Box<dyn RayTracer>,
    pub pulse_synthesizer: Box<dyn PulseSynthesizer>,
    pub detector_simulation: Box<dyn DetectorSimulation>,
    pub weight_calculator: Box<dyn WeightCalculator>,
}

impl SimulationServices {
    /// Creates the built-in services selected by the configuration.
    pub fn from_config(config: &SimulationConfig, seed: u64) -> Result<Self> {
        Ok(Self {
            ice_model: Box::new(medium::ice_model_from_name(&config.propagation.ice_model)?),
            ray_tracer: propagation::ray_tracer_from_name(
                &config.propagation.module,
                config.propagation.n_reflections,
            )?,
            pulse_synthesizer: signal::pulse_synthesizer_from_name(&config.signal.model, seed)?,
            detector_simulation: response::detector_simulation_from_config(
                config,
                seed.wrapping_add(1),
            ),
            weight_calculator: weights::weight_calculator_from_name(
                &config.weights.weight_mode,
                &config.weights.cross_section_type,
            )?,
        })
    }
}

/// Results of a completed simulation run.
#[derive(Clone, Debug)]
pub struct SimulationOutcome {
    /// Output dataset.
    pub table: DataTable,
    /// Number of showers for which any trigger fired.
    pub n_triggered_showers: usize,
    pub effective_volume: Option<EffectiveVolume>,
}

/// Simulation of an input dataset for a given detector.
pub struct Simulation {
    config: SimulationConfig,
    input: InputDataset,
    detector: Box<dyn Detector>,
    services: SimulationServices,
    stations: Vec<StationSetup>,
    noise_level: NoiseLevel,
    stored_ray_tracing: BTreeMap<i64, StoredRayTracing>,
    dt: fsi,
}

impl Simulation {
    /// Prepares the simulation, computing the noise level and checking
    /// whether ray tracing results stored in the input can be reused.
    pub fn new(
        config: SimulationConfig,
        input: InputDataset,
        detector: Box<dyn Detector>,
        services: SimulationServices,
    ) -> Result<Self> {
        config.validate()?;
        let dt = 1.0 / config.sampling_rate;

        let stations = detector
            .station_ids()
            .into_iter()
            .map(|station_id| StationSetup::new(detector.as_ref(), station_id, dt))
            .collect::<Result<Vec<_>>>()?;

        let (first_station_id, first_channel_id) = stations
            .first()
            .and_then(|station| {
                station
                    .channel_ids
                    .first()
                    .map(|&channel_id| (station.station_id, channel_id))
            })
            .ok_or_else(|| {
                SimulationError::InvalidData("Detector has no station with channels".to_string())
            })?;
        let noise_level = NoiseLevel::compute(
            &config.trigger,
            services.detector_simulation.as_ref(),
            first_station_id,
            first_channel_id,
            dt,
        )?;

        let pre_simulated = !config.speedup.redo_raytracing
            && input.table().text_attribute("detector") == Some(detector.description_text());
        let stored_ray_tracing = if pre_simulated {
            info!("Detector is identical to the one of the input, reusing stored ray tracing");
            stations
                .iter()
                .filter_map(|station| {
                    input
                        .table()
                        .group(&station_group_name(station.station_id))
                        .and_then(|group| {
                            StoredRayTracing::from_station_group(group, input.n_showers())
                        })
                        .map(|stored| (station.station_id, stored))
                })
                .collect()
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            config,
            input,
            detector,
            services,
            stations,
            noise_level,
            stored_ray_tracing,
            dt,
        })
    }

    pub fn noise_level(&self) -> &NoiseLevel {
        &self.noise_level
    }

    pub fn stations(&self) -> &[StationSetup] {
        &self.stations
    }

    /// Whether ray paths are restored from the input rather than solved for.
    pub fn reuses_ray_tracing(&self) -> bool {
        !self.stored_ray_tracing.is_empty()
    }

    /// Runs the simulation over all event groups and assembles the output.
    pub fn run(&mut self, verbosity: &Verbosity, creation_date: Option<String>) -> Result<SimulationOutcome> {
        let Self {
            config,
            input,
            detector,
            services,
            stations,
            noise_level,
            stored_ray_tracing,
            dt,
        } = self;
        let SimulationServices {
            ice_model,
            ray_tracer,
            pulse_synthesizer,
            detector_simulation,
            weight_calculator,
        } = services;
        let ice_model = ice_model.as_ref();
        let ray_tracer = ray_tracer.as_ref();

        let n_showers = input.n_showers();
        let n_solutions = propagation::max_solutions(config.propagation.n_reflections);
        let polarization_mode = config.polarization_mode()?;
        let assemblers: Vec<_> = stations
            .iter()
            .map(|station| {
                FieldAssembler::new(
                    FieldAssemblyConfig {
                        delta_c_cut: config.speedup.delta_c_cut,
                        attenuate_ice: config.propagation.attenuate_ice,
                        focusing_limit: if config.propagation.focusing {
                            Some(config.propagation.focusing_limit)
                        } else {
                            None
                        },
                        polarization_mode,
                        e_phi: config.signal.e_phi,
                        n_samples: station.n_samples,
                        dt: *dt,
                        max_frequency: station.max_frequency,
                    },
                    ice_model,
                    ray_tracer,
                )
            })
            .collect();
        let layouts: Vec<_> = stations
            .iter()
            .map(|station| StationLayout {
                station_id: station.station_id,
                channel_ids: station.channel_ids.clone(),
            })
            .collect();
        let mut station_outputs: Vec<_> = stations
            .iter()
            .map(|station| StationOutput {
                station_id: station.station_id,
                channel_ids: station.channel_ids.clone(),
                antenna_positions: station.antenna_positions.clone(),
                n_samples: station.n_samples,
                meta: StationMeta::new(
                    n_showers,
                    station.channel_ids.len(),
                    n_solutions,
                    config.speedup.amp_per_ray_solution,
                ),
                events: Vec::new(),
            })
            .collect();
        let station_ids: Vec<_> = stations.iter().map(|station| station.station_id).collect();
        let mut registry = TriggerRegistry::new(n_showers, &station_ids);
        let mut weights = vec![0.0; n_showers];

        let fiducial_volume = input.fiducial_volume();
        let candidate_threshold = config.speedup.min_efield_amplitude * noise_level.vrms_efield;
        let event_groups = input.event_groups().to_vec();

        for group in event_groups
            .iter()
            .progress_with(verbosity.create_progress_bar(event_groups.len()))
        {
            let showers = input.showers();
            let mother = &showers[group.mother_index()];
            let mother_weight = weight_calculator.weight(mother.zenith, mother.energy, mother.flavor);
            for &shower_idx in &group.shower_indices {
                let shower = &showers[shower_idx];
                weights[shower_idx] = if shower.n_interaction > 1 {
                    mother_weight
                } else {
                    weight_calculator.weight(shower.zenith, shower.energy, shower.flavor)
                };
            }

            for (station_idx, station) in stations.iter().enumerate() {
                let mut samples = Vec::new();

                for &shower_idx in &group.shower_indices {
                    let shower = &mut input.showers_mut()[shower_idx];
                    let context = IterationContext {
                        event_group_id: group.event_group_id,
                        shower_idx,
                        shower_id: shower.shower_id,
                        station_idx,
                        station_id: station.station_id,
                        ..IterationContext::default()
                    };
                    if let Some(fiducial_volume) = &fiducial_volume {
                        if !fiducial_volume.contains(&shower.vertex) {
                            debug!(
                                "Shower {} at {} is outside the fiducial volume, skipping",
                                shower.shower_id, shower.vertex
                            );
                            continue;
                        }
                    }
                    if let Some(shower_class) = config.signal.shower_type {
                        if shower.shower_class != shower_class {
                            debug!(
                                "Shower {} is of type {}, skipping",
                                shower.shower_id, shower.shower_class
                            );
                            continue;
                        }
                    }
                    if weights[shower_idx] < config.speedup.minimum_weight_cut {
                        debug!(
                            "Shower {} has weight {:.3e} below the cut, skipping",
                            shower.shower_id, weights[shower_idx]
                        );
                        continue;
                    }

                    for (channel_idx, (&channel_id, receiver)) in station
                        .channel_ids
                        .iter()
                        .zip(station.receivers.iter())
                        .enumerate()
                    {
                        let context = IterationContext {
                            channel_idx,
                            channel_id,
                            ..context
                        };
                        let solutions = match stored_ray_tracing.get(&station.station_id) {
                            Some(stored) => restore_solutions(
                                ray_tracer,
                                ice_model,
                                stored,
                                &context,
                                &shower.vertex,
                                receiver,
                            ),
                            None => match ray_tracer.solve(&shower.vertex, receiver, ice_model) {
                                Ok(solutions) => solutions,
                                Err(err) => {
                                    debug!(
                                        "Ray tracing failed for shower {} and channel {}: {}",
                                        shower.shower_id, channel_id, err
                                    );
                                    continue;
                                }
                            },
                        };
                        let assembly = assemblers[station_idx].assemble_channel(
                            &context,
                            shower,
                            receiver,
                            &solutions,
                            pulse_synthesizer.as_mut(),
                        );
                        station_outputs[station_idx]
                            .meta
                            .record_channel(shower_idx, channel_idx, &assembly);
                        samples.extend(assembly.samples);
                    }
                }

                if !samples
                    .iter()
                    .any(|sample| sample.max_field_amplitude() > candidate_threshold)
                {
                    debug!(
                        "Event group {}: no field above {:.3e} V/m at station {}, skipping station",
                        group.event_group_id, candidate_threshold, station.station_id
                    );
                    continue;
                }

                if config.speedup.amp_per_ray_solution {
                    for sample in &samples {
                        let properties =
                            detector_simulation.sample_properties(station.station_id, sample);
                        station_outputs[station_idx].meta.record_sample_properties(
                            sample.shower_idx,
                            sample.channel_idx,
                            sample.ray_solution_idx,
                            &properties,
                        );
                    }
                }

                for mut sub_event in split_into_sub_events(samples, config.split_event_time_diff) {
                    if config.signal.zerosignal {
                        sub_event
                            .samples
                            .iter_mut()
                            .for_each(|sample| sample.scale(0.0));
                    }
                    let response = detector_simulation.simulate(
                        &layouts[station_idx],
                        &sub_event,
                        noise_level.vrms,
                    )?;
                    for trigger in &response.triggers {
                        registry.record_outcome(
                            station.station_id,
                            &sub_event.shower_indices,
                            &trigger.name,
                            trigger.fired,
                        );
                    }
                    if !response.has_triggered() {
                        debug!(
                            "Event group {}, sub-event {}: station {} did not trigger",
                            group.event_group_id, sub_event.sub_event_id, station.station_id
                        );
                        continue;
                    }

                    let mut multiple_triggers = vec![false; registry.n_triggers()];
                    for trigger in response.triggers.iter().filter(|trigger| trigger.fired) {
                        multiple_triggers[registry.register_trigger_type(&trigger.name)] = true;
                    }
                    station_outputs[station_idx].events.push(EventRecord {
                        event_group_id: group.event_group_id,
                        event_id: sub_event.sub_event_id,
                        maximum_amplitudes: response
                            .channels
                            .iter()
                            .map(|channel| channel.max_amplitude)
                            .collect(),
                        maximum_amplitudes_envelope: response
                            .channels
                            .iter()
                            .map(|channel| channel.max_amplitude_envelope)
                            .collect(),
                        triggered: true,
                        multiple_triggers,
                    });
                }
            }
        }

        let attributes = RunAttributes {
            detector_description: detector.description_text().to_string(),
            noise_temperature: noise_level.noise_temperature,
            vrms: noise_level.vrms,
            dt: *dt,
            bandwidth: noise_level.bandwidth,
            n_samples: stations.first().map_or(0, |station| station.n_samples),
            config_yaml: config.to_yaml()?,
            creation_date,
        };
        let table = build_output_table(
            input,
            &weights,
            &registry,
            &station_outputs,
            &attributes,
            config.save_all,
        );
        let triggered = registry.global().triggered();
        let n_triggered_showers = triggered.iter().filter(|&&fired| fired).count();
        info!("{} of {} showers triggered", n_triggered_showers, n_showers);

        Ok(SimulationOutcome {
            table,
            n_triggered_showers,
            effective_volume: effective_volume(input, &weights, triggered),
        })
    }
}

/// Reconstructs the stored ray paths for the shower and channel of the
/// given context, using stored path lengths and travel times where present.
fn restore_solutions(
    ray_tracer: &dyn RayTracer,
    ice_model: &dyn IceModel,
    stored: &StoredRayTracing,
    context: &IterationContext,
    emitter: &Point3<fsi>,
    receiver: &Point3<fsi>,
) -> Vec<RaySolution> {
    stored
        .solutions(context.shower_idx, context.channel_idx)
        .into_iter()
        .filter_map(|stored_solution| {
            match ray_tracer.restore(emitter, receiver, ice_model, &stored_solution.parameters) {
                Ok(mut solution) => {
                    if stored_solution.path_length.is_some() {
                        solution.path_length = stored_solution.path_length;
                    }
                    if stored_solution.travel_time.is_some() {
                        solution.travel_time = stored_solution.travel_time;
                    }
                    Some(solution)
                }
                Err(err) => {
                    debug!(
                        "Could not restore ray path for shower {} and channel {}: {}",
                        context.shower_id, context.channel_id, err
                    );
                    None
                }
            }
        })
        .collect()
}

/// Simulates the given input file for the given detector file and writes
/// the output file.
///
/// Fails before doing anything else if the output file exists and may not be
/// overwritten. A missing seed in the configuration is drawn and recorded in
/// the configuration written to the output.
pub fn simulate_files(
    input_file_path: &Path,
    detector_file_path: &Path,
    output_file_path: &Path,
    mut config: SimulationConfig,
    io_context: &IOContext,
    verbosity: &Verbosity,
    creation_date: Option<String>,
) -> Result<SimulationOutcome> {
    check_write_allowed(output_file_path, io_context.overwrite_mode())?;
    let seed = config.ensure_seed();

    if verbosity.print_messages() {
        println!("Reading input from {}", input_file_path.display());
    }
    let input = InputDataset::from_file(input_file_path)?;
    let detector = JsonDetector::from_file(detector_file_path)?;
    let services = SimulationServices::from_config(&config, seed)?;

    let mut simulation = Simulation::new(config, input, Box::new(detector), services)?;
    let outcome = simulation.run(verbosity, creation_date)?;

    if verbosity.print_messages() {
        println!("Writing output to {}", output_file_path.display());
    }
    let atomic_output_file = io_context.create_atomic_output_file(output_file_path.to_path_buf())?;
    outcome
        .table
        .write_to_file(atomic_output_file.temporary_path(), Endianness::native())?;
    io_context.close_atomic_output_file(atomic_output_file)?;
    Ok(outcome)
}
