//! Response of the detector hardware to the electric fields arriving at the
//! antennas.

pub mod threshold;

use crate::{
    config::SimulationConfig,
    error::Result,
    fourier::Complex,
    simulation::{field::ChannelFieldSample, fsi, splitting::SubEvent},
};
use ndarray::Array1;

/// Signal properties of a single field sample after the signal chain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleProperties {
    /// Maximum of the voltage envelope [V].
    pub max_amplitude_envelope: fsi,
    /// Absolute time of the envelope maximum [ns].
    pub signal_time: fsi,
}

/// Maximum amplitudes of a channel in a simulated readout.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChannelAmplitudes {
    /// Maximum absolute voltage [V].
    pub max_amplitude: fsi,
    /// Maximum of the voltage envelope [V].
    pub max_amplitude_envelope: fsi,
}

/// Outcome of one trigger for a readout.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TriggerOutcome {
    pub name: String,
    pub fired: bool,
}

/// Result of simulating the readout of a station for one sub-event.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StationResponse {
    /// Amplitudes for every channel of the station, in channel order.
    pub channels: Vec<ChannelAmplitudes>,
    pub triggers: Vec<TriggerOutcome>,
}

impl StationResponse {
    /// Whether any trigger fired.
    pub fn has_triggered(&self) -> bool {
        self.triggers.iter().any(|trigger| trigger.fired)
    }
}

/// Layout of the station whose readout is simulated.
#[derive(Clone, Debug, PartialEq)]
pub struct StationLayout {
    pub station_id: i64,
    pub channel_ids: Vec<i64>,
}

/// Defines the interface of a detector simulation turning electric fields
/// into voltages and trigger decisions.
pub trait DetectorSimulation {
    /// Returns the name of the detector simulation.
    fn name(&self) -> &str;

    /// Computes the transfer function of the complete signal chain of the
    /// given channel at the given frequencies.
    fn filter(&self, station_id: i64, channel_id: i64, frequencies: &Array1<fsi>) -> Array1<Complex<fsi>>;

    /// Computes the signal properties of an individual field sample.
    fn sample_properties(&self, station_id: i64, sample: &ChannelFieldSample) -> SampleProperties;

    /// Simulates the readout of the station for the given sub-event and
    /// evaluates the triggers, given the noise RMS voltage `vrms`.
    fn simulate(
        &mut self,
        station: &StationLayout,
        sub_event: &SubEvent,
        vrms: fsi,
    ) -> Result<StationResponse>;
}

/// Creates the reference detector simulation for the given configuration,
/// adding noise drawn from a generator seeded with `seed` if enabled.
pub fn detector_simulation_from_config(config: &SimulationConfig, seed: u64) -> Box<dyn DetectorSimulation> {
    let response = threshold::ThresholdResponse::new(&config.response, &config.trigger);
    if config.noise {
        Box::new(response.with_noise(seed))
    } else {
        Box::new(response)
    }
}
