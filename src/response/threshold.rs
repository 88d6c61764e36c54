//! Simple detector simulation with a band-pass signal chain and amplitude
//! threshold triggers.

use super::{
    ChannelAmplitudes, DetectorSimulation, SampleProperties, StationLayout, StationResponse,
    TriggerOutcome,
};
use crate::{
    config::{ResponseConfig, TriggerConfig},
    error::{Result, SimulationError},
    fourier::{self, Complex, Spectrum, Trace},
    random::{self, SimulationRng},
    simulation::{field::ChannelFieldSample, fsi, splitting::SubEvent},
};
use ndarray::Array1;
use rand_distr::{Distribution, Normal};

/// Name of the trigger requiring any channel to exceed the threshold.
pub const SIMPLE_THRESHOLD_TRIGGER: &str = "simple_threshold";
/// Name of the trigger requiring a minimum number of channels to exceed the
/// threshold.
pub const MAJORITY_TRIGGER: &str = "majority";

/// Detector simulation projecting the `e_θ` field component onto a constant
/// effective antenna length, followed by a Butterworth band-pass amplifier.
#[derive(Clone, Debug)]
pub struct ThresholdResponse {
    passband: [fsi; 2],
    filter_order: i32,
    gain: fsi,
    effective_length: fsi,
    threshold: fsi,
    majority: usize,
    noise_rng: Option<SimulationRng>,
}

impl ThresholdResponse {
    /// Creates a new noiseless detector simulation.
    pub fn new(response_config: &ResponseConfig, trigger_config: &TriggerConfig) -> Self {
        Self {
            passband: response_config.passband,
            filter_order: response_config.filter_order,
            gain: response_config.gain,
            effective_length: response_config.effective_length,
            threshold: trigger_config.threshold,
            majority: trigger_config.majority,
            noise_rng: None,
        }
    }

    /// Enables Gaussian noise drawn from a generator seeded with `seed`.
    pub fn with_noise(mut self, seed: u64) -> Self {
        self.noise_rng = Some(random::create_rng(seed));
        self
    }

    /// Magnitude of the transfer function at the given frequency.
    fn transfer_magnitude(&self, frequency: fsi) -> fsi {
        if frequency <= 0.0 {
            return 0.0;
        }
        let [low_frequency, high_frequency] = self.passband;
        let order = 2 * self.filter_order;
        let high_pass = 1.0 / fsi::sqrt(1.0 + (low_frequency / frequency).powi(order));
        let low_pass = 1.0 / fsi::sqrt(1.0 + (frequency / high_frequency).powi(order));
        self.gain * high_pass * low_pass
    }

    fn voltage_spectrum(&self, sample: &ChannelFieldSample) -> Spectrum {
        let frequencies = fourier::rfft_frequencies(sample.n_samples(), sample.dt());
        let mut spectrum = sample.e_theta.clone();
        spectrum.zip_mut_with(&frequencies, |value, &frequency| {
            *value = *value * (self.transfer_magnitude(frequency) * self.effective_length)
        });
        spectrum
    }

    fn voltage_trace(&self, sample: &ChannelFieldSample) -> Trace {
        let spectrum = self.voltage_spectrum(sample);
        fourier::freq_to_time(spectrum.as_slice().unwrap_or(&[]), sample.sampling_rate)
    }
}

impl DetectorSimulation for ThresholdResponse {
    fn name(&self) -> &str {
        "threshold"
    }

    fn filter(&self, _station_id: i64, _channel_id: i64, frequencies: &Array1<fsi>) -> Array1<Complex<fsi>> {
        frequencies.mapv(|frequency| Complex::new(self.transfer_magnitude(frequency), 0.0))
    }

    fn sample_properties(&self, _station_id: i64, sample: &ChannelFieldSample) -> SampleProperties {
        let trace = self.voltage_trace(sample);
        let envelope = fourier::envelope(trace.as_slice().unwrap_or(&[]));
        let (max_idx, max_amplitude_envelope) = envelope
            .iter()
            .enumerate()
            .fold((0, 0.0), |(max_idx, max), (idx, &value)| {
                if value > max {
                    (idx, value)
                } else {
                    (max_idx, max)
                }
            });
        SampleProperties {
            max_amplitude_envelope,
            signal_time: sample.trace_start_time + max_idx as fsi * sample.dt(),
        }
    }

    fn simulate(
        &mut self,
        station: &StationLayout,
        sub_event: &SubEvent,
        vrms: fsi,
    ) -> Result<StationResponse> {
        let n_channels = station.channel_ids.len();
        let dt = sub_event.samples.first().map_or(1.0, ChannelFieldSample::dt);
        let start_time = sub_event
            .samples
            .iter()
            .fold(fsi::INFINITY, |min, sample| fsi::min(min, sample.trace_start_time));
        let end_time = sub_event.samples.iter().fold(fsi::NEG_INFINITY, |max, sample| {
            fsi::max(max, sample.trace_start_time + sample.n_samples() as fsi * dt)
        });
        let n_grid_samples = if sub_event.samples.is_empty() {
            0
        } else {
            ((end_time - start_time) / dt).ceil() as usize + 1
        };

        let mut traces = vec![Trace::zeros(n_grid_samples); n_channels];
        for sample in &sub_event.samples {
            let trace = match traces.get_mut(sample.channel_idx) {
                Some(trace) => trace,
                None => {
                    return Err(SimulationError::InvalidData(format!(
                        "Station {} has no channel with index {}",
                        station.station_id, sample.channel_idx
                    )))
                }
            };
            let offset = ((sample.trace_start_time - start_time) / dt).round() as usize;
            for (idx, value) in self.voltage_trace(sample).iter().enumerate() {
                if let Some(grid_value) = trace.get_mut(offset + idx) {
                    *grid_value += value;
                }
            }
        }

        if let Some(rng) = self.noise_rng.as_mut() {
            let distribution = Normal::new(0.0, vrms).map_err(|err| {
                SimulationError::InvalidData(format!("Invalid noise level {}: {}", vrms, err))
            })?;
            for trace in &mut traces {
                trace.mapv_inplace(|value| value + distribution.sample(rng));
            }
        }

        let channels: Vec<_> = traces
            .iter()
            .map(|trace| {
                let values = trace.as_slice().unwrap_or(&[]);
                ChannelAmplitudes {
                    max_amplitude: fourier::max_abs(values),
                    max_amplitude_envelope: fourier::max_abs(
                        fourier::envelope(values).as_slice().unwrap_or(&[]),
                    ),
                }
            })
            .collect();

        let n_above_threshold = channels
            .iter()
            .filter(|amplitudes| amplitudes.max_amplitude > self.threshold * vrms)
            .count();

        Ok(StationResponse {
            channels,
            triggers: vec![
                TriggerOutcome {
                    name: SIMPLE_THRESHOLD_TRIGGER.to_string(),
                    fired: n_above_threshold >= 1,
                },
                TriggerOutcome {
                    name: MAJORITY_TRIGGER.to_string(),
                    fired: n_above_threshold >= self.majority,
                },
            ],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::SimulationConfig, simulation::splitting::tests::create_sample};
    use approx::assert_abs_diff_eq;

    const SAMPLING_RATE: fsi = 5.0;
    const N_SAMPLES: usize = 256;

    fn response() -> ThresholdResponse {
        let config = SimulationConfig::from_yaml_str(None).unwrap();
        ThresholdResponse::new(&config.response, &config.trigger)
    }

    fn pulse_sample(shower_idx: usize, channel_idx: usize, amplitude: fsi) -> ChannelFieldSample {
        let mut trace = vec![0.0; N_SAMPLES];
        trace[N_SAMPLES / 2] = amplitude;
        let mut sample = create_sample(shower_idx, channel_idx, 100.0);
        sample.sampling_rate = SAMPLING_RATE;
        sample.e_theta = fourier::time_to_freq(&trace, SAMPLING_RATE);
        sample.e_phi = Spectrum::zeros(sample.e_theta.len());
        sample
    }

    fn sub_event(samples: Vec<ChannelFieldSample>) -> SubEvent {
        SubEvent {
            sub_event_id: 0,
            shower_indices: vec![0],
            samples,
        }
    }

    fn layout(n_channels: usize) -> StationLayout {
        StationLayout {
            station_id: 1,
            channel_ids: (0..n_channels as i64).collect(),
        }
    }

    #[test]
    fn filter_passes_band_and_blocks_outside() {
        let response = response();
        let frequencies = Array1::from(vec![0.0, 0.01, 0.2, 2.0]);
        let filter = response.filter(1, 0, &frequencies);
        assert_eq!(filter[0].norm(), 0.0);
        assert!(filter[1].norm() < 1e-6);
        assert_abs_diff_eq!(filter[2].norm(), 1.0, epsilon = 1e-2);
        assert!(filter[3].norm() < 1e-6);
    }

    #[test]
    fn strong_pulse_fires_threshold_but_not_majority() {
        let mut response = response();
        let sub_event = sub_event(vec![pulse_sample(0, 0, 1.0)]);
        let result = response.simulate(&layout(2), &sub_event, 1e-3).unwrap();
        assert_eq!(result.channels.len(), 2);
        assert!(result.channels[0].max_amplitude > 3e-3);
        assert_eq!(result.channels[1].max_amplitude, 0.0);
        assert!(result.has_triggered());
        assert_eq!(
            result.triggers,
            vec![
                TriggerOutcome {
                    name: SIMPLE_THRESHOLD_TRIGGER.to_string(),
                    fired: true
                },
                TriggerOutcome {
                    name: MAJORITY_TRIGGER.to_string(),
                    fired: false
                }
            ]
        );
    }

    #[test]
    fn pulses_in_two_channels_fire_majority() {
        let mut response = response();
        let sub_event = sub_event(vec![pulse_sample(0, 0, 1.0), pulse_sample(0, 1, 1.0)]);
        let result = response.simulate(&layout(2), &sub_event, 1e-3).unwrap();
        assert!(result.triggers.iter().all(|trigger| trigger.fired));
    }

    #[test]
    fn zero_field_never_triggers_without_noise() {
        let mut response = response();
        let sub_event = sub_event(vec![pulse_sample(0, 0, 0.0)]);
        let result = response.simulate(&layout(1), &sub_event, 1e-3).unwrap();
        assert!(!result.has_triggered());
    }

    #[test]
    fn noise_is_added_when_enabled() {
        let mut response = response().with_noise(5);
        let sub_event = sub_event(vec![pulse_sample(0, 0, 0.0)]);
        let result = response.simulate(&layout(1), &sub_event, 1e-3).unwrap();
        assert!(result.channels[0].max_amplitude > 0.0);
    }

    #[test]
    fn signal_time_is_near_pulse() {
        let response = response();
        let sample = pulse_sample(0, 0, 1.0);
        let properties = response.sample_properties(1, &sample);
        assert!(properties.max_amplitude_envelope > 0.0);
        let pulse_time = 100.0 + 0.5 * N_SAMPLES as fsi / SAMPLING_RATE;
        assert!((properties.signal_time - pulse_time).abs() < 5.0);
    }
}
