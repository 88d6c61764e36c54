//! Configuration of the simulation.
//!
//! The configuration is read from a default YAML document embedded in the
//! crate, deep-merged with an optional user document.

use crate::{
    error::{Result, SimulationError},
    medium::ICE_MODEL_NAMES,
    particles::ShowerClass,
    propagation::RAY_TRACER_NAMES,
    random,
    signal::PULSE_MODEL_NAMES,
    simulation::fsi,
    weights::{CROSS_SECTION_TYPE_NAMES, WEIGHT_MODE_NAMES},
};
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;
use std::path::Path;

/// Default configuration as a YAML document.
pub const DEFAULT_CONFIG_YAML: &str = include_str!("config/default.yaml");

/// How the polarization of the emitted field is determined.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolarizationMode {
    /// Perpendicular to the launch vector, in the plane of the launch vector
    /// and the shower axis.
    Auto,
    /// Fixed mixture of theta and phi components.
    Custom,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeightsConfig {
    pub weight_mode: String,
    pub cross_section_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeedupConfig {
    pub minimum_weight_cut: fsi,
    #[serde(rename = "delta_C_cut")]
    pub delta_c_cut: fsi,
    pub redo_raytracing: bool,
    pub min_efield_amplitude: fsi,
    pub amp_per_ray_solution: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PropagationConfig {
    pub module: String,
    pub ice_model: String,
    pub attenuate_ice: bool,
    pub focusing: bool,
    pub focusing_limit: fsi,
    pub n_reflections: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    pub model: String,
    pub zerosignal: bool,
    pub polarization: String,
    #[serde(rename = "ePhi")]
    pub e_phi: fsi,
    pub shower_type: Option<ShowerClass>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub noise_temperature: Option<fsi>,
    #[serde(rename = "Vrms")]
    pub vrms: Option<fsi>,
    pub threshold: fsi,
    pub majority: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseConfig {
    pub passband: [fsi; 2],
    pub filter_order: i32,
    pub gain: fsi,
    pub effective_length: fsi,
}

/// Complete configuration of a simulation run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub seed: Option<u64>,
    pub sampling_rate: fsi,
    pub split_event_time_diff: fsi,
    pub save_all: bool,
    pub noise: bool,
    pub weights: WeightsConfig,
    pub speedup: SpeedupConfig,
    pub propagation: PropagationConfig,
    pub signal: SignalConfig,
    pub trigger: TriggerConfig,
    pub response: ResponseConfig,
}

/// Recursively merges `overrides` into `base`, with values in `overrides`
/// taking precedence and nested mappings merged key by key.
pub fn merge_yaml(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Mapping(base_mapping), Value::Mapping(override_mapping)) => {
            for (key, override_value) in override_mapping {
                match base_mapping.get_mut(&key) {
                    Some(base_value) => merge_yaml(base_value, override_value),
                    None => {
                        base_mapping.insert(key, override_value);
                    }
                }
            }
        }
        (base, overrides) => *base = overrides,
    }
}

fn config_error<T>(message: String) -> Result<T> {
    Err(SimulationError::Config(message))
}

fn check_name(kind: &str, name: &str, valid_names: &[&str]) -> Result<()> {
    if valid_names.contains(&name) {
        Ok(())
    } else {
        config_error(format!(
            "Invalid {} {} (valid values are {})",
            kind,
            name,
            valid_names.join(", ")
        ))
    }
}

impl SimulationConfig {
    /// Creates the configuration from the default document merged with the
    /// given user document, and validates it.
    pub fn from_yaml_str(user_yaml: Option<&str>) -> Result<Self> {
        let mut merged: Value = serde_yaml_ng::from_str(DEFAULT_CONFIG_YAML)?;
        if let Some(user_yaml) = user_yaml {
            let user: Value = serde_yaml_ng::from_str(user_yaml)?;
            match user {
                Value::Null => {}
                Value::Mapping(_) => merge_yaml(&mut merged, user),
                _ => {
                    return config_error(
                        "User configuration must be a mapping of option names to values"
                            .to_string(),
                    )
                }
            }
        }
        let config: Self = serde_yaml_ng::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the user configuration from the given file, if any, and merges
    /// it into the default configuration.
    pub fn from_file(user_config_path: Option<&Path>) -> Result<Self> {
        match user_config_path {
            Some(path) => {
                let text = crate::io::utils::read_text_file(path)?;
                Self::from_yaml_str(Some(&text))
            }
            None => Self::from_yaml_str(None),
        }
    }

    /// Checks that all options have valid values.
    pub fn validate(&self) -> Result<()> {
        match (self.trigger.noise_temperature, self.trigger.vrms) {
            (Some(_), Some(_)) => {
                return config_error(
                    "Both noise temperature and Vrms are set, only one of them may be given"
                        .to_string(),
                )
            }
            (None, None) => {
                return config_error("Either noise temperature or Vrms must be set".to_string())
            }
            (Some(temperature), None) if temperature <= 0.0 => {
                return config_error(format!("Invalid noise temperature {}", temperature))
            }
            (None, Some(vrms)) if vrms <= 0.0 => {
                return config_error(format!("Invalid Vrms {}", vrms))
            }
            _ => {}
        }
        if self.polarization_mode()? == PolarizationMode::Custom && self.signal.e_phi.abs() > 1.0 {
            return config_error(format!(
                "ePhi must be between -1 and 1, but is {}",
                self.signal.e_phi
            ));
        }
        if self.sampling_rate <= 0.0 {
            return config_error(format!("Invalid sampling rate {}", self.sampling_rate));
        }
        if self.split_event_time_diff <= 0.0 {
            return config_error(format!(
                "Invalid event splitting time difference {}",
                self.split_event_time_diff
            ));
        }
        if self.speedup.delta_c_cut < 0.0 {
            return config_error(format!(
                "Invalid Cherenkov angle cut {}",
                self.speedup.delta_c_cut
            ));
        }
        if self.propagation.focusing_limit <= 0.0 {
            return config_error(format!(
                "Invalid focusing limit {}",
                self.propagation.focusing_limit
            ));
        }
        let [low_frequency, high_frequency] = self.response.passband;
        if !(0.0 <= low_frequency && low_frequency < high_frequency) {
            return config_error(format!(
                "Invalid passband [{}, {}]",
                low_frequency, high_frequency
            ));
        }
        if self.response.filter_order < 1 {
            return config_error(format!(
                "Invalid filter order {}",
                self.response.filter_order
            ));
        }
        if self.trigger.majority == 0 {
            return config_error("Majority must be at least 1".to_string());
        }
        check_name("propagation module", &self.propagation.module, &RAY_TRACER_NAMES)?;
        check_name("ice model", &self.propagation.ice_model, &ICE_MODEL_NAMES)?;
        check_name("signal model", &self.signal.model, &PULSE_MODEL_NAMES)?;
        check_name("weight mode", &self.weights.weight_mode, &WEIGHT_MODE_NAMES)?;
        check_name(
            "cross section type",
            &self.weights.cross_section_type,
            &CROSS_SECTION_TYPE_NAMES,
        )?;
        Ok(())
    }

    /// Returns the configured polarization mode.
    pub fn polarization_mode(&self) -> Result<PolarizationMode> {
        match self.signal.polarization.as_str() {
            "auto" => Ok(PolarizationMode::Auto),
            "custom" => Ok(PolarizationMode::Custom),
            other => config_error(format!(
                "Invalid polarization mode {} (valid modes are auto, custom)",
                other
            )),
        }
    }

    /// Returns the configured seed, drawing and storing a random one first
    /// if none is set.
    pub fn ensure_seed(&mut self) -> u64 {
        *self.seed.get_or_insert_with(random::draw_random_seed)
    }

    /// Serializes the configuration into a YAML document.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml_ng::to_string(self)?)
    }
}
