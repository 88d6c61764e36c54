//! Synthesis of the radio pulses emitted by particle showers.

pub mod zhs;

use crate::{
    error::{Result, SimulationError},
    fourier::Spectrum,
    particles::ShowerClass,
    simulation::fsi,
};

/// Names of the available pulse models.
pub const PULSE_MODEL_NAMES: [&str; 1] = ["ZHS1992"];

/// Physical parameters of a shower and observer for which to synthesize a
/// pulse.
#[derive(Clone, Copy, Debug)]
pub struct PulseParameters {
    /// Energy of the shower [eV].
    pub energy: fsi,
    /// Angle between the shower axis and the direction to the observer [rad].
    pub viewing_angle: fsi,
    /// Number of samples in the time trace.
    pub n_samples: usize,
    /// Time between samples [ns].
    pub dt: fsi,
    /// Class of the shower.
    pub shower_class: ShowerClass,
    /// Index of refraction at the shower.
    pub n_index: fsi,
    /// Distance from the shower to the observer [m].
    pub distance: fsi,
}

/// Frequency domain electric field of a synthesized pulse.
#[derive(Clone, Debug)]
pub struct SynthesizedPulse {
    /// Field amplitude spectrum along the polarization direction.
    pub spectrum: Spectrum,
    /// Identifier of the stochastic shower realization that was used.
    pub realization_id: u64,
}

/// Defines the interface of a service computing the Askaryan emission from a
/// shower.
pub trait PulseSynthesizer {
    /// Returns the name of the pulse model.
    fn name(&self) -> &str;

    /// Computes the frequency domain field observed for the given
    /// parameters.
    ///
    /// If `realization_id` is given, the corresponding stochastic shower
    /// realization is used, otherwise a new one is drawn.
    fn synthesize(
        &mut self,
        parameters: &PulseParameters,
        realization_id: Option<u64>,
    ) -> Result<SynthesizedPulse>;
}

/// Creates the pulse synthesizer with the given name, drawing new
/// realizations from a generator seeded with `seed`.
pub fn pulse_synthesizer_from_name(name: &str, seed: u64) -> Result<Box<dyn PulseSynthesizer>> {
    match name {
        "ZHS1992" => Ok(Box::new(zhs::ZhsSynthesizer::new(seed))),
        other => Err(SimulationError::Config(format!(
            "Unknown signal model {} (valid models are {})",
            other,
            PULSE_MODEL_NAMES.join(", ")
        ))),
    }
}
