//! Frequency domain parametrization of the Askaryan pulse following
//! Zas, Halzen and Stanev (1992).

use super::{PulseParameters, PulseSynthesizer, SynthesizedPulse};
use crate::{
    error::{Result, SimulationError},
    fourier::{rfft_frequencies, Complex},
    particles::ShowerClass,
    random::{self, SimulationRng},
    simulation::fsi,
    units::{DEG, GHZ, M, MHZ, PEV, TEV, V},
};
use rand::RngCore;
use rand_distr::{Distribution, Normal};

/// Frequency normalizing the spectral shape.
const REFERENCE_FREQUENCY: fsi = 0.5 * GHZ;
/// Field amplitude per energy at the Cherenkov angle [V/m/MHz per TeV at 1 m].
const AMPLITUDE_PER_TEV: fsi = 1.1e-7;
/// Width of the Cherenkov cone at the reference frequency.
const REFERENCE_CONE_WIDTH: fsi = 2.4 * DEG;
/// Energy above which the LPM effect elongates electromagnetic showers.
const LPM_ENERGY: fsi = 2.0 * PEV;
/// Relative spread of the shower length between realizations.
const LENGTH_SPREAD: fsi = 0.1;
/// Compensates the Fourier normalization used in the original parametrization.
const FOURIER_NORMALIZATION: fsi = 0.5;

/// Synthesizer for the ZHS1992 pulse model.
#[derive(Clone, Debug)]
pub struct ZhsSynthesizer {
    rng: SimulationRng,
}

impl ZhsSynthesizer {
    /// Creates a new synthesizer drawing new realization ids from a
    /// generator seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: random::create_rng(seed),
        }
    }

    /// Relative length of the shower in the given realization.
    fn length_factor(realization_id: u64) -> fsi {
        let mut rng = random::create_rng(realization_id);
        let factor = match Normal::new(1.0, LENGTH_SPREAD) {
            Ok(distribution) => distribution.sample(&mut rng),
            Err(_) => 1.0,
        };
        fsi::max(factor, 0.5)
    }

    /// Narrowing of the Cherenkov cone due to the LPM effect.
    fn lpm_factor(energy: fsi, shower_class: ShowerClass) -> fsi {
        match shower_class {
            ShowerClass::Em if energy > LPM_ENERGY => {
                fsi::powf(LPM_ENERGY / (0.14 * energy + LPM_ENERGY), 0.3)
            }
            _ => 1.0,
        }
    }
}

impl PulseSynthesizer for ZhsSynthesizer {
    fn name(&self) -> &str {
        "ZHS1992"
    }

    fn synthesize(
        &mut self,
        parameters: &PulseParameters,
        realization_id: Option<u64>,
    ) -> Result<SynthesizedPulse> {
        if parameters.n_index <= 1.0 {
            return Err(SimulationError::Synthesis(format!(
                "No Cherenkov emission for index of refraction {}",
                parameters.n_index
            )));
        }
        if parameters.distance <= 0.0 {
            return Err(SimulationError::Synthesis(format!(
                "Invalid distance {} to observer",
                parameters.distance
            )));
        }
        let realization_id = realization_id.unwrap_or_else(|| self.rng.next_u64());

        let cherenkov_angle = fsi::acos(1.0 / parameters.n_index);
        let delta_angle = parameters.viewing_angle - cherenkov_angle;
        let cone_width_factor = Self::lpm_factor(parameters.energy, parameters.shower_class)
            / Self::length_factor(realization_id);

        let trace_duration = parameters.n_samples as fsi * parameters.dt;
        let amplitude_scale = FOURIER_NORMALIZATION
            * AMPLITUDE_PER_TEV
            * (parameters.energy / TEV)
            * (V / M)
            / (parameters.distance / M)
            / MHZ;

        let spectrum = rfft_frequencies(parameters.n_samples, parameters.dt).mapv(|frequency| {
            if frequency <= 0.0 {
                return Complex::new(0.0, 0.0);
            }
            let nu = frequency / REFERENCE_FREQUENCY;
            let cone_width = REFERENCE_CONE_WIDTH / nu * cone_width_factor;
            let magnitude = amplitude_scale * nu / (1.0 + 0.4 * nu * nu)
                * fsi::exp(-0.5 * (delta_angle / cone_width).powi(2));
            // Constant phase of 90 degrees, delayed to the middle of the trace
            let phase = 0.5 * std::f64::consts::PI
                - 2.0 * std::f64::consts::PI * frequency * 0.5 * trace_duration;
            Complex::from_polar(magnitude, phase)
        });

        Ok(SynthesizedPulse {
            spectrum,
            realization_id,
        })
    }
}
