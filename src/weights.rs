//! Survival probability of neutrinos traversing the Earth.

use crate::{
    constants::{N_AVOGADRO, RHO_EARTH, R_EARTH},
    error::{Result, SimulationError},
    simulation::fsi,
    units::{CM, GEV},
};

/// Names of the available weighting modes.
pub const WEIGHT_MODE_NAMES: [&str; 2] = ["none", "simple"];

/// Names of the available neutrino-nucleon cross section parametrizations.
pub const CROSS_SECTION_TYPE_NAMES: [&str; 2] = ["ghandi", "ctw"];

/// Computes the probability that a neutrino reaches its interaction vertex.
pub trait WeightCalculator {
    /// Returns the survival probability of a neutrino with the given
    /// arrival zenith angle [rad] and energy [eV].
    fn weight(&self, zenith: fsi, energy: fsi, flavor: i64) -> fsi;
}

/// Every neutrino survives.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoWeights;

impl WeightCalculator for NoWeights {
    fn weight(&self, _zenith: fsi, _energy: fsi, _flavor: i64) -> fsi {
        1.0
    }
}

/// Parametrization of the total neutrino-nucleon cross section.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrossSection {
    /// Power law of Gandhi et al. (1998).
    Ghandi,
    /// Fit of Connolly, Thorne and Waters (2011).
    Ctw,
}

impl CrossSection {
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "ghandi" => Ok(Self::Ghandi),
            "ctw" => Ok(Self::Ctw),
            other => Err(SimulationError::Config(format!(
                "Unknown cross section type {} (valid types are {})",
                other,
                CROSS_SECTION_TYPE_NAMES.join(", ")
            ))),
        }
    }

    /// Total (charged plus neutral current) cross section for the given
    /// neutrino energy [cm^2].
    pub fn total_cm2(&self, energy: fsi) -> fsi {
        match self {
            Self::Ghandi => {
                let energy_gev = energy / GEV;
                2.69e-36 * energy_gev.powf(0.402) + 1.06e-36 * energy_gev.powf(0.408)
            }
            Self::Ctw => {
                let epsilon = (energy / GEV).log10();
                let ctw = |c_0: fsi, c_1: fsi, c_2: fsi, c_3: fsi, c_4: fsi| {
                    let l = (epsilon - c_0).ln();
                    fsi::powf(10.0, c_1 + c_2 * l + c_3 * l * l + c_4 / l)
                };
                ctw(-1.826, -17.31, -6.406, 1.431, -17.91)
                    + ctw(-1.826, -17.31, -6.448, 1.431, -18.61)
            }
        }
    }
}

/// Earth absorption along the straight chord towards the vertex, for a
/// uniform Earth density and a power law cross section.
#[derive(Clone, Copy, Debug)]
pub struct SimpleEarthWeights {
    cross_section: CrossSection,
}

impl SimpleEarthWeights {
    pub fn new(cross_section: CrossSection) -> Self {
        Self { cross_section }
    }

    /// Length of the chord through the Earth for the given arrival zenith
    /// angle, neglecting the depth of the vertex.
    pub fn chord_length(zenith: fsi) -> fsi {
        fsi::max(-2.0 * R_EARTH * zenith.cos(), 0.0)
    }
}

impl WeightCalculator for SimpleEarthWeights {
    fn weight(&self, zenith: fsi, energy: fsi, _flavor: i64) -> fsi {
        let column_density = Self::chord_length(zenith) / CM * RHO_EARTH;
        let interaction_length = 1.0 / (N_AVOGADRO * self.cross_section.total_cm2(energy));
        (-column_density / interaction_length).exp()
    }
}

/// Creates the weight calculator for the given mode and cross section type.
pub fn weight_calculator_from_name(
    weight_mode: &str,
    cross_section_type: &str,
) -> Result<Box<dyn WeightCalculator>> {
    match weight_mode {
        "none" => Ok(Box::new(NoWeights)),
        "simple" => Ok(Box::new(SimpleEarthWeights::new(CrossSection::from_name(
            cross_section_type,
        )?))),
        other => Err(SimulationError::Config(format!(
            "Unknown weight mode {} (valid modes are {})",
            other,
            WEIGHT_MODE_NAMES.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        constants::PI,
        units::{EEV, PEV},
    };
    use approx::assert_relative_eq;

    #[test]
    fn downgoing_neutrinos_always_survive() {
        let weights = SimpleEarthWeights::new(CrossSection::Ctw);
        assert_eq!(weights.weight(0.3 * PI, EEV, 14), 1.0);
        assert_eq!(weights.weight(0.5 * PI, EEV, 14), 1.0);
    }

    #[test]
    fn upgoing_survival_decreases_with_energy_and_depth() {
        for cross_section in [CrossSection::Ghandi, CrossSection::Ctw] {
            let weights = SimpleEarthWeights::new(cross_section);
            let shallow = weights.weight(0.55 * PI, PEV, 12);
            let deep = weights.weight(0.9 * PI, PEV, 12);
            let deep_energetic = weights.weight(0.9 * PI, EEV, 12);
            assert!(shallow < 1.0 && shallow > deep);
            assert!(deep > deep_energetic);
        }
    }

    #[test]
    fn cross_sections_agree_roughly_at_pev() {
        let ghandi = CrossSection::Ghandi.total_cm2(PEV);
        let ctw = CrossSection::Ctw.total_cm2(PEV);
        assert_relative_eq!(ghandi, ctw, max_relative = 0.5);
    }

    #[test]
    fn unknown_modes_are_rejected() {
        assert!(weight_calculator_from_name("simple", "ghandi").is_ok());
        assert!(weight_calculator_from_name("exact", "ghandi").is_err());
        assert!(weight_calculator_from_name("simple", "unknown").is_err());
    }
}
