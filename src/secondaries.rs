//! Selection of shower-inducing secondaries produced by propagating
//! energetic muons and taus through the ice.

use crate::{
    error::{Result, SimulationError},
    geometry::{Point3, Vec3},
    particles::{self, ShowerClass, DECAY_BUNDLE_CODE, MU_MINUS_CODE},
    simulation::fsi,
    units::{KM, M, PEV},
};
use log::debug;
use serde::{Deserialize, Serialize};
use std::{collections::VecDeque, fs, path::Path};

/// Default minimum energy of a secondary for it to be considered a shower.
pub const DEFAULT_MIN_SHOWER_ENERGY: fsi = 0.5 * PEV;
/// Default energy below which propagated leptons are no longer tracked.
pub const DEFAULT_LOW_ENERGY: fsi = 0.5 * PEV;
/// Default energy below which leptons are no longer tracked when only
/// their decay is of interest.
pub const DEFAULT_DECAY_LOW_ENERGY: fsi = 0.1 * PEV;
/// Default maximum propagation length for leptons.
pub const DEFAULT_PROPAGATION_LENGTH: fsi = 1000.0 * KM;
/// Default distance below which consecutive showers are merged.
pub const DEFAULT_COMPACT_DISTANCE: fsi = 0.1 * M;
/// Default number of times a propagation without decay is repeated before
/// giving up.
pub const DEFAULT_MAX_DECAY_ATTEMPTS: usize = 100;

/// State of a lepton to be propagated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LeptonState {
    /// PDG code of the lepton.
    pub code: i64,
    /// Energy of the lepton [eV].
    pub energy: fsi,
    /// Initial position of the lepton [m].
    pub position: Point3<fsi>,
    /// Unit vector along the direction of motion.
    pub direction: Vec3<fsi>,
}

/// A secondary item produced by the particle transport, either a particle
/// emitted in a decay or a stochastic energy loss.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransportSecondary {
    /// Transport type code (PDG code or interaction type code).
    pub type_code: i64,
    /// Energy of the particle, or energy remaining after the interaction [eV].
    pub energy: fsi,
    /// Energy of the parent before the interaction [eV].
    #[serde(default)]
    pub parent_energy: fsi,
    /// Position where the item was produced [m].
    pub position: Point3<fsi>,
}

impl TransportSecondary {
    /// Whether this item represents an interaction rather than a particle.
    pub fn is_interaction(&self) -> bool {
        particles::is_interaction_type(self.type_code)
    }

    /// Energy deposited in the shower induced by this item.
    pub fn shower_energy(&self) -> fsi {
        if self.is_interaction() {
            self.parent_energy - self.energy
        } else {
            self.energy
        }
    }
}

/// Properties of a shower induced by a secondary.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SecondaryProperties {
    /// Distance from the initial lepton position [m].
    pub distance: fsi,
    /// Shower energy [eV].
    pub energy: fsi,
    /// Class of the shower.
    pub shower_class: ShowerClass,
    /// Internal code of the shower primary.
    pub code: i64,
    /// Name of the shower primary.
    pub name: String,
}

/// Defines the interface of a service propagating leptons through matter.
pub trait ParticleTransporter {
    /// Propagates the given lepton at most `propagation_length` or until its
    /// energy drops below `low_energy`, returning all produced secondaries.
    ///
    /// `decay_muon` signals that the lepton is a muon produced in a decay.
    fn propagate(
        &mut self,
        lepton: &LeptonState,
        propagation_length: fsi,
        low_energy: fsi,
        decay_muon: bool,
    ) -> Result<Vec<TransportSecondary>>;
}

/// Configuration parameters for secondary selection.
#[derive(Clone, Debug)]
pub struct SecondaryFilterConfig {
    /// Minimum energy of a secondary for it to be considered a shower.
    pub min_shower_energy: fsi,
    /// Energy below which propagated leptons are no longer tracked.
    pub low_energy: fsi,
    /// Maximum propagation length for leptons.
    pub propagation_length: fsi,
    /// Distance below which consecutive showers are merged.
    pub compact_distance: fsi,
    /// Whether muons produced in decays should be propagated as well.
    pub propagate_decay_muons: bool,
}

impl SecondaryFilterConfig {
    /// Returns an error if any of the configuration parameter values are
    /// invalid.
    pub fn validate(&self) -> Result<()> {
        let invalid = if !(self.min_shower_energy >= 0.0) {
            Some("Minimum shower energy must be non-negative")
        } else if !(self.low_energy >= 0.0) {
            Some("Low energy must be non-negative")
        } else if !(self.propagation_length > 0.0) {
            Some("Propagation length must be larger than zero")
        } else if !(self.compact_distance >= 0.0) {
            Some("Compact distance must be non-negative")
        } else {
            None
        };
        match invalid {
            Some(message) => Err(SimulationError::Config(message.to_string())),
            None => Ok(()),
        }
    }
}

impl Default for SecondaryFilterConfig {
    fn default() -> Self {
        SecondaryFilterConfig {
            min_shower_energy: DEFAULT_MIN_SHOWER_ENERGY,
            low_energy: DEFAULT_LOW_ENERGY,
            propagation_length: DEFAULT_PROPAGATION_LENGTH,
            compact_distance: DEFAULT_COMPACT_DISTANCE,
            propagate_decay_muons: true,
        }
    }
}

/// Decay properties of a propagated lepton.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayProperties {
    /// Distance from the initial lepton position to the decay [m].
    pub distance: fsi,
    /// Summed energy of all decay products [eV].
    pub energy: fsi,
}

/// Selects the secondaries that induce showers with energies above
/// `min_shower_energy`, in the order they were produced.
///
/// Items with unknown codes are dropped.
pub fn filter_secondaries(
    secondaries: &[TransportSecondary],
    min_shower_energy: fsi,
    lepton_position: &Point3<fsi>,
) -> Vec<SecondaryProperties> {
    secondaries
        .iter()
        .filter_map(|secondary| {
            if secondary.energy <= min_shower_energy {
                return None;
            }
            let code = match particles::particle_code(secondary.type_code) {
                Some(code) => code,
                None => {
                    debug!(
                        "Dropping secondary with unsupported type code {}",
                        secondary.type_code
                    );
                    return None;
                }
            };
            let shower_class = particles::shower_class(code)?;
            let name = particles::particle_name(code)?.to_string();
            Some(SecondaryProperties {
                distance: secondary.position.distance_to(lepton_position),
                energy: secondary.shower_energy(),
                shower_class,
                code,
                name,
            })
        })
        .collect()
}

/// Merges the showers at the end of the list that lie closer than
/// `compact_distance` to their predecessor into a single decay bundle.
///
/// Only the last two entries are ever compared, so close showers separated
/// by a distant one are left untouched.
pub fn group_compact_showers(showers: &mut Vec<SecondaryProperties>, compact_distance: fsi) {
    while showers.len() > 1 {
        let n = showers.len();
        if fsi::abs(showers[n - 1].distance - showers[n - 2].distance) >= compact_distance {
            break;
        }
        if let Some(last) = showers.pop() {
            let new_last = &mut showers[n - 2];
            new_last.energy += last.energy;
            new_last.code = DECAY_BUNDLE_CODE;
            new_last.name = particles::particle_name(DECAY_BUNDLE_CODE)
                .unwrap_or("decay_bundle")
                .to_string();
        }
    }
}

/// Finds the last muon among the decay products that has enough energy to
/// be propagated further.
fn find_decay_muon(
    lepton: &LeptonState,
    secondaries: &[TransportSecondary],
    low_energy: fsi,
) -> Option<LeptonState> {
    secondaries
        .iter()
        .filter(|secondary| {
            !secondary.is_interaction()
                && secondary.type_code.abs() == MU_MINUS_CODE
                && secondary.energy > low_energy
        })
        .last()
        .map(|muon| LeptonState {
            code: muon.type_code,
            energy: muon.energy,
            position: muon.position,
            direction: lepton.direction,
        })
}

fn check_lepton_is_supported(lepton: &LeptonState) -> Result<()> {
    if particles::is_propagatable_lepton(lepton.code) {
        Ok(())
    } else {
        Err(SimulationError::Config(format!(
            "Propagation of particle with code {} is not supported",
            lepton.code
        )))
    }
}

/// Propagates each lepton and returns the properties of the
/// shower-inducing secondaries it produces.
pub fn secondaries_array<T: ParticleTransporter + ?Sized>(
    transporter: &mut T,
    leptons: &[LeptonState],
    config: &SecondaryFilterConfig,
) -> Result<Vec<Vec<SecondaryProperties>>> {
    config.validate()?;
    leptons
        .iter()
        .map(|lepton| {
            check_lepton_is_supported(lepton)?;

            let secondaries = transporter.propagate(
                lepton,
                config.propagation_length,
                config.low_energy,
                false,
            )?;

            let mut showers =
                filter_secondaries(&secondaries, config.min_shower_energy, &lepton.position);

            let decay_muon = if config.propagate_decay_muons {
                find_decay_muon(lepton, &secondaries, config.low_energy)
            } else {
                None
            };

            group_compact_showers(&mut showers, config.compact_distance);

            if let Some(muon) = decay_muon {
                debug!("Propagating decay muon with energy {:.3e} eV", muon.energy);
                let muon_secondaries = transporter.propagate(
                    &muon,
                    config.propagation_length,
                    config.low_energy,
                    true,
                )?;
                showers.extend(filter_secondaries(
                    &muon_secondaries,
                    config.min_shower_energy,
                    &lepton.position,
                ));
            }
            Ok(showers)
        })
        .collect()
}

/// Propagates each lepton until it decays and returns the decay distance
/// and energy.
///
/// A propagation that produces no decay products is repeated up to
/// `max_attempts` times before an error is returned.
pub fn decays<T: ParticleTransporter + ?Sized>(
    transporter: &mut T,
    leptons: &[LeptonState],
    low_energy: fsi,
    propagation_length: fsi,
    max_attempts: usize,
) -> Result<Vec<DecayProperties>> {
    leptons
        .iter()
        .map(|lepton| {
            check_lepton_is_supported(lepton)?;
            for attempt in 0..max_attempts {
                let secondaries =
                    transporter.propagate(lepton, propagation_length, low_energy, false)?;
                let decay_products: Vec<_> = secondaries
                    .iter()
                    .filter(|secondary| !secondary.is_interaction())
                    .collect();

                if let Some(first) = decay_products.first() {
                    return Ok(DecayProperties {
                        distance: first.position.distance_to(&lepton.position),
                        energy: decay_products.iter().map(|product| product.energy).sum(),
                    });
                }
                debug!(
                    "No decay products in propagation attempt {}, retrying",
                    attempt + 1
                );
            }
            Err(SimulationError::Transport(format!(
                "No decay found for lepton with code {} after {} attempts",
                lepton.code, max_attempts
            )))
        })
        .collect()
}

/// Particle transport replaying pre-recorded propagation output.
///
/// Each call to `propagate` consumes the next recorded track.
#[derive(Clone, Debug, Default)]
pub struct RecordedTransporter {
    tracks: VecDeque<Vec<TransportSecondary>>,
}

impl RecordedTransporter {
    /// Creates a new transporter replaying the given tracks.
    pub fn new(tracks: Vec<Vec<TransportSecondary>>) -> Self {
        Self {
            tracks: tracks.into(),
        }
    }

    /// Reads recorded tracks from a JSON file holding a list of tracks.
    pub fn from_file(file_path: &Path) -> Result<Self> {
        let text = fs::read_to_string(file_path)?;
        Self::from_json(&text)
    }

    /// Parses recorded tracks from a JSON string holding a list of tracks.
    pub fn from_json(text: &str) -> Result<Self> {
        let tracks: Vec<Vec<TransportSecondary>> = serde_json::from_str(text)?;
        Ok(Self::new(tracks))
    }

    /// Number of tracks not yet replayed.
    pub fn remaining_tracks(&self) -> usize {
        self.tracks.len()
    }
}

impl ParticleTransporter for RecordedTransporter {
    fn propagate(
        &mut self,
        _lepton: &LeptonState,
        _propagation_length: fsi,
        _low_energy: fsi,
        _decay_muon: bool,
    ) -> Result<Vec<TransportSecondary>> {
        self.tracks.pop_front().ok_or_else(|| {
            SimulationError::Transport("No recorded tracks left to replay".to_string())
        })
    }
}
