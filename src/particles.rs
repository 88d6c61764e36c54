//! Particle and interaction taxonomy.
//!
//! Particles are identified by their PDG code. Energy losses reported by the
//! lepton transport are identified by interaction type codes above
//! [`INTERACTION_TYPE_CUTOFF`], which are mapped onto internal codes in the
//! range 80-91 that the PDG reserves for user-defined particles.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt, str::FromStr};

/// Transport type codes above this value denote interactions (energy
/// losses) rather than actual particles.
pub const INTERACTION_TYPE_CUTOFF: i64 = 1_000_000_000;

/// Internal code of a composite shower made of merged compact showers.
pub const DECAY_BUNDLE_CODE: i64 = 86;

/// PDG code of the negative muon.
pub const MU_MINUS_CODE: i64 = 13;
/// PDG code of the negative tau.
pub const TAU_MINUS_CODE: i64 = 15;

/// Classification of a particle shower.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShowerClass {
    /// Electromagnetic shower.
    Em,
    /// Hadronic shower.
    Had,
}

impl ShowerClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Em => "em",
            Self::Had => "had",
        }
    }
}

impl fmt::Display for ShowerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ShowerClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "em" => Ok(Self::Em),
            "had" => Ok(Self::Had),
            other => Err(format!("Invalid shower type {}", other)),
        }
    }
}

lazy_static! {
    static ref INTERACTION_CODES: HashMap<i64, i64> = [
        (1_000_000_001, 80),
        (1_000_000_002, 81),
        (1_000_000_003, 82),
        (1_000_000_004, 83),
        (1_000_000_005, 85),
        (1_000_000_006, 87),
        (1_000_000_007, 84),
        (1_000_000_008, 88),
        (1_000_000_009, 89),
        (1_000_000_010, 90),
        (1_000_000_011, 91),
    ]
    .into_iter()
    .collect();

    static ref PARTICLE_NAMES: HashMap<i64, &'static str> = [
        (0, "gamma"),
        (11, "e-"),
        (-11, "e+"),
        (12, "nu_e"),
        (-12, "nu_e_bar"),
        (13, "mu-"),
        (-13, "mu+"),
        (14, "nu_mu"),
        (-14, "nu_mu_bar"),
        (15, "tau-"),
        (-15, "tau+"),
        (16, "nu_tau"),
        (-16, "nu_tau_bar"),
        (80, "particle"),
        (81, "brems"),
        (82, "ionized_e"),
        (83, "e_pair"),
        (84, "hadrons"),
        (85, "nucl_int"),
        (86, "decay_bundle"),
        (87, "mu_pair"),
        (88, "cont_loss"),
        (89, "weak_int"),
        (90, "compton"),
        (91, "decay"),
        (111, "pi0"),
        (211, "pi+"),
        (-211, "pi-"),
        (311, "K0"),
        (321, "K+"),
        (-321, "K-"),
        (2212, "p+"),
        (-2212, "p-"),
    ]
    .into_iter()
    .collect();
}

const EM_PRIMARY_NAMES: [&str; 8] = [
    "gamma",
    "e-",
    "e+",
    "brems",
    "ionized_e",
    "e_pair",
    "weak_int",
    "compton",
];

const HAD_PRIMARY_NAMES: [&str; 11] = [
    "hadrons",
    "nucl_int",
    "decay_bundle",
    "pi0",
    "pi+",
    "pi-",
    "K0",
    "K+",
    "K-",
    "p+",
    "p-",
];

/// Whether the given transport type code denotes an interaction.
pub fn is_interaction_type(type_code: i64) -> bool {
    type_code > INTERACTION_TYPE_CUTOFF
}

/// Maps a transport type code to the internal particle code.
///
/// Returns `None` for codes that are neither a known interaction
/// nor a known particle.
pub fn particle_code(type_code: i64) -> Option<i64> {
    INTERACTION_CODES.get(&type_code).copied().or_else(|| {
        if PARTICLE_NAMES.contains_key(&type_code) {
            Some(type_code)
        } else {
            None
        }
    })
}

/// Looks up the name of the given internal particle code.
pub fn particle_name(code: i64) -> Option<&'static str> {
    PARTICLE_NAMES.get(&code).copied()
}

/// Determines the class of shower initiated by the particle with the given
/// internal code, or `None` if it does not initiate a shower.
pub fn shower_class(code: i64) -> Option<ShowerClass> {
    let name = particle_name(code)?;
    if EM_PRIMARY_NAMES.contains(&name) {
        Some(ShowerClass::Em)
    } else if HAD_PRIMARY_NAMES.contains(&name) {
        Some(ShowerClass::Had)
    } else {
        None
    }
}

/// Whether the particle with the given internal code can be an
/// electromagnetic shower primary.
pub fn is_em_primary(code: i64) -> bool {
    shower_class(code) == Some(ShowerClass::Em)
}

/// Whether the particle with the given internal code can be a hadronic
/// shower primary.
pub fn is_had_primary(code: i64) -> bool {
    shower_class(code) == Some(ShowerClass::Had)
}

/// Whether the particle with the given internal code can be a shower
/// primary.
pub fn is_shower_primary(code: i64) -> bool {
    shower_class(code).is_some()
}

/// Whether the given PDG code denotes a muon or tau that the lepton
/// transport can propagate.
pub fn is_propagatable_lepton(code: i64) -> bool {
    matches!(code.abs(), MU_MINUS_CODE | TAU_MINUS_CODE)
}
