//! Units used throughout the simulation.
//!
//! Every quantity is stored as a plain float expressed in the base units
//! below. Multiplying a number by a unit converts it into base units, and
//! dividing by a unit converts it back.

use crate::constants::PI;

/// Floating-point precision to use for units.
#[allow(non_camel_case_types)]
pub type fun = f64;

// Base units

/// Unit for length [m].
pub const M: fun = 1.0;
/// Unit for time [ns].
pub const NS: fun = 1.0;
/// Unit for energy [eV].
pub const EV: fun = 1.0;
/// Unit for frequency [GHz].
pub const GHZ: fun = 1.0;
/// Unit for electric potential [V].
pub const V: fun = 1.0;
/// Unit for temperature [K].
pub const KELVIN: fun = 1.0;
/// Unit for angle [rad].
pub const RAD: fun = 1.0;

// Derived units

pub const CM: fun = 1e-2 * M;
pub const KM: fun = 1e3 * M;
pub const S: fun = 1e9 * NS;
pub const HZ: fun = 1e-9 * GHZ;
pub const MHZ: fun = 1e-3 * GHZ;
pub const KEV: fun = 1e3 * EV;
pub const MEV: fun = 1e6 * EV;
pub const GEV: fun = 1e9 * EV;
pub const TEV: fun = 1e12 * EV;
pub const PEV: fun = 1e15 * EV;
pub const EEV: fun = 1e18 * EV;
pub const MICRO: fun = 1e-6;
/// Unit for angle [degree].
pub const DEG: fun = PI / 180.0 * RAD;
