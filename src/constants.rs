//! Physical and mathematical constants.

/// Floating-point precision to use for constants.
#[allow(non_camel_case_types)]
pub type fcn = f64;

// Mathematical constants

pub const PI: fcn = std::f64::consts::PI;

// Physical constants

/// Speed of light in vacuum [m/ns].
pub const C_LIGHT: fcn = 0.299_792_458;
/// Boltzmann constant [J/K].
pub const K_BOLTZMANN: fcn = 1.380_649e-23;
/// Reference impedance of the receiver chain [ohm].
pub const RECEIVER_IMPEDANCE: fcn = 50.0;
/// Avogadro constant [1/mol].
pub const N_AVOGADRO: fcn = 6.022_140_76e23;
/// Mean radius of the Earth [m].
pub const R_EARTH: fcn = 6.371e6;
/// Mean mass density of the Earth [g/cm^3].
pub const RHO_EARTH: fcn = 5.51;
