//! Models for the refractive and absorptive properties of the ice.

use crate::{
    constants::PI,
    error::{Result, SimulationError},
    fourier::Complex,
    geometry::{Dim3::Z, Point3},
    simulation::fsi,
    units::{GHZ, M},
};
use serde::{Deserialize, Serialize};

/// Names of the available built-in ice models.
pub const ICE_MODEL_NAMES: [&str; 4] = [
    "southpole_simple",
    "southpole_2015",
    "greenland_simple",
    "mooresbay_simple",
];

/// Smallest fraction of the reference attenuation length that the
/// frequency dependence can reduce it to.
const MIN_ATTENUATION_LENGTH_FRACTION: fsi = 0.1;

/// Reflecting layer at the bottom of an ice shelf.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReflectiveBottom {
    /// Depth of the reflecting layer (negative) [m].
    pub depth: fsi,
    /// Amplitude reflection coefficient.
    pub coefficient: fsi,
    /// Phase shift introduced by each reflection [rad].
    pub phase_shift: fsi,
}

/// Defines the properties of a medium that radio signals propagate through.
pub trait IceModel {
    /// Returns the name of the model.
    fn name(&self) -> &str;

    /// Returns the index of refraction at the given position.
    fn index_of_refraction(&self, position: &Point3<fsi>) -> fsi;

    /// Returns the field attenuation length at depth `z` for frequency `frequency`.
    fn attenuation_length(&self, z: fsi, frequency: fsi) -> fsi;

    /// Returns the reflecting bottom layer, if the medium has one.
    fn reflective_bottom(&self) -> Option<ReflectiveBottom> {
        None
    }
}

/// Ice whose index of refraction approaches the deep-ice value
/// exponentially with depth.
///
/// `n(z) = n_ice - delta_n*exp(z/z_0)` below the surface and 1 above.
#[derive(Clone, Debug)]
pub struct ExponentialIceModel {
    name: String,
    n_ice: fsi,
    delta_n: fsi,
    z_0: fsi,
    reference_attenuation_length: fsi,
    attenuation_frequency_slope: fsi,
    reflective_bottom: Option<ReflectiveBottom>,
}

impl ExponentialIceModel {
    /// Creates a new exponential ice model.
    pub fn new(
        name: &str,
        n_ice: fsi,
        delta_n: fsi,
        z_0: fsi,
        reference_attenuation_length: fsi,
        attenuation_frequency_slope: fsi,
        reflective_bottom: Option<ReflectiveBottom>,
    ) -> Self {
        assert!(n_ice >= 1.0, "Deep ice index must be at least 1.");
        assert!(z_0 > 0.0, "Scale depth must be larger than zero.");
        assert!(
            reference_attenuation_length > 0.0,
            "Attenuation length must be larger than zero."
        );
        Self {
            name: name.to_string(),
            n_ice,
            delta_n,
            z_0,
            reference_attenuation_length,
            attenuation_frequency_slope,
            reflective_bottom,
        }
    }

    /// Ice at the South Pole with a simple exponential firn profile.
    pub fn southpole_simple() -> Self {
        Self::new("southpole_simple", 1.78, 0.427, 71.0 * M, 1000.0 * M, 0.55, None)
    }

    /// Ice at the South Pole with the 2015 fit to the firn profile.
    pub fn southpole_2015() -> Self {
        Self::new("southpole_2015", 1.78, 0.423, 77.0 * M, 1000.0 * M, 0.55, None)
    }

    /// Ice at Summit Station in Greenland.
    pub fn greenland_simple() -> Self {
        Self::new("greenland_simple", 1.78, 0.51, 37.25 * M, 950.0 * M, 0.55, None)
    }

    /// Ross ice shelf at Moore's Bay, with a reflecting ice-water interface.
    pub fn mooresbay_simple() -> Self {
        Self::new(
            "mooresbay_simple",
            1.78,
            0.46,
            34.5 * M,
            420.0 * M,
            0.55,
            Some(ReflectiveBottom {
                depth: -576.0 * M,
                coefficient: 0.82,
                phase_shift: PI,
            }),
        )
    }

    /// Ice with the same index of refraction everywhere below the surface.
    pub fn homogeneous(n_ice: fsi) -> Self {
        Self::new("homogeneous", n_ice, 0.0, 1.0, 1000.0 * M, 0.0, None)
    }
}

impl IceModel for ExponentialIceModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn index_of_refraction(&self, position: &Point3<fsi>) -> fsi {
        let z = position[Z];
        if z > 0.0 {
            1.0
        } else {
            self.n_ice - self.delta_n * fsi::exp(z / self.z_0)
        }
    }

    fn attenuation_length(&self, _z: fsi, frequency: fsi) -> fsi {
        let fraction = fsi::max(
            1.0 - self.attenuation_frequency_slope * frequency / GHZ,
            MIN_ATTENUATION_LENGTH_FRACTION,
        );
        self.reference_attenuation_length * fraction
    }

    fn reflective_bottom(&self) -> Option<ReflectiveBottom> {
        self.reflective_bottom
    }
}

/// Creates the built-in ice model with the given name.
pub fn ice_model_from_name(name: &str) -> Result<ExponentialIceModel> {
    match name {
        "southpole_simple" => Ok(ExponentialIceModel::southpole_simple()),
        "southpole_2015" => Ok(ExponentialIceModel::southpole_2015()),
        "greenland_simple" => Ok(ExponentialIceModel::greenland_simple()),
        "mooresbay_simple" => Ok(ExponentialIceModel::mooresbay_simple()),
        other => Err(SimulationError::Config(format!(
            "Unknown ice model {} (valid models are {})",
            other,
            ICE_MODEL_NAMES.join(", ")
        ))),
    }
}

fn fresnel_root(zenith: fsi, n: fsi) -> Complex<fsi> {
    Complex::new(n * n - fsi::sin(zenith).powi(2), 0.0).sqrt()
}

/// Computes the Fresnel reflection coefficient for the polarization
/// parallel to the plane of incidence.
///
/// `zenith` is the angle of incidence and the relative index is `n_2/n_1`.
pub fn fresnel_r_p(zenith: fsi, n_2: fsi, n_1: fsi) -> Complex<fsi> {
    let n = n_2 / n_1;
    let root = fresnel_root(zenith, n);
    let n_squared_cos = Complex::new(n * n * fsi::cos(zenith), 0.0);
    (root - n_squared_cos) / (root + n_squared_cos)
}

/// Computes the Fresnel reflection coefficient for the polarization
/// perpendicular to the plane of incidence.
///
/// `zenith` is the angle of incidence and the relative index is `n_2/n_1`.
pub fn fresnel_r_s(zenith: fsi, n_2: fsi, n_1: fsi) -> Complex<fsi> {
    let n = n_2 / n_1;
    let root = fresnel_root(zenith, n);
    let cos = Complex::new(fsi::cos(zenith), 0.0);
    (cos - root) / (cos + root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn index_approaches_deep_ice_value() {
        let ice = ExponentialIceModel::southpole_simple();
        assert_abs_diff_eq!(ice.index_of_refraction(&Point3::new(0.0, 0.0, 1.0)), 1.0);
        assert_abs_diff_eq!(
            ice.index_of_refraction(&Point3::new(0.0, 0.0, 0.0)),
            1.78 - 0.427,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(
            ice.index_of_refraction(&Point3::new(0.0, 0.0, -3000.0)),
            1.78,
            epsilon = 1e-12
        );
    }

    #[test]
    fn only_mooresbay_has_reflective_bottom() {
        for name in ICE_MODEL_NAMES {
            let ice = ice_model_from_name(name).unwrap();
            assert_eq!(ice.reflective_bottom().is_some(), name == "mooresbay_simple");
        }
        assert!(ice_model_from_name("mars").is_err());
    }

    #[test]
    fn total_internal_reflection_has_unit_magnitude() {
        let n_1 = 1.35;
        let zenith = 60.0_f64.to_radians();
        assert_abs_diff_eq!(fresnel_r_p(zenith, 1.0, n_1).norm(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(fresnel_r_s(zenith, 1.0, n_1).norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn normal_incidence_coefficients_agree_in_magnitude() {
        let r_p = fresnel_r_p(0.0, 1.0, 1.5);
        let r_s = fresnel_r_s(0.0, 1.0, 1.5);
        assert_abs_diff_eq!(r_p.norm(), r_s.norm(), epsilon = 1e-12);
        assert_abs_diff_eq!(r_s.re, (1.5 - 1.0) / (1.5 + 1.0), epsilon = 1e-12);
    }
}
