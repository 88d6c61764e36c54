//! Propagation of radio signals along ray paths through the ice.

pub mod straight_line;

use crate::{
    error::{Result, SimulationError},
    geometry::{Point3, Vec3},
    medium::IceModel,
    simulation::fsi,
};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Names of the available ray tracers.
pub const RAY_TRACER_NAMES: [&str; 1] = ["straight_line"];

/// Solution type of a ray going straight from emitter to receiver.
pub const SOLUTION_TYPE_DIRECT: i64 = 1;
/// Solution type of a ray bending over on its way to the receiver.
pub const SOLUTION_TYPE_REFRACTED: i64 = 2;
/// Solution type of a ray reflected off the surface.
pub const SOLUTION_TYPE_REFLECTED: i64 = 3;

/// Returns the name of the given ray solution type.
pub fn solution_type_name(solution_type: i64) -> Option<&'static str> {
    match solution_type {
        SOLUTION_TYPE_DIRECT => Some("direct"),
        SOLUTION_TYPE_REFRACTED => Some("refracted"),
        SOLUTION_TYPE_REFLECTED => Some("reflected"),
        _ => None,
    }
}

/// Maximum number of ray solutions between two points when up to
/// `n_reflections` bottom reflections are allowed.
pub fn max_solutions(n_reflections: usize) -> usize {
    2 + 4 * n_reflections
}

/// Parameters that fully specify a ray path between two given points.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RayPathParameters {
    /// First shape parameter of the path.
    pub c0: fsi,
    /// Second shape parameter of the path.
    pub c1: fsi,
    /// Type of the solution (direct, refracted or reflected).
    pub solution_type: i64,
    /// Number of reflections off the bottom.
    pub reflection: i64,
    /// Whether the path starts out towards the bottom (1) or the surface (2).
    pub reflection_case: i64,
}

/// A discrete ray path between an emitter and a receiver.
#[derive(Clone, Debug, PartialEq)]
pub struct RaySolution {
    /// Parameters specifying the path.
    pub parameters: RayPathParameters,
    /// Position where the ray starts.
    pub emitter: Point3<fsi>,
    /// Position where the ray ends.
    pub receiver: Point3<fsi>,
    /// Length of the path, if it could be computed.
    pub path_length: Option<fsi>,
    /// Time for the signal to travel along the path, if it could be computed.
    pub travel_time: Option<fsi>,
    /// Unit vector along the ray at the emitter.
    pub launch_vector: Vec3<fsi>,
    /// Unit vector pointing from the receiver back along the incoming ray.
    pub receive_vector: Vec3<fsi>,
    /// Angle of incidence for each reflection off the surface.
    pub surface_reflection_angles: Vec<fsi>,
}

impl RaySolution {
    /// Type of the solution (direct, refracted or reflected).
    pub fn solution_type(&self) -> i64 {
        self.parameters.solution_type
    }

    /// Number of reflections off the bottom.
    pub fn n_bottom_reflections(&self) -> i64 {
        self.parameters.reflection
    }
}

/// Defines the interface of a service finding ray paths through the ice.
pub trait RayTracer {
    /// Returns the name of the ray tracer.
    fn name(&self) -> &str;

    /// Finds all ray paths connecting the emitter and the receiver.
    ///
    /// An empty list means that the receiver cannot be reached.
    fn solve(
        &self,
        emitter: &Point3<fsi>,
        receiver: &Point3<fsi>,
        ice: &dyn IceModel,
    ) -> Result<Vec<RaySolution>>;

    /// Reconstructs a ray path from previously computed parameters.
    fn restore(
        &self,
        emitter: &Point3<fsi>,
        receiver: &Point3<fsi>,
        ice: &dyn IceModel,
        parameters: &RayPathParameters,
    ) -> Result<RaySolution>;

    /// Computes the amplitude attenuation factor along the path for each of
    /// the given frequencies.
    ///
    /// Frequencies above `max_frequency` are fully attenuated.
    fn attenuation(
        &self,
        solution: &RaySolution,
        ice: &dyn IceModel,
        frequencies: &Array1<fsi>,
        max_frequency: fsi,
    ) -> Array1<fsi>;

    /// Computes the amplitude gain due to focusing of nearby rays, estimated
    /// by displacing the receiver vertically by `receiver_offset`.
    ///
    /// The result never exceeds `limit`.
    fn focusing(
        &self,
        solution: &RaySolution,
        ice: &dyn IceModel,
        receiver_offset: fsi,
        limit: fsi,
    ) -> fsi;
}

/// Creates the ray tracer with the given name.
pub fn ray_tracer_from_name(name: &str, n_reflections: usize) -> Result<Box<dyn RayTracer>> {
    match name {
        "straight_line" => Ok(Box::new(straight_line::StraightLineRayTracer::new(
            n_reflections,
        ))),
        other => Err(SimulationError::Config(format!(
            "Unknown propagation module {} (valid modules are {})",
            other,
            RAY_TRACER_NAMES.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solution_types_are_named() {
        assert_eq!(solution_type_name(1), Some("direct"));
        assert_eq!(solution_type_name(2), Some("refracted"));
        assert_eq!(solution_type_name(3), Some("reflected"));
        assert_eq!(solution_type_name(4), None);
    }

    #[test]
    fn unknown_module_is_a_config_error() {
        assert!(ray_tracer_from_name("straight_line", 1).is_ok());
        assert!(matches!(
            ray_tracer_from_name("analytic", 0),
            Err(SimulationError::Config(_))
        ));
    }
}
