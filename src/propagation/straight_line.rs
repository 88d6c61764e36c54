//! Ray tracer approximating ray paths as straight lines, with reflections
//! off the surface and a reflective bottom handled by mirror images.

use super::{
    RayPathParameters, RaySolution, RayTracer, SOLUTION_TYPE_DIRECT, SOLUTION_TYPE_REFLECTED,
};
use crate::{
    constants::C_LIGHT,
    error::{Result, SimulationError},
    geometry::{
        Dim3::{X, Y, Z},
        Point3, Vec3,
    },
    medium::IceModel,
    simulation::fsi,
};
use ndarray::Array1;

/// Number of segments used when integrating quantities along a path.
const N_INTEGRATION_SEGMENTS: usize = 100;

/// Smallest `sin(zenith)` of the receive vector for which the geometric
/// focusing factor is evaluated.
const MIN_FOCUSING_SIN_ZENITH: fsi = 1e-6;

/// Mirror plane a ray can be reflected in.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Mirror {
    Surface,
    Bottom(fsi),
}

impl Mirror {
    fn reflect(&self, z: fsi) -> fsi {
        match self {
            Self::Surface => -z,
            Self::Bottom(depth) => 2.0 * depth - z,
        }
    }
}

/// Ray tracer treating every path segment as a straight line.
#[derive(Clone, Debug)]
pub struct StraightLineRayTracer {
    n_reflections: usize,
}

impl StraightLineRayTracer {
    /// Creates a new straight line ray tracer allowing up to `n_reflections`
    /// reflections off a reflective bottom.
    pub fn new(n_reflections: usize) -> Self {
        Self { n_reflections }
    }

    /// Sequence of mirrors the emitter must be reflected in to unfold the
    /// path with the given number of bottom reflections and reflection case.
    fn mirrors(
        reflection: i64,
        reflection_case: i64,
        bottom_depth: Option<fsi>,
    ) -> Result<Vec<Mirror>> {
        let (n_mirrors, starts_at_surface) = match (reflection, reflection_case) {
            (0, 1) => (0, false),
            (0, 2) => (1, true),
            (i, 1) if i > 0 => (2 * i - 1, false),
            (i, 2) if i > 0 => (2 * i, true),
            _ => {
                return Err(SimulationError::RayTracing(format!(
                    "Invalid reflection count {} with reflection case {}",
                    reflection, reflection_case
                )))
            }
        };
        if reflection > 0 && bottom_depth.is_none() {
            return Err(SimulationError::RayTracing(
                "Bottom reflection requested in ice without reflective bottom".to_string(),
            ));
        }
        let bottom = Mirror::Bottom(bottom_depth.unwrap_or(0.0));
        Ok((0..n_mirrors)
            .map(|idx| {
                if (idx % 2 == 0) == starts_at_surface {
                    Mirror::Surface
                } else {
                    bottom
                }
            })
            .collect())
    }

    fn trace(
        &self,
        emitter: &Point3<fsi>,
        receiver: &Point3<fsi>,
        ice: &dyn IceModel,
        reflection: i64,
        reflection_case: i64,
    ) -> Result<RaySolution> {
        let bottom_depth = ice.reflective_bottom().map(|bottom| bottom.depth);
        let mirrors = Self::mirrors(reflection, reflection_case, bottom_depth)?;

        let image_z = mirrors
            .iter()
            .fold(emitter[Z], |z, mirror| mirror.reflect(z));
        let image = emitter.with_z(image_z);

        let unfolded = receiver - &image;
        let path_length = unfolded.length();
        if path_length == 0.0 {
            return Err(SimulationError::RayTracing(
                "Emitter and receiver coincide".to_string(),
            ));
        }
        let direction = unfolded.normalized();

        let n_surface_reflections = mirrors
            .iter()
            .filter(|&&mirror| mirror == Mirror::Surface)
            .count();
        let launch_sign = if mirrors.len() % 2 == 0 { 1.0 } else { -1.0 };
        let launch_vector = Vec3::new(direction[X], direction[Y], launch_sign * direction[Z]);
        let receive_vector = -direction;

        let incidence_angle = fsi::acos(fsi::min(1.0, fsi::abs(direction[Z])));
        let surface_reflection_angles = vec![incidence_angle; n_surface_reflections];

        let solution_type = if n_surface_reflections > 0 {
            SOLUTION_TYPE_REFLECTED
        } else {
            SOLUTION_TYPE_DIRECT
        };

        let travel_time = integrate_along_path(&image, receiver, bottom_depth, !mirrors.is_empty(), |position| {
            ice.index_of_refraction(position)
        }) / C_LIGHT;

        let (launch_zenith, _) = launch_vector.spherical_angles();

        Ok(RaySolution {
            parameters: RayPathParameters {
                c0: launch_zenith,
                c1: path_length,
                solution_type,
                reflection,
                reflection_case,
            },
            emitter: *emitter,
            receiver: *receiver,
            path_length: Some(path_length),
            travel_time: Some(travel_time),
            launch_vector,
            receive_vector,
            surface_reflection_angles,
        })
    }

    fn unfolded_start(&self, solution: &RaySolution, ice: &dyn IceModel) -> Option<Point3<fsi>> {
        let bottom_depth = ice.reflective_bottom().map(|bottom| bottom.depth);
        let mirrors = Self::mirrors(
            solution.parameters.reflection,
            solution.parameters.reflection_case,
            bottom_depth,
        )
        .ok()?;
        let image_z = mirrors
            .iter()
            .fold(solution.emitter[Z], |z, mirror| mirror.reflect(z));
        Some(solution.emitter.with_z(image_z))
    }
}

/// Maps a depth on an unfolded path back into the ice between the surface
/// and the reflective bottom.
fn fold_depth(z: fsi, bottom_depth: Option<fsi>) -> fsi {
    match bottom_depth {
        Some(depth) if depth < 0.0 => {
            let thickness = -depth;
            let folded = (-z).rem_euclid(2.0 * thickness);
            if folded > thickness {
                -(2.0 * thickness - folded)
            } else {
                -folded
            }
        }
        _ => -fsi::abs(z),
    }
}

/// Integrates the given quantity over the length of the straight line from
/// `start` to `end` using the midpoint rule, optionally folding the
/// positions back into the ice.
fn integrate_along_path<Q>(
    start: &Point3<fsi>,
    end: &Point3<fsi>,
    bottom_depth: Option<fsi>,
    fold: bool,
    quantity: Q,
) -> fsi
where
    Q: Fn(&Point3<fsi>) -> fsi,
{
    let displacement = end - start;
    let segment_length = displacement.length() / N_INTEGRATION_SEGMENTS as fsi;
    (0..N_INTEGRATION_SEGMENTS)
        .map(|idx| {
            let fraction = (idx as fsi + 0.5) / N_INTEGRATION_SEGMENTS as fsi;
            let mut position = start + &(&displacement * fraction);
            if fold {
                position = position.with_z(fold_depth(position[Z], bottom_depth));
            }
            quantity(&position) * segment_length
        })
        .sum()
}

impl RayTracer for StraightLineRayTracer {
    fn name(&self) -> &str {
        "straight_line"
    }

    fn solve(
        &self,
        emitter: &Point3<fsi>,
        receiver: &Point3<fsi>,
        ice: &dyn IceModel,
    ) -> Result<Vec<RaySolution>> {
        let mut solutions = vec![self.trace(emitter, receiver, ice, 0, 1)?];

        if emitter[Z] >= 0.0 || receiver[Z] >= 0.0 {
            return Ok(solutions);
        }
        solutions.push(self.trace(emitter, receiver, ice, 0, 2)?);

        if let Some(bottom) = ice.reflective_bottom() {
            if emitter[Z] > bottom.depth && receiver[Z] > bottom.depth {
                for reflection in 1..=self.n_reflections as i64 {
                    for reflection_case in 1..=2 {
                        solutions.push(self.trace(
                            emitter,
                            receiver,
                            ice,
                            reflection,
                            reflection_case,
                        )?);
                    }
                }
            }
        }
        Ok(solutions)
    }

    fn restore(
        &self,
        emitter: &Point3<fsi>,
        receiver: &Point3<fsi>,
        ice: &dyn IceModel,
        parameters: &RayPathParameters,
    ) -> Result<RaySolution> {
        let mut solution = self.trace(
            emitter,
            receiver,
            ice,
            parameters.reflection,
            parameters.reflection_case,
        )?;
        solution.parameters = *parameters;
        Ok(solution)
    }

    fn attenuation(
        &self,
        solution: &RaySolution,
        ice: &dyn IceModel,
        frequencies: &Array1<fsi>,
        max_frequency: fsi,
    ) -> Array1<fsi> {
        let start = match self.unfolded_start(solution, ice) {
            Some(start) => start,
            None => return Array1::zeros(frequencies.len()),
        };
        let bottom_depth = ice.reflective_bottom().map(|bottom| bottom.depth);
        let fold = start != solution.emitter;
        frequencies.mapv(|frequency| {
            if frequency > max_frequency {
                0.0
            } else {
                let optical_depth =
                    integrate_along_path(&start, &solution.receiver, bottom_depth, fold, |position| {
                        1.0 / ice.attenuation_length(position[Z], frequency)
                    });
                fsi::exp(-optical_depth)
            }
        })
    }

    fn focusing(
        &self,
        solution: &RaySolution,
        ice: &dyn IceModel,
        receiver_offset: fsi,
        limit: fsi,
    ) -> fsi {
        let n_emitter = ice.index_of_refraction(&solution.emitter);
        let n_receiver = ice.index_of_refraction(&solution.receiver);
        let index_factor = fsi::sqrt(n_emitter / n_receiver);

        let (receive_zenith, _) = solution.receive_vector.spherical_angles();
        let sin_receive_zenith = fsi::sin(receive_zenith).abs();

        let geometric_factor = match (solution.path_length, receiver_offset != 0.0) {
            (Some(path_length), true) if sin_receive_zenith > MIN_FOCUSING_SIN_ZENITH => {
                let displaced_receiver =
                    solution.receiver.with_z(solution.receiver[Z] + receiver_offset);
                match self.trace(
                    &solution.emitter,
                    &displaced_receiver,
                    ice,
                    solution.parameters.reflection,
                    solution.parameters.reflection_case,
                ) {
                    Ok(displaced) => {
                        let (launch_zenith, _) = solution.launch_vector.spherical_angles();
                        let (displaced_launch_zenith, _) =
                            displaced.launch_vector.spherical_angles();
                        let derivative =
                            fsi::abs((displaced_launch_zenith - launch_zenith) / receiver_offset);
                        fsi::sqrt(path_length * derivative / sin_receive_zenith)
                    }
                    Err(_) => 1.0,
                }
            }
            _ => 1.0,
        };

        let focusing = geometric_factor * index_factor;
        if focusing.is_finite() {
            fsi::min(focusing, limit)
        } else {
            limit
        }
    }
}
