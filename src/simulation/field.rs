//! Assembly of the electric fields arriving at each channel along each ray
//! path.

use super::{fsi, IterationContext};
use crate::{
    config::PolarizationMode,
    events::Shower,
    fourier::{self, Complex, Spectrum, Trace},
    geometry::{
        Dim3::{X, Y, Z},
        Point3, SphericalFrame, Vec3,
    },
    medium::{self, IceModel},
    propagation::{RayPathParameters, RaySolution, RayTracer},
    signal::{PulseParameters, PulseSynthesizer},
    units::{CM, DEG, M},
};
use log::debug;
use ndarray::Array1;

/// Vertical offset of the receiver used to estimate focusing.
pub const FOCUSING_RECEIVER_OFFSET: fsi = -0.01 * M;

/// Calibrated frequency domain electric field seen by one channel from one
/// shower along one ray path.
#[derive(Clone, Debug)]
pub struct ChannelFieldSample {
    /// Row of the shower in the input dataset.
    pub shower_idx: usize,
    pub shower_id: i64,
    pub channel_idx: usize,
    pub channel_id: i64,
    pub ray_solution_idx: usize,
    /// Spectrum of the field component along `e_θ` at the receiver.
    pub e_theta: Spectrum,
    /// Spectrum of the field component along `e_φ` at the receiver.
    pub e_phi: Spectrum,
    /// Sampling rate of the corresponding time traces [GHz].
    pub sampling_rate: fsi,
    /// Absolute time of the first sample of the trace [ns].
    pub trace_start_time: fsi,
    /// Zenith angle of the direction the signal arrives from [rad].
    pub receive_zenith: fsi,
    /// Azimuth angle of the direction the signal arrives from [rad].
    pub receive_azimuth: fsi,
    pub solution_type: i64,
    /// Length of the ray path [m].
    pub path_length: fsi,
    /// Angle between the shower axis and the launch vector [rad].
    pub viewing_angle: fsi,
    /// Fresnel coefficient of the last surface reflection for `e_θ`.
    pub reflection_coefficient_theta: Option<Complex<fsi>>,
    /// Fresnel coefficient of the last surface reflection for `e_φ`.
    pub reflection_coefficient_phi: Option<Complex<fsi>>,
}

impl ChannelFieldSample {
    /// Number of samples in the time traces.
    pub fn n_samples(&self) -> usize {
        2 * self.e_theta.len().saturating_sub(1)
    }

    /// Time between samples [ns].
    pub fn dt(&self) -> fsi {
        1.0 / self.sampling_rate
    }

    pub fn theta_trace(&self) -> Trace {
        fourier::freq_to_time(self.e_theta.as_slice().unwrap_or(&[]), self.sampling_rate)
    }

    pub fn phi_trace(&self) -> Trace {
        fourier::freq_to_time(self.e_phi.as_slice().unwrap_or(&[]), self.sampling_rate)
    }

    /// Largest absolute value of any field component in the time domain.
    pub fn max_field_amplitude(&self) -> fsi {
        let theta_max = fourier::max_abs(self.theta_trace().as_slice().unwrap_or(&[]));
        let phi_max = fourier::max_abs(self.phi_trace().as_slice().unwrap_or(&[]));
        fsi::max(theta_max, phi_max)
    }

    /// Scales both field components by the given factor.
    pub fn scale(&mut self, factor: fsi) {
        self.e_theta.mapv_inplace(|value| value * factor);
        self.e_phi.mapv_inplace(|value| value * factor);
    }
}

/// Quantities describing a ray solution that are recorded in the output,
/// with `None` for quantities that were never computed.
#[derive(Clone, Debug, PartialEq)]
pub struct SolutionRecord {
    pub ray_solution_idx: usize,
    pub parameters: RayPathParameters,
    pub launch_vector: Vec3<fsi>,
    pub receive_vector: Option<Vec3<fsi>>,
    /// Polarization of the field at the receiver in ground coordinates.
    pub polarization: Option<Vec3<fsi>>,
    pub travel_time: Option<fsi>,
    pub path_length: Option<fsi>,
    pub focusing_factor: Option<fsi>,
}

/// Result of assembling the fields for one channel and shower.
#[derive(Clone, Debug, Default)]
pub struct ChannelAssembly {
    /// One record for every ray solution that was found.
    pub records: Vec<SolutionRecord>,
    /// Field samples for the solutions that survived all cuts.
    pub samples: Vec<ChannelFieldSample>,
}

/// Parameters controlling field assembly.
#[derive(Clone, Debug)]
pub struct FieldAssemblyConfig {
    /// Largest allowed deviation of the viewing angle from the Cherenkov
    /// angle [rad].
    pub delta_c_cut: fsi,
    pub attenuate_ice: bool,
    /// Upper limit on the focusing factor, or `None` if focusing is ignored.
    pub focusing_limit: Option<fsi>,
    pub polarization_mode: PolarizationMode,
    /// Fraction of the field along `e_φ` for the custom polarization mode.
    pub e_phi: fsi,
    /// Number of samples in the synthesized traces.
    pub n_samples: usize,
    /// Time between samples in the synthesized traces [ns].
    pub dt: fsi,
    /// Frequency above which the ice absorbs the signal completely [GHz].
    pub max_frequency: fsi,
}

/// Computes the calibrated electric fields at the channels of a station.
pub struct FieldAssembler<'a> {
    config: FieldAssemblyConfig,
    ice: &'a dyn IceModel,
    ray_tracer: &'a dyn RayTracer,
    frequencies: Array1<fsi>,
}

impl<'a> FieldAssembler<'a> {
    pub fn new(
        config: FieldAssemblyConfig,
        ice: &'a dyn IceModel,
        ray_tracer: &'a dyn RayTracer,
    ) -> Self {
        let frequencies = fourier::rfft_frequencies(config.n_samples, config.dt);
        Self {
            config,
            ice,
            ray_tracer,
            frequencies,
        }
    }

    pub fn config(&self) -> &FieldAssemblyConfig {
        &self.config
    }

    /// Computes the polarization of the emitted field in on-sky components
    /// of the launch direction.
    pub fn onsky_polarization(&self, launch_vector: &Vec3<fsi>, shower_axis: &Vec3<fsi>) -> Vec3<fsi> {
        match self.config.polarization_mode {
            PolarizationMode::Auto => {
                let direction = launch_vector
                    .cross(&shower_axis.cross(launch_vector))
                    .normalized();
                SphericalFrame::for_direction(launch_vector).ground_to_onsky(&direction)
            }
            PolarizationMode::Custom => {
                let e_phi = self.config.e_phi;
                let e_theta = fsi::sqrt(1.0 - e_phi * e_phi);
                Vec3::new(0.0, e_theta, e_phi).normalized()
            }
        }
    }

    /// Assembles the fields for all ray solutions between the shower vertex
    /// and the receiver.
    ///
    /// Solutions that fail a cut or for which a service reports an error
    /// are skipped. A realization id is attached to the shower the first
    /// time a pulse is synthesized for it.
    pub fn assemble_channel(
        &self,
        context: &IterationContext,
        shower: &mut Shower,
        receiver: &Point3<fsi>,
        solutions: &[RaySolution],
        synthesizer: &mut dyn PulseSynthesizer,
    ) -> ChannelAssembly {
        let mut assembly = ChannelAssembly::default();
        if solutions.is_empty() {
            debug!(
                "Event group {}, station {}, channel {}: no ray solution from {} to {}",
                context.event_group_id, context.station_id, context.channel_id, shower.vertex, receiver
            );
            return assembly;
        }

        let shower_axis = shower.axis();
        let n_index = self.ice.index_of_refraction(&shower.vertex);
        let cherenkov_angle = fsi::acos(1.0 / n_index);

        let mut viewing_angles = Vec::with_capacity(solutions.len());
        for (ray_solution_idx, solution) in solutions.iter().enumerate() {
            let viewing_angle = shower_axis.angle_to(&solution.launch_vector);
            debug!(
                "Solution {}: viewing angle {:.1} deg, delta_C = {:.1} deg",
                ray_solution_idx,
                viewing_angle / DEG,
                (viewing_angle - cherenkov_angle) / DEG
            );
            viewing_angles.push(viewing_angle);
            assembly.records.push(SolutionRecord {
                ray_solution_idx,
                parameters: solution.parameters,
                launch_vector: solution.launch_vector,
                receive_vector: None,
                polarization: None,
                travel_time: None,
                path_length: None,
                focusing_factor: None,
            });
        }

        let min_delta_c = viewing_angles
            .iter()
            .fold(fsi::INFINITY, |min, &angle| fsi::min(min, (angle - cherenkov_angle).abs()));
        if min_delta_c > self.config.delta_c_cut {
            debug!("delta_C too large for every solution, skipping channel");
            return assembly;
        }

        for (ray_solution_idx, solution) in solutions.iter().enumerate() {
            let viewing_angle = viewing_angles[ray_solution_idx];
            if (viewing_angle - cherenkov_angle).abs() > self.config.delta_c_cut {
                debug!(
                    "delta_C too large for solution {}, skipping solution",
                    ray_solution_idx
                );
                continue;
            }
            let (path_length, travel_time) = match (solution.path_length, solution.travel_time) {
                (Some(path_length), Some(travel_time)) => (path_length, travel_time),
                _ => {
                    debug!(
                        "No path length or travel time for solution {}, skipping solution",
                        ray_solution_idx
                    );
                    continue;
                }
            };
            let record = &mut assembly.records[ray_solution_idx];
            record.path_length = Some(path_length);
            record.travel_time = Some(travel_time);
            record.receive_vector = Some(solution.receive_vector);

            let parameters = PulseParameters {
                energy: shower.shower_energy,
                viewing_angle,
                n_samples: self.config.n_samples,
                dt: self.config.dt,
                shower_class: shower.shower_class,
                n_index,
                distance: path_length,
            };
            let pulse = match synthesizer.synthesize(&parameters, shower.realization_id()) {
                Ok(pulse) => pulse,
                Err(err) => {
                    debug!(
                        "Pulse synthesis failed for shower {} and solution {}: {}",
                        shower.shower_id, ray_solution_idx, err
                    );
                    continue;
                }
            };
            shower.get_or_attach_realization_id(pulse.realization_id);
            let mut spectrum = pulse.spectrum;

            if self.config.attenuate_ice {
                let attenuation = self.ray_tracer.attenuation(
                    solution,
                    self.ice,
                    &self.frequencies,
                    self.config.max_frequency,
                );
                spectrum.zip_mut_with(&attenuation, |value, &factor| *value = *value * factor);
            }

            if let Some(focusing_limit) = self.config.focusing_limit {
                let focusing = self.ray_tracer.focusing(
                    solution,
                    self.ice,
                    FOCUSING_RECEIVER_OFFSET,
                    focusing_limit,
                );
                record.focusing_factor = Some(focusing);
                debug!(
                    "Focusing: channel {}, solution {} -> {:.1}x",
                    context.channel_id, ray_solution_idx, focusing
                );
                spectrum
                    .iter_mut()
                    .skip(1)
                    .for_each(|value| *value = *value * focusing);
            }

            let polarization_onsky = self.onsky_polarization(&solution.launch_vector, &shower_axis);
            let receive_frame = SphericalFrame::for_direction(&solution.receive_vector);
            record.polarization = Some(receive_frame.onsky_to_ground(&polarization_onsky));
            let (receive_zenith, receive_azimuth) = solution.receive_vector.spherical_angles();

            let mut e_theta = spectrum.mapv(|value| value * polarization_onsky[Y]);
            let mut e_phi = spectrum.mapv(|value| value * polarization_onsky[Z]);

            let mut reflection_coefficient_theta = None;
            let mut reflection_coefficient_phi = None;
            if !solution.surface_reflection_angles.is_empty() {
                let n_below_surface = self
                    .ice
                    .index_of_refraction(&Point3::new(receiver[X], receiver[Y], -1.0 * CM));
                for &reflection_zenith in &solution.surface_reflection_angles {
                    let r_theta = medium::fresnel_r_p(reflection_zenith, 1.0, n_below_surface);
                    let r_phi = medium::fresnel_r_s(reflection_zenith, 1.0, n_below_surface);
                    e_theta.mapv_inplace(|value| value * r_theta);
                    e_phi.mapv_inplace(|value| value * r_phi);
                    debug!(
                        "Surface reflection at {:.2} deg: r_theta = {:.2}, r_phi = {:.2}",
                        reflection_zenith / DEG,
                        r_theta,
                        r_phi
                    );
                    reflection_coefficient_theta = Some(r_theta);
                    reflection_coefficient_phi = Some(r_phi);
                }
            }

            let n_bottom_reflections = solution.n_bottom_reflections();
            if n_bottom_reflections > 0 {
                if let Some(bottom) = self.ice.reflective_bottom() {
                    let phase_shift = (n_bottom_reflections as fsi * bottom.phase_shift)
                        % (2.0 * std::f64::consts::PI);
                    let factor = Complex::from_polar(
                        bottom.coefficient.powi(n_bottom_reflections as i32),
                        phase_shift,
                    );
                    e_theta.mapv_inplace(|value| value * factor);
                    e_phi.mapv_inplace(|value| value * factor);
                    debug!(
                        "{} bottom reflections reduce the signal by a factor of {:.2}",
                        n_bottom_reflections,
                        factor.norm()
                    );
                }
            }

            let trace_start_time = shower.vertex_time.unwrap_or(0.0) + travel_time
                - 0.5 * self.config.n_samples as fsi * self.config.dt;

            assembly.samples.push(ChannelFieldSample {
                shower_idx: shower.idx,
                shower_id: shower.shower_id,
                channel_idx: context.channel_idx,
                channel_id: context.channel_id,
                ray_solution_idx,
                e_theta,
                e_phi,
                sampling_rate: 1.0 / self.config.dt,
                trace_start_time,
                receive_zenith,
                receive_azimuth,
                solution_type: solution.solution_type(),
                path_length,
                viewing_angle,
                reflection_coefficient_theta,
                reflection_coefficient_phi,
            });
        }
        assembly
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        events::{tests::create_input_table, InputDataset},
        medium::ExponentialIceModel,
        propagation::straight_line::StraightLineRayTracer,
        error::Result,
        signal::{zhs::ZhsSynthesizer, SynthesizedPulse},
    };
    use approx::assert_abs_diff_eq;

    /// Emits a flat unit spectrum, so every factor applied by the assembler
    /// shows up directly in the sample.
    struct FlatSynthesizer;

    impl PulseSynthesizer for FlatSynthesizer {
        fn name(&self) -> &str {
            "flat"
        }

        fn synthesize(
            &mut self,
            parameters: &PulseParameters,
            realization_id: Option<u64>,
        ) -> Result<SynthesizedPulse> {
            Ok(SynthesizedPulse {
                spectrum: Spectrum::from_elem(parameters.n_samples / 2 + 1, Complex::new(1.0, 0.0)),
                realization_id: realization_id.unwrap_or(1),
            })
        }
    }

    /// Accepts every solution and applies no attenuation, with a fixed
    /// polarization of 0.8 along `e_θ` and 0.6 along `e_φ`.
    fn flat_assembly_config() -> FieldAssemblyConfig {
        let mut config = assembly_config(std::f64::consts::PI);
        config.attenuate_ice = false;
        config.polarization_mode = PolarizationMode::Custom;
        config.e_phi = 0.6;
        config
    }

    fn sample_for_solution(assembly: &ChannelAssembly, ray_solution_idx: usize) -> &ChannelFieldSample {
        assembly
            .samples
            .iter()
            .find(|sample| sample.ray_solution_idx == ray_solution_idx)
            .unwrap()
    }

    fn assert_complex_eq(actual: Complex<fsi>, expected: Complex<fsi>) {
        assert_abs_diff_eq!(actual.re, expected.re, epsilon = 1e-9);
        assert_abs_diff_eq!(actual.im, expected.im, epsilon = 1e-9);
    }

    fn assembly_config(delta_c_cut: fsi) -> FieldAssemblyConfig {
        FieldAssemblyConfig {
            delta_c_cut,
            attenuate_ice: true,
            focusing_limit: None,
            polarization_mode: PolarizationMode::Auto,
            e_phi: 0.0,
            n_samples: 256,
            dt: 0.2,
            max_frequency: 1.0,
        }
    }

    /// Places the receiver on the Cherenkov cone of a horizontal shower in
    /// homogeneous ice.
    fn shower_on_cone(ice: &ExponentialIceModel) -> (Shower, Point3<fsi>) {
        let table = create_input_table(vec![0], &[[0.0, 0.0, -500.0]], 0.5 * std::f64::consts::PI);
        let input = InputDataset::from_table(table).unwrap();
        let shower = input.showers()[0].clone();
        let cherenkov_angle = fsi::acos(1.0 / ice.index_of_refraction(&shower.vertex));
        let distance = 300.0;
        let receiver = Point3::new(
            -distance * cherenkov_angle.cos(),
            0.0,
            -500.0 + distance * cherenkov_angle.sin(),
        );
        (shower, receiver)
    }

    #[test]
    fn cherenkov_angle_matches_index_of_refraction() {
        assert_abs_diff_eq!(fsi::acos(1.0 / 1.78) / DEG, 55.82, epsilon = 0.01);
    }

    #[test]
    fn on_cone_solution_produces_sample_and_attaches_realization() {
        let ice = ExponentialIceModel::homogeneous(1.78);
        let ray_tracer = StraightLineRayTracer::new(0);
        let assembler = FieldAssembler::new(assembly_config(5.0 * DEG), &ice, &ray_tracer);
        let (mut shower, receiver) = shower_on_cone(&ice);
        let solutions = ray_tracer.solve(&shower.vertex, &receiver, &ice).unwrap();
        let mut synthesizer = ZhsSynthesizer::new(3);

        let assembly = assembler.assemble_channel(
            &IterationContext::default(),
            &mut shower,
            &receiver,
            &solutions,
            &mut synthesizer,
        );
        assert_eq!(assembly.records.len(), solutions.len());
        assert!(!assembly.samples.is_empty());
        let sample = &assembly.samples[0];
        assert_eq!(sample.n_samples(), 256);
        assert!(sample.max_field_amplitude() > 0.0);
        assert!(shower.realization_id().is_some());
        let direct = &assembly.records[0];
        assert!(direct.travel_time.is_some() && direct.polarization.is_some());
        let expected_start = direct.travel_time.unwrap() - 0.5 * 256.0 * 0.2;
        assert_abs_diff_eq!(sample.trace_start_time, expected_start, epsilon = 1e-9);
    }

    #[test]
    fn realization_is_shared_between_channels() {
        let ice = ExponentialIceModel::homogeneous(1.78);
        let ray_tracer = StraightLineRayTracer::new(0);
        let assembler = FieldAssembler::new(assembly_config(5.0 * DEG), &ice, &ray_tracer);
        let (mut shower, receiver) = shower_on_cone(&ice);
        let solutions = ray_tracer.solve(&shower.vertex, &receiver, &ice).unwrap();
        let mut synthesizer = ZhsSynthesizer::new(3);
        let context = IterationContext::default();
        assembler.assemble_channel(&context, &mut shower, &receiver, &solutions, &mut synthesizer);
        let first_id = shower.realization_id();
        assembler.assemble_channel(&context, &mut shower, &receiver, &solutions, &mut synthesizer);
        assert_eq!(shower.realization_id(), first_id);
    }

    #[test]
    fn off_cone_channel_is_rejected_but_recorded() {
        let ice = ExponentialIceModel::homogeneous(1.78);
        let ray_tracer = StraightLineRayTracer::new(0);
        let assembler = FieldAssembler::new(assembly_config(5.0 * DEG), &ice, &ray_tracer);
        let (mut shower, _) = shower_on_cone(&ice);
        // Viewing angle of 65 degrees
        let angle = 65.0 * DEG;
        let receiver = Point3::new(-300.0 * angle.cos(), 0.0, -500.0 + 300.0 * angle.sin());
        let solutions = ray_tracer.solve(&shower.vertex, &receiver, &ice).unwrap();
        let mut synthesizer = ZhsSynthesizer::new(3);
        let assembly = assembler.assemble_channel(
            &IterationContext::default(),
            &mut shower,
            &receiver,
            &solutions,
            &mut synthesizer,
        );
        assert!(assembly.samples.is_empty());
        assert_eq!(assembly.records.len(), solutions.len());
        assert!(assembly.records[0].travel_time.is_none());
        assert_eq!(shower.realization_id(), None);
    }

    #[test]
    fn custom_polarization_is_normalized() {
        let ice = ExponentialIceModel::homogeneous(1.78);
        let ray_tracer = StraightLineRayTracer::new(0);
        let mut config = assembly_config(5.0 * DEG);
        config.polarization_mode = PolarizationMode::Custom;
        config.e_phi = 0.6;
        let assembler = FieldAssembler::new(config, &ice, &ray_tracer);
        let polarization = assembler.onsky_polarization(&Vec3::new(1.0, 0.0, 0.0), &Vec3::new(0.0, 0.0, 1.0));
        assert_abs_diff_eq!(polarization[X], 0.0);
        assert_abs_diff_eq!(polarization[Y], 0.8, epsilon = 1e-12);
        assert_abs_diff_eq!(polarization[Z], 0.6, epsilon = 1e-12);
    }

    #[test]
    fn auto_polarization_is_perpendicular_to_launch_vector() {
        let ice = ExponentialIceModel::homogeneous(1.78);
        let ray_tracer = StraightLineRayTracer::new(0);
        let assembler = FieldAssembler::new(assembly_config(5.0 * DEG), &ice, &ray_tracer);
        let launch_vector = Vec3::new(0.6, 0.0, 0.8);
        let polarization = assembler.onsky_polarization(&launch_vector, &Vec3::new(1.0, 0.0, 0.0));
        // No radial component in the launch frame
        assert_abs_diff_eq!(polarization[X], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(polarization.length(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn bottom_reflection_scales_and_inverts_field() {
        let ice = ExponentialIceModel::mooresbay_simple();
        let ray_tracer = StraightLineRayTracer::new(1);
        let assembler = FieldAssembler::new(flat_assembly_config(), &ice, &ray_tracer);
        let (mut shower, receiver) = shower_on_cone(&ice);
        let solutions = ray_tracer.solve(&shower.vertex, &receiver, &ice).unwrap();
        let bottom_idx = solutions
            .iter()
            .position(|solution| {
                solution.n_bottom_reflections() == 1 && solution.surface_reflection_angles.is_empty()
            })
            .unwrap();

        let assembly = assembler.assemble_channel(
            &IterationContext::default(),
            &mut shower,
            &receiver,
            &solutions,
            &mut FlatSynthesizer,
        );
        assert_eq!(assembly.samples.len(), solutions.len());
        let direct = sample_for_solution(&assembly, 0);
        let reflected = sample_for_solution(&assembly, bottom_idx);
        assert!(reflected.reflection_coefficient_theta.is_none());

        let expected_factor = Complex::from_polar(0.82, std::f64::consts::PI);
        for (reflected_value, direct_value) in reflected.e_theta.iter().zip(direct.e_theta.iter()) {
            assert_complex_eq(*reflected_value, *direct_value * expected_factor);
        }
        for (reflected_value, direct_value) in reflected.e_phi.iter().zip(direct.e_phi.iter()) {
            assert_complex_eq(*reflected_value, *direct_value * expected_factor);
        }
        assert_abs_diff_eq!(reflected.e_theta[3].re, -0.8 * 0.82, epsilon = 1e-9);
    }

    #[test]
    fn surface_reflection_applies_fresnel_coefficients() {
        let ice = ExponentialIceModel::mooresbay_simple();
        let ray_tracer = StraightLineRayTracer::new(0);
        let assembler = FieldAssembler::new(flat_assembly_config(), &ice, &ray_tracer);
        let (mut shower, receiver) = shower_on_cone(&ice);
        let solutions = ray_tracer.solve(&shower.vertex, &receiver, &ice).unwrap();
        let surface_idx = solutions
            .iter()
            .position(|solution| !solution.surface_reflection_angles.is_empty())
            .unwrap();
        let incidence_angle = solutions[surface_idx].surface_reflection_angles[0];

        let assembly = assembler.assemble_channel(
            &IterationContext::default(),
            &mut shower,
            &receiver,
            &solutions,
            &mut FlatSynthesizer,
        );
        let n_below_surface = ice.index_of_refraction(&Point3::new(receiver[X], receiver[Y], -1.0 * CM));
        let expected_theta = medium::fresnel_r_p(incidence_angle, 1.0, n_below_surface);
        let expected_phi = medium::fresnel_r_s(incidence_angle, 1.0, n_below_surface);

        let reflected = sample_for_solution(&assembly, surface_idx);
        assert_complex_eq(reflected.reflection_coefficient_theta.unwrap(), expected_theta);
        assert_complex_eq(reflected.reflection_coefficient_phi.unwrap(), expected_phi);
        assert_complex_eq(reflected.e_theta[5], expected_theta * 0.8);
        assert_complex_eq(reflected.e_phi[5], expected_phi * 0.6);

        let direct = sample_for_solution(&assembly, 0);
        assert!(direct.reflection_coefficient_theta.is_none());
        assert!(direct.reflection_coefficient_phi.is_none());
    }

    #[test]
    fn focusing_factor_is_recorded_and_spares_zero_frequency() {
        let ice = ExponentialIceModel::southpole_simple();
        let ray_tracer = StraightLineRayTracer::new(0);
        let mut config = flat_assembly_config();
        config.focusing_limit = Some(2.0);
        let assembler = FieldAssembler::new(config, &ice, &ray_tracer);
        let (mut shower, receiver) = shower_on_cone(&ice);
        let solutions = ray_tracer.solve(&shower.vertex, &receiver, &ice).unwrap();

        let assembly = assembler.assemble_channel(
            &IterationContext::default(),
            &mut shower,
            &receiver,
            &solutions,
            &mut FlatSynthesizer,
        );
        let focusing = assembly.records[0].focusing_factor.unwrap();
        assert!(focusing > 0.0 && focusing <= 2.0);
        assert_abs_diff_eq!(
            focusing,
            ray_tracer.focusing(&solutions[0], &ice, FOCUSING_RECEIVER_OFFSET, 2.0),
            epsilon = 1e-12
        );
        let direct = sample_for_solution(&assembly, 0);
        assert_complex_eq(direct.e_theta[0], Complex::new(0.8, 0.0));
        assert_complex_eq(direct.e_theta[1], Complex::new(0.8 * focusing, 0.0));
    }

    #[test]
    fn vertex_time_delays_trace_start() {
        let ice = ExponentialIceModel::homogeneous(1.78);
        let ray_tracer = StraightLineRayTracer::new(0);
        let assembler = FieldAssembler::new(flat_assembly_config(), &ice, &ray_tracer);
        let (mut shower, receiver) = shower_on_cone(&ice);
        let solutions = ray_tracer.solve(&shower.vertex, &receiver, &ice).unwrap();
        let context = IterationContext::default();

        let undelayed = assembler.assemble_channel(
            &context,
            &mut shower,
            &receiver,
            &solutions,
            &mut FlatSynthesizer,
        );
        shower.vertex_time = Some(1500.0);
        let delayed = assembler.assemble_channel(
            &context,
            &mut shower,
            &receiver,
            &solutions,
            &mut FlatSynthesizer,
        );
        assert_abs_diff_eq!(
            sample_for_solution(&delayed, 0).trace_start_time,
            sample_for_solution(&undelayed, 0).trace_start_time + 1500.0,
            epsilon = 1e-9
        );
    }
}
