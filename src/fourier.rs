//! Fourier transforms of real-valued traces.
//!
//! Spectra use the normalization in which a spectrum is the real FFT of a
//! trace divided by the sampling rate and multiplied by √2, so that the
//! spectral amplitude is independent of the trace length.

use crate::simulation::fsi;
use ndarray::Array1;
use rustfft::{Fft, FftPlanner};
use std::{cell::RefCell, sync::Arc};

pub use rustfft::num_complex::Complex;

/// Complex frequency-domain spectrum.
pub type Spectrum = Array1<Complex<fsi>>;

/// Real time-domain trace.
pub type Trace = Array1<fsi>;

std::thread_local! {
    static FFT_PLANNER: RefCell<FftPlanner<fsi>> = RefCell::new(FftPlanner::new());
}

/// Returns the cached forward FFT of the given length.
fn forward_fft(n_samples: usize) -> Arc<dyn Fft<fsi>> {
    FFT_PLANNER.with(|planner| planner.borrow_mut().plan_fft_forward(n_samples))
}

/// Returns the cached inverse FFT of the given length.
fn inverse_fft(n_samples: usize) -> Arc<dyn Fft<fsi>> {
    FFT_PLANNER.with(|planner| planner.borrow_mut().plan_fft_inverse(n_samples))
}

/// Returns the frequencies of the real FFT of a trace with `n_samples`
/// samples spaced by `dt`.
pub fn rfft_frequencies(n_samples: usize, dt: fsi) -> Array1<fsi> {
    let n_frequencies = n_samples / 2 + 1;
    let frequency_step = 1.0 / (n_samples as fsi * dt);
    Array1::from_shape_fn(n_frequencies, |idx| idx as fsi * frequency_step)
}

/// Computes the spectrum of a real trace sampled at `sampling_rate`.
pub fn time_to_freq(trace: &[fsi], sampling_rate: fsi) -> Spectrum {
    let n_samples = trace.len();
    let mut buffer: Vec<_> = trace.iter().map(|&value| Complex::new(value, 0.0)).collect();
    if n_samples > 0 {
        forward_fft(n_samples).process(&mut buffer);
    }
    let scale = std::f64::consts::SQRT_2 / sampling_rate;
    buffer
        .into_iter()
        .take(n_samples / 2 + 1)
        .map(|value| value * scale)
        .collect()
}

/// Computes the real trace, sampled at `sampling_rate`, corresponding to a
/// spectrum of a trace with an even number of samples.
pub fn freq_to_time(spectrum: &[Complex<fsi>], sampling_rate: fsi) -> Trace {
    if spectrum.len() < 2 {
        return Trace::zeros(0);
    }
    let n_samples = 2 * (spectrum.len() - 1);
    let mut buffer = vec![Complex::new(0.0, 0.0); n_samples];
    buffer[..spectrum.len()].copy_from_slice(spectrum);
    for idx in 1..spectrum.len() - 1 {
        buffer[n_samples - idx] = spectrum[idx].conj();
    }
    inverse_fft(n_samples).process(&mut buffer);
    let scale = sampling_rate / (std::f64::consts::SQRT_2 * n_samples as fsi);
    buffer.into_iter().map(|value| value.re * scale).collect()
}

/// Computes the envelope of a real trace as the magnitude of its analytic
/// signal.
pub fn envelope(trace: &[fsi]) -> Trace {
    let n_samples = trace.len();
    if n_samples == 0 {
        return Trace::zeros(0);
    }
    let mut buffer: Vec<_> = trace.iter().map(|&value| Complex::new(value, 0.0)).collect();
    forward_fft(n_samples).process(&mut buffer);

    let half = n_samples / 2;
    for (idx, value) in buffer.iter_mut().enumerate() {
        let weight = if idx == 0 || (n_samples % 2 == 0 && idx == half) {
            1.0
        } else if idx <= (n_samples - 1) / 2 {
            2.0
        } else {
            0.0
        };
        *value = *value * weight;
    }
    inverse_fft(n_samples).process(&mut buffer);
    let scale = 1.0 / n_samples as fsi;
    buffer.into_iter().map(|value| value.norm() * scale).collect()
}

/// Finds the maximum absolute value of a trace.
pub fn max_abs(trace: &[fsi]) -> fsi {
    trace.iter().fold(0.0, |max, &value| fsi::max(max, value.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn transforms_are_inverse() {
        let sampling_rate = 5.0;
        let trace: Vec<fsi> = (0..64)
            .map(|idx| (0.3 * idx as fsi).sin() * (-0.01 * (idx as fsi - 30.0).powi(2)).exp())
            .collect();
        let spectrum = time_to_freq(&trace, sampling_rate);
        assert_eq!(spectrum.len(), 33);
        let back = freq_to_time(spectrum.as_slice().unwrap(), sampling_rate);
        for (original, recovered) in trace.iter().zip(back.iter()) {
            assert_abs_diff_eq!(original, recovered, epsilon = 1e-12);
        }
    }

    #[test]
    fn frequencies_end_at_nyquist() {
        let frequencies = rfft_frequencies(100, 0.2);
        assert_eq!(frequencies.len(), 51);
        assert_abs_diff_eq!(frequencies[50], 2.5, epsilon = 1e-12);
    }

    #[test]
    fn envelope_of_sine_is_flat() {
        let n_samples = 128;
        let trace: Vec<fsi> = (0..n_samples)
            .map(|idx| 2.0 * (2.0 * std::f64::consts::PI * 8.0 * idx as fsi / n_samples as fsi).cos())
            .collect();
        let envelope = envelope(&trace);
        for value in envelope.iter() {
            assert_abs_diff_eq!(*value, 2.0, epsilon = 1e-9);
        }
        assert_abs_diff_eq!(max_abs(&trace), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn plans_are_reused_between_transforms() {
        let first = forward_fft(96);
        let trace = vec![1.0; 96];
        time_to_freq(&trace, 2.0);
        envelope(&trace);
        let second = forward_fft(96);
        assert!(std::ptr::eq(
            Arc::as_ptr(&first) as *const u8,
            Arc::as_ptr(&second) as *const u8
        ));
        assert!(!std::ptr::eq(
            Arc::as_ptr(&forward_fft(96)) as *const u8,
            Arc::as_ptr(&inverse_fft(96)) as *const u8
        ));
    }
}
