//! Utilities related to numbers.

use std::{cmp, fmt};

/// Floating point marker trait for easier control over trait bounds.
pub trait BFloat: Sync + Send + num::Float + num::cast::FromPrimitive + fmt::Debug {}

impl BFloat for f32 {}
impl BFloat for f64 {}

/// Integer-float pair that can be ordered based on the float.
///
/// Pairs with equal floats compare equal, so a stable sort keeps
/// their original order.
#[derive(Clone, Copy, Debug)]
pub struct OrderableIndexValuePair<I: num::Integer, F: BFloat>(pub I, pub F);

impl<I: num::Integer, F: BFloat> PartialEq for OrderableIndexValuePair<I, F> {
    fn eq(&self, other: &Self) -> bool {
        self.1 == other.1
    }
}

impl<I: num::Integer, F: BFloat> PartialOrd for OrderableIndexValuePair<I, F> {
    fn partial_cmp(&self, other: &Self) -> Option<cmp::Ordering> {
        self.1.partial_cmp(&other.1)
    }
}

impl<I: num::Integer, F: BFloat> Eq for OrderableIndexValuePair<I, F> {}

impl<I: num::Integer, F: BFloat> Ord for OrderableIndexValuePair<I, F> {
    fn cmp(&self, other: &Self) -> cmp::Ordering {
        self.partial_cmp(other)
            .expect("NaN in floating point comparison.")
    }
}

/// Returns the indices that sort the given values in ascending order.
///
/// The sort is stable, so equal values keep their relative order.
/// Panics if any of the values is NaN.
pub fn argsort<F: BFloat>(values: &[F]) -> Vec<usize> {
    let mut pairs: Vec<_> = values
        .iter()
        .enumerate()
        .map(|(idx, &value)| OrderableIndexValuePair(idx, value))
        .collect();
    pairs.sort();
    pairs.into_iter().map(|pair| pair.0).collect()
}

/// Integrates sampled values with the trapezoidal rule.
pub fn trapz<F: BFloat>(values: &[F], coords: &[F]) -> F {
    assert_eq!(
        values.len(),
        coords.len(),
        "Number of values and coordinates differ"
    );
    let half = F::from_f64(0.5).unwrap();
    values
        .windows(2)
        .zip(coords.windows(2))
        .fold(F::zero(), |sum, (v, x)| {
            sum + (x[1] - x[0]) * (v[0] + v[1]) * half
        })
}
