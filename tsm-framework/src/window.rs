//! Window functions for analysis and synthesis frames

use std::f32::consts::PI;
use tsm_kernel::WindowKind;

/// Periodic Hann window, `0.5 * (1 - cos(2πn / length))`
///
/// Consecutive copies overlapped at half their length sum to one.
pub fn hanning(length: usize) -> Vec<f32> {
    (0..length)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / length as f32).cos()))
        .collect()
}

/// Coefficients for a window descriptor, `None` for rectangular
pub fn build(kind: Option<WindowKind>, length: usize) -> Option<Vec<f32>> {
    kind.map(|kind| match kind {
        WindowKind::Hanning => hanning(length),
    })
}

/// Elementwise product of two optional windows
///
/// A missing window acts as all ones.
pub fn product(a: Option<&[f32]>, b: Option<&[f32]>) -> Option<Vec<f32>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.iter().zip(b).map(|(x, y)| x * y).collect()),
        (Some(w), None) | (None, Some(w)) => Some(w.to_vec()),
        (None, None) => None,
    }
}

/// Multiply `buffer` by `window` in place
///
/// Only the overlapping prefix is touched; a missing window is a no-op.
pub fn apply(buffer: &mut [f32], window: Option<&[f32]>) {
    if let Some(window) = window {
        for (sample, w) in buffer.iter_mut().zip(window) {
            *sample *= w;
        }
    }
}
