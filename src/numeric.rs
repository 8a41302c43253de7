//! Centralized numeric guards
//!
//! All component scoring and confidence math routes through these helpers so
//! a NaN or infinity from upstream can never poison the composite score.

/// Substitute 0.0 for NaN or infinite values.
pub fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}

/// Clamp `x` into `[min, max]`. A NaN input resolves to `min`.
pub fn clamp_range(min: f64, max: f64, x: f64) -> f64 {
    x.max(min).min(max)
}
