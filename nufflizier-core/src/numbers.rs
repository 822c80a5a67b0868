//! Numeric conversion helpers centralizing safe numeric casts and report rounding.

use num_traits::cast::cast;

/// Convert a count to f64 while allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Convert a die face count into an index-friendly `usize`, returning 0 for negatives.
#[must_use]
pub fn i32_to_usize(value: i32) -> usize {
    cast::<i32, usize>(value).unwrap_or(0)
}

/// Round to a fixed number of decimal places, returning 0.0 for non-finite values.
#[must_use]
pub fn round_to(value: f64, digits: i32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10_f64.powi(digits);
    (value * factor).round() / factor
}

/// Clamp a probability into `[0, 1]`; non-finite inputs collapse to a coin flip.
#[must_use]
pub fn clamp_unit(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.5;
    }
    value.clamp(0.0, 1.0)
}

/// Format a probability as a one-decimal percentage string.
#[must_use]
pub fn percent(value: f64) -> String {
    format!("{:.1}%", clamp_unit(value) * 100.0)
}
