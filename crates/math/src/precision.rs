//! Kernel-wide precision constants.

/// Two points closer than this are considered coincident.
pub const CONFUSION: f64 = 1.0e-7;

/// Square of [`CONFUSION`].
pub const SQUARE_CONFUSION: f64 = CONFUSION * CONFUSION;

/// Angular tolerance used for parallelism checks on unit vectors.
pub const ANGULAR: f64 = 1.0e-12;

/// Parametric confusion for unit-speed parameterisations.
pub const PCONFUSION: f64 = 1.0e-9;

/// Stand-in for an infinite parameter bound. Finite so arithmetic on it
/// never produces NaN.
pub const INFINITE: f64 = 1.0e100;

/// True when `value` should be treated as an infinite bound.
#[inline]
pub fn is_infinite(value: f64) -> bool {
    !value.is_finite() || value.abs() >= INFINITE * 0.5
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infinite_detection() {
        assert!(is_infinite(INFINITE));
        assert!(is_infinite(-INFINITE));
        assert!(is_infinite(f64::INFINITY));
        assert!(is_infinite(f64::NEG_INFINITY));
        assert!(!is_infinite(1.0e50));
        assert!(!is_infinite(0.0));
    }
}
