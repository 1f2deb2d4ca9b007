pub mod extrema;
pub mod geometry;

// Re-export the main entry points at crate root for convenience.
pub use extrema::ext_cc::ExtremaCurveCurve;
pub use extrema::ext_cs::{CurveSurfaceExtrema, ExtremaCurveSurface};
pub use extrema::ext_pc::{ExtremaPointCurve, PointCurveExtrema};
pub use extrema::ext_ss::ExtremaSurfaceSurface;
pub use extrema::{ExtremaConfig, ExtremaError, ExtremaResult, Extremum, SearchMode};
pub use geometry::{CurveEval, SurfaceEval};

use cad_math::precision::{ANGULAR, CONFUSION, PCONFUSION};

/// Global tolerance configuration for geometric comparisons.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Points closer than this are considered coincident (model units).
    pub coincidence: f64,
    /// Angles smaller than this (radians) are considered zero.
    pub angular: f64,
    /// Parameter-space tolerance for curve/surface evaluations.
    pub parametric: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            coincidence: CONFUSION,
            angular: ANGULAR,
            parametric: PCONFUSION,
        }
    }
}

impl Tolerance {
    /// Looser tolerances for geometry imported from low-precision sources.
    pub fn coarse() -> Self {
        Self {
            coincidence: 1e-5,
            angular: 1e-9,
            parametric: 1e-7,
        }
    }

    pub fn points_coincident(&self, a: &geometry::point::Point3d, b: &geometry::point::Point3d) -> bool {
        a.distance_to(b) < self.coincidence
    }

    pub fn is_zero_length(&self, length: f64) -> bool {
        length.abs() < self.coincidence
    }

    pub fn is_zero_angle(&self, angle: f64) -> bool {
        angle.abs() < self.angular
    }

    /// Default sampling with this tolerance's angular threshold.
    pub fn extrema_config(&self) -> ExtremaConfig {
        ExtremaConfig {
            angular_tolerance: self.angular,
            ..ExtremaConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::point::Point3d;

    #[test]
    fn test_default_tolerance_matches_precision_constants() {
        let tol = Tolerance::default();
        assert_eq!(tol.coincidence, CONFUSION);
        assert_eq!(tol.extrema_config().angular_tolerance, ANGULAR);
        assert!(tol.points_coincident(&Point3d::ORIGIN, &Point3d::new(0.0, 0.0, 1e-8)));
        assert!(!tol.points_coincident(&Point3d::ORIGIN, &Point3d::new(0.0, 0.0, 1e-6)));
        assert!(Tolerance::coarse().is_zero_length(1e-6));
        assert!(!tol.is_zero_angle(1e-10));
    }
}
