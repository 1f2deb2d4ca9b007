//! Distance extrema between curves and surfaces.
//!
//! Closed-form solvers handle the canonical pairs (plane, sphere, cylinder,
//! lines and circles); everything else goes through multi-start Newton
//! searches on the squared-distance function. Every query returns its result
//! by value.

pub mod analytic;
pub mod ext_cc;
pub mod ext_cs;
pub mod ext_pc;
pub mod ext_ps;
pub mod ext_ss;
pub mod gen_ext_cs;

use cad_math::MathError;
use cad_math::precision::{ANGULAR, is_infinite};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;
use thiserror::Error;

use crate::geometry::point::Point3d;

pub use crate::geometry::frame::normalize_angle;
pub use cad_math::Status;

/// Misuse of an extrema query or of its result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtremaError {
    #[error("perform called before initialize")]
    NotInitialized,
    #[error("extrema computation is not done")]
    NotDone,
    #[error("extremum {index} out of range (number of extrema: {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("infinitely many extrema: only the constant distance is defined")]
    InfiniteSolutions,
    #[error("unbounded parameter domain: {0}")]
    UnboundedDomain(String),
    #[error(transparent)]
    Math(#[from] MathError),
}

/// Which kind of extrema a query should report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SearchMode {
    Min,
    Max,
    #[default]
    MinMax,
}

impl SearchMode {
    pub fn wants_min(self) -> bool {
        self != SearchMode::Max
    }

    pub fn wants_max(self) -> bool {
        self != SearchMode::Min
    }
}

/// Parameters of an extremum on one of the two objects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Params {
    Curve(f64),
    Surface(f64, f64),
}

impl Params {
    pub fn curve(&self) -> Option<f64> {
        match *self {
            Params::Curve(t) => Some(t),
            Params::Surface(..) => None,
        }
    }

    pub fn surface(&self) -> Option<(f64, f64)> {
        match *self {
            Params::Surface(u, v) => Some((u, v)),
            Params::Curve(_) => None,
        }
    }
}

/// One stationary point of the distance function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extremum {
    pub params1: Params,
    pub params2: Params,
    pub point1: Point3d,
    pub point2: Point3d,
    pub square_distance: f64,
    pub is_minimum: bool,
}

impl Extremum {
    /// Same extremum with the two objects exchanged.
    pub fn swapped(self) -> Self {
        Self {
            params1: self.params2,
            params2: self.params1,
            point1: self.point2,
            point2: self.point1,
            ..self
        }
    }
}

/// Outcome of an extrema query.
///
/// An `InfiniteSolutions` result carries the constant squared distance and a
/// single representative pair of points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtremaResult {
    status: Status,
    extrema: Vec<Extremum>,
    infinite_square_distance: Option<f64>,
}

impl ExtremaResult {
    pub fn with_status(status: Status) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }

    pub fn finite(extrema: Vec<Extremum>) -> Self {
        let status = if extrema.is_empty() { Status::NoSolution } else { Status::Ok };
        Self {
            status,
            extrema,
            infinite_square_distance: None,
        }
    }

    pub fn infinite(square_distance: f64, representative: Option<Extremum>) -> Self {
        Self {
            status: Status::InfiniteSolutions,
            extrema: representative.into_iter().collect(),
            infinite_square_distance: Some(square_distance),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// True when the query produced a usable answer, finite or infinite.
    pub fn is_done(&self) -> bool {
        matches!(self.status, Status::Ok | Status::InfiniteSolutions)
    }

    pub fn is_infinite(&self) -> bool {
        self.status.is_infinite()
    }

    pub fn nb_ext(&self) -> usize {
        self.extrema.len()
    }

    pub fn extrema(&self) -> &[Extremum] {
        &self.extrema
    }

    /// Zero-based access.
    pub fn extremum(&self, index: usize) -> Result<&Extremum, ExtremaError> {
        self.extrema.get(index).ok_or(ExtremaError::IndexOutOfRange {
            index,
            len: self.extrema.len(),
        })
    }

    pub fn square_distance(&self, index: usize) -> Result<f64, ExtremaError> {
        Ok(self.extremum(index)?.square_distance)
    }

    pub fn infinite_square_distance(&self) -> Result<f64, ExtremaError> {
        match (self.status, self.infinite_square_distance) {
            (Status::InfiniteSolutions, Some(d)) => Ok(d),
            _ => Err(ExtremaError::NotDone),
        }
    }

    /// Smallest squared distance among the minima, or the constant distance
    /// of an infinite result.
    pub fn min_square_distance(&self) -> Option<f64> {
        if let Some(d) = self.infinite_square_distance {
            return Some(d);
        }
        self.extrema
            .iter()
            .filter(|e| e.is_minimum)
            .map(|e| e.square_distance)
            .min_by(f64::total_cmp)
    }

    /// Result with the roles of the two objects exchanged.
    pub fn swapped(mut self) -> Self {
        for e in &mut self.extrema {
            *e = e.swapped();
        }
        self
    }
}

/// Rectangular parameter domain of a surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain2D {
    pub u_min: f64,
    pub u_max: f64,
    pub v_min: f64,
    pub v_max: f64,
}

impl Domain2D {
    pub fn new(u_min: f64, u_max: f64, v_min: f64, v_max: f64) -> Self {
        Self {
            u_min,
            u_max,
            v_min,
            v_max,
        }
    }

    /// Every bound finite.
    pub fn is_finite(&self) -> bool {
        ![self.u_min, self.u_max, self.v_min, self.v_max]
            .into_iter()
            .any(is_infinite)
    }

    /// Point `(u, v)` inside the domain up to `tol`. With `u_periodic`, `u`
    /// is first folded into the period starting at `u_min`.
    pub fn contains(&self, u: f64, v: f64, u_periodic: bool, tol: f64) -> bool {
        let u = if u_periodic {
            let folded = normalize_periodic(u, self.u_min, TAU);
            if folded > self.u_max + tol && (folded - TAU - self.u_min).abs() <= tol {
                self.u_min
            } else {
                folded
            }
        } else {
            u
        };
        u >= self.u_min - tol && u <= self.u_max + tol && v >= self.v_min - tol && v <= self.v_max + tol
    }

    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (self.u_min, self.v_min),
            (self.u_max, self.v_min),
            (self.u_min, self.v_max),
            (self.u_max, self.v_max),
        ]
    }
}

/// Parameter domains of two surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Domain4D {
    pub first: Domain2D,
    pub second: Domain2D,
}

impl Domain4D {
    pub fn new(first: Domain2D, second: Domain2D) -> Self {
        Self { first, second }
    }

    pub fn swapped(&self) -> Self {
        Self {
            first: self.second,
            second: self.first,
        }
    }
}

/// `x` folded into `[first, first + period)`.
pub fn normalize_periodic(x: f64, first: f64, period: f64) -> f64 {
    let offset = (x - first).rem_euclid(period);
    if offset >= period { first } else { first + offset }
}

/// Sampling densities and iteration budgets of the numeric extrema paths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExtremaConfig {
    /// Curve samples on the generic path.
    pub nb_t: usize,
    pub nb_u: usize,
    pub nb_v: usize,
    /// Curve samples for periodic and B-spline curves.
    pub nb_t_refined: usize,
    pub max_newton_iterations: usize,
    /// Samples per domain edge in the analytic boundary pass.
    pub boundary_samples: usize,
    /// Two unit directions are parallel when `1 - |a·b|` is below this.
    pub angular_tolerance: f64,
}

impl Default for ExtremaConfig {
    fn default() -> Self {
        Self {
            nb_t: 12,
            nb_u: 32,
            nb_v: 32,
            nb_t_refined: 13,
            max_newton_iterations: 50,
            boundary_samples: 20,
            angular_tolerance: ANGULAR,
        }
    }
}

impl ExtremaConfig {
    /// Denser grids for wavy free-form geometry.
    pub fn fine() -> Self {
        Self {
            nb_t: 24,
            nb_u: 48,
            nb_v: 48,
            nb_t_refined: 26,
            max_newton_iterations: 100,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(sq: f64, is_minimum: bool) -> Extremum {
        Extremum {
            params1: Params::Curve(1.0),
            params2: Params::Surface(2.0, 3.0),
            point1: Point3d::ORIGIN,
            point2: Point3d::new(0.0, 0.0, sq.sqrt()),
            square_distance: sq,
            is_minimum,
        }
    }

    #[test]
    fn test_result_accessors() {
        let r = ExtremaResult::finite(vec![sample(4.0, true), sample(1.0, true), sample(9.0, false)]);
        assert!(r.is_done());
        assert_eq!(r.nb_ext(), 3);
        assert_eq!(r.square_distance(1).unwrap(), 1.0);
        assert_eq!(r.min_square_distance(), Some(1.0));
        assert_eq!(r.extremum(3), Err(ExtremaError::IndexOutOfRange { index: 3, len: 3 }));
        assert_eq!(r.infinite_square_distance(), Err(ExtremaError::NotDone));
    }

    #[test]
    fn test_infinite_result() {
        let r = ExtremaResult::infinite(25.0, Some(sample(25.0, true)));
        assert!(r.is_done() && r.is_infinite());
        assert_eq!(r.infinite_square_distance().unwrap(), 25.0);
        assert_eq!(r.min_square_distance(), Some(25.0));
        assert_eq!(r.nb_ext(), 1);
    }

    #[test]
    fn test_empty_result_is_no_solution() {
        let r = ExtremaResult::finite(Vec::new());
        assert_eq!(r.status(), Status::NoSolution);
        assert!(!r.is_done());
        assert_eq!(r.min_square_distance(), None);
    }

    #[test]
    fn test_swapped_exchanges_roles() {
        let e = sample(4.0, true).swapped();
        assert_eq!(e.params1, Params::Surface(2.0, 3.0));
        assert_eq!(e.params2.curve(), Some(1.0));
        assert_eq!(e.point1.z, 2.0);
    }

    #[test]
    fn test_normalize_periodic() {
        assert!((normalize_periodic(7.0, 0.0, TAU) - (7.0 - TAU)).abs() < 1e-12);
        assert!((normalize_periodic(-0.5, -1.0, 2.0) + 0.5).abs() < 1e-12);
        assert!((normalize_periodic(1.0, -1.0, 2.0) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_domain_contains_periodic() {
        let d = Domain2D::new(0.0, std::f64::consts::PI, -1.0, 1.0);
        assert!(d.contains(-TAU + 1.0, 0.0, true, 1e-9));
        assert!(!d.contains(-1.0, 0.0, true, 1e-9));
        assert!(!d.contains(-TAU + 1.0, 0.0, false, 1e-9));
        assert!(d.contains(TAU - 1e-12, 0.5, true, 1e-9));
        assert!(d.is_finite());
        assert!(!Domain2D::new(0.0, 1.0, -cad_math::precision::INFINITE, 0.0).is_finite());
    }

    #[test]
    fn test_search_mode() {
        assert!(SearchMode::MinMax.wants_min() && SearchMode::MinMax.wants_max());
        assert!(!SearchMode::Min.wants_max());
        assert!(!SearchMode::Max.wants_min());
    }
}
