use tracing::instrument;

use super::{Interior, finish};
use crate::extrema::{Domain4D, ExtremaConfig, ExtremaResult, SearchMode};
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::{Plane, SurfaceEval};

/// Extrema between two planes.
///
/// Unbounded planes either intersect (no extremum) or are parallel (the
/// distance is constant everywhere).
#[derive(Debug, Clone)]
pub struct PlanePlane {
    first: Plane,
    second: Plane,
    domain: Option<Domain4D>,
    config: ExtremaConfig,
}

impl PlanePlane {
    pub fn new(first: Plane, second: Plane) -> Self {
        Self {
            first,
            second,
            domain: None,
            config: ExtremaConfig::default(),
        }
    }

    pub fn with_domain(mut self, domain: Domain4D) -> Self {
        self.domain = Some(domain);
        self
    }

    pub fn with_config(mut self, config: ExtremaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn value1(&self, u: f64, v: f64) -> Point3d {
        self.first.value(u, v)
    }

    pub fn value2(&self, u: f64, v: f64) -> Point3d {
        self.second.value(u, v)
    }

    pub fn is_swapped(&self) -> bool {
        false
    }

    pub fn is_bounded(&self) -> bool {
        self.domain.is_some()
    }

    #[instrument(skip(self), level = "trace")]
    pub fn perform(&self, tol: f64, mode: SearchMode) -> ExtremaResult {
        let (p1, p2) = (&self.first, &self.second);
        let cos = p1.normal().dot(&p2.normal());
        finish(
            p1,
            p2,
            self.domain.as_ref(),
            self.config.boundary_samples,
            false,
            tol,
            mode,
            |out| {
                if cos.abs() < 1.0 - self.config.angular_tolerance {
                    return Interior::Finite;
                }
                let origin2 = p2.frame.origin;
                let d = p1.signed_distance(&origin2);
                let foot = origin2 - p1.normal() * d;
                out.add_points(p1.parameters_of(&foot), (0.0, 0.0), &foot, &origin2, true);
                Interior::Infinite(d * d)
            },
        )
    }
}
