use tracing::instrument;

use super::{Interior, finish};
use crate::extrema::{Domain4D, ExtremaConfig, ExtremaResult, SearchMode};
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::{Plane, Sphere, SurfaceEval};

/// Extrema between a plane and a sphere: always one minimum and one maximum
/// on the line through the center along the plane normal.
#[derive(Debug, Clone)]
pub struct PlaneSphere {
    plane: Plane,
    sphere: Sphere,
    domain: Option<Domain4D>,
    swapped: bool,
    config: ExtremaConfig,
}

impl PlaneSphere {
    pub fn new(plane: Plane, sphere: Sphere) -> Self {
        Self {
            plane,
            sphere,
            domain: None,
            swapped: false,
            config: ExtremaConfig::default(),
        }
    }

    /// Sphere given first: parameters come back in `(sphere, plane)` order.
    pub fn new_reversed(sphere: Sphere, plane: Plane) -> Self {
        Self {
            swapped: true,
            ..Self::new(plane, sphere)
        }
    }

    /// Domains in the caller's argument order.
    pub fn with_domain(mut self, domain: Domain4D) -> Self {
        self.domain = Some(if self.swapped { domain.swapped() } else { domain });
        self
    }

    pub fn with_config(mut self, config: ExtremaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn value1(&self, u: f64, v: f64) -> Point3d {
        if self.swapped { self.sphere.value(u, v) } else { self.plane.value(u, v) }
    }

    pub fn value2(&self, u: f64, v: f64) -> Point3d {
        if self.swapped { self.plane.value(u, v) } else { self.sphere.value(u, v) }
    }

    pub fn is_swapped(&self) -> bool {
        self.swapped
    }

    pub fn is_bounded(&self) -> bool {
        self.domain.is_some()
    }

    #[instrument(skip(self), level = "trace")]
    pub fn perform(&self, tol: f64, mode: SearchMode) -> ExtremaResult {
        let (plane, sphere) = (&self.plane, &self.sphere);
        finish(
            plane,
            sphere,
            self.domain.as_ref(),
            self.config.boundary_samples,
            self.swapped,
            tol,
            mode,
            |out| {
                let n = plane.normal();
                let center = sphere.center();
                let r = sphere.radius;
                let d = plane.signed_distance(&center);
                let side = if d >= 0.0 { 1.0 } else { -1.0 };
                let foot = center - n * d;

                if mode.wants_min() {
                    let (on_plane, on_sphere) = if d.abs() < r {
                        // Intersecting: any point of the intersection circle.
                        let p = foot + plane.frame.x_dir * (r * r - d * d).sqrt();
                        (p, p)
                    } else {
                        (foot, center - n * (side * r))
                    };
                    out.add_points(
                        plane.parameters_of(&on_plane),
                        sphere.parameters_of(&on_sphere),
                        &on_plane,
                        &on_sphere,
                        true,
                    );
                }
                if mode.wants_max() {
                    let far = center + n * (side * r);
                    out.add_points(plane.parameters_of(&foot), sphere.parameters_of(&far), &foot, &far, false);
                }
                Interior::Finite
            },
        )
    }
}
