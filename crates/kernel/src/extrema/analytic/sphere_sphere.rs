use tracing::instrument;

use super::{Interior, finish};
use crate::extrema::{Domain4D, ExtremaConfig, ExtremaResult, SearchMode};
use crate::geometry::point::Point3d;
use crate::geometry::surfaces::{Sphere, SurfaceEval};

/// Extrema between two spheres, all on the line through both centers.
#[derive(Debug, Clone)]
pub struct SphereSphere {
    first: Sphere,
    second: Sphere,
    domain: Option<Domain4D>,
    config: ExtremaConfig,
}

impl SphereSphere {
    pub fn new(first: Sphere, second: Sphere) -> Self {
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
        let (s1, s2) = (&self.first, &self.second);
        finish(
            s1,
            s2,
            self.domain.as_ref(),
            self.config.boundary_samples,
            false,
            tol,
            mode,
            |out| {
                let (c1, c2) = (s1.center(), s2.center());
                let (r1, r2) = (s1.radius, s2.radius);
                let between = c2 - c1;
                let dist = between.length();

                let Some(dir) = between.normalized().filter(|_| dist >= tol) else {
                    // Concentric: every radial pair is at |r1 - r2|.
                    let p1 = c1 + s1.frame.x_dir * r1;
                    let p2 = c2 + s1.frame.x_dir * r2;
                    out.add_points(s1.parameters_of(&p1), s2.parameters_of(&p2), &p1, &p2, true);
                    let gap = r1 - r2;
                    return Interior::Infinite(gap * gap);
                };

                if mode.wants_min() {
                    let (p1, p2) = if dist >= r1 + r2 {
                        (c1 + dir * r1, c2 - dir * r2)
                    } else if dist > (r1 - r2).abs() {
                        // Crossing spheres: a point of the intersection circle.
                        let along = (dist * dist + r1 * r1 - r2 * r2) / (2.0 * dist);
                        let across = (r1 * r1 - along * along).max(0.0).sqrt();
                        let perp = dir.any_perpendicular().unwrap_or(s1.frame.x_dir);
                        let p = c1 + dir * along + perp * across;
                        (p, p)
                    } else if r1 > r2 {
                        // Second sphere nested inside the first.
                        (c1 + dir * r1, c2 + dir * r2)
                    } else {
                        (c1 - dir * r1, c2 - dir * r2)
                    };
                    out.add_points(s1.parameters_of(&p1), s2.parameters_of(&p2), &p1, &p2, true);
                }
                if mode.wants_max() {
                    let p1 = c1 - dir * r1;
                    let p2 = c2 + dir * r2;
                    out.add_points(s1.parameters_of(&p1), s2.parameters_of(&p2), &p1, &p2, false);
                }
                Interior::Finite
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extrema::Status;

    fn sphere(x: f64, y: f64, z: f64, r: f64) -> Sphere {
        Sphere::new(Point3d::new(x, y, z), r).unwrap()
    }

    fn min_max(r: &ExtremaResult) -> (f64, f64) {
        let min = r.extrema().iter().find(|e| e.is_minimum).unwrap().square_distance;
        let max = r.extrema().iter().find(|e| !e.is_minimum).unwrap().square_distance;
        (min, max)
    }

    #[test]
    fn test_concentric_spheres() {
        let r = SphereSphere::new(sphere(0.0, 0.0, 0.0, 1.0), sphere(0.0, 0.0, 0.0, 2.0))
            .perform(1e-7, SearchMode::MinMax);
        assert_eq!(r.status(), Status::InfiniteSolutions);
        assert!((r.infinite_square_distance().unwrap() - 1.0).abs() < 1e-12);
        let e = r.extremum(0).unwrap();
        assert!((e.point1.square_distance(&e.point2) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_separate_spheres() {
        let r = SphereSphere::new(sphere(0.0, 0.0, 0.0, 1.0), sphere(10.0, 0.0, 0.0, 2.0))
            .perform(1e-7, SearchMode::MinMax);
        assert_eq!(r.nb_ext(), 2);
        let (min, max) = min_max(&r);
        assert!((min - 49.0).abs() < 1e-9);
        assert!((max - 169.0).abs() < 1e-9);
    }

    #[test]
    fn test_crossing_spheres_touch() {
        let r = SphereSphere::new(sphere(0.0, 0.0, 0.0, 2.0), sphere(3.0, 0.0, 0.0, 2.0))
            .perform(1e-7, SearchMode::MinMax);
        let (min, max) = min_max(&r);
        assert!(min < 1e-20);
        assert!((max - 49.0).abs() < 1e-9);
        let e = r.extrema().iter().find(|e| e.is_minimum).unwrap();
        assert!((e.point1.distance_to(&Point3d::ORIGIN) - 2.0).abs() < 1e-9);
        assert!((e.point1.x - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_nested_spheres() {
        // Small sphere off-center inside a big one.
        let r = SphereSphere::new(sphere(0.0, 0.0, 0.0, 5.0), sphere(1.0, 0.0, 0.0, 1.0))
            .perform(1e-7, SearchMode::MinMax);
        let (min, max) = min_max(&r);
        assert!((min - 9.0).abs() < 1e-9);
        assert!((max - 49.0).abs() < 1e-9);

        let r = SphereSphere::new(sphere(1.0, 0.0, 0.0, 1.0), sphere(0.0, 0.0, 0.0, 5.0))
            .perform(1e-7, SearchMode::Min);
        assert_eq!(r.nb_ext(), 1);
        assert!((r.min_square_distance().unwrap() - 9.0).abs() < 1e-9);
    }
}
