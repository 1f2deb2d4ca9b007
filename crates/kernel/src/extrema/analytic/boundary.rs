use super::ClosedFormProjection;
use crate::extrema::{Domain2D, Domain4D, Extremum, Params, SearchMode};

/// Extremal candidate found on a domain edge, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub params1: (f64, f64),
    pub params2: (f64, f64),
    pub square_distance: f64,
    pub is_minimum: bool,
}

impl Candidate {
    pub fn into_extremum<A: ClosedFormProjection, B: ClosedFormProjection>(self, first: &A, second: &B) -> Extremum {
        Extremum {
            params1: Params::Surface(self.params1.0, self.params1.1),
            params2: Params::Surface(self.params2.0, self.params2.1),
            point1: first.value(self.params1.0, self.params1.1),
            point2: second.value(self.params2.0, self.params2.1),
            square_distance: self.square_distance,
            is_minimum: self.is_minimum,
        }
    }
}

/// Best minimum and maximum over all edge samples.
#[derive(Debug, Default)]
pub(crate) struct EdgeExtrema {
    pub min: Option<Candidate>,
    pub max: Option<Candidate>,
}

impl EdgeExtrema {
    fn offer(&mut self, c: Candidate) {
        let slot = if c.is_minimum { &mut self.min } else { &mut self.max };
        let better = match slot {
            None => true,
            Some(best) if c.is_minimum => c.square_distance < best.square_distance,
            Some(best) => c.square_distance > best.square_distance,
        };
        if better {
            *slot = Some(c);
        }
    }
}

/// Samples `samples + 1` points along each edge of both finite domains and
/// projects every sample onto the other surface.
pub(crate) fn edge_extrema<A, B>(
    first: &A,
    second: &B,
    domain: &Domain4D,
    samples: usize,
    mode: SearchMode,
) -> EdgeExtrema
where
    A: ClosedFormProjection,
    B: ClosedFormProjection,
{
    let mut out = EdgeExtrema::default();
    if domain.first.is_finite() {
        for (u1, v1) in edge_points(&domain.first, samples) {
            let p = first.value(u1, v1);
            for (params2, is_minimum) in project(second, &p, &domain.second, mode) {
                out.offer(Candidate {
                    params1: (u1, v1),
                    params2,
                    square_distance: second.value(params2.0, params2.1).square_distance(&p),
                    is_minimum,
                });
            }
        }
    }
    if domain.second.is_finite() {
        for (u2, v2) in edge_points(&domain.second, samples) {
            let p = second.value(u2, v2);
            for (params1, is_minimum) in project(first, &p, &domain.first, mode) {
                out.offer(Candidate {
                    params1,
                    params2: (u2, v2),
                    square_distance: first.value(params1.0, params1.1).square_distance(&p),
                    is_minimum,
                });
            }
        }
    }
    out
}

fn project<S: ClosedFormProjection>(
    surface: &S,
    p: &crate::geometry::point::Point3d,
    domain: &Domain2D,
    mode: SearchMode,
) -> Vec<((f64, f64), bool)> {
    let mut found = Vec::with_capacity(2);
    if mode.wants_min() {
        if let Some(params) = surface.nearest(p, domain) {
            found.push((params, true));
        }
    }
    if mode.wants_max() {
        if let Some(params) = surface.farthest(p, domain) {
            found.push((params, false));
        }
    }
    found
}

fn edge_points(d: &Domain2D, samples: usize) -> Vec<(f64, f64)> {
    let n = samples.max(1);
    let mut points = Vec::with_capacity(4 * (n + 1));
    for i in 0..=n {
        let s = i as f64 / n as f64;
        let u = d.u_min + s * (d.u_max - d.u_min);
        let v = d.v_min + s * (d.v_max - d.v_min);
        points.extend([(u, d.v_min), (u, d.v_max), (d.u_min, v), (d.u_max, v)]);
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_points_cover_corners() {
        let d = Domain2D::new(0.0, 2.0, -1.0, 1.0);
        let pts = edge_points(&d, 4);
        assert_eq!(pts.len(), 20);
        for corner in d.corners() {
            assert!(pts.contains(&corner));
        }
        assert!(pts.iter().all(|&(u, v)| (0.0..=2.0).contains(&u) && (-1.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_offer_keeps_extremes() {
        let mut e = EdgeExtrema::default();
        let c = |sq, is_minimum| Candidate {
            params1: (0.0, 0.0),
            params2: (0.0, 0.0),
            square_distance: sq,
            is_minimum,
        };
        for sq in [3.0, 1.0, 2.0] {
            e.offer(c(sq, true));
            e.offer(c(sq, false));
        }
        assert_eq!(e.min.unwrap().square_distance, 1.0);
        assert_eq!(e.max.unwrap().square_distance, 3.0);
    }
}
