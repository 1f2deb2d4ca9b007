use serde::{Deserialize, Serialize};

use super::GeometryError;
use super::point::Point3d;
use super::vector::Vec3;

/// Knots closer than this are the same knot.
const KNOT_EQUALITY: f64 = 1e-12;
/// Finite-difference step as a fraction of the parameter domain.
const D1_STEP: f64 = 1e-7;
const D2_STEP: f64 = 1e-4;

/// A NURBS (Non-Uniform Rational B-Spline) curve in 3D.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NurbsCurve {
    pub degree: usize,
    pub control_points: Vec<Point3d>,
    /// Empty for a non-rational curve.
    pub weights: Vec<f64>,
    /// `control_points.len() + degree + 1` non-decreasing values.
    pub knots: Vec<f64>,
}

impl NurbsCurve {
    pub fn new(
        degree: usize,
        control_points: Vec<Point3d>,
        weights: Vec<f64>,
        knots: Vec<f64>,
    ) -> Result<Self, GeometryError> {
        check_knots(&knots, control_points.len(), degree)?;
        if !weights.is_empty() && weights.len() != control_points.len() {
            return Err(GeometryError::InvalidNurbs(format!(
                "{} weights for {} control points",
                weights.len(),
                control_points.len()
            )));
        }
        if weights.iter().any(|&w| !(w > 0.0)) {
            return Err(GeometryError::InvalidNurbs("weights must be positive".into()));
        }
        Ok(Self {
            degree,
            control_points,
            weights,
            knots,
        })
    }

    /// Non-rational B-spline curve.
    pub fn bspline(degree: usize, control_points: Vec<Point3d>, knots: Vec<f64>) -> Result<Self, GeometryError> {
        Self::new(degree, control_points, Vec::new(), knots)
    }

    fn weight(&self, i: usize) -> f64 {
        self.weights.get(i).copied().unwrap_or(1.0)
    }

    pub fn domain(&self) -> (f64, f64) {
        (self.knots[self.degree], self.knots[self.knots.len() - self.degree - 1])
    }

    /// De Boor evaluation in homogeneous coordinates.
    pub fn evaluate(&self, t: f64) -> Point3d {
        let p = self.degree;
        let span = find_span(&self.knots, self.control_points.len(), p, t);
        let basis = basis_functions(&self.knots, span, t, p);

        let mut sum = Vec3::ZERO;
        let mut w_sum = 0.0;
        for (i, b) in basis.iter().enumerate() {
            let idx = span - p + i;
            let bw = b * self.weight(idx);
            sum = sum + self.control_points[idx].to_vec3() * bw;
            w_sum += bw;
        }
        Point3d::ORIGIN + sum / w_sum
    }

    /// First derivative by central differences clamped to the domain.
    pub fn derivative(&self, t: f64) -> Vec3 {
        let (lo, hi) = self.domain();
        let h = D1_STEP * (hi - lo).max(1.0);
        let t0 = (t - h).max(lo);
        let t1 = (t + h).min(hi);
        if t1 - t0 < f64::EPSILON {
            return Vec3::ZERO;
        }
        (self.evaluate(t1) - self.evaluate(t0)) / (t1 - t0)
    }

    /// Second derivative; the three-point stencil is shifted inside the
    /// domain near its ends.
    pub fn second_derivative(&self, t: f64) -> Vec3 {
        let (lo, hi) = self.domain();
        let h = D2_STEP * (hi - lo);
        if h <= 0.0 {
            return Vec3::ZERO;
        }
        let c = t.clamp(lo + h, hi - h);
        let p0 = self.evaluate(c - h).to_vec3();
        let p1 = self.evaluate(c).to_vec3();
        let p2 = self.evaluate(c + h).to_vec3();
        (p2 - p1 * 2.0 + p0) / (h * h)
    }

    /// Multiplicity of the knot value `t`, zero when `t` is not a knot.
    pub fn knot_multiplicity(&self, t: f64) -> usize {
        self.knots.iter().filter(|&&k| (k - t).abs() <= KNOT_EQUALITY).count()
    }

    /// Interior knots in `(t0, t1)` where the curve may lose C¹ continuity.
    pub fn sharp_parameters(&self, t0: f64, t1: f64) -> Vec<f64> {
        let (lo, hi) = self.domain();
        let mut out: Vec<f64> = Vec::new();
        for &k in &self.knots {
            if k <= lo.max(t0) || k >= hi.min(t1) {
                continue;
            }
            if out.last().is_some_and(|&last| (k - last).abs() <= KNOT_EQUALITY) {
                continue;
            }
            if self.degree > 0 && self.knot_multiplicity(k) >= self.degree {
                out.push(k);
            }
        }
        out
    }
}

/// A tensor-product NURBS surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NurbsSurface {
    pub degree_u: usize,
    pub degree_v: usize,
    /// Row-major grid: `control_points[u_index * num_v + v_index]`.
    pub control_points: Vec<Point3d>,
    pub weights: Vec<f64>,
    pub knots_u: Vec<f64>,
    pub knots_v: Vec<f64>,
    pub num_u: usize,
    pub num_v: usize,
}

impl NurbsSurface {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        degree_u: usize,
        degree_v: usize,
        control_points: Vec<Point3d>,
        weights: Vec<f64>,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
        num_u: usize,
        num_v: usize,
    ) -> Result<Self, GeometryError> {
        if control_points.len() != num_u * num_v {
            return Err(GeometryError::InvalidNurbs(format!(
                "{} control points for a {num_u}x{num_v} grid",
                control_points.len()
            )));
        }
        if !weights.is_empty() && weights.len() != control_points.len() {
            return Err(GeometryError::InvalidNurbs("weight grid size mismatch".into()));
        }
        check_knots(&knots_u, num_u, degree_u)?;
        check_knots(&knots_v, num_v, degree_v)?;
        Ok(Self {
            degree_u,
            degree_v,
            control_points,
            weights,
            knots_u,
            knots_v,
            num_u,
            num_v,
        })
    }

    fn weight(&self, u_idx: usize, v_idx: usize) -> f64 {
        self.weights.get(u_idx * self.num_v + v_idx).copied().unwrap_or(1.0)
    }

    pub fn domain_u(&self) -> (f64, f64) {
        (self.knots_u[self.degree_u], self.knots_u[self.knots_u.len() - self.degree_u - 1])
    }

    pub fn domain_v(&self) -> (f64, f64) {
        (self.knots_v[self.degree_v], self.knots_v[self.knots_v.len() - self.degree_v - 1])
    }

    pub fn evaluate(&self, u: f64, v: f64) -> Point3d {
        let span_u = find_span(&self.knots_u, self.num_u, self.degree_u, u);
        let span_v = find_span(&self.knots_v, self.num_v, self.degree_v, v);
        let basis_u = basis_functions(&self.knots_u, span_u, u, self.degree_u);
        let basis_v = basis_functions(&self.knots_v, span_v, v, self.degree_v);

        let mut sum = Vec3::ZERO;
        let mut w_sum = 0.0;
        for (i, bu) in basis_u.iter().enumerate() {
            let u_idx = span_u - self.degree_u + i;
            for (j, bv) in basis_v.iter().enumerate() {
                let v_idx = span_v - self.degree_v + j;
                let bw = bu * bv * self.weight(u_idx, v_idx);
                sum = sum + self.control_points[u_idx * self.num_v + v_idx].to_vec3() * bw;
                w_sum += bw;
            }
        }
        Point3d::ORIGIN + sum / w_sum
    }

    /// `(∂S/∂u, ∂S/∂v)` by clamped central differences.
    pub fn partials(&self, u: f64, v: f64) -> (Vec3, Vec3) {
        let (u_lo, u_hi) = self.domain_u();
        let (v_lo, v_hi) = self.domain_v();
        let hu = D1_STEP * (u_hi - u_lo).max(1.0);
        let hv = D1_STEP * (v_hi - v_lo).max(1.0);
        let (u0, u1) = ((u - hu).max(u_lo), (u + hu).min(u_hi));
        let (v0, v1) = ((v - hv).max(v_lo), (v + hv).min(v_hi));
        let du = if u1 > u0 {
            (self.evaluate(u1, v) - self.evaluate(u0, v)) / (u1 - u0)
        } else {
            Vec3::ZERO
        };
        let dv = if v1 > v0 {
            (self.evaluate(u, v1) - self.evaluate(u, v0)) / (v1 - v0)
        } else {
            Vec3::ZERO
        };
        (du, dv)
    }

    /// `(∂²S/∂u², ∂²S/∂v², ∂²S/∂u∂v)`.
    pub fn second_partials(&self, u: f64, v: f64) -> (Vec3, Vec3, Vec3) {
        let (u_lo, u_hi) = self.domain_u();
        let (v_lo, v_hi) = self.domain_v();
        let hu = D2_STEP * (u_hi - u_lo);
        let hv = D2_STEP * (v_hi - v_lo);
        if hu <= 0.0 || hv <= 0.0 {
            return (Vec3::ZERO, Vec3::ZERO, Vec3::ZERO);
        }
        let cu = u.clamp(u_lo + hu, u_hi - hu);
        let cv = v.clamp(v_lo + hv, v_hi - hv);
        let p = |a: f64, b: f64| self.evaluate(a, b).to_vec3();
        let center = p(cu, cv);
        let duu = (p(cu + hu, cv) - center * 2.0 + p(cu - hu, cv)) / (hu * hu);
        let dvv = (p(cu, cv + hv) - center * 2.0 + p(cu, cv - hv)) / (hv * hv);
        let duv = (p(cu + hu, cv + hv) - p(cu + hu, cv - hv) - p(cu - hu, cv + hv) + p(cu - hu, cv - hv))
            / (4.0 * hu * hv);
        (duu, dvv, duv)
    }

    pub fn normal(&self, u: f64, v: f64) -> Option<Vec3> {
        let (du, dv) = self.partials(u, v);
        du.cross(&dv).normalized()
    }
}

fn check_knots(knots: &[f64], nb_poles: usize, degree: usize) -> Result<(), GeometryError> {
    if nb_poles <= degree {
        return Err(GeometryError::InvalidNurbs(format!(
            "{nb_poles} control points cannot carry degree {degree}"
        )));
    }
    if knots.len() != nb_poles + degree + 1 {
        return Err(GeometryError::InvalidNurbs(format!(
            "knot vector length {} must be {}",
            knots.len(),
            nb_poles + degree + 1
        )));
    }
    if knots.windows(2).any(|w| !(w[0] <= w[1])) {
        return Err(GeometryError::InvalidNurbs("knots must be non-decreasing".into()));
    }
    if !(knots[degree] < knots[nb_poles]) {
        return Err(GeometryError::InvalidNurbs("empty parameter domain".into()));
    }
    Ok(())
}

/// Knot span holding `t`, by binary search. `t` outside the domain maps to
/// the first or last span.
fn find_span(knots: &[f64], nb_poles: usize, degree: usize, t: f64) -> usize {
    let n = nb_poles - 1;
    if t >= knots[n + 1] {
        return n;
    }
    if t <= knots[degree] {
        return degree;
    }
    let mut low = degree;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Non-vanishing basis functions `N[span-p..=span]` at `t`.
fn basis_functions(knots: &[f64], span: usize, t: f64, degree: usize) -> Vec<f64> {
    let p = degree;
    let mut n_vals = vec![0.0; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];

    n_vals[0] = 1.0;
    for j in 1..=p {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            let temp = n_vals[r] / (right[r + 1] + left[j - r]);
            n_vals[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n_vals[j] = saved;
    }
    n_vals
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment() -> NurbsCurve {
        NurbsCurve::bspline(
            1,
            vec![Point3d::new(0.0, 0.0, 0.0), Point3d::new(10.0, 0.0, 0.0)],
            vec![0.0, 0.0, 1.0, 1.0],
        )
        .unwrap()
    }

    #[test]
    fn test_segment_evaluate_and_derivative() {
        let c = segment();
        assert!((c.evaluate(0.5).x - 5.0).abs() < 1e-10);
        let d = c.derivative(0.0);
        assert!((d.x - 10.0).abs() < 1e-6 && d.y.abs() < 1e-9);
        assert!(c.second_derivative(0.3).length() < 1e-3);
    }

    #[test]
    fn test_quadratic_second_derivative() {
        // B(t) = (10t, 20t(1-t), 0): second derivative (0, -40, 0).
        let c = NurbsCurve::bspline(
            2,
            vec![
                Point3d::new(0.0, 0.0, 0.0),
                Point3d::new(5.0, 10.0, 0.0),
                Point3d::new(10.0, 0.0, 0.0),
            ],
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        )
        .unwrap();
        let mid = c.evaluate(0.5);
        assert!((mid.x - 5.0).abs() < 1e-10 && (mid.y - 5.0).abs() < 1e-10);
        let d2 = c.second_derivative(0.5);
        assert!((d2.y + 40.0).abs() < 1e-3, "{d2:?}");
        let d1 = c.derivative(0.25);
        assert!((d1.y - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_rational_quarter_circle() {
        let w = std::f64::consts::FRAC_1_SQRT_2;
        let c = NurbsCurve::new(
            2,
            vec![
                Point3d::new(1.0, 0.0, 0.0),
                Point3d::new(1.0, 1.0, 0.0),
                Point3d::new(0.0, 1.0, 0.0),
            ],
            vec![1.0, w, 1.0],
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        )
        .unwrap();
        for i in 0..=20 {
            let p = c.evaluate(i as f64 / 20.0);
            assert!(((p.x * p.x + p.y * p.y).sqrt() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_sharp_parameters_on_polyline() {
        // Degree-1 polyline: every interior knot is a corner.
        let c = NurbsCurve::bspline(
            1,
            vec![
                Point3d::new(0.0, 0.0, 0.0),
                Point3d::new(1.0, 1.0, 0.0),
                Point3d::new(2.0, 0.0, 0.0),
                Point3d::new(3.0, 1.0, 0.0),
            ],
            vec![0.0, 0.0, 1.0, 2.0, 3.0, 3.0],
        )
        .unwrap();
        assert_eq!(c.knot_multiplicity(1.0), 1);
        assert_eq!(c.knot_multiplicity(0.0), 2);
        assert_eq!(c.sharp_parameters(0.0, 3.0), vec![1.0, 2.0]);
        assert_eq!(c.sharp_parameters(1.5, 3.0), vec![2.0]);
    }

    #[test]
    fn test_invalid_definitions_rejected() {
        let pts = vec![Point3d::ORIGIN, Point3d::new(1.0, 0.0, 0.0)];
        assert!(NurbsCurve::bspline(1, pts.clone(), vec![0.0, 0.0, 1.0]).is_err());
        assert!(NurbsCurve::bspline(1, pts.clone(), vec![0.0, 1.0, 0.5, 1.0]).is_err());
        assert!(NurbsCurve::new(1, pts, vec![1.0, -1.0], vec![0.0, 0.0, 1.0, 1.0]).is_err());
    }

    #[test]
    fn test_bilinear_patch_partials() {
        // S(u, v) = (u, v, u v) on [0, 1]^2.
        let s = NurbsSurface::new(
            1,
            1,
            vec![
                Point3d::new(0.0, 0.0, 0.0),
                Point3d::new(0.0, 1.0, 0.0),
                Point3d::new(1.0, 0.0, 0.0),
                Point3d::new(1.0, 1.0, 1.0),
            ],
            Vec::new(),
            vec![0.0, 0.0, 1.0, 1.0],
            vec![0.0, 0.0, 1.0, 1.0],
            2,
            2,
        )
        .unwrap();
        let p = s.evaluate(0.5, 0.25);
        assert!((p.z - 0.125).abs() < 1e-12);
        let (du, dv) = s.partials(0.5, 0.25);
        assert!((du.z - 0.25).abs() < 1e-6 && (dv.z - 0.5).abs() < 1e-6);
        let (duu, dvv, duv) = s.second_partials(0.5, 0.5);
        assert!(duu.length() < 1e-4 && dvv.length() < 1e-4);
        assert!((duv.z - 1.0).abs() < 1e-4);
        assert!(s.normal(0.5, 0.5).is_some());
    }
}
