//! Property-based tests for the numerical solvers using the `proptest` crate.

use approx::abs_diff_eq;
use nalgebra::{DVector, Matrix4, Vector4};
use proptest::prelude::*;

use cad_math::precision::INFINITE;
use cad_math::{
    Differentiable, Frpr, FrprConfig, FunctionRoot, MathError, MultiVarFn, MultiVarGradFn, Newton4d,
    Newton4dConfig, NewtonFunctionRoot, NewtonRootConfig, PolynomialRoots, Pso, PsoConfig, RootConfig,
    Status, TrigCoefficients, TrigonometricRoots,
};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

/// Arbitrary `(lower, upper)` pair with a positive width.
fn arb_bounds() -> impl Strategy<Value = (f64, f64)> {
    (-50.0f64..50.0, 0.1f64..50.0).prop_map(|(lo, width)| (lo, lo + width))
}

/// Coefficient in a range where the trigonometric equation is well scaled.
fn arb_coefficient() -> impl Strategy<Value = f64> {
    -5.0f64..5.0
}

fn arb_angle() -> impl Strategy<Value = f64> {
    0.0f64..std::f64::consts::TAU
}

/// Box bound that is ordinary, huge, or infinite.
fn arb_wide_bound() -> impl Strategy<Value = f64> {
    prop_oneof![
        -100.0f64..100.0,
        Just(1e300),
        Just(-1e300),
        Just(INFINITE),
        Just(-INFINITE),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
    ]
}

// ---------------------------------------------------------------------------
// 1. Scalar root solvers: a converged root always lies inside the bounds
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn function_root_respects_bounds(
        (lo, hi) in arb_bounds(),
        guess in -100.0f64..100.0,
        shift in -60.0f64..60.0,
    ) {
        let f = move |x: f64| (x - shift).powi(3) + (x - shift);
        let r = FunctionRoot::new(RootConfig::default()).with_bounds(lo, hi).perform(&f, guess);
        if let Ok(root) = r.root() {
            prop_assert!(root >= lo && root <= hi, "root {} outside [{}, {}]", root, lo, hi);
        }
        prop_assert!(r.nb_iterations() <= RootConfig::default().max_iterations);
    }
}

proptest! {
    #[test]
    fn newton_root_respects_bounds_and_finds_interior_root(
        (lo, hi) in arb_bounds(),
        guess in -100.0f64..100.0,
    ) {
        let target = 0.5 * (lo + hi);
        let f = Differentiable::new(move |x: f64| (x - target).atan(), |x: f64| 1.0 / (1.0 + (x - target).powi(2)));
        let r = NewtonFunctionRoot::new(NewtonRootConfig::default())
            .with_bounds(lo, hi)
            .perform(&f, guess);
        prop_assert!(r.is_done());
        let root = r.root().unwrap();
        prop_assert!(root >= lo && root <= hi);
        prop_assert!((root - target).abs() < 1e-6);
    }
}

// ---------------------------------------------------------------------------
// 2. Trigonometric solver: a planted root is recovered, every root is a root
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn trig_solver_recovers_planted_root(
        a in arb_coefficient(),
        b in arb_coefficient(),
        c in arb_coefficient(),
        d in arb_coefficient(),
        theta0 in arb_angle(),
    ) {
        let (s, co) = theta0.sin_cos();
        let e = -(a * co * co + 2.0 * b * co * s + c * co + d * s);
        let k = TrigCoefficients::new(a, b, c, d, e);
        let r = TrigonometricRoots::new(k, 0.0, std::f64::consts::TAU);
        prop_assume!(!r.infinite_roots());
        prop_assert!(r.is_done());
        for &t in r.roots() {
            prop_assert!(k.residual(t).abs() < 1e-6, "residual {} at {}", k.residual(t), t);
        }
        let recovered = r.roots().iter().any(|&t| {
            let diff = (t - theta0).rem_euclid(std::f64::consts::TAU);
            diff.min(std::f64::consts::TAU - diff) < 1e-5
        });
        prop_assert!(recovered, "theta0 {} not in {:?}", theta0, r.roots());
    }
}

// ---------------------------------------------------------------------------
// 3. Polynomial roots from planted factors
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn quartic_recovers_planted_roots(
        r1 in -10.0f64..-5.0,
        r2 in -4.0f64..-1.0,
        r3 in 0.0f64..3.0,
        r4 in 4.0f64..9.0,
    ) {
        // Expand (x - r1)(x - r2)(x - r3)(x - r4).
        let e1 = r1 + r2 + r3 + r4;
        let e2 = r1 * r2 + r1 * r3 + r1 * r4 + r2 * r3 + r2 * r4 + r3 * r4;
        let e3 = r1 * r2 * r3 + r1 * r2 * r4 + r1 * r3 * r4 + r2 * r3 * r4;
        let e4 = r1 * r2 * r3 * r4;
        let p = PolynomialRoots::quartic(1.0, -e1, e2, -e3, e4).unwrap();
        prop_assert_eq!(p.nb_solutions().unwrap(), 4);
        for (found, planted) in p.roots().iter().zip([r1, r2, r3, r4]) {
            prop_assert!(abs_diff_eq!(*found, planted, epsilon = 1e-7), "{} vs {}", found, planted);
        }
    }
}

// ---------------------------------------------------------------------------
// 4. PSO post-condition: every particle ends inside the box
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]
    #[test]
    fn pso_particles_stay_in_box(
        seed in any::<u32>(),
        (lo0, hi0) in arb_bounds(),
        (lo1, hi1) in arb_bounds(),
        cx in -200.0f64..200.0,
        cy in -200.0f64..200.0,
    ) {
        let f = MultiVarFn::new(2, move |x: &DVector<f64>| (x[0] - cx).powi(2) + (x[1] - cy).abs());
        let lower = DVector::from_vec(vec![lo0, lo1]);
        let upper = DVector::from_vec(vec![hi0, hi1]);
        let steps = DVector::from_vec(vec![(hi0 - lo0) / 8.0, (hi1 - lo1) / 8.0]);
        let config = PsoConfig { nb_particles: 16, nb_iterations: 40, seed };
        let r = Pso::new(lower.clone(), upper.clone(), steps, config).unwrap().perform(&f).unwrap();
        prop_assert!(r.is_done());
        let best = r.location().unwrap();
        for p in r.particles().iter().chain(std::iter::once(best)) {
            for i in 0..2 {
                prop_assert!(p[i] >= lower[i] && p[i] <= upper[i]);
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]
    #[test]
    fn pso_setup_never_panics_on_wide_boxes(
        a in arb_wide_bound(),
        b in arb_wide_bound(),
        c in arb_wide_bound(),
        d in arb_wide_bound(),
        step in 0.01f64..10.0,
    ) {
        let lower = DVector::from_vec(vec![a.min(b), c.min(d)]);
        let upper = DVector::from_vec(vec![a.max(b), c.max(d)]);
        let steps = DVector::from_element(2, step);
        let config = PsoConfig { nb_particles: 8, nb_iterations: 10, seed: 7 };
        match Pso::new(lower.clone(), upper.clone(), steps, config) {
            Ok(pso) => {
                let f = MultiVarFn::new(2, |x: &DVector<f64>| x[0] * x[0] + x[1] * x[1]);
                let r = pso.perform(&f).unwrap();
                for p in r.particles() {
                    for i in 0..2 {
                        prop_assert!(p[i] >= lower[i] && p[i] <= upper[i]);
                    }
                }
            }
            Err(err) => prop_assert!(matches!(err, MathError::InvalidParameter { .. }), "{:?}", err),
        }
    }
}

// ---------------------------------------------------------------------------
// 5. FRPR never increases the objective between iterates
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]
    #[test]
    fn frpr_objective_is_monotone(
        a in -2.0f64..2.0,
        b in 1.0f64..100.0,
        x0 in -2.0f64..2.0,
        y0 in -2.0f64..2.0,
    ) {
        // Rosenbrock family: non-convex with a curved valley.
        let f = MultiVarGradFn::new(
            2,
            move |x: &DVector<f64>| (a - x[0]).powi(2) + b * (x[1] - x[0] * x[0]).powi(2),
            move |x: &DVector<f64>| {
                DVector::from_vec(vec![
                    -2.0 * (a - x[0]) - 4.0 * b * x[0] * (x[1] - x[0] * x[0]),
                    2.0 * b * (x[1] - x[0] * x[0]),
                ])
            },
        );
        let config = FrprConfig { max_iterations: 300, ..Default::default() };
        let r = Frpr::new(config).perform(&f, &DVector::from_vec(vec![x0, y0])).unwrap();
        let values = r.values();
        prop_assert!(!values.is_empty());
        for w in values.windows(2) {
            prop_assert!(w[1] <= w[0] + 1e-12 * w[0].abs(), "objective rose from {} to {}", w[0], w[1]);
        }
    }
}

// ---------------------------------------------------------------------------
// 6. Newton4D on well-conditioned linear systems
// ---------------------------------------------------------------------------

proptest! {
    #[test]
    fn newton4d_finds_interior_zero(
        target in prop::array::uniform4(-0.9f64..0.9),
        start in prop::array::uniform4(-1.0f64..1.0),
        off in prop::array::uniform4(-0.5f64..0.5),
    ) {
        let t = Vector4::from(target);
        // Diagonally dominant, hence non-singular.
        let a = Matrix4::new(
            4.0, off[0], 0.0, off[1],
            off[0], 4.0, off[2], 0.0,
            0.0, off[2], 4.0, off[3],
            off[1], 0.0, off[3], 4.0,
        );
        let f = move |x: &Vector4<f64>| (a * (x - t), a);
        let r = Newton4d::new(Newton4dConfig::default())
            .with_bounds(Vector4::repeat(-1.0), Vector4::repeat(1.0))
            .unwrap()
            .perform(&f, &Vector4::from(start));
        prop_assert_eq!(r.status(), Status::Ok);
        prop_assert!((r.solution() - t).norm() < 1e-8);
        prop_assert!(r.nb_iterations() <= 100);
    }
}
