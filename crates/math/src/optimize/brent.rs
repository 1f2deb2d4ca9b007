//! One-dimensional minimisation: golden-ratio bracketing followed by Brent's
//! parabolic/golden-section search. Used as the line search of
//! [`super::Frpr`].

const GOLD: f64 = 1.618_034;
const CGOLD: f64 = 0.381_966_0;
const GROWTH_LIMIT: f64 = 100.0;
const TINY: f64 = 1e-20;

/// Three abscissas with `f(b) <= f(a)` and `f(b) <= f(c)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bracket {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub fb: f64,
}

/// Minimum found by [`brent_minimize`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMinimum {
    pub x: f64,
    pub fx: f64,
    pub iterations: usize,
}

/// Expand from `[a, b]` downhill until a minimum is enclosed.
///
/// Returns `None` when an evaluation fails or `max_steps` expansions do not
/// enclose a minimum (unbounded below along the search line).
pub fn bracket_minimum<F>(f: &mut F, mut a: f64, mut b: f64, max_steps: usize) -> Option<Bracket>
where
    F: FnMut(f64) -> Option<f64>,
{
    let mut fa = f(a)?;
    let mut fb = f(b)?;
    if fb > fa {
        std::mem::swap(&mut a, &mut b);
        std::mem::swap(&mut fa, &mut fb);
    }
    let mut c = b + GOLD * (b - a);
    let mut fc = f(c)?;

    for _ in 0..max_steps {
        if fb <= fc {
            return Some(Bracket { a, b, c, fb });
        }
        let r = (b - a) * (fb - fc);
        let q = (b - c) * (fb - fa);
        let denom = 2.0 * (q - r).abs().max(TINY).copysign(q - r);
        let mut u = b - ((b - c) * q - (b - a) * r) / denom;
        let ulim = b + GROWTH_LIMIT * (c - b);
        let mut fu;

        if (b - u) * (u - c) > 0.0 {
            fu = f(u)?;
            if fu < fc {
                return Some(Bracket { a: b, b: u, c, fb: fu });
            } else if fu > fb {
                return Some(Bracket { a, b, c: u, fb });
            }
            u = c + GOLD * (c - b);
            fu = f(u)?;
        } else if (c - u) * (u - ulim) > 0.0 {
            fu = f(u)?;
            if fu < fc {
                b = c;
                c = u;
                u = c + GOLD * (c - b);
                fb = fc;
                fc = fu;
                fu = f(u)?;
            }
        } else if (u - ulim) * (ulim - c) >= 0.0 {
            u = ulim;
            fu = f(u)?;
        } else {
            u = c + GOLD * (c - b);
            fu = f(u)?;
        }

        (a, b, c) = (b, c, u);
        (fa, fb, fc) = (fb, fc, fu);
    }
    (fb <= fc).then_some(Bracket { a, b, c, fb })
}

/// Brent's method on a bracket. `tol` is the fractional precision on `x`.
pub fn brent_minimize<F>(f: &mut F, bracket: Bracket, tol: f64, max_iterations: usize) -> Option<LineMinimum>
where
    F: FnMut(f64) -> Option<f64>,
{
    let zeps = f64::EPSILON * 1e-3;
    let (mut a, mut b) = if bracket.a < bracket.c {
        (bracket.a, bracket.c)
    } else {
        (bracket.c, bracket.a)
    };
    let (mut x, mut w, mut v) = (bracket.b, bracket.b, bracket.b);
    let (mut fx, mut fw, mut fv) = (bracket.fb, bracket.fb, bracket.fb);
    let mut d: f64 = 0.0;
    let mut e: f64 = 0.0;

    for iteration in 0..max_iterations {
        let xm = 0.5 * (a + b);
        let tol1 = tol * x.abs() + zeps;
        let tol2 = 2.0 * tol1;
        if (x - xm).abs() <= tol2 - 0.5 * (b - a) {
            return Some(LineMinimum { x, fx, iterations: iteration });
        }

        let mut golden = true;
        if e.abs() > tol1 {
            let r = (x - w) * (fx - fv);
            let mut q = (x - v) * (fx - fw);
            let mut p = (x - v) * q - (x - w) * r;
            q = 2.0 * (q - r);
            if q > 0.0 {
                p = -p;
            }
            q = q.abs();
            let etemp = e;
            e = d;
            if p.abs() < (0.5 * q * etemp).abs() && p > q * (a - x) && p < q * (b - x) {
                d = p / q;
                let u = x + d;
                if u - a < tol2 || b - u < tol2 {
                    d = tol1.copysign(xm - x);
                }
                golden = false;
            }
        }
        if golden {
            e = if x >= xm { a - x } else { b - x };
            d = CGOLD * e;
        }

        let u = if d.abs() >= tol1 { x + d } else { x + tol1.copysign(d) };
        let fu = f(u)?;
        if fu <= fx {
            if u >= x {
                a = x;
            } else {
                b = x;
            }
            (v, w, x) = (w, x, u);
            (fv, fw, fx) = (fw, fx, fu);
        } else {
            if u < x {
                a = u;
            } else {
                b = u;
            }
            if fu <= fw || w == x {
                (v, w) = (w, u);
                (fv, fw) = (fw, fu);
            } else if fu <= fv || v == x || v == w {
                v = u;
                fv = fu;
            }
        }
    }
    Some(LineMinimum {
        x,
        fx,
        iterations: max_iterations,
    })
}
