//! # Reference curve fitting
//!
//! Fits a cubic `y = c0 + c1 x + c2 x^2 + c3 x^3` through Body frame waypoints in the least
//! squares sense. Since the vehicle sits at the Body frame origin, the curve evaluated at `x = 0`
//! is directly the cross-track error and its slope there gives the heading error.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::{DMatrix, DVector, Point2};
use serde::Serialize;

use util::maths::{poly_deriv_val, poly_val};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Degree of the fitted polynomial.
pub const REF_CURVE_ORDER: usize = 3;

/// Number of coefficients of the fitted polynomial.
pub const NUM_REF_CURVE_COEFFS: usize = REF_CURVE_ORDER + 1;

/// Minimum number of points needed for a well defined fit.
pub const MIN_NUM_FIT_POINTS: usize = NUM_REF_CURVE_COEFFS;

/// Singular values below this are treated as zero when solving the fit.
const SVD_EPS: f64 = 1e-12;

/// Convergence tolerance of the SVD iteration.
const SVD_CONV_EPS: f64 = std::f64::EPSILON;

/// Maximum number of SVD iterations before the fit is abandoned.
const SVD_MAX_ITERS: usize = 1000;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A cubic reference curve in the Body frame.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct RefCurve {
    /// Coefficients, lowest power first.
    pub coeffs: [f64; NUM_REF_CURVE_COEFFS]
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum RefFitError {
    #[error("At least {} points are required to fit the reference curve, found {0}", MIN_NUM_FIT_POINTS)]
    InsufficientPoints(usize),

    #[error("The fit points are not finite once raised to the curve order")]
    NonFiniteInput,

    #[error("The least squares solve failed: {0}")]
    SolveFailed(&'static str),

    #[error("The fitted coefficients are not finite: {0:?}")]
    NonFinite([f64; NUM_REF_CURVE_COEFFS])
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl RefCurve {
    /// Fit the curve through the given points, using X as the independent variable.
    pub fn fit(points: &[Point2<f64>]) -> Result<Self, RefFitError> {
        if points.len() < MIN_NUM_FIT_POINTS {
            return Err(RefFitError::InsufficientPoints(points.len()));
        }

        // Vandermonde matrix of the X values
        let a = DMatrix::from_fn(
            points.len(),
            NUM_REF_CURVE_COEFFS,
            |i, j| points[i].x.powi(j as i32)
        );
        let b = DVector::from_iterator(points.len(), points.iter().map(|p| p.y));

        // The SVD does not terminate on infinite or NaN entries
        if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
            return Err(RefFitError::NonFiniteInput);
        }

        let sol = a.try_svd(true, true, SVD_CONV_EPS, SVD_MAX_ITERS)
            .ok_or(RefFitError::SolveFailed("SVD did not converge"))?
            .solve(&b, SVD_EPS)
            .map_err(RefFitError::SolveFailed)?;

        let mut coeffs = [0f64; NUM_REF_CURVE_COEFFS];
        coeffs.copy_from_slice(sol.as_slice());

        if coeffs.iter().any(|c| !c.is_finite()) {
            return Err(RefFitError::NonFinite(coeffs));
        }

        Ok(Self { coeffs })
    }

    /// Evaluate the curve at `x`.
    pub fn eval(&self, x: f64) -> f64 {
        poly_val(x, &self.coeffs)
    }

    /// Evaluate the slope of the curve at `x`.
    pub fn slope(&self, x: f64) -> f64 {
        poly_deriv_val(x, &self.coeffs)
    }

    /// Cross-track error of a vehicle at the Body frame origin, `f(0) - 0`.
    pub fn cte(&self) -> f64 {
        self.eval(0.0) - 0.0
    }

    /// Heading error of a vehicle at the Body frame origin, `0 - atan(f'(0))`.
    pub fn epsi(&self) -> f64 {
        0.0 - self.coeffs[1].atan()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_straight_constant_offset() {
        for &c in &[-3.5, 0.0, 0.25, 12.0] {
            let pts: Vec<_> = (0..6)
                .map(|i| Point2::new(-5.0 + 9.0 * i as f64, c))
                .collect();

            let curve = RefCurve::fit(&pts).unwrap();

            assert_abs_diff_eq!(curve.eval(0.0), c, epsilon = 1e-9);
            assert_abs_diff_eq!(curve.cte(), c, epsilon = 1e-9);
            assert_abs_diff_eq!(curve.epsi(), 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_recovers_exact_cubic() {
        let truth = [0.5, -0.2, 0.03, -0.001];
        let pts: Vec<_> = (0..8)
            .map(|i| {
                let x = -10.0 + 7.0 * i as f64;
                Point2::new(x, poly_val(x, &truth))
            })
            .collect();

        let curve = RefCurve::fit(&pts).unwrap();

        for (c, t) in curve.coeffs.iter().zip(truth.iter()) {
            assert_abs_diff_eq!(*c, *t, epsilon = 1e-8);
        }
        assert_abs_diff_eq!(curve.slope(0.0), -0.2, epsilon = 1e-8);
        assert_abs_diff_eq!(curve.epsi(), 0.2f64.atan(), epsilon = 1e-8);
    }

    #[test]
    fn test_least_squares_through_noise() {
        // Alternating +/- offsets around y = 1 average out
        let pts: Vec<_> = (0..20)
            .map(|i| Point2::new(i as f64, 1.0 + if i % 2 == 0 { 0.1 } else { -0.1 }))
            .collect();

        let curve = RefCurve::fit(&pts).unwrap();

        assert_abs_diff_eq!(curve.eval(9.5), 1.0, epsilon = 0.05);
    }

    #[test]
    fn test_non_finite_points_rejected() {
        // x^3 overflows to infinity
        let huge: Vec<_> = (0..6)
            .map(|i| Point2::new(1e110 * (i + 1) as f64, 1.0))
            .collect();
        assert!(matches!(RefCurve::fit(&huge), Err(RefFitError::NonFiniteInput)));

        let mut nan: Vec<_> = (0..6).map(|i| Point2::new(i as f64, 0.0)).collect();
        nan[2].y = std::f64::NAN;
        assert!(matches!(RefCurve::fit(&nan), Err(RefFitError::NonFiniteInput)));
    }

    #[test]
    fn test_insufficient_points_rejected() {
        let pts = vec![Point2::new(0.0, 0.0), Point2::new(1.0, 0.0), Point2::new(2.0, 0.0)];

        match RefCurve::fit(&pts) {
            Err(RefFitError::InsufficientPoints(3)) => (),
            r => panic!("Expected InsufficientPoints, got {:?}", r),
        }
        assert!(matches!(RefCurve::fit(&[]), Err(RefFitError::InsufficientPoints(0))));
    }
}
