//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Convert an angle in degrees into radians.
///
/// Computed as `deg * pi / 180`, in that order, which is not always
/// bit-identical to `f64::to_radians`.
pub fn deg2rad<T>(deg: T) -> T
where
    T: Float
{
    deg * T::from(std::f64::consts::PI).unwrap() / T::from(180.0).unwrap()
}

/// Convert an angle in radians into degrees.
pub fn rad2deg<T>(rad: T) -> T
where
    T: Float
{
    rad * T::from(180.0).unwrap() / T::from(std::f64::consts::PI).unwrap()
}

/// Apply polynomial coefficients to a value.
///
/// Coefficients are ordered lowest power first, i.e. `c[0] + c[1]*x + c[2]*x^2
/// + ...`.
pub fn poly_val<T>(value: T, coeffs: &[T]) -> T
where
    T: Float + std::ops::AddAssign
{
    let mut res = T::zero();

    for (i, c) in coeffs.iter().enumerate() {
        res += *c * value.powi(i as i32);
    }

    res
}

/// Evaluate the first derivative of a polynomial at a value.
///
/// Coefficients are ordered lowest power first, as for [`poly_val`].
pub fn poly_deriv_val<T>(value: T, coeffs: &[T]) -> T
where
    T: Float + std::ops::AddAssign
{
    let mut res = T::zero();

    for (i, c) in coeffs.iter().enumerate().skip(1) {
        res += T::from(i).unwrap() * *c * value.powi(i as i32 - 1);
    }

    res
}

pub fn clamp<T>(value: T, min: T, max: T) -> T 
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}
