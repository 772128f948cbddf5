use std::f64::consts::TAU;

use once_cell::sync::Lazy;

use crate::forwards::Dual;

/// Highest odd power kept in the sine series.
pub const SERIES_DEGREE: usize = 23;

static INV_FACTORIALS: Lazy<[f64; SERIES_DEGREE + 1]> = Lazy::new(|| {
    let mut table = [1.0; SERIES_DEGREE + 1];
    let mut factorial = 1.0;
    for (k, entry) in table.iter_mut().enumerate().skip(1) {
        factorial *= k as f64;
        *entry = 1.0 / factorial;
    }
    table
});

/// Sine of a dual number from its Taylor series, evaluated in dual
/// arithmetic so `eps` comes out as `cos(real) * eps`.
///
/// The real part is first reduced into `[0, 2π)`. The shift is a constant,
/// so the derivative component passes through untouched.
pub fn sin(x: Dual) -> Dual {
    let x = Dual::new(x.real.rem_euclid(TAU), x.eps);

    let x_squared = x * x;
    let mut accum = x;
    let mut result = x;
    let mut sign = -1.0;
    for power in (3..=SERIES_DEGREE).step_by(2) {
        accum = accum * x_squared;
        result = result + accum.scale(sign * INV_FACTORIALS[power]);
        sign = -sign;
    }
    result
}
