use std::fmt::{self, Display, Formatter};
use std::ops::{Add, Mul, Neg, Sub};

use num_traits::{One, Pow, Zero};

use crate::error::{AutodiffError, Result};

/// A dual number `real + eps·ε` with `ε² = 0`.
///
/// `real` carries the value and `eps` the derivative along the seeded
/// direction. Every operation returns a new value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Dual {
    pub real: f64, // The real value
    pub eps: f64,  // The derivative
}

impl Dual {
    pub fn new(real: f64, eps: f64) -> Self {
        Dual { real, eps }
    }

    /// A value with zero derivative.
    pub fn constant(real: f64) -> Self {
        Dual { real, eps: 0.0 }
    }

    /// Seeds a derivative direction: `d/dx` of `x` is one.
    pub fn variable(real: f64) -> Self {
        Dual { real, eps: 1.0 }
    }

    pub fn scale(self, factor: f64) -> Self {
        Dual {
            real: self.real * factor,
            eps: self.eps * factor,
        }
    }

    pub fn abs(self) -> Self {
        Dual {
            real: self.real.abs(),
            eps: self.eps.abs(),
        }
    }

    /// Quotient rule. A zero real divisor has no solution unless the
    /// dividend's real part is also zero, in which case it has infinitely many.
    pub fn try_div(self, other: Self) -> Result<Self> {
        if other.real != 0.0 {
            return Ok(Dual {
                real: self.real / other.real,
                eps: (self.eps * other.real - self.real * other.eps) / (other.real * other.real),
            });
        }
        if self.real != 0.0 {
            return Err(AutodiffError::DivisionUndefined {
                dividend: self,
                divisor: other,
            });
        }
        Err(AutodiffError::DivisionIndeterminate {
            dividend: self,
            divisor: other,
        })
    }
}

impl From<f64> for Dual {
    fn from(real: f64) -> Self {
        Dual::constant(real)
    }
}

impl Display for Dual {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:?} + {:?}ε", self.real, self.eps)
    }
}

impl Neg for Dual {
    type Output = Self;

    fn neg(self) -> Self {
        Dual {
            real: -self.real,
            eps: -self.eps,
        }
    }
}

impl Add for Dual {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Dual {
            real: self.real + other.real,
            eps: self.eps + other.eps,
        }
    }
}

impl Sub for Dual {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        self + (-other)
    }
}

impl Mul for Dual {
    type Output = Self;

    // product rule, the ε² term is dropped
    fn mul(self, other: Self) -> Self {
        Dual {
            real: self.real * other.real,
            eps: self.real * other.eps + self.eps * other.real,
        }
    }
}

impl Zero for Dual {
    fn zero() -> Self {
        Dual::constant(0.0)
    }

    fn is_zero(&self) -> bool {
        self.real == 0.0 && self.eps == 0.0
    }
}

impl One for Dual {
    fn one() -> Self {
        Dual::constant(1.0)
    }
}

impl Pow<u32> for Dual {
    type Output = Dual;

    fn pow(self, p: u32) -> Dual {
        let mut result = Dual::one();
        for _ in 0..p {
            result = result * self;
        }
        result
    }
}
