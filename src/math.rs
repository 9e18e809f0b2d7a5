use std::ops::{Add, Mul, Neg, Sub};

#[inline]
pub fn sigmoid(x: f64) -> f64 {
    1. / (1. + (-x).exp())
}

/// The scalar operations the board model is built from.
///
/// Implemented for plain `f64` for simulation and for [`Dual`] to carry the
/// derivative with respect to the steering parameter along.
pub trait Scalar:
    Copy + Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + Neg<Output = Self>
{
    /// A value that does not depend on the parameter.
    fn constant(value: f64) -> Self;
    fn value(&self) -> f64;
    fn scale(self, factor: f64) -> Self;
    fn sigmoid(self) -> Self;
    fn ln(self) -> Self;
    fn exp(self) -> Self;
}

impl Scalar for f64 {
    #[inline]
    fn constant(value: f64) -> Self {
        value
    }

    #[inline]
    fn value(&self) -> f64 {
        *self
    }

    #[inline]
    fn scale(self, factor: f64) -> Self {
        self * factor
    }

    #[inline]
    fn sigmoid(self) -> Self {
        sigmoid(self)
    }

    #[inline]
    fn ln(self) -> Self {
        f64::ln(self)
    }

    #[inline]
    fn exp(self) -> Self {
        f64::exp(self)
    }
}

/// Forward mode dual number: a value together with its derivative with
/// respect to a single seeded input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual {
    primal: f64,
    tangent: f64,
}

impl Dual {
    pub fn new(primal: f64, tangent: f64) -> Self {
        Self { primal, tangent }
    }

    /// The input we differentiate with respect to, seeded with tangent 1.
    pub fn variable(value: f64) -> Self {
        Self::new(value, 1.)
    }

    pub fn primal(&self) -> f64 {
        self.primal
    }

    pub fn tangent(&self) -> f64 {
        self.tangent
    }
}

impl Add for Dual {
    type Output = Dual;

    #[inline]
    fn add(self, rhs: Dual) -> Dual {
        Dual::new(self.primal + rhs.primal, self.tangent + rhs.tangent)
    }
}

impl Sub for Dual {
    type Output = Dual;

    #[inline]
    fn sub(self, rhs: Dual) -> Dual {
        Dual::new(self.primal - rhs.primal, self.tangent - rhs.tangent)
    }
}

impl Mul for Dual {
    type Output = Dual;

    #[inline]
    fn mul(self, rhs: Dual) -> Dual {
        Dual::new(
            self.primal * rhs.primal,
            self.tangent * rhs.primal + self.primal * rhs.tangent,
        )
    }
}

impl Neg for Dual {
    type Output = Dual;

    #[inline]
    fn neg(self) -> Dual {
        Dual::new(-self.primal, -self.tangent)
    }
}

impl Scalar for Dual {
    #[inline]
    fn constant(value: f64) -> Self {
        Dual::new(value, 0.)
    }

    #[inline]
    fn value(&self) -> f64 {
        self.primal
    }

    #[inline]
    fn scale(self, factor: f64) -> Self {
        Dual::new(self.primal * factor, self.tangent * factor)
    }

    #[inline]
    fn sigmoid(self) -> Self {
        let s = sigmoid(self.primal);
        Dual::new(s, self.tangent * s * (1. - s))
    }

    #[inline]
    fn ln(self) -> Self {
        Dual::new(self.primal.ln(), self.tangent / self.primal)
    }

    #[inline]
    fn exp(self) -> Self {
        let e = self.primal.exp();
        Dual::new(e, self.tangent * e)
    }
}
