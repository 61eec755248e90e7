use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter},
    hash::{Hash, Hasher},
};

use num::{
    rational::Ratio,
    traits::{CheckedAdd, CheckedDiv, CheckedMul, CheckedSub},
    Zero,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{exerr, ExError, ExResult};

/// Exact fraction of two `i64`s that is always kept in lowest terms. The sign lives in the
/// numerator, the denominator is positive.
///
/// ```rust
/// # use std::error::Error;
/// # fn main() -> Result<(), Box<dyn Error>> {
/// #
/// use calcex::Rational;
/// let third = Rational::new(1, 3)?;
/// let one = third.checked_add(&third).and_then(|r| r.checked_add(&third));
/// assert_eq!(one, Some(Rational::from_integer(1)));
/// assert_eq!(Rational::new(2, -4)?, Rational::new(-1, 2)?);
/// #
/// #     Ok(())
/// # }
/// ```
///
/// Arithmetic is checked. All `checked_*` methods return `None` on overflow or when the result
/// cannot be represented exactly. Callers are expected to fall back to floating point then.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(try_from = "(i64, i64)", into = "(i64, i64)")
)]
pub struct Rational {
    ratio: Ratio<i64>,
}

impl Rational {
    /// Creates a fraction in lowest terms.
    ///
    /// # Errors
    ///
    /// The denominator is zero or one of the components is `i64::MIN` whose negation is
    /// not representable.
    pub fn new(numer: i64, denom: i64) -> ExResult<Rational> {
        if denom == 0 {
            return Err(exerr!(Arithmetic, "denominator of {}/{} is zero", numer, denom));
        }
        if numer == i64::MIN || denom == i64::MIN {
            return Err(exerr!(Arithmetic, "{}/{} is out of range", numer, denom));
        }
        Ok(Rational {
            ratio: Ratio::new(numer, denom),
        })
    }

    pub fn from_integer(n: i64) -> Rational {
        Rational {
            ratio: Ratio::from_integer(n),
        }
    }

    pub fn zero() -> Rational {
        Rational::from_integer(0)
    }

    pub fn one() -> Rational {
        Rational::from_integer(1)
    }

    fn from_ratio(ratio: Ratio<i64>) -> Option<Rational> {
        // keeps i64::MIN out such that negation stays infallible
        if *ratio.numer() == i64::MIN || *ratio.denom() == i64::MIN {
            None
        } else {
            Some(Rational { ratio })
        }
    }

    /// Approximates `x` by a truncated continued fraction.
    ///
    /// The expansion stops as soon as the current convergent is within `epsilon` of `x`, after
    /// `max_terms` terms, or when the next convergent would overflow. Returns `None` for
    /// non-finite input or when already the integer part does not fit into an `i64`.
    ///
    /// ```rust
    /// use calcex::Rational;
    /// let approx = Rational::from_f64(std::f64::consts::PI, 1e-12, 4).unwrap();
    /// assert_eq!((approx.numer(), approx.denom()), (355, 113));
    /// let coarse = Rational::from_f64(std::f64::consts::PI, 1e-2, 32).unwrap();
    /// assert_eq!((coarse.numer(), coarse.denom()), (22, 7));
    /// ```
    pub fn from_f64(x: f64, epsilon: f64, max_terms: usize) -> Option<Rational> {
        let limit = i64::MAX as f64;
        if !x.is_finite() || x.abs() >= limit {
            return None;
        }
        let int_part = x.floor();
        let mut rest = x - int_part;
        let (mut h_prev, mut k_prev) = (1i64, 0i64);
        let (mut h, mut k) = (int_part as i64, 1i64);
        let mut n_terms = 1;
        while n_terms < max_terms && rest != 0.0 && (h as f64 / k as f64 - x).abs() > epsilon {
            let inverted = 1.0 / rest;
            let term = inverted.floor();
            if term >= limit {
                break;
            }
            let a = term as i64;
            let h_next = a.checked_mul(h).and_then(|v| v.checked_add(h_prev));
            let k_next = a.checked_mul(k).and_then(|v| v.checked_add(k_prev));
            match (h_next, k_next) {
                (Some(hn), Some(kn)) => {
                    h_prev = h;
                    k_prev = k;
                    h = hn;
                    k = kn;
                }
                _ => break,
            }
            rest = inverted - term;
            n_terms += 1;
        }
        Rational::new(h, k).ok()
    }

    pub fn numer(&self) -> i64 {
        *self.ratio.numer()
    }

    pub fn denom(&self) -> i64 {
        *self.ratio.denom()
    }

    pub fn is_integer(&self) -> bool {
        self.ratio.is_integer()
    }

    pub fn is_zero(&self) -> bool {
        self.ratio.is_zero()
    }

    pub fn to_f64(&self) -> f64 {
        self.numer() as f64 / self.denom() as f64
    }

    pub fn checked_add(&self, other: &Rational) -> Option<Rational> {
        CheckedAdd::checked_add(&self.ratio, &other.ratio).and_then(Rational::from_ratio)
    }

    pub fn checked_sub(&self, other: &Rational) -> Option<Rational> {
        CheckedSub::checked_sub(&self.ratio, &other.ratio).and_then(Rational::from_ratio)
    }

    pub fn checked_mul(&self, other: &Rational) -> Option<Rational> {
        CheckedMul::checked_mul(&self.ratio, &other.ratio).and_then(Rational::from_ratio)
    }

    /// Returns `None` also for a zero divisor.
    pub fn checked_div(&self, other: &Rational) -> Option<Rational> {
        if other.is_zero() {
            None
        } else {
            CheckedDiv::checked_div(&self.ratio, &other.ratio).and_then(Rational::from_ratio)
        }
    }

    /// Remainder with the sign of the dividend, i.e., `a - b * trunc(a / b)`.
    pub fn checked_rem(&self, other: &Rational) -> Option<Rational> {
        let quotient = self.checked_div(other)?;
        let truncated = Rational::from_integer(quotient.ratio.trunc().to_integer());
        self.checked_sub(&truncated.checked_mul(other)?)
    }

    /// Exact power for integral exponents. Non-integral exponents yield `None` and the
    /// caller decides on a floating point fallback.
    pub fn checked_pow(&self, exponent: &Rational) -> Option<Rational> {
        if !exponent.is_integer() {
            return None;
        }
        let e = exponent.numer();
        let base = if e < 0 {
            Rational::one().checked_div(self)?
        } else {
            *self
        };
        let mut remaining = e.unsigned_abs();
        let mut result = Rational::one();
        let mut square = base;
        while remaining > 0 {
            if remaining & 1 == 1 {
                result = result.checked_mul(&square)?;
            }
            remaining >>= 1;
            if remaining > 0 {
                square = square.checked_mul(&square)?;
            }
        }
        Some(result)
    }

    pub fn neg(&self) -> Rational {
        // numerator is never i64::MIN
        Rational { ratio: -self.ratio }
    }

    pub fn abs(&self) -> Rational {
        if self.numer() < 0 {
            self.neg()
        } else {
            *self
        }
    }

    pub fn signum(&self) -> i64 {
        self.numer().signum()
    }

    pub fn floor(&self) -> Rational {
        Rational::from_integer(self.ratio.floor().to_integer())
    }

    pub fn ceil(&self) -> Rational {
        Rational::from_integer(self.ratio.ceil().to_integer())
    }

    pub fn trunc(&self) -> Rational {
        Rational::from_integer(self.ratio.trunc().to_integer())
    }
}

impl Ord for Rational {
    /// Compares cross products. Denominators are positive, so no sign flips are needed.
    fn cmp(&self, other: &Self) -> Ordering {
        let lhs = self.numer() as i128 * other.denom() as i128;
        let rhs = other.numer() as i128 * self.denom() as i128;
        lhs.cmp(&rhs)
    }
}

impl PartialOrd for Rational {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Rational {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Rational {}

impl Hash for Rational {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.numer().hash(state);
        self.denom().hash(state);
    }
}

impl Display for Rational {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        if self.denom() == 1 {
            write!(f, "{}", self.numer())
        } else {
            write!(f, "{}/{}", self.numer(), self.denom())
        }
    }
}

impl From<i64> for Rational {
    fn from(n: i64) -> Self {
        Rational::from_integer(n)
    }
}

impl From<Rational> for (i64, i64) {
    fn from(r: Rational) -> Self {
        (r.numer(), r.denom())
    }
}

impl TryFrom<(i64, i64)> for Rational {
    type Error = ExError;
    fn try_from((numer, denom): (i64, i64)) -> ExResult<Self> {
        Rational::new(numer, denom)
    }
}

#[cfg(test)]
mod test {
    use super::Rational;
    use crate::ExErrorKind;

    fn r(n: i64, d: i64) -> Rational {
        Rational::new(n, d).unwrap()
    }

    #[test]
    fn test_lowest_terms() {
        let x = r(6, -8);
        assert_eq!((x.numer(), x.denom()), (-3, 4));
        let x = r(-6, -8);
        assert_eq!((x.numer(), x.denom()), (3, 4));
        let x = r(0, -5);
        assert_eq!((x.numer(), x.denom()), (0, 1));
        assert_eq!(
            Rational::new(1, 0).unwrap_err().kind,
            ExErrorKind::Arithmetic
        );
        assert!(Rational::new(i64::MIN, 1).is_err());
    }

    #[test]
    fn test_exact_arithmetic() {
        let third = r(1, 3);
        let sum = third
            .checked_add(&third)
            .and_then(|s| s.checked_add(&third))
            .unwrap();
        assert_eq!(sum, Rational::one());
        assert_eq!(r(1, 2).checked_sub(&r(1, 3)), Some(r(1, 6)));
        assert_eq!(r(2, 3).checked_mul(&r(9, 4)), Some(r(3, 2)));
        assert_eq!(r(2, 3).checked_div(&r(4, 9)), Some(r(3, 2)));
        assert_eq!(r(2, 3).checked_div(&Rational::zero()), None);
        assert_eq!(r(7, 2).checked_rem(&r(1, 1)), Some(r(1, 2)));
        assert_eq!(r(-7, 2).checked_rem(&r(1, 1)), Some(r(-1, 2)));
        assert_eq!(
            Rational::from_integer(i64::MAX).checked_add(&Rational::one()),
            None
        );
    }

    #[test]
    fn test_pow() {
        assert_eq!(r(2, 3).checked_pow(&r(2, 1)), Some(r(4, 9)));
        assert_eq!(r(2, 3).checked_pow(&r(-2, 1)), Some(r(9, 4)));
        assert_eq!(r(5, 1).checked_pow(&Rational::zero()), Some(Rational::one()));
        assert_eq!(r(4, 1).checked_pow(&r(1, 2)), None);
        assert_eq!(Rational::zero().checked_pow(&r(-1, 1)), None);
        assert_eq!(r(10, 1).checked_pow(&r(40, 1)), None);
    }

    #[test]
    fn test_ordering() {
        assert!(r(1, 3) < r(1, 2));
        assert!(r(-1, 2) < r(-1, 3));
        assert!(r(i64::MAX, 3) > r(i64::MAX - 1, 3));
        assert_eq!(r(2, 4), r(1, 2));
    }

    #[test]
    fn test_from_f64() {
        let x = Rational::from_f64(0.75, 1e-12, 32).unwrap();
        assert_eq!((x.numer(), x.denom()), (3, 4));
        let x = Rational::from_f64(-0.5, 1e-12, 32).unwrap();
        assert_eq!((x.numer(), x.denom()), (-1, 2));
        let x = Rational::from_f64(0.1, 1e-12, 32).unwrap();
        assert_eq!((x.numer(), x.denom()), (1, 10));
        let x = Rational::from_f64(1.0 / 3.0, 1e-12, 32).unwrap();
        assert_eq!((x.numer(), x.denom()), (1, 3));
        let x = Rational::from_f64(std::f64::consts::PI, 0.0, 2).unwrap();
        assert_eq!((x.numer(), x.denom()), (22, 7));
        assert!(Rational::from_f64(f64::NAN, 1e-12, 32).is_none());
        assert!(Rational::from_f64(f64::INFINITY, 1e-12, 32).is_none());
        assert!(Rational::from_f64(1e300, 1e-12, 32).is_none());
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", r(3, 1)), "3");
        assert_eq!(format!("{}", r(-3, 6)), "-1/2");
    }
}
