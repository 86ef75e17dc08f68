//! Fixed-precision big-values.
//!
//! [`BigValue`] wraps an MPFR float (`rug::Float`) and pins down the handful
//! of operations the series engines need. Every operation rounds to nearest
//! at the precision of its left operand; values of one computation are all
//! created from the same [`Precision`], so mixed precisions never meet.
//!
//! Exact unbounded integers and rationals come straight from `rug`
//! ([`Integer`], [`Rational`]); [`BigValue::from_ratio`] is the only bridge
//! between the exact and the rounded world.

use rug::float::Round;
use rug::ops::{AddAssignRound, DivAssignRound, MulAssignRound, PowAssignRound, SubAssignRound};
use rug::{Float, Integer, Rational};
use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::precision::Precision;

/// Rounding applied by every big-value operation.
pub const ROUND: Round = Round::Nearest;

/// A floating value with a fixed mantissa precision.
///
/// # Example
///
/// ```
/// use pidecimals::{BigValue, Precision};
///
/// let p = Precision::new(128).unwrap();
/// let mut x = BigValue::from_u64(p, 1);
/// x.div_u64(3);
/// x.mul_u64(3);
/// assert!(x.agrees_within_ulps(&BigValue::from_u64(p, 1), 1));
/// ```
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub struct BigValue {
    inner: Float,
}

impl BigValue {
    /// Zero at the given precision.
    pub fn zero(precision: Precision) -> Self {
        BigValue {
            inner: Float::new(precision.bits()),
        }
    }

    /// An unsigned integer, rounded to the given precision.
    pub fn from_u64(precision: Precision, value: u64) -> Self {
        BigValue {
            inner: Float::with_val_round(precision.bits(), value, ROUND).0,
        }
    }

    /// A signed integer, rounded to the given precision.
    pub fn from_i64(precision: Precision, value: i64) -> Self {
        BigValue {
            inner: Float::with_val_round(precision.bits(), value, ROUND).0,
        }
    }

    /// An exact integer, rounded once to the given precision.
    pub fn from_integer(precision: Precision, value: &Integer) -> Self {
        BigValue {
            inner: Float::with_val_round(precision.bits(), value, ROUND).0,
        }
    }

    /// The exact rational `numerator / denominator`, rounded once.
    ///
    /// # Errors
    ///
    /// [`Error::DivisionByZero`] when the denominator is zero.
    pub fn from_ratio(
        precision: Precision,
        numerator: &Integer,
        denominator: &Integer,
    ) -> Result<Self> {
        if denominator.is_zero() {
            return Err(Error::DivisionByZero("exact ratio"));
        }
        let ratio = Rational::from((numerator.clone(), denominator.clone()));
        Ok(BigValue {
            inner: Float::with_val_round(precision.bits(), &ratio, ROUND).0,
        })
    }

    pub(crate) fn from_float(inner: Float) -> Self {
        BigValue { inner }
    }

    /// Mantissa precision in bits.
    pub fn precision_bits(&self) -> u32 {
        self.inner.prec()
    }

    /// Borrow the underlying MPFR value.
    pub fn as_float(&self) -> &Float {
        &self.inner
    }

    /// Whether the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.inner.is_zero()
    }

    /// Whether the value is neither NaN nor infinite.
    pub fn is_finite(&self) -> bool {
        self.inner.is_finite()
    }

    // ========================================================================
    // Arithmetic
    // ========================================================================

    /// `self += rhs`
    pub fn add_assign(&mut self, rhs: &BigValue) {
        self.inner.add_assign_round(&rhs.inner, ROUND);
    }

    /// `self -= rhs`
    pub fn sub_assign(&mut self, rhs: &BigValue) {
        self.inner.sub_assign_round(&rhs.inner, ROUND);
    }

    /// `self *= rhs`
    pub fn mul_assign(&mut self, rhs: &BigValue) {
        self.inner.mul_assign_round(&rhs.inner, ROUND);
    }

    /// `self /= rhs`
    pub fn div_assign(&mut self, rhs: &BigValue) {
        self.inner.div_assign_round(&rhs.inner, ROUND);
    }

    /// `self += rhs` for a machine integer.
    pub fn add_u64(&mut self, rhs: u64) {
        self.inner += rhs;
    }

    /// `self *= rhs` for a machine integer.
    pub fn mul_u64(&mut self, rhs: u64) {
        self.inner *= rhs;
    }

    /// `self /= rhs` for a machine integer.
    pub fn div_u64(&mut self, rhs: u64) {
        self.inner /= rhs;
    }

    /// Flip the sign in place. Exact.
    pub fn negate(&mut self) {
        rug::ops::NegAssign::neg_assign(&mut self.inner);
    }

    /// `self ^ exponent`.
    pub fn pow_u32(&self, exponent: u32) -> BigValue {
        let mut out = self.inner.clone();
        out.pow_assign_round(exponent, ROUND);
        BigValue { inner: out }
    }

    /// Square root.
    pub fn sqrt(&self) -> BigValue {
        let mut out = self.inner.clone();
        out.sqrt_round(ROUND);
        BigValue { inner: out }
    }

    /// Sum of two values, at the precision of `self`.
    pub fn sum(&self, rhs: &BigValue) -> BigValue {
        let mut out = self.clone();
        out.add_assign(rhs);
        out
    }

    /// Product of two values, at the precision of `self`.
    pub fn product(&self, rhs: &BigValue) -> BigValue {
        let mut out = self.clone();
        out.mul_assign(rhs);
        out
    }

    // ========================================================================
    // Comparison and formatting
    // ========================================================================

    /// Whether `self` and `other` differ by at most `ulps` units in the last
    /// place of `self`.
    ///
    /// Big-value addition is not associative under rounding, so sums over
    /// differently shaped decompositions are compared with this instead of
    /// `==`.
    pub fn agrees_within_ulps(&self, other: &BigValue, ulps: u32) -> bool {
        if !self.is_finite() || !other.is_finite() {
            return false;
        }
        let mut diff = Float::with_val(self.inner.prec(), &self.inner - &other.inner);
        diff.abs_mut();
        let Some(exp) = self.inner.get_exp() else {
            // self is zero: only an exact zero agrees
            return diff.is_zero();
        };
        let mut bound = Float::with_val(64, ulps);
        bound <<= exp - self.inner.prec() as i32;
        diff.partial_cmp(&bound) != Some(Ordering::Greater)
    }

    /// Render in base 10 with `digits` significant digits.
    pub fn to_decimal_string(&self, digits: usize) -> String {
        self.inner.to_string_radix(10, Some(digits.max(1)))
    }

    /// Nearest `f64`, for logging.
    pub fn to_f64(&self) -> f64 {
        self.inner.to_f64()
    }
}

impl std::fmt::Display for BigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.inner, f)
    }
}

/// `n!` as an exact integer.
pub fn factorial(n: u32) -> Integer {
    Integer::from(Integer::factorial(n))
}

#[cfg(test)]
mod tests {
    use rug::ops::Pow;

    use super::*;

    fn p(bits: u64) -> Precision {
        Precision::new(bits).unwrap()
    }

    #[test]
    fn zero_is_zero() {
        let z = BigValue::zero(p(256));
        assert!(z.is_zero());
        assert_eq!(z.precision_bits(), 256);
    }

    #[test]
    fn integer_construction_is_exact_when_it_fits() {
        let x = BigValue::from_u64(p(64), u64::MAX);
        assert_eq!(*x.as_float(), u64::MAX);
        let y = BigValue::from_i64(p(64), -640_320);
        assert_eq!(*y.as_float(), -640_320);
    }

    #[test]
    fn ratio_rounds_once() {
        let third = BigValue::from_ratio(p(200), &Integer::from(1), &Integer::from(3)).unwrap();
        let mut manual = BigValue::from_u64(p(200), 1);
        manual.div_u64(3);
        assert_eq!(third, manual);
    }

    #[test]
    fn ratio_with_zero_denominator_fails() {
        let err = BigValue::from_ratio(p(64), &Integer::from(1), &Integer::new()).unwrap_err();
        assert!(matches!(err, Error::DivisionByZero(_)));
    }

    #[test]
    fn negative_cube_power() {
        let c = BigValue::from_i64(p(128), -640_320);
        let cube = c.pow_u32(3);
        let expected = Integer::from(-640_320i64).pow(3u32);
        assert_eq!(cube, BigValue::from_integer(p(128), &expected));
        assert_eq!(c.pow_u32(0), BigValue::from_u64(p(128), 1));
    }

    #[test]
    fn sqrt_of_square() {
        let nine = BigValue::from_u64(p(128), 9);
        assert_eq!(nine.sqrt(), BigValue::from_u64(p(128), 3));
    }

    #[test]
    fn negate_is_exact() {
        let mut x = BigValue::from_u64(p(64), 7);
        x.negate();
        assert_eq!(x, BigValue::from_i64(p(64), -7));
    }

    #[test]
    fn ulp_agreement() {
        let one = BigValue::from_u64(p(64), 1);
        let mut nudged = one.clone();
        let mut tiny = BigValue::from_u64(p(64), 1);
        // one ulp of 1.0 at 64 bits is 2^-63
        for _ in 0..63 {
            tiny.div_u64(2);
        }
        nudged.add_assign(&tiny);
        assert_ne!(one, nudged);
        assert!(one.agrees_within_ulps(&nudged, 1));
        assert!(!one.agrees_within_ulps(&nudged.sum(&tiny).sum(&tiny), 1));
        assert!(BigValue::zero(p(64)).agrees_within_ulps(&BigValue::zero(p(64)), 0));
    }

    #[test]
    fn decimal_rendering() {
        let x = BigValue::from_u64(p(64), 25);
        assert!(x.to_decimal_string(3).starts_with("25"));
    }

    #[test]
    fn factorials() {
        assert_eq!(factorial(0), 1);
        assert_eq!(factorial(10), 3_628_800);
    }
}
