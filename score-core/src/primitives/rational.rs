//! Exact fractions for musical time.
//!
//! Durations and positions are never floats. [`Rational`] is a finite
//! [`Fraction`] whose numerator and denominator fit into `i64`. Comparison
//! and hashing are by value, so unreduced values compare equal to their
//! reduced forms.
//!
//! The operators overflow like integer arithmetic does. Values computed
//! from user input go through the `checked_*` forms, which report an
//! overflow as [`ScoreError::InternalInvariantViolation`].
//!
//! ```
//! use score_core::primitives::Rational;
//!
//! let a = Rational::new(1, 8);
//! let b = Rational::new(3, 8);
//! assert_eq!(a.add(b), Rational::new(1, 2));
//! assert_eq!(Rational::raw(4, 8).shorten().denominator(), 2);
//! assert!(a < b);
//! assert!(Rational::new(1, i64::MAX).checked_mul(a).is_err());
//! ```

use std::{
    cmp::Ordering,
    fmt,
    ops::{Add, Mul, Neg, Sub},
    str::FromStr,
};

use fraction::{
    CheckedAdd, CheckedDiv, CheckedMul, CheckedSub, Fraction, GenericFraction,
    Integer, Ratio, Sign, Zero,
};
use serde::{Deserialize, Serialize};

use crate::error::{ScoreError, ScoreResult};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "RationalRepr", try_from = "RationalRepr")]
pub struct Rational(Fraction);

#[derive(Serialize, Deserialize)]
struct RationalRepr {
    numerator: i64,
    denominator: i64,
}
impl From<Rational> for RationalRepr {
    fn from(value: Rational) -> Self {
        let reduced = value.shorten();
        Self {
            numerator: reduced.numerator(),
            denominator: reduced.denominator(),
        }
    }
}
impl TryFrom<RationalRepr> for Rational {
    type Error = String;
    fn try_from(value: RationalRepr) -> Result<Self, Self::Error> {
        if value.denominator == 0 {
            return Err("rational denominator can not be zero".to_string());
        }
        Ok(Self::new(value.numerator, value.denominator))
    }
}

/// Largest magnitude of numerator and denominator.
const LIMIT: u64 = i64::MAX as u64;

impl Rational {
    pub const ZERO: Rational = Rational(Fraction::new_raw(0, 1));
    pub const ONE: Rational = Rational(Fraction::new_raw(1, 1));

    /// Reduced rational. Panics on zero denominator, which is always a
    /// programming error (user input goes through the text reader).
    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self::raw(numerator, denominator).shorten()
    }

    /// Rational as given, only the sign is moved to the numerator.
    pub fn raw(numerator: i64, denominator: i64) -> Self {
        assert!(denominator != 0, "rational with zero denominator");
        let sign = match (numerator < 0) == (denominator < 0) {
            true => Sign::Plus,
            false => Sign::Minus,
        };
        Self(Fraction::new_raw_signed(
            sign,
            numerator.unsigned_abs(),
            denominator.unsigned_abs(),
        ))
    }

    pub fn from_integer(value: i64) -> Self {
        Self::raw(value, 1)
    }

    /// Finite fraction in the `i64` range.
    fn bounded(value: Fraction) -> Option<Self> {
        match (value.numer(), value.denom()) {
            (Some(n), Some(d)) if *n <= LIMIT && *d <= LIMIT && *d > 0 => {
                Some(Self(value))
            }
            _ => None,
        }
    }

    fn overflow(self, operation: &str, other: Self) -> ScoreError {
        ScoreError::InternalInvariantViolation(format!(
            "{self} {operation} {other} is out of the rational range"
        ))
    }

    pub fn numerator(&self) -> i64 {
        let magnitude = self
            .0
            .numer()
            .map_or(0, |n| i64::try_from(*n).unwrap_or(i64::MAX));
        match self.is_negative() {
            true => -magnitude,
            false => magnitude,
        }
    }
    pub fn denominator(&self) -> i64 {
        self.0
            .denom()
            .map_or(1, |d| i64::try_from(*d).unwrap_or(i64::MAX))
    }

    /// Reduce by the greatest common divisor.
    pub fn shorten(self) -> Self {
        match self.0 {
            GenericFraction::Rational(sign, ratio) => Self(GenericFraction::Rational(
                sign,
                Ratio::new(*ratio.numer(), *ratio.denom()),
            )),
            _ => self,
        }
    }

    pub fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }

    pub fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }

    pub fn mul(self, other: Self) -> Self {
        Self(self.0 * other.0)
    }

    pub fn checked_add(self, other: Self) -> ScoreResult<Self> {
        self.0
            .checked_add(&other.0)
            .and_then(Self::bounded)
            .ok_or_else(|| self.overflow("+", other))
    }

    pub fn checked_sub(self, other: Self) -> ScoreResult<Self> {
        self.0
            .checked_sub(&other.0)
            .and_then(Self::bounded)
            .ok_or_else(|| self.overflow("-", other))
    }

    pub fn checked_mul(self, other: Self) -> ScoreResult<Self> {
        self.0
            .checked_mul(&other.0)
            .and_then(Self::bounded)
            .ok_or_else(|| self.overflow("*", other))
    }

    /// Multiply by `numerator / denominator`.
    pub fn scale(self, numerator: i64, denominator: i64) -> Self {
        self.mul(Self::new(numerator, denominator))
    }

    /// Sign of `self - other`, computed without floating point or overflow.
    pub fn compare(&self, other: &Self) -> i32 {
        match self.0.cmp(&other.0) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// # Errors
    ///
    /// [`ScoreError::MalformedInput`] for zero.
    pub fn checked_recip(self) -> ScoreResult<Self> {
        match self.is_zero() {
            true => Err(ScoreError::MalformedInput(
                "zero has no reciprocal".to_string(),
            )),
            false => Ok(Self(self.0.recip())),
        }
    }

    /// Panics when dividing by zero.
    pub fn div(self, other: Self) -> Self {
        assert!(!other.is_zero(), "rational division by zero");
        Self(self.0 / other.0)
    }

    pub fn checked_div(self, other: Self) -> ScoreResult<Self> {
        self.0
            .checked_div(&other.0)
            .and_then(Self::bounded)
            .ok_or_else(|| self.overflow("/", other))
    }

    /// Largest integer not greater than the value.
    pub fn floor(&self) -> i64 {
        Self(self.0.floor()).numerator()
    }

    pub fn max(self, other: Self) -> Self {
        Ord::max(self, other)
    }
}

/// GCD(0, n) is n; the result is never negative.
pub fn gcd(a: i64, b: i64) -> i64 {
    a.gcd(&b)
}

impl Default for Rational {
    fn default() -> Self {
        Self::ZERO
    }
}
impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator(), self.denominator())
    }
}

impl Add for Rational {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Rational::add(self, rhs)
    }
}
impl Sub for Rational {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Rational::sub(self, rhs)
    }
}
impl Mul for Rational {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self::Output {
        Rational::mul(self, rhs)
    }
}
impl Neg for Rational {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

impl FromStr for Rational {
    type Err = ScoreError;

    /// Read `n/d` or a plain integer.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed =
            || ScoreError::MalformedInput(format!("bad rational: `{s}`"));
        let (numerator, denominator) = match s.split_once('/') {
            Some((n, d)) => (n.trim(), d.trim()),
            None => (s.trim(), "1"),
        };
        let numerator: i64 = numerator.parse().map_err(|_| malformed())?;
        let denominator: i64 = denominator.parse().map_err(|_| malformed())?;
        if denominator == 0 {
            return Err(malformed());
        }
        Ok(Self::new(numerator, denominator))
    }
}

impl From<i64> for Rational {
    fn from(value: i64) -> Self {
        Self::from_integer(value)
    }
}
impl From<Rational> for Fraction {
    fn from(value: Rational) -> Self {
        value.0
    }
}
impl TryFrom<Fraction> for Rational {
    type Error = String;
    fn try_from(value: Fraction) -> Result<Self, Self::Error> {
        Self::bounded(value)
            .map(Self::shorten)
            .ok_or_else(|| format!("fraction is not a finite i64 rational: {value}"))
    }
}
