//! Everything needed to manipulate durations and positions of events.
//!
//! There are two kinds of musical time, and they never mix:
//!
//! - [`Span`] is a duration (how long something lasts).
//! - [`Absolute`] is a distance from the start of a voice.
//!
//! Only the meaningful operations exist: a position plus a span is a
//! position, the difference of two positions is a span. Adding two
//! positions does not compile.
//!
//! ```
//! use score_core::primitives::{Absolute, Span, Time};
//!
//! let start = Absolute::new(1, 4);
//! let end = Time::add_time(start, Span::new(3, 8));
//! assert_eq!(end, Absolute::new(5, 8));
//! assert_eq!(Time::get_span(start, end), Span::new(3, 8));
//! ```
//!
//! ```compile_fail
//! use score_core::primitives::Absolute;
//! let _ = Absolute::new(1, 4) + Absolute::new(1, 4);
//! ```

use std::{
    cmp::Ordering,
    fmt,
    ops::{Add, AddAssign, Sub},
};

use serde::{Deserialize, Serialize};

use crate::error::ScoreResult;

use super::Rational;

/// Duration in whole notes.
#[derive(
    Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Default, Serialize, Deserialize,
)]
pub struct Span(Rational);
impl Span {
    pub const ZERO: Span = Span(Rational::ZERO);

    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self(Rational::new(numerator, denominator))
    }
    pub fn get(&self) -> Rational {
        self.0
    }
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
    /// Augmentation / diminution.
    pub fn scaled(&self, factor: Rational) -> Self {
        Self(self.0.mul(factor))
    }
    pub fn checked_scaled(&self, factor: Rational) -> ScoreResult<Self> {
        Ok(Self(self.0.checked_mul(factor)?))
    }
    pub fn checked_add(self, other: Self) -> ScoreResult<Self> {
        Ok(Self(self.0.checked_add(other.0)?))
    }
    /// Sum in iteration order, failing on the first overflow.
    pub fn checked_sum(spans: impl IntoIterator<Item = Span>) -> ScoreResult<Self> {
        spans
            .into_iter()
            .try_fold(Span::ZERO, |total, span| total.checked_add(span))
    }
}
impl From<Rational> for Span {
    fn from(value: Rational) -> Self {
        Self(value)
    }
}
impl Add for Span {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.add(rhs.0))
    }
}
impl AddAssign for Span {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.add(rhs.0)
    }
}
impl Sub for Span {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.sub(rhs.0))
    }
}
impl std::iter::Sum for Span {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Span::ZERO, |acc, span| acc + span)
    }
}
impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Position in whole notes from the start of a voice.
#[derive(
    Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Default, Serialize, Deserialize,
)]
pub struct Absolute(Rational);
impl Absolute {
    pub const ZERO: Absolute = Absolute(Rational::ZERO);

    pub fn new(numerator: i64, denominator: i64) -> Self {
        Self(Rational::new(numerator, denominator))
    }
    pub fn get(&self) -> Rational {
        self.0
    }
}
impl From<Rational> for Absolute {
    fn from(value: Rational) -> Self {
        Self(value)
    }
}
impl Add<Span> for Absolute {
    type Output = Self;
    fn add(self, rhs: Span) -> Self::Output {
        Self(self.0.add(rhs.0))
    }
}
impl AddAssign<Span> for Absolute {
    fn add_assign(&mut self, rhs: Span) {
        self.0 = self.0.add(rhs.0)
    }
}
impl Sub<Span> for Absolute {
    type Output = Self;
    fn sub(self, rhs: Span) -> Self::Output {
        Self(self.0.sub(rhs.0))
    }
}
impl Sub for Absolute {
    type Output = Span;
    fn sub(self, rhs: Self) -> Self::Output {
        Span(self.0.sub(rhs.0))
    }
}
impl fmt::Display for Absolute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Free-standing forms of the time operations.
pub struct Time;
impl Time {
    pub fn add_time(time: Absolute, span: Span) -> Absolute {
        time + span
    }
    pub fn get_span(from: Absolute, to: Absolute) -> Span {
        to - from
    }
}

/// Tiers for ordering events sharing one rational instant.
pub mod tier {
    pub const GRACE_AFTER: i32 = -20000;
    pub const BAR: i32 = -15000;
    pub const STATE: i32 = -15000;
    pub const GRACE_BEFORE: i32 = -10000;
    pub const NOTE: i32 = 0;
}

/// Absolute time plus an ordering tier for events at the same instant.
///
/// Tiers are only meaningful between equal positions.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
pub struct ExtendedAbsolute {
    pub time: Absolute,
    pub tier: i32,
}
impl ExtendedAbsolute {
    pub fn new(time: Absolute, tier: i32) -> Self {
        Self { time, tier }
    }
    pub fn note(time: Absolute) -> Self {
        Self::new(time, tier::NOTE)
    }
    pub fn state(time: Absolute) -> Self {
        Self::new(time, tier::STATE)
    }
    pub fn grace_before(time: Absolute, index: usize) -> Self {
        Self::new(time, tier::GRACE_BEFORE + index as i32)
    }
    pub fn grace_after(time: Absolute, index: usize) -> Self {
        Self::new(time, tier::GRACE_AFTER + index as i32)
    }
}
impl PartialOrd for ExtendedAbsolute {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for ExtendedAbsolute {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then(self.tier.cmp(&other.tier))
    }
}
impl From<Absolute> for ExtendedAbsolute {
    fn from(value: Absolute) -> Self {
        Self::note(value)
    }
}
impl fmt::Display for ExtendedAbsolute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tier {
            0 => write!(f, "{}", self.time),
            tier => write!(f, "{}[{}]", self.time, tier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Absolute, ExtendedAbsolute, Span, Time};

    #[test]
    fn position_and_span() {
        let a = Absolute::new(3, 4);
        let b = Time::add_time(a, Span::new(1, 8));
        assert_eq!(b, Absolute::new(7, 8));
        assert_eq!(b - a, Span::new(1, 8));
        assert_eq!(Time::get_span(b, a), Span::new(-1, 8));
        let total: Span = [Span::new(1, 4), Span::new(1, 8), Span::new(1, 8)]
            .into_iter()
            .sum();
        assert_eq!(total, Span::new(1, 2));
    }

    #[test]
    fn extended_ordering() {
        let t = Absolute::new(1, 4);
        let mut times = vec![
            ExtendedAbsolute::note(t),
            ExtendedAbsolute::grace_before(t, 1),
            ExtendedAbsolute::state(t),
            ExtendedAbsolute::grace_before(t, 0),
            ExtendedAbsolute::grace_after(t, 0),
            ExtendedAbsolute::note(Absolute::new(1, 8)),
        ];
        times.sort();
        assert_eq!(
            times,
            vec![
                ExtendedAbsolute::note(Absolute::new(1, 8)),
                ExtendedAbsolute::grace_after(t, 0),
                ExtendedAbsolute::state(t),
                ExtendedAbsolute::grace_before(t, 0),
                ExtendedAbsolute::grace_before(t, 1),
                ExtendedAbsolute::note(t),
            ]
        );
    }
}
