//! Tools for interpreting spans as musical note values.

use crate::error::{ScoreError, ScoreResult};

use super::{Rational, Span};

/// Shortest note value the engine understands (1/128).
pub static LIMIT_DENOMINATOR: i64 = 128;

fn is_power_of_two(num: i64) -> bool {
    num > 0 && num & (num - 1) == 0
}

/// Largest power of two not greater than `num`.
fn power_of_two_floor(num: i64) -> i64 {
    if num < 1 {
        return 0;
    }
    1 << (63 - num.leading_zeros())
}

/// Number of dots of a note value.
///
/// A numerator `2^k - 1` means `k - 1` dots; the denominator has to be a
/// power of two.
///
/// ```
/// # use score_core::primitives::{Span, duration::get_dot_number};
/// assert_eq!(get_dot_number(Span::new(1, 4)).unwrap(), 0);
/// assert_eq!(get_dot_number(Span::new(3, 8)).unwrap(), 1);
/// assert_eq!(get_dot_number(Span::new(7, 8)).unwrap(), 2);
/// assert!(get_dot_number(Span::new(5, 8)).is_err());
/// ```
pub fn get_dot_number(span: Span) -> ScoreResult<u32> {
    let value = span.get();
    if value.numerator() < 1 || !is_power_of_two(value.denominator()) {
        return Err(ScoreError::IllegalDuration(value));
    }
    // breve and longa are whole numbers with an even numerator
    let numerator = match value.denominator() {
        1 => value.numerator() >> value.numerator().trailing_zeros(),
        _ => value.numerator(),
    };
    match is_power_of_two(numerator + 1) {
        true => Ok((numerator + 1).trailing_zeros() - 1),
        false => Err(ScoreError::IllegalDuration(value)),
    }
}

/// Note value without its dots: 3/8 → 1/4, 7/16 → 1/4.
pub fn get_undotted_value(span: Span) -> ScoreResult<Span> {
    let dots = get_dot_number(span)?;
    Ok(span.scaled(Rational::new(1 << dots, (1 << (dots + 1)) - 1)))
}

/// Inverse of [`get_undotted_value`] / [`get_dot_number`].
pub fn get_dotted_value(undotted: Span, dots: u32) -> Span {
    let factor = Rational::new((1 << (dots + 1)) - 1, 1 << dots);
    undotted.scaled(factor)
}

/// Read a duration token like `4`, `8.`, `2..` or `\breve`.
pub fn parse_duration(token: &str) -> ScoreResult<Span> {
    let malformed =
        || ScoreError::MalformedInput(format!("bad duration: `{token}`"));
    let value = token.trim_end_matches('.');
    let dots = (token.len() - value.len()) as u32;
    let undotted = match value {
        "\\breve" => Span::new(2, 1),
        "\\longa" => Span::new(4, 1),
        digits => {
            let denominator: i64 = digits.parse().map_err(|_| malformed())?;
            if !is_power_of_two(denominator)
                || denominator > LIMIT_DENOMINATOR
            {
                return Err(ScoreError::IllegalDuration(Rational::new(
                    1,
                    denominator.max(1),
                )));
            }
            Span::new(1, denominator)
        }
    };
    Ok(get_dotted_value(undotted, dots))
}

/// Split a span into dot-free note values that add up to it.
///
/// # Returns
///
/// Note values from the largest to the smallest.
///
/// ```
/// # use score_core::primitives::{Span, duration::decompose_span};
/// assert_eq!(
///     decompose_span(Span::new(13, 16)).unwrap(),
///     vec![Span::new(1, 2), Span::new(1, 4), Span::new(1, 16)]
/// );
/// ```
pub fn decompose_span(span: Span) -> ScoreResult<Vec<Span>> {
    let value = span.get();
    if value.is_negative() || !is_power_of_two(value.denominator()) {
        return Err(ScoreError::IllegalDuration(value));
    }
    let mut parts = Vec::new();
    let mut numerator = value.numerator();
    while numerator > 0 {
        let part = power_of_two_floor(numerator);
        parts.push(Span::new(part, value.denominator()));
        numerator -= part;
    }
    Ok(parts)
}
