//! Correct-decimals diagnostic.
//!
//! Compares a computed value against a reference expansion of pi and counts
//! how many leading decimals (after `"3."`) agree.

use std::path::Path;

use crate::big::BigValue;
use crate::error::Result;

/// The first 10 000 decimals of pi, as `"3.1415..."`.
pub const PI_REFERENCE: &str = include_str!("../resources/pi_reference.txt");

/// Number of leading decimals of `value` that match `reference`.
///
/// Both sides are compared after their `"3."` prefix. A value outside
/// `[2, 4)` matches zero decimals whatever its leading digits, so
/// `3.14159e-5` is not mistaken for pi. The comparison never looks past the
/// digits the value's precision can carry.
///
/// # Example
///
/// ```
/// use pidecimals::{matching_decimals, BigValue, Precision};
///
/// let p = Precision::new(64).unwrap();
/// let mut approx = BigValue::from_u64(p, 22);
/// approx.div_u64(7);
/// assert_eq!(matching_decimals(&approx, "3.1415926"), 2);
/// ```
pub fn matching_decimals(value: &BigValue, reference: &str) -> usize {
    let Some(expected) = reference.trim().strip_prefix("3.") else {
        return 0;
    };
    // pi lies in [2, 4), binary exponent 2
    if value.as_float().get_exp() != Some(2) {
        return 0;
    }
    let significant = expected.len().min(precision_digits(value)) + 2;
    let rendered = value.to_decimal_string(significant);
    let mut parts = rendered.split(['e', '@']);
    let mantissa = parts.next().unwrap_or_default();
    if parts.next().is_some_and(|exp| exp.parse::<i64>() != Ok(0)) {
        return 0;
    }
    let Some(computed) = mantissa.strip_prefix("3.") else {
        return 0;
    };
    computed
        .bytes()
        .zip(expected.bytes())
        .take_while(|(a, b)| a == b)
        .count()
}

/// Read a reference expansion from a text file.
pub fn read_reference(path: &Path) -> Result<String> {
    Ok(std::fs::read_to_string(path)?.trim().to_string())
}

fn precision_digits(value: &BigValue) -> usize {
    (f64::from(value.precision_bits()) * std::f64::consts::LOG10_2).ceil() as usize
}

#[cfg(test)]
mod tests {
    use rug::float::Constant;
    use rug::{Float, Integer};

    use super::*;
    use crate::precision::Precision;

    #[test]
    fn reference_is_well_formed() {
        let reference = PI_REFERENCE.trim();
        assert!(reference.starts_with("3.14159265358979323846"));
        assert_eq!(reference.len(), 2 + 10_000);
        assert!(reference[2..].bytes().all(|b| b.is_ascii_digit()));
    }

    #[test]
    fn f64_pi_matches_about_fifteen_decimals() {
        let p = Precision::new(53).unwrap();
        let value = BigValue::from_float(rug::Float::with_val(53, std::f64::consts::PI));
        assert_eq!(value.precision_bits(), p.bits());
        let matched = matching_decimals(&value, PI_REFERENCE);
        assert!((14..=16).contains(&matched), "matched {matched}");
    }

    #[test]
    fn non_pi_values_match_nothing() {
        let p = Precision::new(64).unwrap();
        assert_eq!(matching_decimals(&BigValue::from_u64(p, 4), PI_REFERENCE), 0);
        assert_eq!(matching_decimals(&BigValue::zero(p), PI_REFERENCE), 0);
        assert_eq!(matching_decimals(&BigValue::from_u64(p, 3), "2.71828"), 0);
    }

    #[test]
    fn scaled_pi_matches_nothing() {
        let p = Precision::new(128).unwrap();
        let digits = Integer::from(314_159);
        // 3.14159e-5 and 3.14159e5 share every leading digit with pi
        let small = BigValue::from_ratio(p, &digits, &Integer::from(10_000_000_000u64)).unwrap();
        let large = BigValue::from_ratio(p, &digits, &Integer::from(1)).unwrap();
        assert_eq!(matching_decimals(&small, PI_REFERENCE), 0);
        assert_eq!(matching_decimals(&large, PI_REFERENCE), 0);

        let pi = Float::with_val(p.bits(), Constant::Pi);
        assert!(matching_decimals(&BigValue::from_float(pi.clone()), PI_REFERENCE) >= 35);
        let shifted = BigValue::from_float(pi / 100_000u32);
        assert_eq!(matching_decimals(&shifted, PI_REFERENCE), 0);
    }
}
