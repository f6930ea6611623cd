//! Fixed-point decimal with four fractional digits.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

const SCALE: i64 = 10_000;
const DIGITS: usize = 4;

/// A decimal stored as an `i64` scaled by 10^4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Decimal(i64);

impl Decimal {
    pub fn from_scaled(value: i64) -> Self {
        Decimal(value)
    }

    pub fn scaled(&self) -> i64 {
        self.0
    }
}

impl FromStr for Decimal {
    type Err = String;

    /// Parses `-?[0-9]+\.[0-9]{1,4}`. The value must fit the scaled range.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let Some((whole, frac)) = body.split_once('.') else {
            return Err(format!("`{s}` is missing a decimal point"));
        };
        let all_digits = |p: &str| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !all_digits(frac) {
            return Err(format!("`{s}` is not a well-formed decimal value"));
        }
        if frac.len() > DIGITS {
            return Err(format!("`{s}` has too many digits after the decimal point"));
        }

        let overflow = || format!("`{s}` is out of range for a decimal");
        let mut value: i64 = 0;
        for b in whole.bytes().chain(frac.bytes()) {
            let digit = i64::from(b - b'0');
            // Accumulate toward the sign so i64::MIN / SCALE still parses.
            value = value
                .checked_mul(10)
                .and_then(|v| {
                    if negative {
                        v.checked_sub(digit)
                    } else {
                        v.checked_add(digit)
                    }
                })
                .ok_or_else(overflow)?;
        }
        for _ in frac.len()..DIGITS {
            value = value.checked_mul(10).ok_or_else(overflow)?;
        }
        Ok(Decimal(value))
    }
}

impl Display for Decimal {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let whole = magnitude / SCALE as u64;
        let frac = format!("{:04}", magnitude % SCALE as u64);
        let frac = frac.trim_end_matches('0');
        let frac = if frac.is_empty() { "0" } else { frac };
        write!(f, "{sign}{whole}.{frac}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[parameterized(
        integer_part = { "1.0", 10_000 },
        four_digits = { "1.2345", 12_345 },
        negative = { "-0.5", -5_000 },
        leading_zeros = { "007.10", 71_000 },
        max = { "922337203685477.5807", i64::MAX },
        min = { "-922337203685477.5808", i64::MIN },
    )]
    fn test_parse(s: &str, scaled: i64) {
        assert_eq!(s.parse::<Decimal>().unwrap().scaled(), scaled);
    }

    #[parameterized(
        no_point = { "1" },
        no_fraction = { "1." },
        no_whole = { ".5" },
        too_precise = { "1.23456" },
        overflow = { "922337203685477.5808" },
        junk = { "1.2a" },
        double_sign = { "--1.0" },
        empty = { "" },
    )]
    fn test_parse_rejects(s: &str) {
        assert!(s.parse::<Decimal>().is_err());
    }

    #[parameterized(
        whole = { 10_000, "1.0" },
        trimmed = { 12_300, "1.23" },
        negative_fraction = { -5, "-0.0005" },
        min = { i64::MIN, "-922337203685477.5808" },
    )]
    fn test_display(scaled: i64, expected: &str) {
        assert_eq!(Decimal::from_scaled(scaled).to_string(), expected);
    }

    #[test]
    fn test_ordering() {
        let a: Decimal = "1.5".parse().unwrap();
        let b: Decimal = "-2.25".parse().unwrap();
        assert!(b < a);
    }
}
