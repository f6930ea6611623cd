//! Millisecond-precision datetimes and signed durations.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

const MS_PER_SECOND: i64 = 1_000;
const MS_PER_MINUTE: i64 = 60 * MS_PER_SECOND;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// `0000-01-01T00:00:00.000Z`
const MIN_DATETIME_MS: i64 = -62_167_219_200_000;
/// `9999-12-31T23:59:59.999Z`
const MAX_DATETIME_MS: i64 = 253_402_300_799_999;

static DATETIME_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d{4})-(\d{2})-(\d{2})(?:T(\d{2}):(\d{2}):(\d{2})(?:\.(\d{3}))?(Z|[+-]\d{4}))?$",
    )
    .unwrap_or_else(|e| unreachable!("static datetime pattern: {e}"))
});

static DURATION_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-)?(?:(\d+)d)?(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?(?:(\d+)ms)?$")
        .unwrap_or_else(|e| unreachable!("static duration pattern: {e}"))
});

/// Milliseconds since the Unix epoch, UTC. Always within years 0000 to
/// 9999, the span the text form can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Datetime(i64);

impl Datetime {
    /// `None` outside the representable span.
    pub fn from_millis(ms: i64) -> Option<Self> {
        (MIN_DATETIME_MS..=MAX_DATETIME_MS)
            .contains(&ms)
            .then_some(Datetime(ms))
    }

    pub fn millis(&self) -> i64 {
        self.0
    }

    pub fn offset(&self, by: Duration) -> Option<Datetime> {
        self.0.checked_add(by.0).and_then(Datetime::from_millis)
    }

    pub fn duration_since(&self, other: Datetime) -> Option<Duration> {
        self.0.checked_sub(other.0).map(Duration)
    }

    /// Truncate to midnight UTC, rounding toward negative infinity.
    pub fn to_date(&self) -> Datetime {
        Datetime(self.0.div_euclid(MS_PER_DAY) * MS_PER_DAY)
    }

    /// Time elapsed since midnight UTC of the same day.
    pub fn to_time(&self) -> Duration {
        Duration(self.0.rem_euclid(MS_PER_DAY))
    }
}

impl FromStr for Datetime {
    type Err = String;

    /// Accepts `YYYY-MM-DD`, optionally followed by
    /// `Thh:mm:ss[.SSS]` and either `Z` or a `+hhmm`/`-hhmm` offset.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("`{s}` is not a valid datetime");
        let caps = DATETIME_FORMAT.captures(s).ok_or_else(invalid)?;
        let num = |i: usize| -> u32 {
            caps.get(i)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0)
        };

        let date = NaiveDate::from_ymd_opt(num(1) as i32, num(2), num(3)).ok_or_else(invalid)?;
        let time = NaiveTime::from_hms_milli_opt(num(4), num(5), num(6), num(7))
            .ok_or_else(invalid)?;
        let local = date.and_time(time).and_utc().timestamp_millis();

        let offset = match caps.get(8).map(|m| m.as_str()) {
            None | Some("Z") => 0,
            Some(tz) => {
                let hours: i64 = tz[1..3].parse().map_err(|_| invalid())?;
                let minutes: i64 = tz[3..5].parse().map_err(|_| invalid())?;
                if hours >= 24 || minutes >= 60 {
                    return Err(invalid());
                }
                let magnitude = hours * MS_PER_HOUR + minutes * MS_PER_MINUTE;
                if tz.starts_with('-') { -magnitude } else { magnitude }
            }
        };
        local
            .checked_sub(offset)
            .and_then(Datetime::from_millis)
            .ok_or_else(invalid)
    }
}

impl Display for Datetime {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match DateTime::from_timestamp_millis(self.0) {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%.3fZ")),
            None => unreachable!("datetime {}ms is outside chrono's range", self.0),
        }
    }
}

/// A signed span of milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Duration(i64);

impl Duration {
    pub fn from_millis(ms: i64) -> Self {
        Duration(ms)
    }

    pub fn to_milliseconds(&self) -> i64 {
        self.0
    }

    pub fn to_seconds(&self) -> i64 {
        self.0 / MS_PER_SECOND
    }

    pub fn to_minutes(&self) -> i64 {
        self.0 / MS_PER_MINUTE
    }

    pub fn to_hours(&self) -> i64 {
        self.0 / MS_PER_HOUR
    }

    pub fn to_days(&self) -> i64 {
        self.0 / MS_PER_DAY
    }
}

impl FromStr for Duration {
    type Err = String;

    /// Accepts an optional `-` then one or more of `Nd`, `Nh`, `Nm`, `Ns`,
    /// `Nms`, each at most once and in that order.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || format!("`{s}` is not a valid duration");
        let caps = DURATION_FORMAT.captures(s).ok_or_else(invalid)?;
        let negative = caps.get(1).is_some();
        let units = [MS_PER_DAY, MS_PER_HOUR, MS_PER_MINUTE, MS_PER_SECOND, 1];

        let mut total: i64 = 0;
        let mut seen = false;
        for (idx, unit) in units.iter().enumerate() {
            let Some(m) = caps.get(idx + 2) else {
                continue;
            };
            seen = true;
            let amount: i64 = m.as_str().parse().map_err(|_| invalid())?;
            let part = amount.checked_mul(*unit).ok_or_else(invalid)?;
            total = if negative {
                total.checked_sub(part)
            } else {
                total.checked_add(part)
            }
            .ok_or_else(invalid)?;
        }
        if !seen {
            return Err(invalid());
        }
        Ok(Duration(total))
    }
}

impl Display for Duration {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.0 == 0 {
            return f.write_str("0ms");
        }
        if self.0 < 0 {
            f.write_str("-")?;
        }
        let mut rest = self.0.unsigned_abs();
        for (unit, suffix) in [
            (MS_PER_DAY, "d"),
            (MS_PER_HOUR, "h"),
            (MS_PER_MINUTE, "m"),
            (MS_PER_SECOND, "s"),
            (1, "ms"),
        ] {
            let unit = unit as u64;
            if rest >= unit {
                write!(f, "{}{suffix}", rest / unit)?;
                rest %= unit;
            }
        }
        Ok(())
    }
}
