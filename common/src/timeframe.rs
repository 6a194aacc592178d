use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::BacktestError;

const SECONDS_PER_YEAR: u64 = 365 * 86_400;
/// Longest duration `chrono` can represent, in whole seconds
const MAX_SECONDS: u64 = (i64::MAX / 1_000) as u64;

/// Bar duration, stored in whole seconds.
///
/// Parses `1m`, `5min`, `15m`, `1h`, `4H`, `1d`, `1w` (case-insensitive unit,
/// bare numbers are minutes) and displays in the shortest canonical unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timeframe {
    seconds: u64,
}

impl Timeframe {
    /// `None` for zero or for durations too long to represent
    pub fn from_seconds(seconds: u64) -> Option<Self> {
        (seconds > 0 && seconds <= MAX_SECONDS).then_some(Self { seconds })
    }

    /// `n` units of `unit_seconds`, saturating at the longest representable timeframe
    fn saturating(n: u64, unit_seconds: u64) -> Self {
        Self {
            seconds: n.max(1).saturating_mul(unit_seconds).min(MAX_SECONDS),
        }
    }

    pub fn minutes(n: u64) -> Self {
        Self::saturating(n, 60)
    }

    pub fn hours(n: u64) -> Self {
        Self::saturating(n, 3_600)
    }

    pub fn days(n: u64) -> Self {
        Self::saturating(n, 86_400)
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.seconds as i64)
    }

    /// Bars per year used for annualizing ratios; never below 1.
    pub fn periods_per_year(&self) -> f64 {
        (SECONDS_PER_YEAR / self.seconds).max(1) as f64
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        if s % 604_800 == 0 {
            write!(f, "{}w", s / 604_800)
        } else if s % 86_400 == 0 {
            write!(f, "{}d", s / 86_400)
        } else if s % 3_600 == 0 {
            write!(f, "{}h", s / 3_600)
        } else if s % 60 == 0 {
            write!(f, "{}m", s / 60)
        } else {
            write!(f, "{}s", s)
        }
    }
}

impl FromStr for Timeframe {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let split = raw
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(raw.len());
        let (digits, unit) = raw.split_at(split);

        let count: u64 = digits
            .parse()
            .map_err(|_| BacktestError::InvalidTimeframe(s.to_string()))?;

        let unit_seconds = match unit.trim().to_lowercase().as_str() {
            "s" | "sec" | "secs" => 1,
            "" | "m" | "min" | "mins" | "t" => 60,
            "h" | "hr" | "hour" | "hours" => 3_600,
            "d" | "day" | "days" => 86_400,
            "w" | "week" | "weeks" => 604_800,
            _ => return Err(BacktestError::InvalidTimeframe(s.to_string())),
        };

        count
            .checked_mul(unit_seconds)
            .and_then(Timeframe::from_seconds)
            .ok_or_else(|| BacktestError::InvalidTimeframe(s.to_string()))
    }
}

impl TryFrom<String> for Timeframe {
    type Error = BacktestError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(tf: Timeframe) -> Self {
        tf.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_units() {
        assert_eq!("5m".parse::<Timeframe>().unwrap().seconds(), 300);
        assert_eq!("15min".parse::<Timeframe>().unwrap().seconds(), 900);
        assert_eq!("4H".parse::<Timeframe>().unwrap().seconds(), 14_400);
        assert_eq!("1d".parse::<Timeframe>().unwrap().seconds(), 86_400);
        assert_eq!("1w".parse::<Timeframe>().unwrap().seconds(), 604_800);
        assert_eq!("30".parse::<Timeframe>().unwrap().seconds(), 1_800);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Timeframe>().is_err());
        assert!("0h".parse::<Timeframe>().is_err());
        assert!("1fortnight".parse::<Timeframe>().is_err());
        assert!("h1".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_parse_rejects_overflow() {
        let err = "99999999999999999w".parse::<Timeframe>().unwrap_err();
        assert!(matches!(err, BacktestError::InvalidTimeframe(_)));
        assert!("18446744073709551615s".parse::<Timeframe>().is_err());
        assert!(Timeframe::from_seconds(u64::MAX).is_none());
    }

    #[test]
    fn test_constructors_saturate() {
        let huge = Timeframe::days(u64::MAX);
        assert_eq!(huge, Timeframe::minutes(u64::MAX));
        assert_eq!(huge.seconds(), MAX_SECONDS);
        assert!(huge.duration() > Duration::zero());
        assert_eq!(huge.periods_per_year(), 1.0);
    }

    #[test]
    fn test_display_round_trip() {
        assert_eq!(Timeframe::minutes(90).to_string(), "90m");
        assert_eq!(Timeframe::hours(4).to_string(), "4h");
        assert_eq!(Timeframe::days(7).to_string(), "1w");
    }

    #[test]
    fn test_periods_per_year() {
        assert_eq!(Timeframe::days(1).periods_per_year(), 365.0);
        assert_eq!(Timeframe::hours(1).periods_per_year(), 8_760.0);
        // Longer than a year still annualizes to one period
        let decade = Timeframe::from_seconds(10 * SECONDS_PER_YEAR).unwrap();
        assert_eq!(decade.periods_per_year(), 1.0);
    }

    #[test]
    fn test_serde_as_string() {
        let tf: Timeframe = serde_json::from_str("\"1h\"").unwrap();
        assert_eq!(tf, Timeframe::hours(1));
        assert_eq!(serde_json::to_string(&tf).unwrap(), "\"1h\"");
    }
}
