use chrono::{DateTime, Duration, TimeZone, Utc};
use common::{Bar, Timeframe};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn series_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Timestamp of bar `i`, or `None` once it leaves chrono's range
fn bar_time(start: DateTime<Utc>, step: Duration, i: usize) -> Option<DateTime<Utc>> {
    let offset = step.checked_mul(i32::try_from(i).ok()?)?;
    start.checked_add_signed(offset)
}

fn warn_truncated(generated: usize, timeframe: Timeframe) {
    tracing::warn!(generated, timeframe = %timeframe, "synthetic series truncated at the last representable timestamp");
}

/// Generate a reproducible random-walk price series.
///
/// The same `seed` always yields the same bars, starting 2024-01-01 UTC and
/// spaced by `timeframe`.
pub fn generate_synthetic_bars(
    count: usize,
    initial_price: f64,
    seed: u64,
    timeframe: Timeframe,
) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bars = Vec::with_capacity(count);

    let start = series_start();
    let step = timeframe.duration();

    // ~2% per-bar volatility with a slight upward drift
    let volatility = 0.02;
    let drift = 0.0002;
    let mut price = initial_price;

    for i in 0..count {
        let Some(timestamp) = bar_time(start, step, i) else {
            warn_truncated(i, timeframe);
            break;
        };

        let shock: f64 = rng.gen_range(-1.0..1.0);
        let bar_return = drift + volatility * shock;
        let close = (price * (1.0 + bar_return)).max(0.01);

        let range = price * rng.gen_range(0.005..0.03);
        let open = price + rng.gen_range(-range / 2.0..range / 2.0);
        let high = open.max(close) + rng.gen_range(0.0..range / 2.0);
        let low = (open.min(close) - rng.gen_range(0.0..range / 2.0)).max(0.0);

        // Busier on larger moves
        let volume = 1_000_000.0 * (1.0 + bar_return.abs() * 10.0) * rng.gen_range(0.8..1.2);

        bars.push(Bar::new(timestamp, open, high, low, close, volume));
        price = close;
    }

    bars
}

/// Generate bars with scripted drops and rallies, for exercising oscillator
/// thresholds
pub fn generate_pattern_bars(
    count: usize,
    initial_price: f64,
    timeframe: Timeframe,
    drop_bars: &[usize],
    rally_bars: &[usize],
) -> Vec<Bar> {
    let mut bars = Vec::with_capacity(count);
    let start = series_start();
    let step = timeframe.duration();
    let mut price = initial_price;

    for i in 0..count {
        let bar_return = if drop_bars.contains(&i) {
            -0.03
        } else if rally_bars.contains(&i) {
            0.03
        } else {
            0.001
        };

        let close = price * (1.0 + bar_return);
        let range = price * 0.01;

        let Some(timestamp) = bar_time(start, step, i) else {
            warn_truncated(i, timeframe);
            break;
        };
        bars.push(Bar::new(
            timestamp,
            price,
            price.max(close) + range,
            price.min(close) - range,
            close,
            1_000_000.0,
        ));
        price = close;
    }

    bars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_synthetic_bars() {
        let bars = generate_synthetic_bars(100, 50.0, 7, Timeframe::days(1));

        assert_eq!(bars.len(), 100);
        for bar in &bars {
            assert!(bar.high >= bar.low);
            assert!(bar.high >= bar.open);
            assert!(bar.high >= bar.close);
            assert!(bar.low <= bar.open);
            assert!(bar.low <= bar.close);
            assert!(bar.volume > 0.0);
        }
        for pair in bars.windows(2) {
            assert_eq!(pair[1].timestamp - pair[0].timestamp, Timeframe::days(1).duration());
        }
    }

    #[test]
    fn test_same_seed_same_bars() {
        let a = generate_synthetic_bars(50, 100.0, 42, Timeframe::hours(1));
        let b = generate_synthetic_bars(50, 100.0, 42, Timeframe::hours(1));
        let c = generate_synthetic_bars(50, 100.0, 43, Timeframe::hours(1));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_huge_timeframe_truncates_instead_of_panicking() {
        let bars = generate_synthetic_bars(10, 100.0, 1, Timeframe::days(u64::MAX));

        assert!(bars.len() < 10);
        assert!(bars.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_generate_pattern_bars() {
        let bars = generate_pattern_bars(50, 100.0, Timeframe::days(1), &[10, 11, 12], &[30, 31, 32]);

        assert_eq!(bars.len(), 50);
        assert!(bars[12].close < bars[9].close);
        assert!(bars[32].close > bars[29].close);
    }
}
