use super::ema::Ema;

/// MACD output series, NaN during warm-up
#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// MACD value for one bar
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MacdPoint {
    pub line: Option<f64>,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

/// Streaming MACD: fast EMA - slow EMA, smoothed by a signal EMA
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        Self {
            fast: Ema::new(fast),
            slow: Ema::new(slow),
            signal: Ema::new(signal),
        }
    }

    pub fn next(&mut self, price: f64) -> MacdPoint {
        let fast = self.fast.next(price);
        let slow = self.slow.next(price);

        let line = match (fast, slow) {
            (Some(f), Some(s)) => Some(f - s),
            _ => return MacdPoint::default(),
        };

        let signal = line.and_then(|l| self.signal.next(l));
        MacdPoint {
            line,
            signal,
            histogram: line.zip(signal).map(|(l, s)| l - s),
        }
    }
}

/// Calculate MACD line, signal line and histogram
pub fn calculate_macd(prices: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    let mut macd = Macd::new(fast, slow, signal);
    let mut out = MacdSeries {
        line: Vec::with_capacity(prices.len()),
        signal: Vec::with_capacity(prices.len()),
        histogram: Vec::with_capacity(prices.len()),
    };

    for &p in prices {
        let point = macd.next(p);
        out.line.push(point.line.unwrap_or(f64::NAN));
        out.signal.push(point.signal.unwrap_or(f64::NAN));
        out.histogram.push(point.histogram.unwrap_or(f64::NAN));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::calculate_ema;
    use approx::assert_relative_eq;

    #[test]
    fn test_macd_line_is_ema_difference() {
        let prices: Vec<f64> = (0..80).map(|i| 50.0 + (i as f64 * 0.2).sin() * 3.0).collect();
        let macd = calculate_macd(&prices, 12, 26, 9);
        let fast = calculate_ema(&prices, 12);
        let slow = calculate_ema(&prices, 26);

        assert!(macd.line[24].is_nan());
        for i in 25..prices.len() {
            assert_relative_eq!(macd.line[i], fast[i] - slow[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_macd_signal_warmup_and_histogram() {
        let prices: Vec<f64> = (0..80).map(|i| 50.0 + i as f64 * 0.1).collect();
        let macd = calculate_macd(&prices, 12, 26, 9);

        // Line valid from 25, signal needs 9 line samples
        assert!(macd.signal[32].is_nan());
        assert!(!macd.signal[33].is_nan());
        for i in 33..prices.len() {
            assert_relative_eq!(
                macd.histogram[i],
                macd.line[i] - macd.signal[i],
                epsilon = 1e-12
            );
        }
    }
}
