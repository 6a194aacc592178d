/// Streaming exponential moving average, seeded with the first sample.
///
/// Output is withheld until `warmup` samples have been seen; the batch
/// [`calculate_ema`] is a fold of this state, so both produce the same values.
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    warmup: usize,
    count: usize,
    value: Option<f64>,
}

impl Ema {
    /// Standard EMA: alpha = 2 / (period + 1), valid after `period` samples
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            alpha: 2.0 / (period as f64 + 1.0),
            warmup: period,
            count: 0,
            value: None,
        }
    }

    /// Wilder smoothing: alpha = 1 / period (an EMA of span 2 * period - 1)
    pub fn wilder(period: usize) -> Self {
        let period = period.max(1);
        Self {
            alpha: 1.0 / period as f64,
            warmup: period,
            count: 0,
            value: None,
        }
    }

    /// Feed one sample. NaN samples leave the state untouched.
    pub fn next(&mut self, x: f64) -> Option<f64> {
        if x.is_nan() {
            return self.current();
        }

        let updated = match self.value {
            None => x,
            Some(prev) => (x - prev) * self.alpha + prev,
        };
        self.value = Some(updated);
        self.count += 1;
        self.current()
    }

    pub fn current(&self) -> Option<f64> {
        if self.count >= self.warmup {
            self.value
        } else {
            None
        }
    }
}

/// Calculate Exponential Moving Average
///
/// # Arguments
/// * `prices` - Slice of prices
/// * `period` - EMA period
///
/// # Returns
/// Vector of EMA values, NaN for the first `period - 1` entries
pub fn calculate_ema(prices: &[f64], period: usize) -> Vec<f64> {
    let mut ema = Ema::new(period);
    prices
        .iter()
        .map(|&p| ema.next(p).unwrap_or(f64::NAN))
        .collect()
}
