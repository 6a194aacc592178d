use super::ema::Ema;

/// Streaming RSI using Wilder's smoothing of gains and losses
#[derive(Debug, Clone)]
pub struct Rsi {
    prev: Option<f64>,
    gains: Ema,
    losses: Ema,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self {
            prev: None,
            gains: Ema::wilder(period),
            losses: Ema::wilder(period),
        }
    }

    pub fn next(&mut self, price: f64) -> Option<f64> {
        if price.is_nan() {
            return None;
        }
        let prev = self.prev.replace(price)?;

        let delta = price - prev;
        let avg_gain = self.gains.next(delta.max(0.0));
        let avg_loss = self.losses.next((-delta).max(0.0));

        match (avg_gain, avg_loss) {
            (Some(gain), Some(loss)) => Some(rsi_from_averages(gain, loss)),
            _ => None,
        }
    }
}

/// RSI from smoothed averages. A zero average loss adds nothing to the
/// denominator, so the value saturates at 100 instead of dividing by zero.
pub fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - (100.0 / (1.0 + rs))
}

/// Calculate RSI using Wilder's Smoothing (Exponential Moving Average)
///
/// # Arguments
/// * `prices` - Slice of closing prices
/// * `period` - RSI period
///
/// # Returns
/// Vector of RSI values, NaN for the first `period` entries
pub fn calculate_rsi(prices: &[f64], period: usize) -> Vec<f64> {
    let mut rsi = Rsi::new(period);
    let values: Vec<f64> = prices
        .iter()
        .map(|&p| rsi.next(p).unwrap_or(f64::NAN))
        .collect();

    let saturated = values.iter().filter(|&&v| v == 100.0).count();
    if saturated > 0 {
        tracing::debug!(saturated, period, "rsi saturated on zero average loss");
    }

    values
}
