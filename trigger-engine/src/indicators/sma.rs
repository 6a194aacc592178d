use std::collections::VecDeque;

/// Rolling window over the last `period` samples.
///
/// Storage grows with the samples pushed, so a period far beyond the data
/// costs nothing up front.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    period: usize,
    values: VecDeque<f64>,
}

impl RollingWindow {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            values: VecDeque::new(),
        }
    }

    /// Push a sample; returns true once the window is full
    pub fn push(&mut self, x: f64) -> bool {
        if self.values.len() == self.period {
            self.values.pop_front();
        }
        self.values.push_back(x);
        self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.values.len() == self.period
    }

    pub fn mean(&self) -> f64 {
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }

    /// Population standard deviation around `mean`
    pub fn std_dev(&self, mean: f64) -> f64 {
        let variance =
            self.values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / self.values.len() as f64;
        variance.sqrt()
    }
}

/// Streaming simple moving average
#[derive(Debug, Clone)]
pub struct Sma {
    window: RollingWindow,
}

impl Sma {
    pub fn new(period: usize) -> Self {
        Self {
            window: RollingWindow::new(period),
        }
    }

    pub fn next(&mut self, x: f64) -> Option<f64> {
        if self.window.push(x) {
            Some(self.window.mean())
        } else {
            None
        }
    }
}

/// Calculate Simple Moving Average
///
/// # Arguments
/// * `prices` - Slice of prices
/// * `period` - SMA period
///
/// # Returns
/// Vector of SMA values, NaN before enough data is available
pub fn calculate_sma(prices: &[f64], period: usize) -> Vec<f64> {
    let mut sma = Sma::new(period);
    prices
        .iter()
        .map(|&p| sma.next(p).unwrap_or(f64::NAN))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sma_basic() {
        let prices = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let sma = calculate_sma(&prices, 3);

        assert_eq!(sma.len(), prices.len());
        assert!(sma[0].is_nan());
        assert!(sma[1].is_nan());
        assert_eq!(sma[2], 2.0); // (1+2+3)/3
        assert_eq!(sma[3], 3.0); // (2+3+4)/3
        assert_eq!(sma[9], 9.0); // (8+9+10)/3
    }

    #[test]
    fn test_sma_period_larger_than_data() {
        let prices = vec![1.0, 2.0, 3.0];
        let sma = calculate_sma(&prices, 5);

        assert!(sma.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_huge_period_stays_undefined() {
        let prices = vec![1.0, 2.0, 3.0, 4.0];
        let sma = calculate_sma(&prices, 1 << 40);

        assert!(sma.iter().all(|v| v.is_nan()));
        assert!(!RollingWindow::new(usize::MAX).is_full());
    }

    #[test]
    fn test_population_std() {
        let mut window = RollingWindow::new(4);
        for x in [2.0, 4.0, 4.0, 6.0] {
            window.push(x);
        }
        let mean = window.mean();
        assert_eq!(mean, 4.0);
        assert_eq!(window.std_dev(mean), 2.0_f64.sqrt());
    }
}
