use super::sma::RollingWindow;

/// Bollinger Bands result
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Bands for one bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPoint {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Streaming Bollinger Bands over a rolling population standard deviation
#[derive(Debug, Clone)]
pub struct Bollinger {
    window: RollingWindow,
    std_mult: f64,
}

impl Bollinger {
    pub fn new(period: usize, std_mult: f64) -> Self {
        Self {
            window: RollingWindow::new(period),
            std_mult,
        }
    }

    pub fn next(&mut self, price: f64) -> Option<BandPoint> {
        if !self.window.push(price) {
            return None;
        }
        let mean = self.window.mean();
        let std = self.window.std_dev(mean);
        Some(BandPoint {
            upper: mean + std * self.std_mult,
            middle: mean,
            lower: mean - std * self.std_mult,
        })
    }
}

/// Calculate Bollinger Bands
///
/// # Arguments
/// * `prices` - Slice of closing prices
/// * `period` - Period for moving average (typically 20)
/// * `std_dev` - Number of standard deviations (typically 2.0)
///
/// # Returns
/// BollingerBands struct containing upper, middle (SMA), and lower bands
pub fn calculate_bollinger_bands(prices: &[f64], period: usize, std_dev: f64) -> BollingerBands {
    let n = prices.len();
    let mut bb = BollingerBands {
        upper: Vec::with_capacity(n),
        middle: Vec::with_capacity(n),
        lower: Vec::with_capacity(n),
    };

    let mut bands = Bollinger::new(period, std_dev);
    for &p in prices {
        match bands.next(p) {
            Some(point) => {
                bb.upper.push(point.upper);
                bb.middle.push(point.middle);
                bb.lower.push(point.lower);
            }
            None => {
                bb.upper.push(f64::NAN);
                bb.middle.push(f64::NAN);
                bb.lower.push(f64::NAN);
            }
        }
    }

    bb
}

/// Calculate %B indicator (position within bands)
/// Returns value between 0 and 1 when within bands
/// < 0 means below lower band, > 1 means above upper band
pub fn percent_b(price: f64, lower: f64, upper: f64) -> f64 {
    if upper == lower {
        return 0.5;
    }
    (price - lower) / (upper - lower)
}

/// Calculate bandwidth (volatility indicator)
pub fn bandwidth(upper: f64, middle: f64, lower: f64) -> f64 {
    if middle == 0.0 {
        return 0.0;
    }
    (upper - lower) / middle
}
