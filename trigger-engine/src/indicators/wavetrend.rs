use std::fmt;

use common::Bar;

use super::ema::Ema;
use super::sma::Sma;
use super::vwap::calculate_vwap;

const CI_SCALE: f64 = 0.015;
const SIGNAL_LENGTH: usize = 4;

/// Cross marker on the WaveTrend lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dot {
    Green,
    Red,
    None,
}

impl Dot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dot::Green => "GREEN",
            Dot::Red => "RED",
            Dot::None => "NONE",
        }
    }
}

impl fmt::Display for Dot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// wt2 relative to the overbought/oversold levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    Overbought,
    Oversold,
    Neutral,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Overbought => "OVERBOUGHT",
            Zone::Oversold => "OVERSOLD",
            Zone::Neutral => "NEUTRAL",
        }
    }
}

/// WaveTrend oscillator output
#[derive(Debug, Clone)]
pub struct WaveTrend {
    pub wt1: Vec<f64>,
    pub wt2: Vec<f64>,
    pub dot: Vec<Option<Dot>>,
    pub zone: Vec<Option<Zone>>,
    pub money_flow: Vec<f64>,
}

/// Streaming wt1/wt2 lines
#[derive(Debug, Clone)]
pub struct WaveTrendLines {
    esa: Ema,
    deviation: Ema,
    wt1: Ema,
    wt2: Sma,
}

impl WaveTrendLines {
    pub fn new(n1: usize, n2: usize) -> Self {
        Self {
            esa: Ema::new(n1),
            deviation: Ema::new(n1),
            wt1: Ema::new(n2),
            wt2: Sma::new(SIGNAL_LENGTH),
        }
    }

    /// Feed one typical price; returns (wt1, wt2) as each becomes defined
    pub fn next(&mut self, ap: f64) -> (Option<f64>, Option<f64>) {
        let Some(esa) = self.esa.next(ap) else {
            return (None, None);
        };
        let Some(d) = self.deviation.next((ap - esa).abs()) else {
            return (None, None);
        };

        let ci = if d == 0.0 {
            0.0
        } else {
            (ap - esa) / (CI_SCALE * d)
        };

        let Some(wt1) = self.wt1.next(ci) else {
            return (None, None);
        };
        (Some(wt1), self.wt2.next(wt1))
    }
}

/// Classify the wt1/wt2 cross at one bar
pub fn classify_dot(prev_wt1: f64, prev_wt2: f64, wt1: f64, wt2: f64, overbought: f64) -> Dot {
    let crossed_up = prev_wt1 < prev_wt2 && wt1 >= wt2;
    let crossed_down = prev_wt1 > prev_wt2 && wt1 <= wt2;

    if crossed_up && wt2 <= 0.0 {
        Dot::Green
    } else if crossed_down && wt2 >= overbought {
        Dot::Red
    } else {
        Dot::None
    }
}

/// Calculate the WaveTrend oscillator
///
/// # Arguments
/// * `bars` - OHLCV bars
/// * `n1` - Channel length
/// * `n2` - Average length
/// * `overbought` / `oversold` - Zone levels applied to wt2
pub fn calculate_wavetrend(
    bars: &[Bar],
    n1: usize,
    n2: usize,
    overbought: f64,
    oversold: f64,
) -> WaveTrend {
    let n = bars.len();
    let mut lines = WaveTrendLines::new(n1, n2);
    let mut wt1 = Vec::with_capacity(n);
    let mut wt2 = Vec::with_capacity(n);

    for bar in bars {
        let (a, b) = lines.next(bar.typical_price());
        wt1.push(a.unwrap_or(f64::NAN));
        wt2.push(b.unwrap_or(f64::NAN));
    }

    let dot = (0..n)
        .map(|i| {
            if i == 0 {
                return None;
            }
            let window = [wt1[i - 1], wt2[i - 1], wt1[i], wt2[i]];
            if window.iter().any(|v| v.is_nan()) {
                return None;
            }
            Some(classify_dot(
                wt1[i - 1],
                wt2[i - 1],
                wt1[i],
                wt2[i],
                overbought,
            ))
        })
        .collect();

    let zone = wt2
        .iter()
        .map(|&v| {
            if v.is_nan() {
                None
            } else if v >= overbought {
                Some(Zone::Overbought)
            } else if v <= oversold {
                Some(Zone::Oversold)
            } else {
                Some(Zone::Neutral)
            }
        })
        .collect();

    let money_flow = calculate_vwap(bars)
        .iter()
        .zip(bars)
        .map(|(&vwap, bar)| {
            if vwap.is_nan() || vwap == 0.0 {
                f64::NAN
            } else {
                (bar.close - vwap) / vwap * 100.0
            }
        })
        .collect();

    WaveTrend {
        wt1,
        wt2,
        dot,
        zone,
        money_flow,
    }
}
