use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use common::{BacktestError, Bar, Indicator, Result};

use crate::indicators::{
    bandwidth, calculate_bollinger_bands, calculate_divergence, calculate_ema, calculate_macd,
    calculate_ribbon, calculate_rsi, calculate_vwap, calculate_wavetrend, percent_b,
};

/// One column of an indicator frame
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// NaN marks an undefined value
    Numeric(Vec<f64>),
    /// `None` marks an undefined label
    Label(Vec<Option<&'static str>>),
}

/// A single cell read out of a column
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    Number(f64),
    Text(&'a str),
    Missing,
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Label(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Numeric(_))
    }

    pub fn cell(&self, idx: usize) -> Cell<'static> {
        match self {
            Column::Numeric(v) => match v.get(idx) {
                Some(x) if !x.is_nan() => Cell::Number(*x),
                _ => Cell::Missing,
            },
            Column::Label(v) => match v.get(idx) {
                Some(Some(s)) => Cell::Text(*s),
                _ => Cell::Missing,
            },
        }
    }
}

/// Bars of one timeframe plus the columns an indicator derives from them
#[derive(Debug, Clone)]
pub struct Frame {
    timestamps: Vec<DateTime<Utc>>,
    columns: BTreeMap<String, Column>,
}

impl Frame {
    /// Frame holding the OHLCV columns of `bars`
    pub fn from_bars(bars: &[Bar]) -> Self {
        let mut frame = Self {
            timestamps: bars.iter().map(|b| b.timestamp).collect(),
            columns: BTreeMap::new(),
        };
        frame.insert_numeric("open", bars.iter().map(|b| b.open).collect());
        frame.insert_numeric("high", bars.iter().map(|b| b.high).collect());
        frame.insert_numeric("low", bars.iter().map(|b| b.low).collect());
        frame.insert_numeric("close", bars.iter().map(|b| b.close).collect());
        frame.insert_numeric("volume", bars.iter().map(|b| b.volume).collect());
        frame
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    pub fn insert_numeric(&mut self, name: &str, values: Vec<f64>) {
        self.columns.insert(name.to_string(), Column::Numeric(values));
    }

    pub fn insert_label(&mut self, name: &str, values: Vec<Option<&'static str>>) {
        self.columns.insert(name.to_string(), Column::Label(values));
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Look up a column, failing with the list of available names
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns.get(name).ok_or_else(|| {
            BacktestError::InvalidStrategySpec(format!(
                "unknown column '{}' (available: {})",
                name,
                self.column_names().join(", ")
            ))
        })
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.keys().map(String::as_str).collect()
    }
}

/// Column a trigger reads when it names no `field`
pub fn primary_column(indicator: &Indicator) -> &'static str {
    match indicator {
        Indicator::Rsi(_) => "rsi",
        Indicator::Ema(_) => "ema",
        Indicator::Macd(_) => "macd",
        Indicator::Bollinger(_) => "middle",
        Indicator::Vwap => "vwap",
        Indicator::EmaRibbon(_) => "ribbon",
        Indicator::WavetrendDot(_) => "dot",
        Indicator::WavetrendWt1(_) => "wt1",
        Indicator::WavetrendWt2(_) => "wt2",
        Indicator::Divergence(_) => "divergence",
        Indicator::Price => "close",
    }
}

/// Build the frame for `indicator` over `bars`
pub fn compute_frame(indicator: &Indicator, bars: &[Bar]) -> Frame {
    let mut frame = Frame::from_bars(bars);
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    match indicator {
        Indicator::Rsi(p) => {
            frame.insert_numeric("rsi", calculate_rsi(&closes, p.period));
        }
        Indicator::Ema(p) => {
            frame.insert_numeric("ema", calculate_ema(&closes, p.period));
        }
        Indicator::Macd(p) => {
            let macd = calculate_macd(&closes, p.fast, p.slow, p.signal);
            frame.insert_numeric("macd", macd.line);
            frame.insert_numeric("signal", macd.signal);
            frame.insert_numeric("histogram", macd.histogram);
        }
        Indicator::Bollinger(p) => {
            let bb = calculate_bollinger_bands(&closes, p.period, p.std_mult);
            let pct_b = closes
                .iter()
                .enumerate()
                .map(|(i, &c)| percent_b(c, bb.lower[i], bb.upper[i]))
                .collect();
            let width = (0..closes.len())
                .map(|i| bandwidth(bb.upper[i], bb.middle[i], bb.lower[i]))
                .collect();
            frame.insert_numeric("upper", bb.upper);
            frame.insert_numeric("middle", bb.middle);
            frame.insert_numeric("lower", bb.lower);
            frame.insert_numeric("percent_b", pct_b);
            frame.insert_numeric("bandwidth", width);
        }
        Indicator::Vwap => {
            let vwap = calculate_vwap(bars);
            let undefined = vwap.iter().filter(|v| v.is_nan()).count();
            if undefined > 0 {
                tracing::debug!(undefined, "vwap undefined on zero cumulative volume");
            }
            frame.insert_numeric("vwap", vwap);
        }
        Indicator::EmaRibbon(p) => {
            let ribbon = calculate_ribbon(&closes, &p.periods);
            for (period, line) in ribbon.periods.iter().zip(ribbon.lines) {
                frame.insert_numeric(&format!("ema_{}", period), line);
            }
            frame.insert_label(
                "ribbon",
                ribbon.state.iter().map(|s| s.map(|s| s.as_str())).collect(),
            );
        }
        Indicator::WavetrendDot(p) | Indicator::WavetrendWt1(p) | Indicator::WavetrendWt2(p) => {
            let wt = calculate_wavetrend(bars, p.n1, p.n2, p.overbought, p.oversold);
            frame.insert_numeric("wt1", wt.wt1);
            frame.insert_numeric("wt2", wt.wt2);
            frame.insert_numeric("money_flow", wt.money_flow);
            frame.insert_label("dot", wt.dot.iter().map(|d| d.map(|d| d.as_str())).collect());
            frame.insert_label(
                "zone",
                wt.zone.iter().map(|z| z.map(|z| z.as_str())).collect(),
            );
        }
        Indicator::Divergence(p) => {
            let rsi = calculate_rsi(&closes, p.rsi_period);
            let labels = calculate_divergence(&closes, &rsi, p.lookback);
            frame.insert_numeric("rsi", rsi);
            frame.insert_label(
                "divergence",
                labels.iter().map(|d| d.map(|d| d.as_str())).collect(),
            );
        }
        Indicator::Price => {}
    }

    frame
}
