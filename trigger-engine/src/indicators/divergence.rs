use std::fmt;

/// Price/indicator divergence label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divergence {
    Bearish,
    Bullish,
    None,
}

impl Divergence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Divergence::Bearish => "BEARISH",
            Divergence::Bullish => "BULLISH",
            Divergence::None => "NONE",
        }
    }
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pivot {
    High,
    Low,
}

/// Strict pivot of `series` at `j` over `lookback` bars on each side.
/// NaN anywhere in the window means no pivot.
fn pivot_at(series: &[f64], j: usize, lookback: usize) -> Option<Pivot> {
    let center = series[j];
    let window = (j - lookback..=j + lookback).filter(|&k| k != j);

    if window.clone().all(|k| center > series[k]) {
        Some(Pivot::High)
    } else if window.into_iter().all(|k| center < series[k]) {
        Some(Pivot::Low)
    } else {
        None
    }
}

/// Last two confirmed pivots of one kind, oldest first
#[derive(Debug, Default)]
struct PivotPair {
    prev: Option<f64>,
    last: Option<f64>,
}

impl PivotPair {
    fn push(&mut self, value: f64) {
        self.prev = self.last.replace(value);
    }

    fn pair(&self) -> Option<(f64, f64)> {
        self.prev.zip(self.last)
    }
}

/// Detect regular divergence between price and an oscillator.
///
/// A pivot at `j` needs `lookback` bars after it, so it is only known at
/// `j + lookback` and the label is emitted there. Entries are `None` during
/// the first `2 * lookback` bars.
pub fn calculate_divergence(
    price: &[f64],
    indicator: &[f64],
    lookback: usize,
) -> Vec<Option<Divergence>> {
    let n = price.len().min(indicator.len());
    let lookback = lookback.max(1);
    let warmup = lookback.saturating_mul(2);

    let mut price_highs = PivotPair::default();
    let mut price_lows = PivotPair::default();
    let mut ind_highs = PivotPair::default();
    let mut ind_lows = PivotPair::default();

    (0..n)
        .map(|i| {
            if i < warmup {
                return None;
            }
            let j = i - lookback;

            let price_pivot = pivot_at(price, j, lookback);
            match price_pivot {
                Some(Pivot::High) => price_highs.push(price[j]),
                Some(Pivot::Low) => price_lows.push(price[j]),
                None => {}
            }
            match pivot_at(indicator, j, lookback) {
                Some(Pivot::High) => ind_highs.push(indicator[j]),
                Some(Pivot::Low) => ind_lows.push(indicator[j]),
                None => {}
            }

            let label = match price_pivot {
                Some(Pivot::High) => match (price_highs.pair(), ind_highs.pair()) {
                    (Some((p1, p2)), Some((o1, o2))) if p2 > p1 && o2 < o1 => {
                        Divergence::Bearish
                    }
                    _ => Divergence::None,
                },
                Some(Pivot::Low) => match (price_lows.pair(), ind_lows.pair()) {
                    (Some((p1, p2)), Some((o1, o2))) if p2 < p1 && o2 > o1 => {
                        Divergence::Bullish
                    }
                    _ => Divergence::None,
                },
                None => Divergence::None,
            };
            Some(label)
        })
        .collect()
}
