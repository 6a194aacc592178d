use std::fmt;

use super::ema::calculate_ema;

/// Where price sits relative to a stack of EMAs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RibbonState {
    Above,
    Below,
    Inside,
}

impl RibbonState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RibbonState::Above => "ABOVE",
            RibbonState::Below => "BELOW",
            RibbonState::Inside => "INSIDE",
        }
    }
}

impl fmt::Display for RibbonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// EMA ribbon: one EMA per period plus the price/ribbon state
#[derive(Debug, Clone)]
pub struct EmaRibbon {
    pub periods: Vec<usize>,
    pub lines: Vec<Vec<f64>>,
    pub state: Vec<Option<RibbonState>>,
}

/// Calculate an EMA ribbon over closing prices.
///
/// The state is `None` until every EMA in the ribbon has warmed up.
pub fn calculate_ribbon(prices: &[f64], periods: &[usize]) -> EmaRibbon {
    let lines: Vec<Vec<f64>> = periods.iter().map(|&p| calculate_ema(prices, p)).collect();

    let state = prices
        .iter()
        .enumerate()
        .map(|(i, &price)| {
            if lines.is_empty() || lines.iter().any(|line| line[i].is_nan()) {
                return None;
            }
            if lines.iter().all(|line| price > line[i]) {
                Some(RibbonState::Above)
            } else if lines.iter().all(|line| price < line[i]) {
                Some(RibbonState::Below)
            } else {
                Some(RibbonState::Inside)
            }
        })
        .collect();

    EmaRibbon {
        periods: periods.to_vec(),
        lines,
        state,
    }
}
