use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }
}

/// Order side for fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Position side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }

    /// Order side that opens (or adds to) this position
    pub fn entry_side(self) -> Side {
        match self {
            PositionSide::Long => Side::Buy,
            PositionSide::Short => Side::Sell,
        }
    }

    pub fn from_entry_side(side: Side) -> Self {
        match side {
            Side::Buy => PositionSide::Long,
            Side::Sell => PositionSide::Short,
        }
    }
}

/// Open position for one instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    pub quantity: f64,
    pub avg_entry_price: f64,
    pub entry_date: DateTime<Utc>,
    pub current_price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit_price: Option<f64>,
    /// Commission paid on entry fills not yet attributed to a closed trade
    #[serde(default)]
    pub entry_commission: f64,
}

impl Position {
    pub fn unrealized_pnl(&self) -> f64 {
        (self.current_price - self.avg_entry_price) * self.quantity * self.side.sign()
    }

    pub fn unrealized_pnl_pct(&self) -> f64 {
        let cost = self.avg_entry_price * self.quantity;
        if cost == 0.0 {
            0.0
        } else {
            (self.unrealized_pnl() / cost) * 100.0
        }
    }

    /// Signed market value: positive for long, negative for short
    pub fn market_value(&self) -> f64 {
        self.quantity * self.current_price * self.side.sign()
    }
}

/// Closed round trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub entry_date: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_date: DateTime<Utc>,
    pub exit_price: f64,
    pub quantity: f64,
    pub side: PositionSide,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub holding_bars: usize,
    pub exit_reason: String,
}

/// One mark-to-market sample of the equity curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Fall from the running equity peak at one bar, as a fraction of the peak
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DrawdownPoint {
    pub timestamp: DateTime<Utc>,
    pub drawdown: f64,
}

/// Performance metrics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // Returns
    pub total_return: f64,
    pub total_pnl: f64,
    // Risk metrics
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration_bars: usize,
    pub calmar_ratio: f64,
    // Trade statistics
    pub trade_count: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub expectancy: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    pub exposure_pct: f64,
}

/// Which simulator produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    EventDriven,
    Vectorized,
}

/// Backtest result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub strategy: String,
    pub mode: SimulationMode,
    pub metrics: PerformanceMetrics,
    pub equity_curve: Vec<EquityPoint>,
    #[serde(default)]
    pub drawdown_curve: Vec<DrawdownPoint>,
    pub trades: Vec<Trade>,
    pub initial_capital: f64,
    pub final_equity: f64,
    /// Recovered problems (invalid triggers, degenerate numerics) seen during the run
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
    pub execution_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimization: Option<OptimizationReport>,
}

impl BacktestResult {
    pub fn pnl(&self) -> f64 {
        self.final_equity - self.initial_capital
    }
}

/// One point of a single-parameter sweep
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub value: f64,
    pub pnl: f64,
    pub trade_count: usize,
}

/// A grid point that could not be evaluated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridFailure {
    pub label: String,
    pub error: String,
}

/// Single-parameter sweep report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    pub trigger_index: usize,
    pub grid: Vec<GridPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_pnl: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<GridFailure>,
    #[serde(default)]
    pub cancelled: bool,
}

/// One parameter combination of a walk-forward search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardEntry {
    pub parameters: BTreeMap<String, f64>,
    pub pnl: f64,
    pub trade_count: usize,
    pub sharpe_ratio: f64,
}

/// Walk-forward report, entries sorted by PnL descending
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkForwardReport {
    pub entries: Vec<WalkForwardEntry>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<GridFailure>,
    #[serde(default)]
    pub cancelled: bool,
}

impl WalkForwardReport {
    pub fn best(&self) -> Option<&WalkForwardEntry> {
        self.entries.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_unrealized_pnl_by_side() {
        let mut pos = Position {
            side: PositionSide::Long,
            quantity: 10.0,
            avg_entry_price: 100.0,
            entry_date: now(),
            current_price: 110.0,
            stop_loss_price: None,
            take_profit_price: None,
            entry_commission: 0.0,
        };
        assert_eq!(pos.unrealized_pnl(), 100.0);
        assert_eq!(pos.unrealized_pnl_pct(), 10.0);

        pos.side = PositionSide::Short;
        assert_eq!(pos.unrealized_pnl(), -100.0);
        assert_eq!(pos.market_value(), -1100.0);
    }

    #[test]
    fn test_typical_price() {
        let bar = Bar::new(now(), 10.0, 12.0, 9.0, 12.0, 100.0);
        assert_eq!(bar.typical_price(), 11.0);
    }
}
