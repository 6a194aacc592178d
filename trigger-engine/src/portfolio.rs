use chrono::{DateTime, Utc};
use common::{Position, PositionSide, Trade};

use crate::execution::Fill;

/// Relative slack when comparing a position's notional against equity
const NOTIONAL_TOLERANCE: f64 = 1e-9;

/// Fixed-fractional position size.
///
/// Risks `risk_per_trade_pct` of `equity` over the distance from `entry` to
/// `stop`. Returns 0 when that distance is zero or the resulting notional
/// would exceed equity.
pub fn position_size(equity: f64, risk_per_trade_pct: f64, entry: f64, stop: f64) -> f64 {
    let distance = (entry - stop).abs();
    if distance == 0.0 || !distance.is_finite() {
        tracing::debug!(entry, stop, "zero stop distance, skipping entry");
        return 0.0;
    }

    let size = equity * risk_per_trade_pct / distance;
    if size * entry > equity * (1.0 + NOTIONAL_TOLERANCE) {
        tracing::debug!(size, entry, equity, "position notional exceeds equity");
        return 0.0;
    }
    size.max(0.0)
}

/// Cash account holding at most one position in a single instrument
#[derive(Debug)]
pub struct Portfolio {
    initial_capital: f64,
    cash: f64,
    position: Option<Position>,
    entry_bar: usize,
    realized_pnl: f64,
    trades: Vec<Trade>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            position: None,
            entry_bar: 0,
            realized_pnl: 0.0,
            trades: Vec::new(),
        }
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    /// Get current equity (cash + signed position value)
    pub fn equity(&self) -> f64 {
        self.cash + self.position_value()
    }

    /// Signed market value of the open position
    pub fn position_value(&self) -> f64 {
        self.position
            .as_ref()
            .map(|p| p.market_value())
            .unwrap_or(0.0)
    }

    /// Get available cash
    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Check if there's an open position
    pub fn has_position(&self) -> bool {
        self.position.is_some()
    }

    /// Get current position reference
    pub fn current_position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Bar index at which the open position was entered
    pub fn entry_bar(&self) -> Option<usize> {
        self.position.as_ref().map(|_| self.entry_bar)
    }

    /// Get all closed trades
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }

    /// Get realized P&L
    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    /// Mark the open position to `price`
    pub fn update_price(&mut self, price: f64) {
        if let Some(pos) = self.position.as_mut() {
            pos.current_price = price;
        }
    }

    /// Attach stop and target levels to the open position
    pub fn set_exit_levels(&mut self, stop_loss: Option<f64>, take_profit: Option<f64>) {
        if let Some(pos) = self.position.as_mut() {
            pos.stop_loss_price = stop_loss;
            pos.take_profit_price = take_profit;
        }
    }

    /// Apply a fill to the account.
    ///
    /// A fill on the position's side adds at a weighted-average entry. An
    /// opposite fill closes up to the open quantity, producing a trade, and
    /// any remainder opens a position on the other side at the fill price.
    pub fn apply_fill(
        &mut self,
        fill: &Fill,
        timestamp: DateTime<Utc>,
        bar: usize,
        reason: &str,
    ) -> Option<Trade> {
        if fill.quantity <= 0.0 {
            return None;
        }

        let fill_side = PositionSide::from_entry_side(fill.side);
        self.cash -= fill_side.sign() * fill.notional() + fill.commission;

        let Some(mut pos) = self.position.take() else {
            self.open(fill_side, fill.quantity, fill.price, fill.commission, timestamp, bar);
            return None;
        };

        if pos.side == fill_side {
            let total = pos.quantity + fill.quantity;
            pos.avg_entry_price =
                (pos.avg_entry_price * pos.quantity + fill.price * fill.quantity) / total;
            pos.quantity = total;
            pos.entry_commission += fill.commission;
            pos.current_price = fill.price;
            self.position = Some(pos);
            return None;
        }

        let closed = fill.quantity.min(pos.quantity);
        let close_commission = fill.commission * closed / fill.quantity;
        let entry_commission = pos.entry_commission * closed / pos.quantity;

        let gross = (fill.price - pos.avg_entry_price) * closed * pos.side.sign();
        let pnl = gross - close_commission - entry_commission;
        let cost_basis = pos.avg_entry_price * closed;

        let trade = Trade {
            entry_date: pos.entry_date,
            entry_price: pos.avg_entry_price,
            exit_date: timestamp,
            exit_price: fill.price,
            quantity: closed,
            side: pos.side,
            pnl,
            pnl_pct: if cost_basis > 0.0 {
                (pnl / cost_basis) * 100.0
            } else {
                0.0
            },
            holding_bars: bar.saturating_sub(self.entry_bar),
            exit_reason: reason.to_string(),
        };
        self.realized_pnl += pnl;
        self.trades.push(trade.clone());

        let remaining = pos.quantity - closed;
        let flipped = fill.quantity - closed;
        if remaining > 0.0 {
            pos.quantity = remaining;
            pos.entry_commission -= entry_commission;
            pos.current_price = fill.price;
            self.position = Some(pos);
        } else if flipped > 0.0 {
            let open_commission = fill.commission - close_commission;
            self.open(fill_side, flipped, fill.price, open_commission, timestamp, bar);
        }

        Some(trade)
    }

    fn open(
        &mut self,
        side: PositionSide,
        quantity: f64,
        price: f64,
        commission: f64,
        timestamp: DateTime<Utc>,
        bar: usize,
    ) {
        self.entry_bar = bar;
        self.position = Some(Position {
            side,
            quantity,
            avg_entry_price: price,
            entry_date: timestamp,
            current_price: price,
            stop_loss_price: None,
            take_profit_price: None,
            entry_commission: commission,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionSimulator;
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use common::{ExecutionConfig, Side};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn fill(side: Side, qty: f64, price: f64) -> Fill {
        ExecutionSimulator::default().execute(side, qty, price)
    }

    #[test]
    fn test_portfolio_new() {
        let portfolio = Portfolio::new(10000.0);
        assert_eq!(portfolio.equity(), 10000.0);
        assert_eq!(portfolio.cash(), 10000.0);
        assert!(!portfolio.has_position());
    }

    #[test]
    fn test_open_and_close_long() {
        let mut portfolio = Portfolio::new(10000.0);

        assert!(portfolio
            .apply_fill(&fill(Side::Buy, 100.0, 50.0), now(), 0, "entry")
            .is_none());
        assert_eq!(portfolio.cash(), 5000.0);
        assert_eq!(portfolio.equity(), 10000.0);

        portfolio.update_price(55.0);
        assert_eq!(portfolio.position_value(), 5500.0);
        assert_eq!(portfolio.equity(), 10500.0);

        let trade = portfolio
            .apply_fill(&fill(Side::Sell, 100.0, 55.0), now(), 3, "take profit")
            .unwrap();

        assert!(!portfolio.has_position());
        assert_eq!(portfolio.cash(), 10500.0);
        assert_eq!(trade.pnl, 500.0);
        assert_eq!(trade.pnl_pct, 10.0);
        assert_eq!(trade.holding_bars, 3);
        assert_eq!(trade.side, PositionSide::Long);
    }

    #[test]
    fn test_short_round_trip() {
        let mut portfolio = Portfolio::new(10000.0);
        portfolio.apply_fill(&fill(Side::Sell, 10.0, 100.0), now(), 0, "entry");

        assert_eq!(portfolio.cash(), 11000.0);
        portfolio.update_price(90.0);
        assert_eq!(portfolio.equity(), 10100.0);

        let trade = portfolio
            .apply_fill(&fill(Side::Buy, 10.0, 90.0), now(), 1, "exit")
            .unwrap();
        assert_eq!(trade.pnl, 100.0);
        assert_eq!(trade.side, PositionSide::Short);
        assert_eq!(portfolio.equity(), 10100.0);
    }

    #[test]
    fn test_weighted_average_add() {
        let mut portfolio = Portfolio::new(10000.0);
        portfolio.apply_fill(&fill(Side::Buy, 10.0, 100.0), now(), 0, "entry");
        portfolio.apply_fill(&fill(Side::Buy, 30.0, 120.0), now(), 1, "add");

        let pos = portfolio.current_position().unwrap();
        assert_eq!(pos.quantity, 40.0);
        assert_eq!(pos.avg_entry_price, 115.0);
    }

    #[test]
    fn test_partial_close() {
        let mut portfolio = Portfolio::new(10000.0);
        portfolio.apply_fill(&fill(Side::Buy, 10.0, 100.0), now(), 0, "entry");

        let trade = portfolio
            .apply_fill(&fill(Side::Sell, 4.0, 110.0), now(), 2, "trim")
            .unwrap();
        assert_eq!(trade.quantity, 4.0);
        assert_eq!(trade.pnl, 40.0);

        let pos = portfolio.current_position().unwrap();
        assert_eq!(pos.quantity, 6.0);
        assert_eq!(pos.avg_entry_price, 100.0);
        assert_eq!(pos.side, PositionSide::Long);
    }

    #[test]
    fn test_flip_to_short() {
        let mut portfolio = Portfolio::new(10000.0);
        portfolio.apply_fill(&fill(Side::Buy, 10.0, 100.0), now(), 0, "entry");

        let trade = portfolio
            .apply_fill(&fill(Side::Sell, 15.0, 105.0), now(), 1, "reverse")
            .unwrap();
        assert_eq!(trade.quantity, 10.0);
        assert_eq!(trade.pnl, 50.0);

        let pos = portfolio.current_position().unwrap();
        assert_eq!(pos.side, PositionSide::Short);
        assert_eq!(pos.quantity, 5.0);
        assert_eq!(pos.avg_entry_price, 105.0);
        assert_eq!(portfolio.entry_bar(), Some(1));
        // 10000 + 50 realized, short marked at its entry
        assert_relative_eq!(portfolio.equity(), 10050.0);
    }

    #[test]
    fn test_commission_in_realized_pnl() {
        let sim = ExecutionSimulator::new(ExecutionConfig::default().with_commission(0.001));
        let mut portfolio = Portfolio::new(10000.0);

        portfolio.apply_fill(&sim.execute(Side::Buy, 10.0, 100.0), now(), 0, "entry");
        let trade = portfolio
            .apply_fill(&sim.execute(Side::Sell, 10.0, 110.0), now(), 1, "exit")
            .unwrap();

        // 100 gross - 1.0 entry - 1.1 exit commission
        assert_relative_eq!(trade.pnl, 97.9, epsilon = 1e-9);
        assert_relative_eq!(portfolio.equity(), 10097.9, epsilon = 1e-9);
    }

    #[test]
    fn test_position_size() {
        // 1% of 10000 over a 5 point stop
        assert_eq!(position_size(10000.0, 0.01, 100.0, 95.0), 20.0);
        assert_eq!(position_size(10000.0, 0.01, 100.0, 100.0), 0.0);
        // 10% risk over 1 point would need 1000 units = 100000 notional
        assert_eq!(position_size(10000.0, 0.1, 100.0, 99.0), 0.0);
        // All-in: risk equals stop distance
        assert_relative_eq!(position_size(10000.0, 1.0, 100.0, 0.0), 100.0);
    }
}
