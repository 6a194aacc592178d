//! Vectorized fast path for all-in, long-only, signal-following strategies
//!
//! Under those conditions the position at bar `t` is fully determined by the
//! signal at `t - 1`, so equity is a cumulative product of gated close-to-close
//! returns and no per-bar state machine is needed.

use common::{
    Bar, Direction, EquityPoint, ExecutionConfig, ExitPolicy, PositionSide, StrategySpec, Trade,
};

/// Tolerance when checking that risk and stop describe an all-in position
const ALL_IN_TOLERANCE: f64 = 1e-12;

/// Check if a strategy can run on the vectorized path and still match the
/// event-driven simulator
pub fn can_vectorize(strategy: &StrategySpec, execution: &ExecutionConfig) -> bool {
    let risk = &strategy.risk;
    strategy.vectorized
        && strategy.direction == Direction::Long
        && strategy.exit == ExitPolicy::SignalLost
        && risk.take_profit_pct <= 0.0
        && risk.stop_loss_pct >= 1.0
        && (risk.risk_per_trade_pct - risk.stop_loss_pct).abs() < ALL_IN_TOLERANCE
        && execution.is_frictionless()
}

/// Close-to-close returns gated by the previous bar's signal
pub fn gated_returns(bars: &[Bar], signal: &[bool]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(t, bar)| {
            if t == 0 || !signal.get(t - 1).copied().unwrap_or(false) {
                return 0.0;
            }
            let prev = bars[t - 1].close;
            if prev != 0.0 {
                bar.close / prev - 1.0
            } else {
                0.0
            }
        })
        .collect()
}

/// Run the vectorized simulation, returning the equity curve and trades
pub fn run_vectorized(
    bars: &[Bar],
    signal: &[bool],
    initial_capital: f64,
) -> (Vec<EquityPoint>, Vec<Trade>) {
    let returns = gated_returns(bars, signal);

    let mut equity = initial_capital;
    let equity_curve: Vec<EquityPoint> = bars
        .iter()
        .zip(&returns)
        .map(|(bar, r)| {
            equity *= 1.0 + r;
            EquityPoint {
                timestamp: bar.timestamp,
                equity,
            }
        })
        .collect();

    let trades = trades_from_transitions(bars, signal, &equity_curve);
    (equity_curve, trades)
}

/// Derive round trips from signal edges: enter at the close of the rising
/// bar, exit at the close of the falling bar, close on the final bar
fn trades_from_transitions(
    bars: &[Bar],
    signal: &[bool],
    equity_curve: &[EquityPoint],
) -> Vec<Trade> {
    let mut trades = Vec::new();
    let mut open: Option<(usize, f64)> = None;
    let last = bars.len().saturating_sub(1);

    for (i, bar) in bars.iter().enumerate() {
        let on = signal.get(i).copied().unwrap_or(false);

        let exit_reason = match open {
            Some((entry, _)) if i > entry && !on => Some("signal lost"),
            Some(_) if i == last => Some("end of data"),
            _ => None,
        };

        if let (Some(reason), Some((entry, quantity))) = (exit_reason, open) {
            let entry_price = bars[entry].close;
            let pnl = (bar.close - entry_price) * quantity;
            trades.push(Trade {
                entry_date: bars[entry].timestamp,
                entry_price,
                exit_date: bar.timestamp,
                exit_price: bar.close,
                quantity,
                side: PositionSide::Long,
                pnl,
                pnl_pct: if entry_price > 0.0 {
                    (bar.close / entry_price - 1.0) * 100.0
                } else {
                    0.0
                },
                holding_bars: i - entry,
                exit_reason: reason.to_string(),
            });
            open = None;
            continue;
        }

        if open.is_none() && on && i < last && bar.close > 0.0 {
            open = Some((i, equity_curve[i].equity / bar.close));
        }
    }

    trades
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};
    use common::RiskSpec;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(start + Duration::days(i as i64), c, c, c, c, 1.0))
            .collect()
    }

    #[test]
    fn test_can_vectorize_requires_all_in_long() {
        let exec = ExecutionConfig::default();
        let base = StrategySpec::new("v").with_risk(RiskSpec::all_in(1000.0));

        assert!(!can_vectorize(&base, &exec));
        assert!(can_vectorize(&base.clone().vectorized(), &exec));
        assert!(!can_vectorize(
            &base.clone().vectorized().with_direction(Direction::Short),
            &exec
        ));
        assert!(!can_vectorize(
            &base.clone().vectorized().with_exit(ExitPolicy::MeanReversion),
            &exec
        ));
        assert!(!can_vectorize(
            &StrategySpec::new("v").vectorized(),
            &exec
        ));
        assert!(!can_vectorize(
            &base.vectorized(),
            &ExecutionConfig::default().with_commission(0.001)
        ));
    }

    #[test]
    fn test_gated_returns_use_previous_signal() {
        let data = bars(&[100.0, 110.0, 121.0, 110.0]);
        let returns = gated_returns(&data, &[true, true, false, false]);

        assert_eq!(returns[0], 0.0);
        assert_relative_eq!(returns[1], 0.1, epsilon = 1e-12);
        assert_relative_eq!(returns[2], 0.1, epsilon = 1e-12);
        assert_eq!(returns[3], 0.0);
    }

    #[test]
    fn test_run_vectorized_trades() {
        let data = bars(&[100.0, 110.0, 121.0, 110.0, 100.0, 120.0]);
        let signal = [true, true, false, false, true, true];
        let (curve, trades) = run_vectorized(&data, &signal, 1000.0);

        assert_relative_eq!(curve[2].equity, 1210.0, epsilon = 1e-9);
        assert_relative_eq!(curve[5].equity, 1452.0, epsilon = 1e-9);

        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].holding_bars, 2);
        assert_eq!(trades[0].exit_reason, "signal lost");
        assert_relative_eq!(trades[0].pnl, 210.0, epsilon = 1e-9);
        assert_eq!(trades[1].exit_reason, "end of data");
        assert_relative_eq!(trades[1].quantity, 12.1, epsilon = 1e-9);
        assert_relative_eq!(trades[1].pnl, 242.0, epsilon = 1e-9);
    }
}
