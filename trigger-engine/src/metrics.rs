use common::{BacktestError, DrawdownPoint, EquityPoint, PerformanceMetrics, Result, Trade};

/// Standard deviations below this are treated as zero
const MIN_STD_DEV: f64 = 1e-12;

/// Calculate performance metrics from equity curve and trades
pub struct MetricsCalculator;

impl MetricsCalculator {
    /// Calculate all performance metrics
    ///
    /// # Arguments
    /// * `equity_curve` - One equity sample per bar
    /// * `trades` - Closed trades of the run
    /// * `initial_capital` - Starting equity
    /// * `periods_per_year` - Bars per year of the base timeframe
    /// * `risk_free_rate` - Annual risk-free rate as a fraction
    pub fn calculate(
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        initial_capital: f64,
        periods_per_year: f64,
        risk_free_rate: f64,
    ) -> Result<PerformanceMetrics> {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .ok_or_else(|| BacktestError::NoData("equity curve is empty".to_string()))?;

        let total_pnl = final_equity - initial_capital;
        let total_return = if initial_capital > 0.0 {
            final_equity / initial_capital - 1.0
        } else {
            0.0
        };

        let returns = Self::calculate_returns(equity_curve);
        let period_rf = risk_free_rate / periods_per_year;
        let excess: Vec<f64> = returns.iter().map(|r| r - period_rf).collect();

        let volatility = sample_std(&returns)
            .map(|s| s * periods_per_year.sqrt())
            .unwrap_or(0.0);
        let sharpe_ratio = Self::calculate_sharpe_ratio(&excess, periods_per_year);
        let sortino_ratio = Self::calculate_sortino_ratio(&excess, periods_per_year);
        let (max_drawdown, max_drawdown_duration_bars) = Self::calculate_max_drawdown(equity_curve);

        let calmar_ratio = if max_drawdown > 0.0 {
            total_return * periods_per_year / max_drawdown
        } else {
            f64::INFINITY
        };

        let stats = Self::calculate_trade_stats(trades);
        let exposure_pct = Self::calculate_exposure(equity_curve, trades);

        Ok(PerformanceMetrics {
            total_return,
            total_pnl,
            volatility,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration_bars,
            calmar_ratio,
            trade_count: trades.len(),
            winning_trades: stats.winning,
            losing_trades: stats.losing,
            win_rate: stats.win_rate,
            avg_win: stats.avg_win,
            avg_loss: stats.avg_loss,
            profit_factor: stats.profit_factor,
            expectancy: stats.expectancy,
            best_trade: stats.best,
            worst_trade: stats.worst,
            exposure_pct,
        })
    }

    /// Per-bar fractional returns of the equity curve
    pub fn calculate_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
        equity_curve
            .windows(2)
            .map(|w| {
                let prev = w[0].equity;
                if prev != 0.0 {
                    (w[1].equity - prev) / prev
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// Annualized Sharpe ratio; 0 with fewer than two returns or no variance
    fn calculate_sharpe_ratio(excess: &[f64], periods_per_year: f64) -> f64 {
        match sample_std(excess) {
            Some(std) if std >= MIN_STD_DEV => mean(excess) / std * periods_per_year.sqrt(),
            _ => 0.0,
        }
    }

    /// Annualized Sortino ratio over the negative excess returns
    fn calculate_sortino_ratio(excess: &[f64], periods_per_year: f64) -> f64 {
        let downside: Vec<f64> = excess.iter().copied().filter(|&r| r < 0.0).collect();

        match sample_std(&downside) {
            Some(std) if std >= MIN_STD_DEV => mean(excess) / std * periods_per_year.sqrt(),
            _ => 0.0,
        }
    }

    /// Maximum drawdown as a fraction of the running peak, and the number of
    /// bars from that peak to the trough
    pub fn calculate_max_drawdown(equity_curve: &[EquityPoint]) -> (f64, usize) {
        let Some(first) = equity_curve.first() else {
            return (0.0, 0);
        };

        let mut peak = first.equity;
        let mut peak_idx = 0;
        let mut max_drawdown = 0.0;
        let mut max_dd_duration = 0;

        for (i, point) in equity_curve.iter().enumerate() {
            if point.equity > peak {
                peak = point.equity;
                peak_idx = i;
            }

            let drawdown = drawdown_fraction(peak, point.equity);
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
                max_dd_duration = i - peak_idx;
            }
        }

        (max_drawdown, max_dd_duration)
    }

    /// Drawdown from the running peak at every bar of the equity curve
    pub fn calculate_drawdown_curve(equity_curve: &[EquityPoint]) -> Vec<DrawdownPoint> {
        let mut peak = f64::MIN;
        equity_curve
            .iter()
            .map(|point| {
                peak = peak.max(point.equity);
                DrawdownPoint {
                    timestamp: point.timestamp,
                    drawdown: drawdown_fraction(peak, point.equity),
                }
            })
            .collect()
    }

    /// Calculate trade statistics
    fn calculate_trade_stats(trades: &[Trade]) -> TradeStats {
        if trades.is_empty() {
            return TradeStats {
                profit_factor: f64::INFINITY,
                ..Default::default()
            };
        }

        let mut stats = TradeStats {
            best: f64::MIN,
            worst: f64::MAX,
            ..Default::default()
        };
        let mut gross_profit = 0.0;
        let mut gross_loss = 0.0;

        for trade in trades {
            if trade.pnl > 0.0 {
                stats.winning += 1;
                gross_profit += trade.pnl;
            } else if trade.pnl < 0.0 {
                stats.losing += 1;
                gross_loss += trade.pnl.abs();
            }
            stats.best = stats.best.max(trade.pnl);
            stats.worst = stats.worst.min(trade.pnl);
        }

        let decided = stats.winning + stats.losing;
        stats.win_rate = if decided > 0 {
            stats.winning as f64 / decided as f64
        } else {
            0.0
        };

        if stats.winning > 0 {
            stats.avg_win = gross_profit / stats.winning as f64;
        }
        if stats.losing > 0 {
            stats.avg_loss = gross_loss / stats.losing as f64;
        }

        // No losing trade means nothing to divide by
        stats.profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else {
            f64::INFINITY
        };

        stats.expectancy = stats.win_rate * stats.avg_win - (1.0 - stats.win_rate) * stats.avg_loss;
        stats
    }

    /// Share of bars spent in a position, in percent
    fn calculate_exposure(equity_curve: &[EquityPoint], trades: &[Trade]) -> f64 {
        if equity_curve.is_empty() || trades.is_empty() {
            return 0.0;
        }

        let total_bars = equity_curve.len() as f64;
        let invested_bars: usize = trades.iter().map(|t| t.holding_bars.max(1)).sum();

        (invested_bars as f64 / total_bars * 100.0).min(100.0)
    }
}

#[derive(Debug, Default)]
struct TradeStats {
    winning: usize,
    losing: usize,
    win_rate: f64,
    avg_win: f64,
    avg_loss: f64,
    profit_factor: f64,
    expectancy: f64,
    best: f64,
    worst: f64,
}

fn drawdown_fraction(peak: f64, equity: f64) -> f64 {
    if peak > 0.0 {
        ((peak - equity) / peak).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; `None` with fewer than two values
fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}
