use std::time::Instant;

use common::{
    BacktestError, BacktestResult, Bar, Direction, EquityPoint, ExecutionConfig, ExitPolicy,
    Indicator, PositionSide, Result, SimulationMode, StrategySpec, Timeframe, Trade,
};

use crate::execution::ExecutionSimulator;
use crate::metrics::MetricsCalculator;
use crate::portfolio::{position_size, Portfolio};
use crate::signals::SignalEngine;
use crate::vectorized::{can_vectorize, run_vectorized};

/// Equity curve and trades of one simulation
#[derive(Debug, Clone)]
pub struct Simulation {
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
}

/// Backtest engine: evaluates a strategy's signal and simulates it
#[derive(Debug, Clone)]
pub struct BacktestEngine {
    strategy: StrategySpec,
    execution: ExecutionConfig,
    base_timeframe: Option<Timeframe>,
}

impl BacktestEngine {
    pub fn new(strategy: StrategySpec) -> Self {
        Self {
            strategy,
            execution: ExecutionConfig::default(),
            base_timeframe: None,
        }
    }

    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    /// Override the base timeframe otherwise inferred from bar spacing
    pub fn with_base_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.base_timeframe = Some(timeframe);
        self
    }

    pub fn strategy(&self) -> &StrategySpec {
        &self.strategy
    }

    pub fn execution(&self) -> &ExecutionConfig {
        &self.execution
    }

    /// Run backtest on provided bar data
    pub fn run(&self, bars: &[Bar]) -> Result<BacktestResult> {
        let span = tracing::info_span!(
            "backtest",
            strategy = %self.strategy.name,
            bars = bars.len()
        );
        let _enter = span.enter();
        let start_time = Instant::now();

        validate_bars(bars)?;

        let mut signals = SignalEngine::new(bars);
        if let Some(tf) = self.base_timeframe {
            signals = signals.with_base_timeframe(tf);
        }
        // Daily annualization when the spacing cannot be inferred
        let base_timeframe = signals.base_timeframe().unwrap_or_else(|| Timeframe::days(1));

        let evaluation = signals.evaluate(&self.strategy)?;
        let mut diagnostics = evaluation.diagnostics;

        let capital = self.strategy.risk.initial_capital;
        let (mode, simulation) = if can_vectorize(&self.strategy, &self.execution) {
            let (equity_curve, trades) = run_vectorized(bars, &evaluation.signal, capital);
            (
                SimulationMode::Vectorized,
                Simulation {
                    equity_curve,
                    trades,
                },
            )
        } else {
            let middle_band = match self.mean_reversion_band(&mut signals) {
                Ok(band) => band,
                Err(BacktestError::InvalidStrategySpec(msg)) => {
                    diagnostics.push(format!("Invalid strategy spec: {}", msg));
                    None
                }
                Err(e) => return Err(e),
            };
            (
                SimulationMode::EventDriven,
                self.simulate(bars, &evaluation.signal, middle_band.as_deref()),
            )
        };

        let metrics = MetricsCalculator::calculate(
            &simulation.equity_curve,
            &simulation.trades,
            capital,
            base_timeframe.periods_per_year(),
            self.execution.risk_free_rate,
        )?;
        let final_equity = simulation
            .equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(capital);

        tracing::info!(
            mode = ?mode,
            trades = simulation.trades.len(),
            final_equity,
            "backtest complete"
        );

        Ok(BacktestResult {
            strategy: self.strategy.name.clone(),
            mode,
            metrics,
            drawdown_curve: MetricsCalculator::calculate_drawdown_curve(&simulation.equity_curve),
            equity_curve: simulation.equity_curve,
            trades: simulation.trades,
            initial_capital: capital,
            final_equity,
            diagnostics,
            execution_time_ms: start_time.elapsed().as_millis() as u64,
            optimization: None,
        })
    }

    /// Middle band of the first Bollinger trigger, when exiting on mean reversion
    fn mean_reversion_band(&self, signals: &mut SignalEngine<'_>) -> Result<Option<Vec<f64>>> {
        if self.strategy.exit != ExitPolicy::MeanReversion {
            return Ok(None);
        }

        let bollinger = self
            .strategy
            .triggers
            .iter()
            .find(|t| matches!(t.indicator, Indicator::Bollinger(_)));

        match bollinger {
            Some(trigger) => signals
                .projected_column(&trigger.indicator, trigger.timeframe, "middle")
                .map(Some),
            None => {
                tracing::warn!(
                    strategy = %self.strategy.name,
                    "mean reversion exit without a bollinger trigger, exiting on signal loss"
                );
                Ok(None)
            }
        }
    }

    /// Event-driven simulation of a precomputed signal.
    ///
    /// While in a position, each bar after the entry bar checks the stop
    /// (against low/high) before the target, filling at that level; otherwise
    /// the exit policy may close at the bar's close. When flat and the signal
    /// is true, enters at the close. The final bar closes any open position.
    pub fn simulate(&self, bars: &[Bar], signal: &[bool], middle_band: Option<&[f64]>) -> Simulation {
        let risk = &self.strategy.risk;
        let side = match self.strategy.direction {
            Direction::Long => PositionSide::Long,
            Direction::Short => PositionSide::Short,
        };

        let execution = ExecutionSimulator::new(self.execution.clone());
        let mut portfolio = Portfolio::new(risk.initial_capital);
        let mut equity_curve = Vec::with_capacity(bars.len());
        let last = bars.len().saturating_sub(1);

        for (i, bar) in bars.iter().enumerate() {
            let on = signal.get(i).copied().unwrap_or(false);
            let mut exited = false;

            if let Some(pos) = portfolio.current_position() {
                let in_trade = portfolio.entry_bar().is_some_and(|entry| i > entry);
                let exit = if in_trade {
                    check_exit_levels(
                        pos.side,
                        pos.stop_loss_price,
                        pos.take_profit_price,
                        bar,
                    )
                    .or_else(|| self.policy_exit(pos.side, on, bars, i, middle_band))
                } else {
                    None
                };

                if let Some((price, reason)) = exit {
                    let fill = execution.execute(pos.side.entry_side().opposite(), pos.quantity, price);
                    if let Some(trade) = portfolio.apply_fill(&fill, bar.timestamp, i, reason) {
                        tracing::debug!(bar = i, pnl = trade.pnl, reason, "exit");
                    }
                    exited = true;
                }
            }

            if on && !exited && !portfolio.has_position() && i < last {
                self.try_enter(&mut portfolio, &execution, side, bar, i);
            }

            portfolio.update_price(bar.close);

            if i == last {
                if let Some(pos) = portfolio.current_position() {
                    let fill =
                        execution.execute(pos.side.entry_side().opposite(), pos.quantity, bar.close);
                    portfolio.apply_fill(&fill, bar.timestamp, i, "end of data");
                }
            }

            equity_curve.push(EquityPoint {
                timestamp: bar.timestamp,
                equity: portfolio.equity(),
            });
        }

        Simulation {
            equity_curve,
            trades: portfolio.into_trades(),
        }
    }

    fn try_enter(
        &self,
        portfolio: &mut Portfolio,
        execution: &ExecutionSimulator,
        side: PositionSide,
        bar: &Bar,
        i: usize,
    ) {
        let risk = &self.strategy.risk;
        let entry = bar.close;
        let stop = entry * (1.0 - side.sign() * risk.stop_loss_pct);
        let target = (risk.take_profit_pct > 0.0)
            .then(|| entry * (1.0 + side.sign() * risk.take_profit_pct));

        let quantity = position_size(portfolio.equity(), risk.risk_per_trade_pct, entry, stop);
        if quantity <= 0.0 {
            return;
        }

        let fill = execution.execute(side.entry_side(), quantity, entry);
        portfolio.apply_fill(&fill, bar.timestamp, i, "entry");
        portfolio.set_exit_levels(Some(stop), target);
        tracing::debug!(bar = i, side = ?side, quantity, price = fill.price, "entry");
    }

    /// Exit at close under the strategy's exit policy
    fn policy_exit(
        &self,
        side: PositionSide,
        on: bool,
        bars: &[Bar],
        i: usize,
        middle_band: Option<&[f64]>,
    ) -> Option<(f64, &'static str)> {
        let close = bars[i].close;
        match (self.strategy.exit, middle_band) {
            (ExitPolicy::MeanReversion, Some(band)) => {
                let middle = band.get(i).copied().filter(|m| !m.is_nan())?;
                let reverted = match side {
                    PositionSide::Long => close <= middle,
                    PositionSide::Short => close >= middle,
                };
                reverted.then_some((close, "mean reversion"))
            }
            _ => (!on).then_some((close, "signal lost")),
        }
    }
}

/// Stop first, then target, against the bar's range
fn check_exit_levels(
    side: PositionSide,
    stop: Option<f64>,
    target: Option<f64>,
    bar: &Bar,
) -> Option<(f64, &'static str)> {
    let (stop_hit, target_hit) = match side {
        PositionSide::Long => (
            stop.filter(|&s| bar.low <= s),
            target.filter(|&t| bar.high >= t),
        ),
        PositionSide::Short => (
            stop.filter(|&s| bar.high >= s),
            target.filter(|&t| bar.low <= t),
        ),
    };

    stop_hit
        .map(|s| (s, "stop loss"))
        .or_else(|| target_hit.map(|t| (t, "take profit")))
}

/// Bars must be non-empty with strictly increasing timestamps
fn validate_bars(bars: &[Bar]) -> Result<()> {
    if bars.is_empty() {
        return Err(BacktestError::NoData("no bars to backtest".to_string()));
    }
    if let Some(pos) = bars.windows(2).position(|w| w[1].timestamp <= w[0].timestamp) {
        return Err(BacktestError::InvalidParameter(format!(
            "bar timestamps must be strictly increasing (bar {} at {})",
            pos + 1,
            bars[pos + 1].timestamp
        )));
    }
    Ok(())
}
