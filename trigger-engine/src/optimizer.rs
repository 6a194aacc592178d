//! Threshold sweeps and walk-forward parameter search.
//!
//! Every grid point reruns the full pipeline (signal evaluation and
//! simulation) on the same bars. Points run on the rayon pool; reports are
//! ordered by grid value (sweep) or PnL (walk-forward), never by completion.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use common::{
    BacktestError, BacktestResult, Bar, ExecutionConfig, GridFailure, GridPoint, Literal,
    OptimizationReport, Result, StrategySpec, SweepSpec, Timeframe, WalkForwardEntry,
    WalkForwardReport, WalkForwardSpec,
};

use crate::engine::BacktestEngine;

/// Parameter optimizer over a base strategy
#[derive(Debug, Clone)]
pub struct Optimizer {
    strategy: StrategySpec,
    execution: ExecutionConfig,
    base_timeframe: Option<Timeframe>,
    cancel: Option<Arc<AtomicBool>>,
    parallel: bool,
}

impl Optimizer {
    pub fn new(strategy: StrategySpec) -> Self {
        Self {
            strategy,
            execution: ExecutionConfig::default(),
            base_timeframe: None,
            cancel: None,
            parallel: true,
        }
    }

    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }

    pub fn with_base_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.base_timeframe = Some(timeframe);
        self
    }

    /// Stop dispatching grid points once `flag` is set
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Enables or disables parallel execution
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Sweep the numeric threshold of one trigger over `spec`'s grid
    pub fn sweep(&self, bars: &[Bar], spec: &SweepSpec) -> Result<OptimizationReport> {
        let span = tracing::info_span!(
            "sweep",
            strategy = %self.strategy.name,
            trigger_index = spec.trigger_index
        );
        let _enter = span.enter();

        let trigger = self.strategy.triggers.get(spec.trigger_index).ok_or_else(|| {
            BacktestError::InvalidParameter(format!(
                "trigger index {} out of range ({} triggers)",
                spec.trigger_index,
                self.strategy.triggers.len()
            ))
        })?;
        if trigger.threshold().is_none() {
            return Err(BacktestError::InvalidParameter(format!(
                "trigger {} ({}) has no numeric value to sweep",
                spec.trigger_index,
                trigger.indicator.name()
            )));
        }

        let values = spec.values()?;
        tracing::info!(points = values.len(), "starting sweep");

        let outcomes = self.run_points(&values, |&value| {
            self.engine(self.with_threshold(spec.trigger_index, value)).run(bars)
        });

        let mut grid = Vec::with_capacity(values.len());
        let mut failures = Vec::new();
        let mut cancelled = false;

        for (&value, outcome) in values.iter().zip(outcomes) {
            match outcome {
                Some(Ok(result)) => grid.push(GridPoint {
                    value,
                    pnl: result.pnl(),
                    trade_count: result.trades.len(),
                }),
                Some(Err(e)) => {
                    tracing::warn!(value, error = %e, "sweep point failed");
                    failures.push(GridFailure {
                        label: format!("value={}", value),
                        error: e.to_string(),
                    });
                }
                None => cancelled = true,
            }
        }

        // First grid point wins ties
        let best = grid.iter().fold(None::<&GridPoint>, |best, point| match best {
            Some(b) if b.pnl >= point.pnl => Some(b),
            _ => Some(point),
        });

        if let Some(b) = best {
            tracing::info!(best_value = b.value, best_pnl = b.pnl, "sweep complete");
        }

        Ok(OptimizationReport {
            trigger_index: spec.trigger_index,
            best_value: best.map(|b| b.value),
            best_pnl: best.map(|b| b.pnl),
            grid,
            failures,
            cancelled,
        })
    }

    /// Backtest at the best swept value, carrying the sweep report in
    /// `optimization`. Falls back to the base strategy when no point succeeded.
    pub fn sweep_result(&self, bars: &[Bar], spec: &SweepSpec) -> Result<BacktestResult> {
        let report = self.sweep(bars, spec)?;
        let strategy = match report.best_value {
            Some(value) => self.with_threshold(spec.trigger_index, value),
            None => self.strategy.clone(),
        };

        let mut result = self.engine(strategy).run(bars)?;
        result.optimization = Some(report);
        Ok(result)
    }

    /// Run every parameter combination of `spec`, best PnL first
    pub fn walk_forward(&self, bars: &[Bar], spec: &WalkForwardSpec) -> Result<WalkForwardReport> {
        let span = tracing::info_span!(
            "walk_forward",
            strategy = %self.strategy.name,
            parameters = spec.parameters.len()
        );
        let _enter = span.enter();

        let combinations = spec.combinations();
        if combinations.is_empty() {
            return Err(BacktestError::InvalidParameter(
                "walk-forward needs at least one parameter with values".to_string(),
            ));
        }

        for name in spec.parameters.keys() {
            if matching_triggers(&self.strategy, name) == 0 {
                tracing::warn!(parameter = %name, "parameter matches no trigger");
            }
        }
        tracing::info!(combinations = combinations.len(), "starting walk-forward");

        let outcomes = self.run_points(&combinations, |params| {
            self.engine(bind_parameters(&self.strategy, params)).run(bars)
        });

        let mut entries = Vec::with_capacity(combinations.len());
        let mut failures = Vec::new();
        let mut cancelled = false;

        for (params, outcome) in combinations.into_iter().zip(outcomes) {
            match outcome {
                Some(Ok(result)) => entries.push(entry_from(params, &result)),
                Some(Err(e)) => {
                    let label = describe(&params);
                    tracing::warn!(parameters = %label, error = %e, "walk-forward point failed");
                    failures.push(GridFailure {
                        label,
                        error: e.to_string(),
                    });
                }
                None => cancelled = true,
            }
        }

        entries.sort_by(|a, b| b.pnl.total_cmp(&a.pnl));

        Ok(WalkForwardReport {
            entries,
            failures,
            cancelled,
        })
    }

    /// Base strategy with trigger `index` compared against `value`
    fn with_threshold(&self, index: usize, value: f64) -> StrategySpec {
        let mut strategy = self.strategy.clone();
        if let Some(trigger) = strategy.triggers.get_mut(index) {
            trigger.value = Some(Literal::Number(value));
        }
        strategy
    }

    fn engine(&self, strategy: StrategySpec) -> BacktestEngine {
        let engine = BacktestEngine::new(strategy).with_execution(self.execution.clone());
        match self.base_timeframe {
            Some(tf) => engine.with_base_timeframe(tf),
            None => engine,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    /// Evaluate `f` on each point in order; `None` marks a point skipped by cancellation
    fn run_points<T, R, F>(&self, points: &[T], f: F) -> Vec<Option<R>>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync,
    {
        let run = |point: &T| (!self.is_cancelled()).then(|| f(point));

        if self.parallel {
            points.par_iter().map(run).collect()
        } else {
            points.iter().map(run).collect()
        }
    }
}

/// Apply named parameter values to a copy of `strategy`.
///
/// A name selects every trigger whose indicator family it contains. Names
/// containing `threshold` set the trigger's numeric value; anything else is
/// handed to [`common::Indicator::set_parameter`].
pub fn bind_parameters(strategy: &StrategySpec, params: &BTreeMap<String, f64>) -> StrategySpec {
    let mut bound = strategy.clone();

    for (name, &value) in params {
        let key = name.to_lowercase();
        for trigger in bound
            .triggers
            .iter_mut()
            .filter(|t| key.contains(t.indicator.family()))
        {
            if key.contains("threshold") {
                if trigger.compare_to.is_none() {
                    trigger.value = Some(Literal::Number(value));
                }
            } else {
                trigger.indicator.set_parameter(&key, value);
            }
        }
    }

    bound
}

/// Number of triggers a parameter name binds to
pub fn matching_triggers(strategy: &StrategySpec, name: &str) -> usize {
    let key = name.to_lowercase();
    strategy
        .triggers
        .iter()
        .filter(|t| key.contains(t.indicator.family()))
        .count()
}

fn entry_from(parameters: BTreeMap<String, f64>, result: &BacktestResult) -> WalkForwardEntry {
    WalkForwardEntry {
        parameters,
        pnl: result.pnl(),
        trade_count: result.trades.len(),
        sharpe_ratio: result.metrics.sharpe_ratio,
    }
}

fn describe(params: &BTreeMap<String, f64>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::generate_synthetic_bars;
    use common::{Indicator, Operator, TriggerSpec};

    fn bars() -> Vec<Bar> {
        generate_synthetic_bars(250, 100.0, 42, Timeframe::days(1))
    }

    fn two_trigger_strategy() -> StrategySpec {
        StrategySpec::new("sweepable")
            .with_trigger(TriggerSpec::new(Indicator::Price, Operator::Gt).with_value(0.0))
            .with_trigger(TriggerSpec::new(Indicator::rsi(14), Operator::Lt).with_value(70.0))
    }

    fn sweep_spec(trigger_index: usize) -> SweepSpec {
        SweepSpec {
            trigger_index,
            start: 60.0,
            end: 80.0,
            step: 5.0,
        }
    }

    #[test]
    fn test_sweep_grid_and_best() {
        let report = Optimizer::new(two_trigger_strategy())
            .sweep(&bars(), &sweep_spec(1))
            .unwrap();

        assert_eq!(report.grid.len(), 5);
        let values: Vec<f64> = report.grid.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![60.0, 65.0, 70.0, 75.0, 80.0]);

        let max_pnl = report
            .grid
            .iter()
            .map(|p| p.pnl)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(report.best_pnl, Some(max_pnl));
        assert!(!report.cancelled);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_sweep_matches_sequential() {
        let data = bars();
        let parallel = Optimizer::new(two_trigger_strategy())
            .sweep(&data, &sweep_spec(1))
            .unwrap();
        let sequential = Optimizer::new(two_trigger_strategy())
            .with_parallelism(false)
            .sweep(&data, &sweep_spec(1))
            .unwrap();
        assert_eq!(parallel.grid, sequential.grid);
    }

    #[test]
    fn test_sweep_rejects_bad_index() {
        let err = Optimizer::new(two_trigger_strategy())
            .sweep(&bars(), &sweep_spec(5))
            .unwrap_err();
        assert!(matches!(err, BacktestError::InvalidParameter(_)));
    }

    #[test]
    fn test_sweep_rejects_non_numeric_trigger() {
        let strategy = StrategySpec::new("labels").with_trigger(
            TriggerSpec::new(Indicator::bollinger(20, 2.0), Operator::Gt).with_compare_to("upper"),
        );
        let err = Optimizer::new(strategy)
            .sweep(&bars(), &sweep_spec(0))
            .unwrap_err();
        assert!(matches!(err, BacktestError::InvalidParameter(_)));
    }

    #[test]
    fn test_failed_points_are_recorded() {
        let report = Optimizer::new(two_trigger_strategy())
            .sweep(&[], &sweep_spec(1))
            .unwrap();
        assert!(report.grid.is_empty());
        assert_eq!(report.failures.len(), 5);
        assert_eq!(report.best_value, None);
    }

    #[test]
    fn test_cancelled_sweep_skips_points() {
        let flag = Arc::new(AtomicBool::new(true));
        let report = Optimizer::new(two_trigger_strategy())
            .with_cancel_flag(flag)
            .sweep(&bars(), &sweep_spec(1))
            .unwrap();
        assert!(report.cancelled);
        assert!(report.grid.is_empty());
    }

    #[test]
    fn test_walk_forward_sorted_by_pnl() {
        let spec = WalkForwardSpec::default()
            .with_parameter("rsi_period", vec![7.0, 14.0])
            .with_parameter("rsi_threshold", vec![50.0, 70.0]);
        let report = Optimizer::new(two_trigger_strategy())
            .walk_forward(&bars(), &spec)
            .unwrap();

        assert_eq!(report.entries.len(), 4);
        assert!(report.entries.windows(2).all(|w| w[0].pnl >= w[1].pnl));
        assert_eq!(report.best().map(|e| e.parameters.len()), Some(2));
    }

    #[test]
    fn test_sweep_result_carries_optimization_block() {
        let data = bars();
        let result = Optimizer::new(two_trigger_strategy())
            .sweep_result(&data, &sweep_spec(1))
            .unwrap();

        let report = result.optimization.as_ref().unwrap();
        let best = report
            .grid
            .iter()
            .find(|p| Some(p.value) == report.best_value)
            .unwrap();
        assert_eq!(result.pnl(), best.pnl);
        assert_eq!(result.trades.len(), best.trade_count);
        assert_eq!(result.equity_curve.len(), data.len());

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json["optimization"]["best_value"],
            serde_json::json!(best.value)
        );
        assert_eq!(json["optimization"]["best_pnl"], serde_json::json!(best.pnl));
        assert_eq!(
            json["optimization"]["grid"].as_array().map(|g| g.len()),
            Some(5)
        );
    }

    #[test]
    fn test_cancelled_sweep_result_runs_base_strategy() {
        let data = bars();
        let result = Optimizer::new(two_trigger_strategy())
            .with_cancel_flag(Arc::new(AtomicBool::new(true)))
            .sweep_result(&data, &sweep_spec(1))
            .unwrap();
        let base = BacktestEngine::new(two_trigger_strategy()).run(&data).unwrap();

        assert!(result.optimization.as_ref().is_some_and(|r| r.cancelled));
        assert_eq!(result.pnl(), base.pnl());
    }

    #[test]
    fn test_walk_forward_survives_oversized_period() {
        let strategy = StrategySpec::new("bands").with_trigger(
            TriggerSpec::new(Indicator::bollinger(20, 2.0), Operator::Gt)
                .with_field("close")
                .with_compare_to("upper"),
        );
        let spec = WalkForwardSpec::default().with_parameter("bollinger_period", vec![20.0, 1e18]);
        let report = Optimizer::new(strategy).walk_forward(&bars(), &spec).unwrap();

        assert_eq!(report.entries.len(), 2);
        assert!(report.failures.is_empty());

        let huge = report
            .entries
            .iter()
            .find(|e| e.parameters["bollinger_period"] == 1e18)
            .unwrap();
        assert_eq!(huge.trade_count, 0);
        assert_eq!(huge.pnl, 0.0);
    }

    #[test]
    fn test_walk_forward_requires_parameters() {
        let err = Optimizer::new(two_trigger_strategy())
            .walk_forward(&bars(), &WalkForwardSpec::default())
            .unwrap_err();
        assert!(matches!(err, BacktestError::InvalidParameter(_)));
    }

    #[test]
    fn test_bind_parameters_by_family() {
        let params = BTreeMap::from([
            ("rsi_period".to_string(), 7.0),
            ("rsi_threshold".to_string(), 30.0),
        ]);
        let bound = bind_parameters(&two_trigger_strategy(), &params);

        assert_eq!(bound.triggers[0], two_trigger_strategy().triggers[0]);
        assert_eq!(bound.triggers[1].indicator, Indicator::rsi(7));
        assert_eq!(bound.triggers[1].threshold(), Some(30.0));

        assert_eq!(matching_triggers(&two_trigger_strategy(), "RSI_period"), 1);
        assert_eq!(matching_triggers(&two_trigger_strategy(), "macd_fast"), 0);
    }
}
