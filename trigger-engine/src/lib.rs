pub mod data;
pub mod engine;
pub mod execution;
pub mod indicators;
pub mod metrics;
pub mod optimizer;
pub mod portfolio;
pub mod signals;
pub mod vectorized;

pub use data::{generate_synthetic_bars, load_file, resample};
pub use engine::{BacktestEngine, Simulation};
pub use execution::{ExecutionSimulator, Fill, PriceAdjustments};
pub use metrics::MetricsCalculator;
pub use optimizer::{bind_parameters, Optimizer};
pub use portfolio::{position_size, Portfolio};
pub use signals::{Evaluation, SignalEngine};
pub use vectorized::{can_vectorize, run_vectorized};

// Re-export common types
pub use common::{
    BacktestError, BacktestResult, Bar, Direction, DrawdownPoint, EquityPoint, ExecutionConfig,
    ExitPolicy, GridFailure, Indicator, Logic, Operator, OptimizationReport, PerformanceMetrics,
    Position, PositionSide, Result, RiskSpec, Side, SimulationMode, StrategySpec, SweepSpec,
    Timeframe, Trade, TriggerSpec, WalkForwardReport, WalkForwardSpec, MAX_SWEEP_POINTS,
};
