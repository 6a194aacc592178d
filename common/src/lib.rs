pub mod config;
pub mod error;
pub mod timeframe;
pub mod types;

pub use config::{
    BollingerParams, DivergenceParams, Direction, EmaParams, ExecutionConfig, ExitPolicy,
    Indicator, Literal, Logic, MacdParams, Operator, RibbonParams, RiskSpec, RsiParams,
    StrategySpec, SweepSpec, Target, TriggerSpec, WalkForwardSpec, WaveTrendParams,
    MAX_SWEEP_POINTS,
};
pub use error::{BacktestError, Result};
pub use timeframe::Timeframe;
pub use types::*;
