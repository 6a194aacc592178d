use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BacktestError, Result};
use crate::timeframe::Timeframe;

fn default_rsi_period() -> usize {
    14
}

fn default_ema_period() -> usize {
    20
}

/// RSI parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RsiParams {
    #[serde(default = "default_rsi_period")]
    pub period: usize,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self {
            period: default_rsi_period(),
        }
    }
}

/// EMA parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmaParams {
    #[serde(default = "default_ema_period")]
    pub period: usize,
}

impl Default for EmaParams {
    fn default() -> Self {
        Self {
            period: default_ema_period(),
        }
    }
}

/// MACD parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// Bollinger Band parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BollingerParams {
    pub period: usize,
    pub std_mult: f64,
}

impl Default for BollingerParams {
    fn default() -> Self {
        Self {
            period: 20,
            std_mult: 2.0,
        }
    }
}

/// EMA ribbon parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RibbonParams {
    pub periods: Vec<usize>,
}

impl Default for RibbonParams {
    fn default() -> Self {
        Self {
            periods: vec![8, 13, 21, 34, 55],
        }
    }
}

/// WaveTrend oscillator parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WaveTrendParams {
    /// Channel length
    pub n1: usize,
    /// Average length
    pub n2: usize,
    pub overbought: f64,
    pub oversold: f64,
}

impl Default for WaveTrendParams {
    fn default() -> Self {
        Self {
            n1: 10,
            n2: 21,
            overbought: 53.0,
            oversold: -53.0,
        }
    }
}

/// Price/RSI divergence parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DivergenceParams {
    /// Bars on each side of a pivot
    pub lookback: usize,
    pub rsi_period: usize,
}

impl Default for DivergenceParams {
    fn default() -> Self {
        Self {
            lookback: 5,
            rsi_period: 14,
        }
    }
}

/// Closed set of indicator kinds, each with its own parameters.
///
/// Any unrecognized `type` deserializes to [`Indicator::Price`], a close-price
/// passthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Indicator {
    Rsi(RsiParams),
    Ema(EmaParams),
    Macd(MacdParams),
    Bollinger(BollingerParams),
    Vwap,
    EmaRibbon(RibbonParams),
    WavetrendDot(WaveTrendParams),
    #[serde(rename = "wavetrend_wt1")]
    WavetrendWt1(WaveTrendParams),
    #[serde(rename = "wavetrend_wt2")]
    WavetrendWt2(WaveTrendParams),
    Divergence(DivergenceParams),
    #[serde(other)]
    Price,
}

impl Indicator {
    pub fn rsi(period: usize) -> Self {
        Indicator::Rsi(RsiParams { period })
    }

    pub fn ema(period: usize) -> Self {
        Indicator::Ema(EmaParams { period })
    }

    pub fn bollinger(period: usize, std_mult: f64) -> Self {
        Indicator::Bollinger(BollingerParams { period, std_mult })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Indicator::Rsi(_) => "rsi",
            Indicator::Ema(_) => "ema",
            Indicator::Macd(_) => "macd",
            Indicator::Bollinger(_) => "bollinger",
            Indicator::Vwap => "vwap",
            Indicator::EmaRibbon(_) => "ema_ribbon",
            Indicator::WavetrendDot(_) => "wavetrend_dot",
            Indicator::WavetrendWt1(_) => "wavetrend_wt1",
            Indicator::WavetrendWt2(_) => "wavetrend_wt2",
            Indicator::Divergence(_) => "divergence",
            Indicator::Price => "price",
        }
    }

    /// Prefix used to bind walk-forward parameter names to this indicator
    pub fn family(&self) -> &'static str {
        match self {
            Indicator::WavetrendDot(_) | Indicator::WavetrendWt1(_) | Indicator::WavetrendWt2(_) => {
                "wavetrend"
            }
            other => other.name(),
        }
    }

    /// Set the parameter whose key appears in `name`; returns whether anything changed.
    ///
    /// Binding is by substring, so `macd_fast_period` sets `fast` and
    /// `bollinger_std` sets `std_mult`. Integer parameters are rounded and
    /// clamped to at least 1.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> bool {
        let name = name.to_lowercase();
        let as_period = || value.round().max(1.0) as usize;

        match self {
            Indicator::Rsi(p) if name.contains("period") => p.period = as_period(),
            Indicator::Ema(p) if name.contains("period") => p.period = as_period(),
            Indicator::Macd(p) if name.contains("fast") => p.fast = as_period(),
            Indicator::Macd(p) if name.contains("slow") => p.slow = as_period(),
            Indicator::Macd(p) if name.contains("signal") => p.signal = as_period(),
            Indicator::Bollinger(p) if name.contains("std") || name.contains("mult") => {
                p.std_mult = value
            }
            Indicator::Bollinger(p) if name.contains("period") => p.period = as_period(),
            Indicator::WavetrendDot(p) | Indicator::WavetrendWt1(p) | Indicator::WavetrendWt2(p) => {
                if name.contains("n1") || name.contains("channel") {
                    p.n1 = as_period();
                } else if name.contains("n2") || name.contains("average") {
                    p.n2 = as_period();
                } else if name.contains("overbought") {
                    p.overbought = value;
                } else if name.contains("oversold") {
                    p.oversold = value;
                } else {
                    return false;
                }
            }
            Indicator::Divergence(p) if name.contains("lookback") => p.lookback = as_period(),
            Indicator::Divergence(p) if name.contains("period") => p.rsi_period = as_period(),
            _ => return false,
        }
        true
    }

    /// Bars needed before the primary column carries its first value
    pub fn min_bars(&self) -> usize {
        match self {
            Indicator::Rsi(p) => p.period.max(1).saturating_add(1),
            Indicator::Ema(p) => p.period.max(1),
            Indicator::Macd(p) => p.fast.max(p.slow).max(1),
            Indicator::Bollinger(p) => p.period.max(1),
            Indicator::EmaRibbon(p) => p.periods.iter().copied().max().unwrap_or(1).max(1),
            Indicator::WavetrendWt1(p) => p
                .n1
                .max(1)
                .saturating_mul(2)
                .saturating_add(p.n2.max(1))
                .saturating_sub(2),
            Indicator::WavetrendDot(p) | Indicator::WavetrendWt2(p) => p
                .n1
                .max(1)
                .saturating_mul(2)
                .saturating_add(p.n2.max(1))
                .saturating_add(1),
            Indicator::Divergence(p) => p.lookback.max(1).saturating_mul(2).saturating_add(1),
            Indicator::Vwap | Indicator::Price => 1,
        }
    }
}

/// Comparison operator of a trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "crosses_up")]
    CrossesUp,
    #[serde(rename = "crosses_down")]
    CrossesDown,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Ge => ">=",
            Operator::Le => "<=",
            Operator::Eq => "==",
            Operator::CrossesUp => "crosses_up",
            Operator::CrossesDown => "crosses_down",
        };
        f.write_str(s)
    }
}

impl FromStr for Operator {
    type Err = BacktestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            ">" => Ok(Operator::Gt),
            "<" => Ok(Operator::Lt),
            ">=" => Ok(Operator::Ge),
            "<=" => Ok(Operator::Le),
            "==" => Ok(Operator::Eq),
            "crosses_up" => Ok(Operator::CrossesUp),
            "crosses_down" => Ok(Operator::CrossesDown),
            other => Err(BacktestError::InvalidStrategySpec(format!(
                "unknown operator '{}'",
                other
            ))),
        }
    }
}

/// Literal comparison target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Number(f64),
    Text(String),
}

/// Resolved comparison target of a trigger
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target<'a> {
    Literal(&'a Literal),
    Column(&'a str),
}

/// One atomic condition: indicator + operator + target at a timeframe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerSpec {
    pub indicator: Indicator,
    /// Evaluation timeframe; the base timeframe when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<Timeframe>,
    pub operator: Operator,
    /// Source column; the indicator's primary column when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Literal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compare_to: Option<String>,
}

impl TriggerSpec {
    pub fn new(indicator: Indicator, operator: Operator) -> Self {
        Self {
            indicator,
            timeframe: None,
            operator,
            field: None,
            value: None,
            compare_to: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(Literal::Number(value));
        self.compare_to = None;
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.value = Some(Literal::Text(label.to_string()));
        self.compare_to = None;
        self
    }

    pub fn with_compare_to(mut self, column: &str) -> Self {
        self.compare_to = Some(column.to_string());
        self.value = None;
        self
    }

    pub fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = Some(timeframe);
        self
    }

    /// Exactly one of `value` and `compare_to` must be set
    pub fn target(&self) -> Result<Target<'_>> {
        match (&self.value, &self.compare_to) {
            (Some(v), None) => Ok(Target::Literal(v)),
            (None, Some(c)) => Ok(Target::Column(c)),
            (Some(_), Some(_)) => Err(BacktestError::InvalidStrategySpec(format!(
                "{} trigger sets both value and compare_to",
                self.indicator.name()
            ))),
            (None, None) => Err(BacktestError::InvalidStrategySpec(format!(
                "{} trigger has neither value nor compare_to",
                self.indicator.name()
            ))),
        }
    }

    /// Numeric threshold, if the target is a number literal
    pub fn threshold(&self) -> Option<f64> {
        match self.value {
            Some(Literal::Number(v)) => Some(v),
            _ => None,
        }
    }
}

/// How trigger columns are folded into the composite signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Logic {
    #[default]
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
}

/// Side the strategy trades when its signal is true
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Long,
    Short,
}

/// Exit rule applied when neither stop nor target fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitPolicy {
    /// Exit at close once the composite signal turns false
    #[default]
    SignalLost,
    /// Exit at close once price crosses back through the Bollinger middle band
    MeanReversion,
}

/// Capital and per-trade risk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSpec {
    pub initial_capital: f64,
    pub risk_per_trade_pct: f64,
    pub stop_loss_pct: f64,
    /// 0 disables the profit target
    pub take_profit_pct: f64,
}

impl Default for RiskSpec {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            risk_per_trade_pct: 0.01,
            stop_loss_pct: 0.05,
            take_profit_pct: 0.0,
        }
    }
}

impl RiskSpec {
    /// Whole equity per trade with an unreachable stop (long side)
    pub fn all_in(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            risk_per_trade_pct: 1.0,
            stop_loss_pct: 1.0,
            take_profit_pct: 0.0,
        }
    }

    pub fn with_capital(mut self, capital: f64) -> Self {
        self.initial_capital = capital;
        self
    }

    pub fn with_stop_loss(mut self, stop_loss_pct: f64) -> Self {
        self.stop_loss_pct = stop_loss_pct;
        self
    }

    pub fn with_take_profit(mut self, take_profit_pct: f64) -> Self {
        self.take_profit_pct = take_profit_pct;
        self
    }

    pub fn with_risk_per_trade(mut self, risk_per_trade_pct: f64) -> Self {
        self.risk_per_trade_pct = risk_per_trade_pct;
        self
    }
}

/// Fill model and metric settings
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Multiplicative adverse slippage (0.001 = 10 bps)
    pub slippage_pct: f64,
    /// Commission charged on fill notional
    pub commission_pct: f64,
    /// Annual risk-free rate subtracted in Sharpe/Sortino
    pub risk_free_rate: f64,
}

impl ExecutionConfig {
    pub fn with_slippage(mut self, slippage_pct: f64) -> Self {
        self.slippage_pct = slippage_pct;
        self
    }

    pub fn with_commission(mut self, commission_pct: f64) -> Self {
        self.commission_pct = commission_pct;
        self
    }

    pub fn is_frictionless(&self) -> bool {
        self.slippage_pct == 0.0 && self.commission_pct == 0.0
    }
}

/// Declarative strategy: triggers combined by logic, plus risk settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub name: String,
    #[serde(default)]
    pub triggers: Vec<TriggerSpec>,
    #[serde(default)]
    pub logic: Logic,
    #[serde(default)]
    pub risk: RiskSpec,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default)]
    pub exit: ExitPolicy,
    /// Declares the signal source safe for the vectorized fast path
    #[serde(default)]
    pub vectorized: bool,
}

impl Default for StrategySpec {
    fn default() -> Self {
        Self {
            name: "unnamed".to_string(),
            triggers: Vec::new(),
            logic: Logic::And,
            risk: RiskSpec::default(),
            direction: Direction::Long,
            exit: ExitPolicy::SignalLost,
            vectorized: false,
        }
    }
}

impl StrategySpec {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_trigger(mut self, trigger: TriggerSpec) -> Self {
        self.triggers.push(trigger);
        self
    }

    pub fn with_logic(mut self, logic: Logic) -> Self {
        self.logic = logic;
        self
    }

    pub fn with_risk(mut self, risk: RiskSpec) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn with_exit(mut self, exit: ExitPolicy) -> Self {
        self.exit = exit;
        self
    }

    pub fn vectorized(mut self) -> Self {
        self.vectorized = true;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| BacktestError::DataLoadError(e.to_string()))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Most grid points a single sweep may expand to
pub const MAX_SWEEP_POINTS: usize = 10_000;

/// Single-parameter threshold sweep over one trigger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSpec {
    pub trigger_index: usize,
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

impl SweepSpec {
    /// Inclusive grid `start + k * step`, tolerant of float accumulation at `end`
    pub fn values(&self) -> Result<Vec<f64>> {
        if !(self.step > 0.0) || !self.step.is_finite() {
            return Err(BacktestError::InvalidParameter(format!(
                "sweep step must be positive, got {}",
                self.step
            )));
        }
        if !self.start.is_finite() || !self.end.is_finite() || self.end < self.start {
            return Err(BacktestError::InvalidParameter(format!(
                "sweep range {}..={} is empty",
                self.start, self.end
            )));
        }

        let span = ((self.end - self.start) / self.step + 1e-9).floor();
        if !(span < MAX_SWEEP_POINTS as f64) {
            return Err(BacktestError::InvalidParameter(format!(
                "sweep {}..={} step {} exceeds {} points",
                self.start, self.end, self.step, MAX_SWEEP_POINTS
            )));
        }

        let count = span as usize + 1;
        Ok((0..count)
            .map(|k| self.start + k as f64 * self.step)
            .collect())
    }
}

/// Cartesian grid of named parameters
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WalkForwardSpec {
    pub parameters: BTreeMap<String, Vec<f64>>,
}

impl WalkForwardSpec {
    pub fn with_parameter(mut self, name: &str, values: Vec<f64>) -> Self {
        self.parameters.insert(name.to_string(), values);
        self
    }

    /// Every combination, in lexicographic order of parameter names
    pub fn combinations(&self) -> Vec<BTreeMap<String, f64>> {
        let mut combos = vec![BTreeMap::new()];
        for (name, values) in &self.parameters {
            let mut next = Vec::with_capacity(combos.len() * values.len());
            for combo in &combos {
                for &value in values {
                    let mut extended = combo.clone();
                    extended.insert(name.clone(), value);
                    next.push(extended);
                }
            }
            combos = next;
        }
        if self.parameters.is_empty() {
            Vec::new()
        } else {
            combos
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_from_json() {
        let json = r#"{
            "indicator": {"type": "rsi", "period": 14},
            "timeframe": "1h",
            "operator": "<",
            "value": 70
        }"#;
        let trigger: TriggerSpec = serde_json::from_str(json).unwrap();

        assert_eq!(trigger.indicator, Indicator::rsi(14));
        assert_eq!(trigger.timeframe, Some(Timeframe::hours(1)));
        assert_eq!(trigger.operator, Operator::Lt);
        assert_eq!(trigger.threshold(), Some(70.0));
    }

    #[test]
    fn test_unknown_indicator_falls_back_to_price() {
        let json = r#"{"indicator": {"type": "supertrend", "period": 10}, "operator": ">", "value": 1}"#;
        let trigger: TriggerSpec = serde_json::from_str(json).unwrap();
        assert_eq!(trigger.indicator, Indicator::Price);
    }

    #[test]
    fn test_unknown_parameter_key_rejected() {
        let json = r#"{"indicator": {"type": "rsi", "perod": 14}, "operator": ">", "value": 1}"#;
        assert!(serde_json::from_str::<TriggerSpec>(json).is_err());
    }

    #[test]
    fn test_unknown_operator_rejected() {
        let json = r#"{"indicator": {"type": "rsi"}, "operator": "!=", "value": 1}"#;
        assert!(serde_json::from_str::<TriggerSpec>(json).is_err());
        assert!("!=".parse::<Operator>().is_err());
    }

    #[test]
    fn test_wavetrend_defaults_and_label_target() {
        let json = r#"{"indicator": {"type": "wavetrend_dot"}, "operator": "==", "value": "GREEN"}"#;
        let trigger: TriggerSpec = serde_json::from_str(json).unwrap();
        assert_eq!(
            trigger.indicator,
            Indicator::WavetrendDot(WaveTrendParams::default())
        );
        assert_eq!(
            trigger.target().unwrap(),
            Target::Literal(&Literal::Text("GREEN".to_string()))
        );
    }

    #[test]
    fn test_target_requires_exactly_one() {
        let mut trigger = TriggerSpec::new(Indicator::bollinger(20, 2.0), Operator::Gt);
        assert!(trigger.target().is_err());

        trigger.value = Some(Literal::Number(1.0));
        trigger.compare_to = Some("upper".to_string());
        assert!(trigger.target().is_err());

        let trigger = trigger.with_compare_to("upper");
        assert_eq!(trigger.target().unwrap(), Target::Column("upper"));
    }

    #[test]
    fn test_strategy_defaults() {
        let strategy = StrategySpec::from_json_str(r#"{"name": "empty"}"#).unwrap();
        assert!(strategy.triggers.is_empty());
        assert_eq!(strategy.logic, Logic::And);
        assert_eq!(strategy.risk, RiskSpec::default());
        assert_eq!(strategy.exit, ExitPolicy::SignalLost);
        assert!(!strategy.vectorized);
    }

    #[test]
    fn test_logic_accepts_lowercase() {
        let strategy = StrategySpec::from_json_str(r#"{"name": "x", "logic": "or"}"#).unwrap();
        assert_eq!(strategy.logic, Logic::Or);
    }

    #[test]
    fn test_set_parameter_by_substring() {
        let mut rsi = Indicator::rsi(14);
        assert!(rsi.set_parameter("rsi_period", 7.0));
        assert_eq!(rsi, Indicator::rsi(7));
        assert!(!rsi.set_parameter("rsi_threshold", 30.0));

        let mut bb = Indicator::bollinger(20, 2.0);
        assert!(bb.set_parameter("bollinger_std", 2.5));
        assert!(bb.set_parameter("bollinger_period", 30.0));
        assert_eq!(bb, Indicator::bollinger(30, 2.5));

        let mut macd = Indicator::Macd(MacdParams::default());
        assert!(macd.set_parameter("macd_fast_period", 8.0));
        match macd {
            Indicator::Macd(p) => assert_eq!(p.fast, 8),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_sweep_values_inclusive() {
        let sweep = SweepSpec {
            trigger_index: 0,
            start: 60.0,
            end: 80.0,
            step: 5.0,
        };
        assert_eq!(sweep.values().unwrap(), vec![60.0, 65.0, 70.0, 75.0, 80.0]);

        let fractional = SweepSpec {
            trigger_index: 0,
            start: 0.1,
            end: 0.3,
            step: 0.1,
        };
        assert_eq!(fractional.values().unwrap().len(), 3);
    }

    #[test]
    fn test_sweep_rejects_bad_step() {
        let sweep = SweepSpec {
            trigger_index: 0,
            start: 60.0,
            end: 80.0,
            step: 0.0,
        };
        assert!(sweep.values().is_err());
    }

    #[test]
    fn test_sweep_rejects_oversized_grid() {
        let dense = SweepSpec {
            trigger_index: 0,
            start: 0.0,
            end: 1000.0,
            step: 1e-9,
        };
        assert!(matches!(
            dense.values(),
            Err(BacktestError::InvalidParameter(_))
        ));

        let at_cap = SweepSpec {
            trigger_index: 0,
            start: 0.0,
            end: (MAX_SWEEP_POINTS - 1) as f64,
            step: 1.0,
        };
        assert_eq!(at_cap.values().unwrap().len(), MAX_SWEEP_POINTS);

        let unbounded = SweepSpec {
            trigger_index: 0,
            start: -f64::MAX,
            end: f64::MAX,
            step: 1.0,
        };
        assert!(unbounded.values().is_err());
    }

    #[test]
    fn test_min_bars_saturates() {
        assert_eq!(Indicator::rsi(14).min_bars(), 15);
        assert_eq!(Indicator::bollinger(20, 2.0).min_bars(), 20);
        assert_eq!(Indicator::Price.min_bars(), 1);
        assert_eq!(Indicator::rsi(usize::MAX).min_bars(), usize::MAX);

        let divergence = Indicator::Divergence(DivergenceParams {
            lookback: usize::MAX / 2 + 1,
            rsi_period: 14,
        });
        assert_eq!(divergence.min_bars(), usize::MAX);
    }

    #[test]
    fn test_walk_forward_combinations() {
        let spec = WalkForwardSpec::default()
            .with_parameter("rsi_period", vec![7.0, 14.0])
            .with_parameter("rsi_threshold", vec![30.0, 40.0, 50.0]);
        let combos = spec.combinations();

        assert_eq!(combos.len(), 6);
        assert!(combos.iter().all(|c| c.len() == 2));
        assert!(WalkForwardSpec::default().combinations().is_empty());
    }
}
