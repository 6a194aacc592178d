use std::collections::hash_map::Entry;
use std::collections::HashMap;

use chrono::{DateTime, Utc};
use common::{
    BacktestError, Bar, Indicator, Literal, Operator, Result, StrategySpec, Target, Timeframe,
    TriggerSpec,
};

use super::align::{asof_indices, project_bools, project_numeric};
use super::combine::combine;
use super::frame::{compute_frame, primary_column, Cell, Column};
use crate::data::{infer_timeframe, resample};

/// Composite signal of a strategy plus the problems recovered while
/// computing it
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub signal: Vec<bool>,
    pub diagnostics: Vec<String>,
}

/// Evaluates triggers over one base bar series.
///
/// Resampled bars are cached per timeframe, so triggers sharing a timeframe
/// aggregate once.
pub struct SignalEngine<'a> {
    bars: &'a [Bar],
    timestamps: Vec<DateTime<Utc>>,
    base_timeframe: Option<Timeframe>,
    resampled: HashMap<Timeframe, Vec<Bar>>,
}

impl<'a> SignalEngine<'a> {
    pub fn new(bars: &'a [Bar]) -> Self {
        Self {
            bars,
            timestamps: bars.iter().map(|b| b.timestamp).collect(),
            base_timeframe: infer_timeframe(bars),
            resampled: HashMap::new(),
        }
    }

    pub fn with_base_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.base_timeframe = Some(timeframe);
        self
    }

    pub fn base_timeframe(&self) -> Option<Timeframe> {
        self.base_timeframe
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Bars at `timeframe`; the base bars when it is absent or equal to the base
    pub fn bars_for(&mut self, timeframe: Option<Timeframe>) -> Result<&[Bar]> {
        let tf = match timeframe {
            Some(tf) if Some(tf) != self.base_timeframe => tf,
            _ => return Ok(self.bars),
        };

        if let Some(base) = self.base_timeframe {
            if tf < base {
                tracing::debug!(
                    trigger = %tf,
                    base = %base,
                    "trigger timeframe finer than base bars"
                );
            }
        }

        let bars = match self.resampled.entry(tf) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(resample(self.bars, tf)?),
        };
        Ok(bars.as_slice())
    }

    /// Boolean series of one trigger, projected onto the base bars
    pub fn evaluate_trigger(&mut self, trigger: &TriggerSpec) -> Result<Vec<bool>> {
        let target = trigger.target()?;
        let bars = self.bars_for(trigger.timeframe)?;
        let frame = compute_frame(&trigger.indicator, bars);

        let source_name = trigger
            .field
            .as_deref()
            .unwrap_or_else(|| primary_column(&trigger.indicator));
        let source = frame.column(source_name)?;

        let operand = match target {
            Target::Literal(lit) => Operand::from_literal(lit),
            Target::Column(name) => Operand::Column(frame.column(name)?),
        };

        let hits = apply_operator(source, trigger.operator, &operand, frame.len());
        if matches!(trigger.operator, Operator::CrossesUp | Operator::CrossesDown)
            && !(source.is_numeric() && operand.is_numeric())
        {
            tracing::warn!(
                indicator = trigger.indicator.name(),
                operator = %trigger.operator,
                "cross against a non-numeric operand never fires"
            );
        }

        let mapping = asof_indices(&self.timestamps, frame.timestamps());
        Ok(project_bools(&hits, &mapping))
    }

    /// Numeric column of `indicator` at `timeframe`, projected onto the base bars
    pub fn projected_column(
        &mut self,
        indicator: &Indicator,
        timeframe: Option<Timeframe>,
        column: &str,
    ) -> Result<Vec<f64>> {
        let bars = self.bars_for(timeframe)?;
        let frame = compute_frame(indicator, bars);
        let values = match frame.column(column)? {
            Column::Numeric(values) => values,
            Column::Label(_) => {
                return Err(BacktestError::InvalidStrategySpec(format!(
                    "column '{}' of {} is not numeric",
                    column,
                    indicator.name()
                )))
            }
        };

        let mapping = asof_indices(&self.timestamps, frame.timestamps());
        Ok(project_numeric(values, &mapping))
    }

    /// Composite signal of all triggers folded by the strategy's logic
    pub fn composite(&mut self, strategy: &StrategySpec) -> Result<Vec<bool>> {
        if strategy.triggers.is_empty() {
            return Err(BacktestError::InvalidStrategySpec(format!(
                "strategy '{}' has no triggers",
                strategy.name
            )));
        }

        let series = strategy
            .triggers
            .iter()
            .enumerate()
            .map(|(idx, trigger)| {
                self.evaluate_trigger(trigger).map_err(|e| match e {
                    BacktestError::InvalidStrategySpec(msg) => BacktestError::InvalidStrategySpec(
                        format!("trigger {} ({}): {}", idx, trigger.indicator.name(), msg),
                    ),
                    other => other,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(combine(&series, strategy.logic, self.bars.len()))
    }

    /// Composite signal, degrading to all-false when the strategy is invalid.
    ///
    /// Triggers whose timeframe holds fewer bars than their indicator's
    /// warm-up never fire; each one is reported as a diagnostic.
    pub fn evaluate(&mut self, strategy: &StrategySpec) -> Result<Evaluation> {
        match self.composite(strategy) {
            Ok(signal) => Ok(Evaluation {
                signal,
                diagnostics: self.short_history(strategy)?,
            }),
            Err(BacktestError::InvalidStrategySpec(msg)) => {
                tracing::warn!(strategy = %strategy.name, error = %msg, "invalid strategy, signal disabled");
                Ok(Evaluation {
                    signal: vec![false; self.bars.len()],
                    diagnostics: vec![format!("Invalid strategy spec: {}", msg)],
                })
            }
            Err(other) => Err(other),
        }
    }

    fn short_history(&mut self, strategy: &StrategySpec) -> Result<Vec<String>> {
        let mut diagnostics = Vec::new();
        for (idx, trigger) in strategy.triggers.iter().enumerate() {
            let required = trigger.indicator.min_bars();
            let actual = self.bars_for(trigger.timeframe)?.len();
            if actual < required {
                let err = BacktestError::InsufficientData { required, actual };
                tracing::debug!(trigger = idx, error = %err, "trigger cannot warm up");
                diagnostics.push(format!(
                    "trigger {} ({}): {}",
                    idx,
                    trigger.indicator.name(),
                    err
                ));
            }
        }
        Ok(diagnostics)
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, Copy)]
enum Operand<'c> {
    Constant(Cell<'c>),
    Column(&'c Column),
}

impl<'c> Operand<'c> {
    fn from_literal(lit: &'c Literal) -> Self {
        match lit {
            Literal::Number(x) if x.is_nan() => Operand::Constant(Cell::Missing),
            Literal::Number(x) => Operand::Constant(Cell::Number(*x)),
            Literal::Text(s) => Operand::Constant(Cell::Text(s.as_str())),
        }
    }

    fn at(&self, idx: usize) -> Cell<'c> {
        match self {
            Operand::Constant(cell) => *cell,
            Operand::Column(column) => column.cell(idx),
        }
    }

    fn is_numeric(&self) -> bool {
        match self {
            Operand::Constant(Cell::Text(_)) => false,
            Operand::Constant(_) => true,
            Operand::Column(column) => column.is_numeric(),
        }
    }
}

/// Canonical text form used by `==`: numbers in shortest round-trip form,
/// labels trimmed and upper-cased
pub fn normalize_cell(cell: Cell<'_>) -> Option<String> {
    match cell {
        Cell::Number(x) => Some(format_number(x)),
        Cell::Text(s) => {
            let s = s.trim();
            match s.parse::<f64>() {
                Ok(x) if x.is_finite() => Some(format_number(x)),
                _ => Some(s.to_uppercase()),
            }
        }
        Cell::Missing => None,
    }
}

fn format_number(x: f64) -> String {
    if x == 0.0 {
        // Collapse -0
        "0".to_string()
    } else {
        x.to_string()
    }
}

fn apply_operator(source: &Column, operator: Operator, operand: &Operand<'_>, len: usize) -> Vec<bool> {
    match operator {
        Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le => (0..len)
            .map(|i| match (source.cell(i), operand.at(i)) {
                (Cell::Number(a), Cell::Number(b)) => match operator {
                    Operator::Gt => a > b,
                    Operator::Lt => a < b,
                    Operator::Ge => a >= b,
                    _ => a <= b,
                },
                _ => false,
            })
            .collect(),
        Operator::Eq => (0..len)
            .map(|i| {
                match (normalize_cell(source.cell(i)), normalize_cell(operand.at(i))) {
                    (Some(a), Some(b)) => a == b,
                    _ => false,
                }
            })
            .collect(),
        Operator::CrossesUp | Operator::CrossesDown => {
            if !(source.is_numeric() && operand.is_numeric()) {
                return vec![false; len];
            }
            let up = operator == Operator::CrossesUp;
            (0..len)
                .map(|i| {
                    if i == 0 {
                        return false;
                    }
                    match (
                        source.cell(i - 1),
                        operand.at(i - 1),
                        source.cell(i),
                        operand.at(i),
                    ) {
                        (Cell::Number(prev), Cell::Number(prev_t), Cell::Number(cur), Cell::Number(t)) => {
                            if up {
                                prev < prev_t && cur >= t
                            } else {
                                prev > prev_t && cur <= t
                            }
                        }
                        _ => false,
                    }
                })
                .collect()
        }
    }
}
