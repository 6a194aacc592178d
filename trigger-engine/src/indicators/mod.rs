//! Technical indicators.
//!
//! Every indicator has a batch function returning a series aligned to its
//! input, NaN (or `None` for labels) until enough history exists. The
//! stateful ones also expose a streaming type whose `next` yields the value
//! for one new sample; the batch function is a fold over it.

pub mod bollinger;
pub mod divergence;
pub mod ema;
pub mod macd;
pub mod ribbon;
pub mod rsi;
pub mod sma;
pub mod vwap;
pub mod wavetrend;

pub use bollinger::{bandwidth, calculate_bollinger_bands, percent_b, Bollinger, BollingerBands};
pub use divergence::{calculate_divergence, Divergence};
pub use ema::{calculate_ema, Ema};
pub use macd::{calculate_macd, Macd, MacdSeries};
pub use ribbon::{calculate_ribbon, EmaRibbon, RibbonState};
pub use rsi::{calculate_rsi, Rsi};
pub use sma::{calculate_sma, RollingWindow, Sma};
pub use vwap::calculate_vwap;
pub use wavetrend::{calculate_wavetrend, Dot, WaveTrend, Zone};
