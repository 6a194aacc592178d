//! Trigger evaluation: indicator frames, timeframe alignment and logic
//! combination into one boolean signal per base bar.

pub mod align;
pub mod combine;
pub mod frame;
pub mod trigger;

pub use align::{asof_indices, project_bools, project_numeric};
pub use combine::combine;
pub use frame::{compute_frame, primary_column, Cell, Column, Frame};
pub use trigger::{normalize_cell, Evaluation, SignalEngine};
