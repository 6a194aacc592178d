pub mod loader;
pub mod resample;
pub mod synthetic;

pub use loader::{load_csv, load_json, parse_timestamp, read_csv};
pub use resample::resample;
pub use synthetic::{generate_pattern_bars, generate_synthetic_bars};

use std::path::Path;

use common::{BacktestError, Bar, Result, Timeframe};

/// Load bars from file, detecting format from extension, and normalize them
pub fn load_file(path: &Path) -> Result<Vec<Bar>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let bars = match ext.as_str() {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        _ => {
            return Err(BacktestError::DataLoadError(format!(
                "Unsupported file format: {}",
                ext
            )))
        }
    };

    tracing::info!(path = %path.display(), bars = bars.len(), "loaded bars");
    Ok(normalize_bars(bars))
}

/// Sort by timestamp and drop duplicate timestamps, keeping the last bar seen
pub fn normalize_bars(mut bars: Vec<Bar>) -> Vec<Bar> {
    let before = bars.len();
    // Stable sort keeps file order among equal timestamps
    bars.sort_by_key(|b| b.timestamp);

    let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.timestamp == bar.timestamp => *last = bar,
            _ => out.push(bar),
        }
    }

    if out.len() < before {
        tracing::warn!(dropped = before - out.len(), "dropped duplicate timestamps");
    }
    out
}

/// Smallest positive spacing between consecutive bars
pub fn infer_timeframe(bars: &[Bar]) -> Option<Timeframe> {
    bars.windows(2)
        .map(|w| (w[1].timestamp - w[0].timestamp).num_seconds())
        .filter(|&s| s > 0)
        .min()
        .and_then(|s| Timeframe::from_seconds(s as u64))
}
