use chrono::DateTime;
use common::{BacktestError, Bar, Result, Timeframe};

/// Right edge of the epoch-aligned bucket `(end - step, end]` containing `ts`
fn bucket_end(ts: i64, step: i64) -> i64 {
    let rem = ts.rem_euclid(step);
    if rem == 0 {
        ts
    } else {
        ts - rem + step
    }
}

/// Aggregate bars into a coarser timeframe.
///
/// Buckets are right-closed and labeled by their right edge, so an aggregated
/// bar only carries a timestamp once every bar in it has closed. Open is the
/// first open, high the max, low the min, close the last close and volume the
/// sum. Buckets with no input bars are not emitted. Input must be sorted.
pub fn resample(bars: &[Bar], timeframe: Timeframe) -> Result<Vec<Bar>> {
    let step = i64::try_from(timeframe.seconds()).map_err(|_| {
        BacktestError::InvalidTimeframe(format!("{} is too large to resample", timeframe))
    })?;

    let mut output: Vec<Bar> = Vec::new();
    let mut current: Option<(i64, Bar)> = None;

    for bar in bars {
        let end = bucket_end(bar.timestamp.timestamp(), step);

        match current.as_mut() {
            Some((active, agg)) if *active == end => {
                agg.high = agg.high.max(bar.high);
                agg.low = agg.low.min(bar.low);
                agg.close = bar.close;
                agg.volume += bar.volume;
            }
            _ => {
                if let Some((_, agg)) = current.take() {
                    output.push(agg);
                }
                let label = DateTime::from_timestamp(end, 0).ok_or_else(|| {
                    BacktestError::InvalidTimeframe(format!("bucket edge {} out of range", end))
                })?;
                let mut agg = bar.clone();
                agg.timestamp = label;
                current = Some((end, agg));
            }
        }
    }

    if let Some((_, agg)) = current {
        output.push(agg);
    }

    tracing::trace!(
        input = bars.len(),
        output = output.len(),
        timeframe = %timeframe,
        "resampled bars"
    );
    Ok(output)
}
