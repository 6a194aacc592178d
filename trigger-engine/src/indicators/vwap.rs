use common::Bar;

/// Cumulative volume-weighted average price over typical price.
///
/// Undefined (NaN) while no volume has traded.
pub fn calculate_vwap(bars: &[Bar]) -> Vec<f64> {
    let mut pv = 0.0;
    let mut volume = 0.0;

    bars.iter()
        .map(|bar| {
            pv += bar.typical_price() * bar.volume;
            volume += bar.volume;
            if volume > 0.0 {
                pv / volume
            } else {
                f64::NAN
            }
        })
        .collect()
}
