use common::Logic;

/// Fold per-trigger signals into one composite of length `len`.
///
/// No series yields an all-false composite; a short series counts as false
/// past its end.
pub fn combine(series: &[Vec<bool>], logic: Logic, len: usize) -> Vec<bool> {
    if series.is_empty() {
        return vec![false; len];
    }

    let at = |s: &Vec<bool>, i: usize| s.get(i).copied().unwrap_or(false);
    (0..len)
        .map(|i| match logic {
            Logic::And => series.iter().all(|s| at(s, i)),
            Logic::Or => series.iter().any(|s| at(s, i)),
        })
        .collect()
}
