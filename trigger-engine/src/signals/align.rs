//! Projection of higher-timeframe series onto base bars.

use chrono::{DateTime, Utc};

/// For each base timestamp, the index of the latest source timestamp at or
/// before it. Both inputs must be sorted ascending.
pub fn asof_indices(base: &[DateTime<Utc>], source: &[DateTime<Utc>]) -> Vec<Option<usize>> {
    let mut mapping = Vec::with_capacity(base.len());
    let mut j = 0usize;
    let mut last_valid: Option<usize> = None;

    for ts in base {
        while j < source.len() && source[j] <= *ts {
            last_valid = Some(j);
            j += 1;
        }
        mapping.push(last_valid);
    }

    mapping
}

/// Project a boolean series; unmatched base rows are false
pub fn project_bools(values: &[bool], mapping: &[Option<usize>]) -> Vec<bool> {
    mapping
        .iter()
        .map(|m| m.and_then(|i| values.get(i).copied()).unwrap_or(false))
        .collect()
}

/// Project a numeric series; unmatched base rows are NaN
pub fn project_numeric(values: &[f64], mapping: &[Option<usize>]) -> Vec<f64> {
    mapping
        .iter()
        .map(|m| m.and_then(|i| values.get(i).copied()).unwrap_or(f64::NAN))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: &[i64]) -> Vec<DateTime<Utc>> {
        secs.iter()
            .map(|&s| Utc.timestamp_opt(s, 0).unwrap())
            .collect()
    }

    #[test]
    fn test_asof_mapping() {
        let base = ts(&[10, 20, 30, 40, 50]);
        let source = ts(&[15, 35, 55]);

        assert_eq!(
            asof_indices(&base, &source),
            vec![None, Some(0), Some(0), Some(1), Some(1)]
        );
    }

    #[test]
    fn test_exact_match_is_included() {
        let base = ts(&[10, 20]);
        let source = ts(&[20]);
        assert_eq!(asof_indices(&base, &source), vec![None, Some(0)]);
    }

    #[test]
    fn test_empty_source() {
        let base = ts(&[10, 20]);
        assert_eq!(asof_indices(&base, &[]), vec![None, None]);
    }

    #[test]
    fn test_projection_fills_unmatched() {
        let mapping = vec![None, Some(0), Some(1), Some(1)];
        assert_eq!(
            project_bools(&[true, false], &mapping),
            vec![false, true, false, false]
        );

        let projected = project_numeric(&[1.5, 2.5], &mapping);
        assert!(projected[0].is_nan());
        assert_eq!(&projected[1..], &[1.5, 2.5, 2.5]);
    }
}
