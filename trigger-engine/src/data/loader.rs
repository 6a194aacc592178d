use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use common::{BacktestError, Bar, Result};

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Load bars from a CSV file with columns `timestamp,open,high,low,close,volume`
pub fn load_csv(path: &Path) -> Result<Vec<Bar>> {
    let file = File::open(path).map_err(|e| BacktestError::DataLoadError(e.to_string()))?;
    read_csv(BufReader::new(file))
}

/// Parse CSV bars from any reader. A header row is expected; rows with fewer
/// than six columns are skipped.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<Bar>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut bars = Vec::new();
    let mut skipped = 0usize;

    for (row, result) in csv_reader.records().enumerate() {
        let record = result.map_err(|e| BacktestError::CsvError(e.to_string()))?;
        if record.len() < 6 {
            skipped += 1;
            continue;
        }

        let field = |idx: usize, name: &str| -> Result<f64> {
            record[idx].parse().map_err(|_| {
                BacktestError::CsvError(format!(
                    "row {}: invalid {} '{}'",
                    row + 1,
                    name,
                    &record[idx]
                ))
            })
        };

        bars.push(Bar::new(
            parse_timestamp(&record[0])?,
            field(1, "open")?,
            field(2, "high")?,
            field(3, "low")?,
            field(4, "close")?,
            field(5, "volume")?,
        ));
    }

    if skipped > 0 {
        tracing::warn!(skipped, "skipped short CSV rows");
    }
    Ok(bars)
}

/// Load bars from a JSON array of bar objects
pub fn load_json(path: &Path) -> Result<Vec<Bar>> {
    let file = File::open(path).map_err(|e| BacktestError::DataLoadError(e.to_string()))?;
    let bars: Vec<Bar> = serde_json::from_reader(BufReader::new(file))?;
    Ok(bars)
}

/// Parse timestamp from RFC 3339, common date-time layouts, plain dates or
/// Unix seconds
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    for fmt in DATE_FORMATS {
        if let Some(dt) = NaiveDate::parse_from_str(s, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Ok(Utc.from_utc_datetime(&dt));
        }
    }

    if let Some(dt) = s
        .parse::<i64>()
        .ok()
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
    {
        return Ok(dt);
    }

    Err(BacktestError::CsvError(format!(
        "Unable to parse timestamp: {}",
        s
    )))
}
