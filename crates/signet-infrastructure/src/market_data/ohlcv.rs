use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Deserialize;
use signet_domain::repositories::market_data::{MarketDataRepository, OhlcvQuery};
use signet_domain::services::ohlcv::{data_quality_from_bars, DataQualityReport};
use signet_domain::value_objects::bar::Bar;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct OhlcvRecord {
    timestamp_utc: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// CSV-backed historical bars. Timestamps are parsed exactly once, here;
/// rows that fail the parse are dropped and counted instead of flowing
/// downstream as ambiguous values.
#[derive(Debug, Clone)]
pub struct CsvMarketDataRepository {
    path: PathBuf,
}

impl CsvMarketDataRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MarketDataRepository for CsvMarketDataRepository {
    fn load_ohlcv(&self, query: &OhlcvQuery) -> Result<(Vec<Bar>, DataQualityReport), String> {
        load_csv(&self.path, &query.symbol, query.expected_step_seconds)
    }
}

pub fn load_csv(
    path: &Path,
    symbol: &str,
    expected_step_seconds: Option<i64>,
) -> Result<(Vec<Bar>, DataQualityReport), String> {
    let file = File::open(path)
        .map_err(|err| format!("failed to open OHLCV CSV {}: {}", path.display(), err))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut bars_by_ts: BTreeMap<i64, Bar> = BTreeMap::new();
    let mut report = DataQualityReport::default();
    let mut last_seen_ts: Option<i64> = None;
    let step = expected_step_seconds.unwrap_or(1).max(1);

    for result in reader.deserialize::<OhlcvRecord>() {
        let record = result.map_err(|err| format!("failed to parse CSV row: {}", err))?;
        let timestamp = match parse_timestamp(&record.timestamp_utc) {
            Ok(timestamp) => timestamp,
            Err(_) => {
                report.dropped_timestamps += 1;
                continue;
            }
        };

        if !record.close.is_finite() || record.close <= 0.0 {
            report.invalid_close += 1;
            continue;
        }

        if let Some(prev) = last_seen_ts {
            if timestamp < prev {
                report.out_of_order += 1;
            }
        }
        last_seen_ts = Some(timestamp);

        if bars_by_ts
            .insert(
                timestamp,
                Bar {
                    symbol: symbol.to_string(),
                    timestamp,
                    open: record.open,
                    high: record.high,
                    low: record.low,
                    close: record.close,
                    volume: record.volume,
                },
            )
            .is_some()
        {
            report.duplicates += 1;
        }
    }

    if report.dropped_timestamps > 0 {
        metrics::counter!("signet.infra.ohlcv.dropped_timestamps")
            .increment(report.dropped_timestamps as u64);
        tracing::warn!(
            dropped = report.dropped_timestamps,
            path = %path.display(),
            "dropped OHLCV rows with unparseable timestamps"
        );
    }

    if bars_by_ts.is_empty() {
        return Ok((Vec::new(), report));
    }

    let bars: Vec<Bar> = bars_by_ts.into_values().collect();
    let derived = data_quality_from_bars(&bars, Some(step));
    report.gaps = derived.gaps;
    report.first_timestamp = derived.first_timestamp;
    report.last_timestamp = derived.last_timestamp;

    Ok((bars, report))
}

/// The only place a timestamp string becomes a Bar timestamp.
fn parse_timestamp(value: &str) -> Result<i64, String> {
    let trimmed = value.trim();
    if let Ok(epoch) = trimmed.parse::<i64>() {
        return Ok(epoch);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%z") {
        return Ok(dt.timestamp());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive).timestamp());
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&naive).timestamp());
        }
    }
    Err(format!("unsupported timestamp format: {}", trimmed))
}
