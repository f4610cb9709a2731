use serde::{Deserialize, Serialize};

/// One OHLCV bar. `timestamp` is unix seconds, UTC, and is only ever
/// produced by the validated boundary parsers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}
