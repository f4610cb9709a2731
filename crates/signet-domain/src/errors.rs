use thiserror::Error;

/// Failure taxonomy shared by the live engine, the audit trail and the
/// confirm-execution endpoint. The backtest path intentionally coarsens
/// `FeatureIncomplete` into a held bar instead of surfacing it.
#[derive(Debug, Error)]
pub enum TradeError {
    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    #[error("feature vector incomplete: missing {missing:?}")]
    FeatureIncomplete { missing: Vec<String> },

    #[error("no trained model available for {symbol}")]
    ModelUnavailable { symbol: String },

    #[error("desired notional {notional} exceeds cap {max_notional}")]
    NotionalExceeded { notional: f64, max_notional: f64 },

    #[error("quantity rounding failed: {0}")]
    PrecisionError(String),

    #[error("exchange rejected request: {0}")]
    GatewayRejected(String),

    #[error("execution token rejected")]
    Unauthorized,

    #[error("audit record {0} not found")]
    AuditNotFound(String),

    #[error("audit record {audit_id} is missing {field}")]
    InvalidRecord {
        audit_id: String,
        field: &'static str,
    },

    #[error("audit store failure: {0}")]
    Audit(String),
}
