use crate::value_objects::side::Side;
use crate::value_objects::signal::SignalKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Open,
    Close,
    Execute,
    ExecuteAttempt,
    Rejected,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Open => "open",
            AuditAction::Close => "close",
            AuditAction::Execute => "execute",
            AuditAction::ExecuteAttempt => "execute_attempt",
            AuditAction::Rejected => "rejected",
        }
    }
}

/// One immutable row of the audit trail. Rows are only ever appended;
/// insertion is idempotent on `audit_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Generator-assigned, unique. Left `None` by callers and filled in by
    /// the store on first insert.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_id: Option<String>,
    pub timestamp: i64,
    pub symbol: String,
    pub signal: SignalKind,
    pub action: AuditAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub side: Option<Side>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    pub simulated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Lower-case rejection label (notional_exceeded, precision_error, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Opaque gateway response, stored as-is.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_result: Option<serde_json::Value>,
    /// Links a confirmed execution back to its originating proposal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_audit_id: Option<String>,
}

impl AuditRecord {
    pub fn new(timestamp: i64, symbol: impl Into<String>, signal: SignalKind, action: AuditAction) -> Self {
        Self {
            audit_id: None,
            timestamp,
            symbol: symbol.into(),
            signal,
            action,
            side: None,
            quantity: None,
            price: None,
            simulated: false,
            comment: None,
            reason: None,
            order_result: None,
            parent_audit_id: None,
        }
    }

    pub fn with_order(mut self, side: Side, quantity: f64, price: f64) -> Self {
        self.side = Some(side);
        self.quantity = Some(quantity);
        self.price = Some(price);
        self
    }

    pub fn simulated(mut self, simulated: bool) -> Self {
        self.simulated = simulated;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditAction, AuditRecord};
    use crate::value_objects::side::Side;
    use crate::value_objects::signal::SignalKind;

    #[test]
    fn record_round_trips_through_json() {
        let record = AuditRecord::new(1_700_000_000, "BTCUSDT", SignalKind::Buy, AuditAction::Open)
            .with_order(Side::Buy, 0.02, 25_000.0)
            .simulated(true)
            .with_comment("dry run");

        let line = serde_json::to_string(&record).expect("serialize");
        let parsed: AuditRecord = serde_json::from_str(&line).expect("deserialize");
        assert_eq!(parsed, record);
    }

    #[test]
    fn absent_optionals_are_omitted_from_the_line() {
        let record = AuditRecord::new(1, "BTCUSDT", SignalKind::Sell, AuditAction::Rejected)
            .with_reason("notional_exceeded");
        let line = serde_json::to_string(&record).expect("serialize");
        assert!(!line.contains("order_result"));
        assert!(!line.contains("parent_audit_id"));
        assert!(line.contains("\"reason\":\"notional_exceeded\""));
    }
}
