use crate::errors::TradeError;
use crate::services::audit::AuditRecord;

/// Durable, append-only audit trail. Implementations must serialize
/// concurrent writers and keep inserts idempotent on audit_id: a duplicate
/// insert is a no-op that still returns the id.
pub trait AuditStore: Send + Sync {
    /// Persist the record, assigning an audit_id when the caller left it
    /// empty, and return the id.
    fn record(&self, record: &AuditRecord) -> Result<String, TradeError>;

    fn get(&self, audit_id: &str) -> Result<Option<AuditRecord>, TradeError>;

    /// Most-recent-first.
    fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>, TradeError>;
}
