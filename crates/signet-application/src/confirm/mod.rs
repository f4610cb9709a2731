use crate::shared::now_timestamp;
use sha2::{Digest, Sha256};
use signet_domain::errors::TradeError;
use signet_domain::repositories::audit::AuditStore;
use signet_domain::repositories::exchange::ExchangeGateway;
use signet_domain::services::audit::{AuditAction, AuditRecord};
use tracing::info_span;

#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    pub audit_id: String,
    pub token: String,
}

#[derive(Debug)]
pub struct ConfirmOutcome {
    pub parent_audit_id: String,
    pub execute_audit_id: String,
    pub order_result: serde_json::Value,
}

/// Second phase of two-phase execution: re-read a previously recorded
/// proposal by audit_id and, with a valid token, spend real funds on it.
///
/// The token gate fails closed and runs before anything touches the store
/// or the exchange; a mismatch leaves no new audit rows behind.
pub fn confirm_execution(
    audit: &dyn AuditStore,
    gateway: &dyn ExchangeGateway,
    expected_token: Option<&str>,
    request: &ConfirmRequest,
) -> Result<ConfirmOutcome, TradeError> {
    let _span = info_span!("confirm_execution", audit_id = %request.audit_id).entered();

    let Some(expected) = expected_token else {
        tracing::warn!("no execution token configured, refusing to execute");
        return Err(TradeError::Unauthorized);
    };
    if !token_matches(expected, &request.token) {
        metrics::counter!("signet.confirm.unauthorized").increment(1);
        return Err(TradeError::Unauthorized);
    }

    let record = audit
        .get(&request.audit_id)?
        .ok_or_else(|| TradeError::AuditNotFound(request.audit_id.clone()))?;

    let side = record.side.ok_or_else(|| TradeError::InvalidRecord {
        audit_id: request.audit_id.clone(),
        field: "side",
    })?;
    let quantity = match record.quantity {
        Some(quantity) if quantity > 0.0 => quantity,
        _ => {
            return Err(TradeError::InvalidRecord {
                audit_id: request.audit_id.clone(),
                field: "quantity",
            })
        }
    };
    if record.symbol.is_empty() {
        return Err(TradeError::InvalidRecord {
            audit_id: request.audit_id.clone(),
            field: "symbol",
        });
    }

    let reduce_only = record.action == AuditAction::Close;
    match gateway.submit_market_order(&record.symbol, side, quantity, reduce_only) {
        Ok(order) => {
            let mut executed = AuditRecord::new(
                now_timestamp(),
                record.symbol.clone(),
                record.signal,
                AuditAction::Execute,
            )
            .with_order(side, quantity, record.price.unwrap_or(0.0));
            executed.order_result = Some(order.clone());
            executed.parent_audit_id = Some(request.audit_id.clone());
            let execute_audit_id = audit.record(&executed)?;
            metrics::counter!("signet.confirm.executed").increment(1);
            tracing::info!(execute_audit_id = %execute_audit_id, "confirmed execution submitted");
            Ok(ConfirmOutcome {
                parent_audit_id: request.audit_id.clone(),
                execute_audit_id,
                order_result: order,
            })
        }
        Err(err) => {
            let mut attempt = AuditRecord::new(
                now_timestamp(),
                record.symbol.clone(),
                record.signal,
                AuditAction::ExecuteAttempt,
            )
            .with_order(side, quantity, record.price.unwrap_or(0.0))
            .with_comment(err.to_string());
            attempt.parent_audit_id = Some(request.audit_id.clone());
            audit.record(&attempt)?;
            metrics::counter!("signet.confirm.failed").increment(1);
            tracing::error!(error = %err, "confirmed execution failed at the gateway");
            Err(err)
        }
    }
}

fn token_matches(expected: &str, provided: &str) -> bool {
    let expected_digest = Sha256::digest(expected.as_bytes());
    let provided_digest = Sha256::digest(provided.as_bytes());
    expected_digest == provided_digest
}

#[cfg(test)]
mod tests {
    use super::token_matches;

    #[test]
    fn token_comparison_is_exact() {
        assert!(token_matches("secret", "secret"));
        assert!(!token_matches("secret", "Secret"));
        assert!(!token_matches("secret", ""));
    }
}
