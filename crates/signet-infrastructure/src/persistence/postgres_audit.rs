use crate::audit::AuditIndex;
use postgres::NoTls;
use r2d2::Pool;
use r2d2_postgres::PostgresConnectionManager;
use signet_domain::services::audit::AuditRecord;
use std::time::Instant;

/// Indexed-table sink for audit rows. The append-only log is the source of
/// truth; this table is an accelerator and is rebuildable from the log.
#[derive(Debug, Clone)]
pub struct PostgresAuditIndex {
    pool: Pool<PostgresConnectionManager<NoTls>>,
    pub audits_table: String,
}

impl PostgresAuditIndex {
    pub fn new(db_url: String, audits_table: String, pool_max_size: u32) -> Result<Self, String> {
        if let Err(err) = validate_table_name(&audits_table) {
            return Err(format!("invalid audits_table '{}': {}", audits_table, err));
        }

        let config = db_url
            .parse::<postgres::Config>()
            .map_err(|err| format!("invalid postgres db url: {err}"))?;
        let manager = PostgresConnectionManager::new(config, NoTls);
        let pool = Pool::builder()
            .max_size(pool_max_size)
            .build(manager)
            .map_err(|err| format!("failed to build postgres pool: {err}"))?;

        Ok(Self { pool, audits_table })
    }

    pub fn ensure_schema(&self) -> Result<(), String> {
        let mut client = self
            .pool
            .get()
            .map_err(|err| format!("failed to checkout postgres connection: {err}"))?;
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {} (\
             audit_id TEXT PRIMARY KEY, \
             timestamp_utc BIGINT NOT NULL, \
             symbol TEXT NOT NULL, \
             signal TEXT NOT NULL, \
             action TEXT NOT NULL, \
             side TEXT, \
             qty DOUBLE PRECISION, \
             price DOUBLE PRECISION, \
             simulated BOOLEAN NOT NULL, \
             comment TEXT, \
             reason TEXT, \
             order_json TEXT, \
             parent_audit_id TEXT, \
             raw_json TEXT NOT NULL)",
            self.audits_table
        );
        client
            .batch_execute(&ddl)
            .map_err(|err| format!("failed to ensure audits table: {err}"))
    }
}

impl AuditIndex for PostgresAuditIndex {
    fn insert(&self, record: &AuditRecord) -> Result<(), String> {
        let span = tracing::info_span!(
            "infra.postgres.insert_audit",
            table = %self.audits_table,
            symbol = %record.symbol
        );
        let _enter = span.enter();

        let Some(audit_id) = record.audit_id.as_deref() else {
            return Err("audit record has no audit_id".to_string());
        };

        let get_start = Instant::now();
        let mut client = match self.pool.get() {
            Ok(client) => client,
            Err(err) => {
                metrics::counter!("signet.infra.postgres.insert_audit.errors_total", "stage" => "pool_get")
                    .increment(1);
                tracing::warn!(error = %err, "failed to checkout postgres connection");
                return Err(format!("failed to checkout postgres connection: {err}"));
            }
        };
        metrics::histogram!("signet.infra.postgres.pool.get_ms")
            .record(get_start.elapsed().as_secs_f64() * 1000.0);

        let raw_json = serde_json::to_string(record)
            .map_err(|err| format!("failed to serialize audit record: {err}"))?;
        let order_json = record
            .order_result
            .as_ref()
            .map(|value| value.to_string());
        let side = record.side.map(|side| side.as_str().to_string());

        // Idempotent on audit_id, mirroring the append log semantics.
        let statement = format!(
            "INSERT INTO {} \
             (audit_id, timestamp_utc, symbol, signal, action, side, qty, price, simulated, \
              comment, reason, order_json, parent_audit_id, raw_json) \
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14) \
             ON CONFLICT (audit_id) DO NOTHING",
            self.audits_table
        );

        let insert_start = Instant::now();
        let result = client.execute(
            &statement,
            &[
                &audit_id,
                &record.timestamp,
                &record.symbol,
                &record.signal.as_str(),
                &record.action.as_str(),
                &side,
                &record.quantity,
                &record.price,
                &record.simulated,
                &record.comment,
                &record.reason,
                &order_json,
                &record.parent_audit_id,
                &raw_json,
            ],
        );
        metrics::histogram!("signet.infra.postgres.insert_audit_ms")
            .record(insert_start.elapsed().as_secs_f64() * 1000.0);

        match result {
            Ok(_) => {
                metrics::counter!("signet.infra.postgres.insert_audit.calls_total", "result" => "ok")
                    .increment(1);
                Ok(())
            }
            Err(err) => {
                metrics::counter!("signet.infra.postgres.insert_audit.calls_total", "result" => "err")
                    .increment(1);
                tracing::warn!(error = %err, "failed to insert audit row");
                Err(format!("failed to insert audit row: {err}"))
            }
        }
    }
}

fn validate_table_name(table: &str) -> Result<(), String> {
    if table.is_empty() {
        return Err("table name is empty".to_string());
    }
    let valid = table
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if !valid {
        return Err("table name may only contain [A-Za-z0-9_.]".to_string());
    }
    Ok(())
}
