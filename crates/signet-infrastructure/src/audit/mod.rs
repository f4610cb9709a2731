use signet_domain::errors::TradeError;
use signet_domain::repositories::audit::AuditStore;
use signet_domain::services::audit::AuditRecord;
use std::collections::HashSet;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Queryable accelerator over the append-only log. Failures here are
/// counted and logged, never propagated: the log is the source of truth.
pub trait AuditIndex: Send + Sync {
    fn insert(&self, record: &AuditRecord) -> Result<(), String>;
}

static AUDIT_ID_SEQ: AtomicU64 = AtomicU64::new(0);

fn generate_audit_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let seq = AUDIT_ID_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{nanos:024x}{seq:08x}")
}

struct StoreState {
    records: Vec<AuditRecord>,
    seen: HashSet<String>,
}

/// Dual-sink audit store: a newline-delimited JSON append log as the
/// durability floor, plus an optional indexed table. One writer lock
/// serializes the durable append across symbol workers; inserts are
/// idempotent on audit_id.
pub struct JsonlAuditStore {
    path: PathBuf,
    index: Option<Box<dyn AuditIndex>>,
    state: Mutex<StoreState>,
}

impl JsonlAuditStore {
    /// Open the store, replaying any existing log into memory. Lines that
    /// fail to parse are skipped with a counted warning.
    pub fn open(path: impl Into<PathBuf>, index: Option<Box<dyn AuditIndex>>) -> Result<Self, String> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| {
                    format!("failed to create audit log dir {}: {}", parent.display(), err)
                })?;
            }
        }

        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut malformed = 0usize;
        if path.exists() {
            let file = fs::File::open(&path)
                .map_err(|err| format!("failed to open audit log {}: {}", path.display(), err))?;
            for line in BufReader::new(file).lines() {
                let line =
                    line.map_err(|err| format!("failed to read audit log line: {}", err))?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<AuditRecord>(&line) {
                    Ok(record) => {
                        if let Some(id) = record.audit_id.clone() {
                            if seen.insert(id) {
                                records.push(record);
                            }
                        } else {
                            malformed += 1;
                        }
                    }
                    Err(_) => malformed += 1,
                }
            }
        }
        if malformed > 0 {
            metrics::counter!("signet.audit.malformed_lines").increment(malformed as u64);
            tracing::warn!(malformed, path = %path.display(), "skipped malformed audit log lines");
        }

        Ok(Self {
            path,
            index,
            state: Mutex::new(StoreState { records, seen }),
        })
    }

    /// Replay the whole log into the index. Returns how many rows were
    /// pushed; the index is rebuildable at any time because the log is the
    /// source of truth.
    pub fn rebuild_index(&self) -> Result<usize, String> {
        let Some(index) = self.index.as_ref() else {
            return Err("no audit index configured".to_string());
        };
        let state = self
            .state
            .lock()
            .map_err(|_| "audit store lock poisoned".to_string())?;
        let mut pushed = 0usize;
        for record in &state.records {
            index.insert(record)?;
            pushed += 1;
        }
        Ok(pushed)
    }

    fn append_line(&self, record: &AuditRecord) -> Result<(), String> {
        let line = serde_json::to_string(record)
            .map_err(|err| format!("failed to serialize audit record: {}", err))?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| format!("failed to open audit log {}: {}", self.path.display(), err))?;
        file.write_all(line.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|err| format!("failed to append audit record: {}", err))
    }
}

impl AuditStore for JsonlAuditStore {
    fn record(&self, record: &AuditRecord) -> Result<String, TradeError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| TradeError::Audit("audit store lock poisoned".to_string()))?;

        if let Some(id) = record.audit_id.as_deref() {
            if state.seen.contains(id) {
                // Duplicate insert of the same id is a no-op, not an error.
                return Ok(id.to_string());
            }
        }

        let mut stored = record.clone();
        let id = match stored.audit_id.clone() {
            Some(id) => id,
            None => {
                let id = generate_audit_id();
                stored.audit_id = Some(id.clone());
                id
            }
        };

        self.append_line(&stored).map_err(TradeError::Audit)?;
        metrics::counter!("signet.audit.records").increment(1);

        if let Some(index) = self.index.as_ref() {
            // Best-effort: the append-only log already made the row durable.
            if let Err(err) = index.insert(&stored) {
                metrics::counter!("signet.audit.index_failures").increment(1);
                tracing::warn!(error = %err, "audit index insert failed");
            }
        }

        state.seen.insert(id.clone());
        state.records.push(stored);
        Ok(id)
    }

    fn get(&self, audit_id: &str) -> Result<Option<AuditRecord>, TradeError> {
        let state = self
            .state
            .lock()
            .map_err(|_| TradeError::Audit("audit store lock poisoned".to_string()))?;
        Ok(state
            .records
            .iter()
            .find(|record| record.audit_id.as_deref() == Some(audit_id))
            .cloned())
    }

    fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>, TradeError> {
        let state = self
            .state
            .lock()
            .map_err(|_| TradeError::Audit("audit store lock poisoned".to_string()))?;
        Ok(state.records.iter().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditIndex, JsonlAuditStore};
    use signet_domain::repositories::audit::AuditStore;
    use signet_domain::services::audit::{AuditAction, AuditRecord};
    use signet_domain::value_objects::side::Side;
    use signet_domain::value_objects::signal::SignalKind;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn unique_tmp_path(name: &str) -> PathBuf {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("signet_{name}_{}_{}", std::process::id(), now))
    }

    fn record(comment: &str) -> AuditRecord {
        AuditRecord::new(1_700_000_000, "BTCUSDT", SignalKind::Buy, AuditAction::Open)
            .with_order(Side::Buy, 0.02, 25_000.0)
            .with_comment(comment)
    }

    #[test]
    fn record_assigns_unique_ids_and_appends() {
        let path = unique_tmp_path("audit.jsonl");
        let store = JsonlAuditStore::open(&path, None).expect("open");

        let first = store.record(&record("a")).expect("first");
        let second = store.record(&record("b")).expect("second");
        assert_ne!(first, second);

        let recent = store.recent(10).expect("recent");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].comment.as_deref(), Some("b"));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn duplicate_audit_id_is_a_noop_keeping_the_first_row() {
        let path = unique_tmp_path("audit_idem.jsonl");
        let store = JsonlAuditStore::open(&path, None).expect("open");

        let mut first = record("original");
        first.audit_id = Some("fixed-id".to_string());
        let mut second = record("attempted overwrite");
        second.audit_id = Some("fixed-id".to_string());

        assert_eq!(store.record(&first).expect("first"), "fixed-id");
        assert_eq!(store.record(&second).expect("second"), "fixed-id");

        let stored = store.get("fixed-id").expect("get").expect("present");
        assert_eq!(stored.comment.as_deref(), Some("original"));
        assert_eq!(store.recent(10).expect("recent").len(), 1);

        // One line on disk as well.
        let contents = fs::read_to_string(&path).expect("read");
        assert_eq!(contents.lines().count(), 1);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn reopening_replays_the_log() {
        let path = unique_tmp_path("audit_replay.jsonl");
        let id = {
            let store = JsonlAuditStore::open(&path, None).expect("open");
            store.record(&record("persisted")).expect("record")
        };

        let reopened = JsonlAuditStore::open(&path, None).expect("reopen");
        let found = reopened.get(&id).expect("get").expect("present");
        assert_eq!(found.comment.as_deref(), Some("persisted"));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let path = unique_tmp_path("audit_malformed.jsonl");
        fs::write(&path, "not json at all\n").expect("seed");

        let store = JsonlAuditStore::open(&path, None).expect("open");
        store.record(&record("after garbage")).expect("record");
        assert_eq!(store.recent(10).expect("recent").len(), 1);
        fs::remove_file(&path).ok();
    }

    #[derive(Default)]
    struct FailingIndex {
        attempts: Mutex<usize>,
    }

    impl AuditIndex for FailingIndex {
        fn insert(&self, _record: &AuditRecord) -> Result<(), String> {
            *self.attempts.lock().unwrap() += 1;
            Err("index offline".to_string())
        }
    }

    #[test]
    fn index_failure_does_not_fail_the_record_call() {
        let path = unique_tmp_path("audit_index.jsonl");
        let store =
            JsonlAuditStore::open(&path, Some(Box::new(FailingIndex::default()))).expect("open");

        let id = store.record(&record("still durable")).expect("record succeeds");
        assert!(store.get(&id).expect("get").is_some());
        fs::remove_file(&path).ok();
    }
}
