use signet_application::confirm::{confirm_execution, ConfirmRequest};
use signet_application::live::{run_cycle, run_cycles, CycleDeps, CycleSettings};
use signet_domain::entities::venue::VenueRules;
use signet_domain::errors::TradeError;
use signet_domain::repositories::audit::AuditStore;
use signet_domain::repositories::exchange::ExchangeGateway;
use signet_domain::repositories::features::{FeatureSeries, FeatureVectorProducer};
use signet_domain::repositories::predictor::{
    CorrectionModel, ModelBundle, ModelRepository, ReturnPredictor,
};
use signet_domain::services::audit::{AuditAction, AuditRecord};
use signet_domain::services::policy::SignalPolicy;
use signet_domain::value_objects::bar::Bar;
use signet_domain::value_objects::feature_vector::FeatureVector;
use signet_domain::value_objects::position::{Position, PositionSide};
use signet_domain::value_objects::side::Side;
use signet_domain::value_objects::signal::SignalKind;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

struct FakeGateway {
    bars: Vec<Bar>,
    position: Position,
    rules: VenueRules,
    fail_reduce_only: bool,
    submissions: Mutex<Vec<(String, Side, f64, bool)>>,
}

impl FakeGateway {
    fn new(bars: Vec<Bar>, position: Position) -> Self {
        Self {
            bars,
            position,
            rules: VenueRules {
                lot_step: 0.001,
                min_notional: 10.0,
            },
            fail_reduce_only: false,
            submissions: Mutex::new(Vec::new()),
        }
    }

    fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

impl ExchangeGateway for FakeGateway {
    fn fetch_klines(
        &self,
        _symbol: &str,
        _timeframe: &str,
        _limit: usize,
    ) -> Result<Vec<Bar>, TradeError> {
        Ok(self.bars.clone())
    }

    fn fetch_position(&self, _symbol: &str) -> Result<Position, TradeError> {
        Ok(self.position.clone())
    }

    fn submit_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
        reduce_only: bool,
    ) -> Result<serde_json::Value, TradeError> {
        self.submissions
            .lock()
            .unwrap()
            .push((symbol.to_string(), side, quantity, reduce_only));
        if self.fail_reduce_only && reduce_only {
            return Err(TradeError::GatewayRejected(
                "venue refused reduce-only order".to_string(),
            ));
        }
        Ok(serde_json::json!({ "order_id": 42, "status": "FILLED" }))
    }

    fn venue_rules(&self, _symbol: &str) -> Result<VenueRules, TradeError> {
        Ok(self.rules)
    }
}

#[derive(Default)]
struct MemoryAuditStore {
    records: Mutex<Vec<AuditRecord>>,
    next_id: AtomicU64,
}

impl MemoryAuditStore {
    fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl AuditStore for MemoryAuditStore {
    fn record(&self, record: &AuditRecord) -> Result<String, TradeError> {
        let mut records = self.records.lock().unwrap();
        if let Some(id) = record.audit_id.as_deref() {
            if records
                .iter()
                .any(|existing| existing.audit_id.as_deref() == Some(id))
            {
                return Ok(id.to_string());
            }
        }
        let id = record
            .audit_id
            .clone()
            .unwrap_or_else(|| format!("audit-{}", self.next_id.fetch_add(1, Ordering::SeqCst)));
        let mut stored = record.clone();
        stored.audit_id = Some(id.clone());
        records.push(stored);
        Ok(id)
    }

    fn get(&self, audit_id: &str) -> Result<Option<AuditRecord>, TradeError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|record| record.audit_id.as_deref() == Some(audit_id))
            .cloned())
    }

    fn recent(&self, limit: usize) -> Result<Vec<AuditRecord>, TradeError> {
        let records = self.records.lock().unwrap();
        Ok(records.iter().rev().take(limit).cloned().collect())
    }
}

struct FixedPredictor(f64);

impl ReturnPredictor for FixedPredictor {
    fn predict(&self, _features: &FeatureVector) -> Result<f64, TradeError> {
        Ok(self.0)
    }
}

struct FakeModels {
    prediction: f64,
    present: bool,
}

impl ModelRepository for FakeModels {
    fn load(&self, symbol: &str) -> Result<Option<ModelBundle>, TradeError> {
        if !self.present {
            return Ok(None);
        }
        let _ = symbol;
        Ok(Some(ModelBundle {
            feature_names: vec!["ret_1".to_string()],
            predictor: Box::new(FixedPredictor(self.prediction)),
        }))
    }

    fn load_correction(&self) -> Result<Option<Box<dyn CorrectionModel>>, TradeError> {
        Ok(None)
    }
}

struct FakeFeatures;

impl FeatureVectorProducer for FakeFeatures {
    fn generate(&self, bars: &[Bar]) -> Result<FeatureSeries, TradeError> {
        let vectors = bars
            .iter()
            .map(|bar| {
                let mut vector = FeatureVector::new(bar.timestamp);
                vector.insert("ret_1", 0.0);
                vector
            })
            .collect();
        Ok(FeatureSeries {
            vectors,
            feature_names: vec!["ret_1".to_string()],
        })
    }
}

fn bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .copied()
        .enumerate()
        .map(|(index, close)| Bar {
            symbol: "BTCUSDT".to_string(),
            timestamp: index as i64,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        })
        .collect()
}

fn settings(dry_run: bool, trade_notional: f64) -> CycleSettings {
    CycleSettings {
        policy: SignalPolicy::default(),
        timeframe: "5m".to_string(),
        kline_limit: 50,
        trade_notional,
        max_position_size: 1.0,
        max_notional: 1000.0,
        dry_run,
        prediction_log: None,
    }
}

#[test]
fn dry_run_buy_against_short_records_close_then_open_without_submitting() {
    let gateway = FakeGateway::new(
        bars(&[25_000.0, 25_100.0]),
        Position {
            symbol: "BTCUSDT".to_string(),
            side: PositionSide::Short,
            quantity: 0.4,
            entry_price: 26_000.0,
        },
    );
    let audit = MemoryAuditStore::default();
    let models = FakeModels {
        prediction: 0.01,
        present: true,
    };
    let deps = CycleDeps {
        gateway: &gateway,
        models: &models,
        features: &FakeFeatures,
        audit: &audit,
    };

    let report = run_cycle(&deps, &settings(true, 500.0), "BTCUSDT").expect("cycle");

    assert_eq!(report.signal.kind, SignalKind::Buy);
    assert!(report.is_complete());
    assert_eq!(report.submissions.len(), 2);
    assert_eq!(gateway.submission_count(), 0);

    let records = audit.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].action, AuditAction::Close);
    assert_eq!(records[1].action, AuditAction::Open);
    assert!(records.iter().all(|record| record.simulated));
    assert!((records[0].quantity.unwrap() - 0.4).abs() < 1e-12);
}

#[test]
fn notional_above_cap_rejects_with_one_audit_row_and_no_intents() {
    let gateway = FakeGateway::new(bars(&[25_000.0]), Position::flat("BTCUSDT"));
    let audit = MemoryAuditStore::default();
    let models = FakeModels {
        prediction: 0.01,
        present: true,
    };
    let deps = CycleDeps {
        gateway: &gateway,
        models: &models,
        features: &FakeFeatures,
        audit: &audit,
    };

    let report = run_cycle(&deps, &settings(true, 2000.0), "BTCUSDT").expect("cycle");

    assert_eq!(report.rejection.as_deref(), Some("notional_exceeded"));
    assert!(report.submissions.is_empty());
    assert!(!report.is_complete());

    let records = audit.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, AuditAction::Rejected);
    assert_eq!(records[0].reason.as_deref(), Some("notional_exceeded"));
}

#[test]
fn live_close_failure_is_audited_and_stops_before_the_open() {
    let mut gateway = FakeGateway::new(
        bars(&[25_000.0]),
        Position {
            symbol: "BTCUSDT".to_string(),
            side: PositionSide::Short,
            quantity: 0.4,
            entry_price: 26_000.0,
        },
    );
    gateway.fail_reduce_only = true;
    let audit = MemoryAuditStore::default();
    let models = FakeModels {
        prediction: 0.01,
        present: true,
    };
    let deps = CycleDeps {
        gateway: &gateway,
        models: &models,
        features: &FakeFeatures,
        audit: &audit,
    };

    let report = run_cycle(&deps, &settings(false, 500.0), "BTCUSDT").expect("cycle");

    // Close attempted and failed; the open was never attempted.
    assert_eq!(report.submissions.len(), 1);
    assert!(report.submissions[0].error.is_some());
    assert!(!report.is_complete());
    assert_eq!(gateway.submission_count(), 1);

    let records = audit.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].action, AuditAction::Close);
    assert!(!records[0].simulated);
    assert_eq!(records[1].action, AuditAction::ExecuteAttempt);
    assert_eq!(records[1].parent_audit_id, records[0].audit_id);
    assert!(records[1].comment.as_deref().unwrap().contains("reduce-only"));
}

#[test]
fn live_flip_submits_close_then_open_with_execute_rows() {
    let gateway = FakeGateway::new(
        bars(&[25_000.0]),
        Position {
            symbol: "BTCUSDT".to_string(),
            side: PositionSide::Long,
            quantity: 0.25,
            entry_price: 24_000.0,
        },
    );
    let audit = MemoryAuditStore::default();
    let models = FakeModels {
        prediction: -0.01,
        present: true,
    };
    let deps = CycleDeps {
        gateway: &gateway,
        models: &models,
        features: &FakeFeatures,
        audit: &audit,
    };

    let report = run_cycle(&deps, &settings(false, 500.0), "BTCUSDT").expect("cycle");

    assert_eq!(report.signal.kind, SignalKind::Sell);
    assert!(report.is_complete());
    assert_eq!(gateway.submission_count(), 2);
    let submissions = gateway.submissions.lock().unwrap();
    assert!(submissions[0].3, "close must be reduce-only");
    assert!(!submissions[1].3);

    // proposal + execute for each half of the flip
    let records = audit.records();
    assert_eq!(records.len(), 4);
    assert_eq!(records[1].action, AuditAction::Execute);
    assert_eq!(records[1].parent_audit_id, records[0].audit_id);
    assert_eq!(records[3].action, AuditAction::Execute);
    assert_eq!(records[3].parent_audit_id, records[2].audit_id);
}

#[test]
fn missing_model_reports_error_and_audits_nothing() {
    let gateway = FakeGateway::new(bars(&[25_000.0]), Position::flat("BTCUSDT"));
    let audit = MemoryAuditStore::default();
    let models = FakeModels {
        prediction: 0.0,
        present: false,
    };
    let deps = CycleDeps {
        gateway: &gateway,
        models: &models,
        features: &FakeFeatures,
        audit: &audit,
    };

    let report = run_cycle(&deps, &settings(false, 500.0), "BTCUSDT").expect("cycle");

    assert_eq!(report.signal.kind, SignalKind::Error);
    assert!(report.submissions.is_empty());
    assert_eq!(gateway.submission_count(), 0);
    assert!(audit.records().is_empty());
}

#[test]
fn cycles_run_independently_per_symbol() {
    let gateway = FakeGateway::new(bars(&[25_000.0]), Position::flat("BTCUSDT"));
    let audit = MemoryAuditStore::default();
    let models = FakeModels {
        prediction: 0.0,
        present: true,
    };
    let deps = CycleDeps {
        gateway: &gateway,
        models: &models,
        features: &FakeFeatures,
        audit: &audit,
    };

    let symbols = vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()];
    let cycles = run_cycles(&deps, &settings(true, 500.0), &symbols);

    assert_eq!(cycles.len(), 2);
    for cycle in &cycles {
        let report = cycle.result.as_ref().expect("cycle result");
        assert_eq!(report.signal.kind, SignalKind::Hold);
    }
}

fn proposal_record(audit: &MemoryAuditStore) -> String {
    let record = AuditRecord::new(1_700_000_000, "BTCUSDT", SignalKind::Buy, AuditAction::Open)
        .with_order(Side::Buy, 0.02, 25_000.0)
        .simulated(true);
    audit.record(&record).expect("record proposal")
}

#[test]
fn confirm_with_wrong_token_touches_neither_exchange_nor_store() {
    let gateway = FakeGateway::new(bars(&[25_000.0]), Position::flat("BTCUSDT"));
    let audit = MemoryAuditStore::default();
    let proposal_id = proposal_record(&audit);

    let err = confirm_execution(
        &audit,
        &gateway,
        Some("secret"),
        &ConfirmRequest {
            audit_id: proposal_id,
            token: "wrong".to_string(),
        },
    )
    .expect_err("must reject");

    assert!(matches!(err, TradeError::Unauthorized));
    assert_eq!(gateway.submission_count(), 0);
    assert_eq!(audit.records().len(), 1);
}

#[test]
fn confirm_with_unknown_audit_id_is_not_found() {
    let gateway = FakeGateway::new(bars(&[25_000.0]), Position::flat("BTCUSDT"));
    let audit = MemoryAuditStore::default();

    let err = confirm_execution(
        &audit,
        &gateway,
        Some("secret"),
        &ConfirmRequest {
            audit_id: "missing".to_string(),
            token: "secret".to_string(),
        },
    )
    .expect_err("must reject");

    assert!(matches!(err, TradeError::AuditNotFound(_)));
    assert_eq!(gateway.submission_count(), 0);
}

#[test]
fn confirm_with_valid_token_executes_and_links_the_rows() {
    let gateway = FakeGateway::new(bars(&[25_000.0]), Position::flat("BTCUSDT"));
    let audit = MemoryAuditStore::default();
    let proposal_id = proposal_record(&audit);

    let outcome = confirm_execution(
        &audit,
        &gateway,
        Some("secret"),
        &ConfirmRequest {
            audit_id: proposal_id.clone(),
            token: "secret".to_string(),
        },
    )
    .expect("confirm");

    assert_eq!(outcome.parent_audit_id, proposal_id);
    assert_eq!(gateway.submission_count(), 1);

    let records = audit.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].action, AuditAction::Execute);
    assert_eq!(records[1].parent_audit_id.as_deref(), Some(proposal_id.as_str()));
    assert!(records[1].order_result.is_some());
}

#[test]
fn confirm_with_incomplete_record_is_unprocessable() {
    let gateway = FakeGateway::new(bars(&[25_000.0]), Position::flat("BTCUSDT"));
    let audit = MemoryAuditStore::default();
    // A rejection row has no side/quantity and must not be executable.
    let record = AuditRecord::new(1, "BTCUSDT", SignalKind::Buy, AuditAction::Rejected)
        .with_reason("notional_exceeded");
    let id = audit.record(&record).expect("record");

    let err = confirm_execution(
        &audit,
        &gateway,
        Some("secret"),
        &ConfirmRequest {
            audit_id: id,
            token: "secret".to_string(),
        },
    )
    .expect_err("must reject");

    assert!(matches!(err, TradeError::InvalidRecord { field: "side", .. }));
    assert_eq!(gateway.submission_count(), 0);
}
