use crate::config::Config;
use crate::shared::{log_base_prediction, now_timestamp};
use signet_domain::entities::venue::VenueConstraints;
use signet_domain::errors::TradeError;
use signet_domain::repositories::audit::AuditStore;
use signet_domain::repositories::exchange::ExchangeGateway;
use signet_domain::repositories::features::FeatureVectorProducer;
use signet_domain::repositories::predictor::ModelRepository;
use signet_domain::services::audit::{AuditAction, AuditRecord};
use signet_domain::services::policy::SignalPolicy;
use signet_domain::services::reconcile::reconcile;
use signet_domain::value_objects::bar::Bar;
use signet_domain::value_objects::order_intent::OrderIntent;
use signet_domain::value_objects::signal::Signal;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info_span;

/// Ports one cycle needs. Position state is read through the gateway every
/// cycle; there is deliberately no cache here.
pub struct CycleDeps<'a> {
    pub gateway: &'a dyn ExchangeGateway,
    pub models: &'a dyn ModelRepository,
    pub features: &'a dyn FeatureVectorProducer,
    pub audit: &'a dyn AuditStore,
}

#[derive(Debug, Clone)]
pub struct CycleSettings {
    pub policy: SignalPolicy,
    pub timeframe: String,
    pub kline_limit: usize,
    pub trade_notional: f64,
    pub max_position_size: f64,
    pub max_notional: f64,
    pub dry_run: bool,
    pub prediction_log: Option<PathBuf>,
}

impl CycleSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            policy: config.signal_policy(),
            timeframe: config.run.timeframe.clone(),
            kline_limit: config.kline_limit(),
            trade_notional: config.sizing.trade_notional,
            max_position_size: config.sizing.max_position_size,
            max_notional: config.sizing.max_notional,
            dry_run: config.execution.dry_run,
            prediction_log: config.paths.prediction_log.as_ref().map(PathBuf::from),
        }
    }
}

/// One submitted (or simulated, or failed) order intent. `audit_id` points
/// at the proposal row, which is written before any network call.
#[derive(Debug)]
pub struct Submission {
    pub intent: OrderIntent,
    pub audit_id: String,
    pub order_result: Option<serde_json::Value>,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct CycleReport {
    pub symbol: String,
    pub signal: Signal,
    /// Sizing rejection label when the reconciler refused to produce intents.
    pub rejection: Option<String>,
    pub rejection_audit_id: Option<String>,
    pub submissions: Vec<Submission>,
    pub dry_run: bool,
}

impl CycleReport {
    fn decided(symbol: &str, signal: Signal, dry_run: bool) -> Self {
        Self {
            symbol: symbol.to_string(),
            signal,
            rejection: None,
            rejection_audit_id: None,
            submissions: Vec::new(),
            dry_run,
        }
    }

    /// False when sizing rejected the cycle or any submission failed, so
    /// callers can detect partial completion (close attempted, open not).
    pub fn is_complete(&self) -> bool {
        self.rejection.is_none() && self.submissions.iter().all(|s| s.error.is_none())
    }
}

#[derive(Debug)]
pub struct SymbolCycle {
    pub symbol: String,
    pub result: Result<CycleReport, TradeError>,
}

/// One full decision cycle for one symbol:
/// fetch data -> evaluate signal -> fetch position -> reconcile ->
/// [submit close] -> [submit open]. Any step may fail; everything already
/// written to the audit trail stays written.
pub fn run_cycle(
    deps: &CycleDeps,
    settings: &CycleSettings,
    symbol: &str,
) -> Result<CycleReport, TradeError> {
    let _span = info_span!(
        "trade_cycle",
        symbol = %symbol,
        timeframe = %settings.timeframe,
        dry_run = settings.dry_run
    )
    .entered();

    // A market-data failure aborts before any decision exists, so nothing
    // is audited for it.
    let stage_start = Instant::now();
    let bars = deps
        .gateway
        .fetch_klines(symbol, &settings.timeframe, settings.kline_limit)?;
    metrics::histogram!("signet.cycle.fetch_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    if bars.is_empty() {
        return Err(TradeError::DataUnavailable(format!(
            "no klines returned for {symbol}"
        )));
    }

    let stage_start = Instant::now();
    let signal = evaluate_signal(deps, settings, symbol, &bars);
    metrics::histogram!("signet.cycle.evaluate_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    if !signal.is_actionable() {
        tracing::info!(kind = signal.kind.as_str(), "cycle finished without orders");
        return Ok(CycleReport::decided(symbol, signal, settings.dry_run));
    }

    let position = deps.gateway.fetch_position(symbol)?;
    let rules = deps.gateway.venue_rules(symbol)?;
    let constraints =
        VenueConstraints::new(rules, settings.max_position_size, settings.max_notional);
    let price = bars[bars.len() - 1].close;

    let outcome = reconcile(
        &signal,
        &position,
        settings.trade_notional,
        price,
        &constraints,
    );
    if let Some(capped) = outcome.capped_quantity {
        tracing::warn!(capped, "quantity capped to max position size");
    }

    if let Some(reason) = &outcome.rejection {
        let record = AuditRecord::new(now_timestamp(), symbol, signal.kind, AuditAction::Rejected)
            .simulated(settings.dry_run)
            .with_reason(reason.as_str())
            .with_comment(reason.detail());
        let audit_id = deps.audit.record(&record)?;
        metrics::counter!("signet.cycle.rejections", "reason" => reason.as_str()).increment(1);
        tracing::warn!(reason = reason.as_str(), "sizing rejected the cycle");

        let mut report = CycleReport::decided(symbol, signal, settings.dry_run);
        report.rejection = Some(reason.as_str().to_string());
        report.rejection_audit_id = Some(audit_id);
        return Ok(report);
    }

    let mut report = CycleReport::decided(symbol, signal.clone(), settings.dry_run);
    for intent in outcome.intents {
        let submission = submit_intent(deps, settings, symbol, &signal, &intent, price)?;
        let failed = submission.error.is_some();
        report.submissions.push(submission);
        if failed {
            // Close submitted, open not yet attempted: stop so the caller
            // sees exactly how far the sequence got.
            break;
        }
    }

    Ok(report)
}

/// Dispatch one cycle per symbol onto scoped worker threads. Cycles share
/// no mutable state; a failure on one symbol never blocks another.
pub fn run_cycles(
    deps: &CycleDeps,
    settings: &CycleSettings,
    symbols: &[String],
) -> Vec<SymbolCycle> {
    let mut results = Vec::with_capacity(symbols.len());
    std::thread::scope(|scope| {
        let handles: Vec<_> = symbols
            .iter()
            .map(|symbol| {
                scope.spawn(move || SymbolCycle {
                    symbol: symbol.clone(),
                    result: run_cycle(deps, settings, symbol),
                })
            })
            .collect();
        for (handle, symbol) in handles.into_iter().zip(symbols.iter()) {
            match handle.join() {
                Ok(cycle) => results.push(cycle),
                Err(_) => results.push(SymbolCycle {
                    symbol: symbol.clone(),
                    result: Err(TradeError::DataUnavailable(
                        "cycle worker panicked".to_string(),
                    )),
                }),
            }
        }
    });
    results
}

fn evaluate_signal(
    deps: &CycleDeps,
    settings: &CycleSettings,
    symbol: &str,
    bars: &[Bar],
) -> Signal {
    let series = match deps.features.generate(bars) {
        Ok(series) => series,
        Err(err) => return Signal::error(err.to_string()),
    };

    let bundle = match deps.models.load(symbol) {
        Ok(Some(bundle)) => bundle,
        Ok(None) => return SignalPolicy::model_unavailable(symbol),
        Err(err) => return Signal::error(err.to_string()),
    };

    let Some(vector) = series.vectors.last() else {
        return Signal::error("feature producer returned no rows");
    };
    let missing = vector.missing(&bundle.feature_names);
    if !missing.is_empty() {
        return SignalPolicy::feature_incomplete(&missing);
    }

    let base = match bundle.predictor.predict(vector) {
        Ok(base) => base,
        Err(err) => return Signal::error(format!("prediction failed: {err}")),
    };

    if let Some(path) = &settings.prediction_log {
        if let Err(err) = log_base_prediction(path, symbol, base) {
            tracing::warn!(error = %err, "failed to append prediction log");
        }
    }

    let correction = match deps.models.load_correction() {
        Ok(correction) => correction,
        Err(err) => {
            tracing::warn!(error = %err, "correction model unavailable, using base prediction");
            None
        }
    };

    let signal = settings.policy.decide(base, correction.as_deref());
    tracing::info!(
        kind = signal.kind.as_str(),
        prediction = signal.prediction.unwrap_or(base),
        "signal evaluated"
    );
    signal
}

fn submit_intent(
    deps: &CycleDeps,
    settings: &CycleSettings,
    symbol: &str,
    signal: &Signal,
    intent: &OrderIntent,
    price: f64,
) -> Result<Submission, TradeError> {
    let action = if intent.reduce_only {
        AuditAction::Close
    } else {
        AuditAction::Open
    };

    // The proposal row goes in before any network call, so a crash after a
    // failed submission still leaves a trace of the intent.
    let proposal = AuditRecord::new(now_timestamp(), symbol, signal.kind, action)
        .with_order(intent.side, intent.quantity, price)
        .simulated(settings.dry_run);
    let proposal_id = deps.audit.record(&proposal)?;

    if settings.dry_run {
        tracing::info!(
            action = action.as_str(),
            side = intent.side.as_str(),
            quantity = intent.quantity,
            "dry run: skipping submission"
        );
        return Ok(Submission {
            intent: intent.clone(),
            audit_id: proposal_id,
            order_result: None,
            error: None,
        });
    }

    match deps
        .gateway
        .submit_market_order(symbol, intent.side, intent.quantity, intent.reduce_only)
    {
        Ok(order) => {
            let mut executed =
                AuditRecord::new(now_timestamp(), symbol, signal.kind, AuditAction::Execute)
                    .with_order(intent.side, intent.quantity, price);
            executed.order_result = Some(order.clone());
            executed.parent_audit_id = Some(proposal_id.clone());
            deps.audit.record(&executed)?;
            metrics::counter!("signet.cycle.orders_submitted").increment(1);
            Ok(Submission {
                intent: intent.clone(),
                audit_id: proposal_id,
                order_result: Some(order),
                error: None,
            })
        }
        Err(err) => {
            // The attempt row must be durable before the engine gives up.
            let mut attempt = AuditRecord::new(
                now_timestamp(),
                symbol,
                signal.kind,
                AuditAction::ExecuteAttempt,
            )
            .with_order(intent.side, intent.quantity, price)
            .with_comment(err.to_string());
            attempt.parent_audit_id = Some(proposal_id.clone());
            deps.audit.record(&attempt)?;
            metrics::counter!("signet.cycle.orders_failed").increment(1);
            tracing::error!(error = %err, action = action.as_str(), "order submission failed");
            Ok(Submission {
                intent: intent.clone(),
                audit_id: proposal_id,
                order_result: None,
                error: Some(err.to_string()),
            })
        }
    }
}
