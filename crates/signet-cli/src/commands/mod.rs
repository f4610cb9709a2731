use crate::infra;
use signet_application::backtesting::run_backtest;
use signet_application::config::{load_config, validate_config, Config};
use signet_application::confirm::{confirm_execution, ConfirmRequest};
use signet_application::live::{run_cycles, CycleDeps, CycleSettings};
use signet_domain::repositories::audit::AuditStore;
use signet_infrastructure::artifacts::FilesystemArtifactWriter;
use std::fs;
use std::path::PathBuf;

pub enum Command {
    Backtest {
        config: PathBuf,
        out: Option<PathBuf>,
    },
    Cycle {
        config: PathBuf,
        symbol: Option<String>,
    },
    Confirm {
        config: PathBuf,
        audit_id: String,
        token: String,
    },
    AuditRecent {
        config: PathBuf,
        limit: usize,
    },
    AuditGet {
        config: PathBuf,
        audit_id: String,
    },
    AuditRebuild {
        config: PathBuf,
    },
    Validate {
        config: PathBuf,
    },
}

pub fn run(command: Command) -> Result<(), String> {
    match command {
        Command::Backtest { config, out } => backtest(config, out),
        Command::Cycle { config, symbol } => cycle(config, symbol),
        Command::Confirm {
            config,
            audit_id,
            token,
        } => confirm(config, audit_id, token),
        Command::AuditRecent { config, limit } => audit_recent(config, limit),
        Command::AuditGet { config, audit_id } => audit_get(config, audit_id),
        Command::AuditRebuild { config } => audit_rebuild(config),
        Command::Validate { config } => validate(config),
    }
}

fn load(config_path: &PathBuf) -> Result<(Config, String), String> {
    let contents = fs::read_to_string(config_path)
        .map_err(|err| format!("failed to read config {}: {}", config_path.display(), err))?;
    let config = load_config(config_path)?;
    Ok((config, contents))
}

fn backtest(config_path: PathBuf, out: Option<PathBuf>) -> Result<(), String> {
    let (config, config_toml) = load(&config_path)?;
    let infra = infra::build_backtest_infra(&config)?;
    let artifacts = FilesystemArtifactWriter::new();

    let run_dir = run_backtest(
        &config,
        &config_toml,
        out,
        &infra.market_data,
        &infra.features,
        &infra.models,
        &artifacts,
    )?;
    println!("backtest artifacts written to {}", run_dir.display());
    Ok(())
}

fn cycle(config_path: PathBuf, symbol: Option<String>) -> Result<(), String> {
    let (config, _) = load(&config_path)?;
    let infra = infra::build_cycle_infra(&config)?;
    let settings = CycleSettings::from_config(&config);
    let symbols = match symbol {
        Some(symbol) => vec![symbol],
        None => config.run.symbols.clone(),
    };
    if symbols.is_empty() {
        return Err("no symbols configured".to_string());
    }

    let deps = CycleDeps {
        gateway: &infra.gateway,
        models: &infra.models,
        features: &infra.features,
        audit: &infra.audit,
    };
    let cycles = run_cycles(&deps, &settings, &symbols);

    let mut failures = 0usize;
    for cycle in &cycles {
        match &cycle.result {
            Ok(report) => {
                let mode = if report.dry_run { "dry-run" } else { "live" };
                match &report.rejection {
                    Some(reason) => println!(
                        "{}: {} [{}] rejected ({reason}), audit {}",
                        cycle.symbol,
                        report.signal.kind.as_str(),
                        mode,
                        report.rejection_audit_id.as_deref().unwrap_or("-"),
                    ),
                    None => println!(
                        "{}: {} [{}] {} order(s){}",
                        cycle.symbol,
                        report.signal.kind.as_str(),
                        mode,
                        report.submissions.len(),
                        if report.is_complete() {
                            String::new()
                        } else {
                            " (incomplete)".to_string()
                        },
                    ),
                }
                for submission in &report.submissions {
                    println!(
                        "  {} {} qty {} audit {}{}",
                        if submission.intent.reduce_only {
                            "close"
                        } else {
                            "open"
                        },
                        submission.intent.side.as_str(),
                        submission.intent.quantity,
                        submission.audit_id,
                        submission
                            .error
                            .as_deref()
                            .map(|err| format!(" FAILED: {err}"))
                            .unwrap_or_default(),
                    );
                }
            }
            Err(err) => {
                failures += 1;
                println!("{}: cycle failed: {}", cycle.symbol, err);
            }
        }
    }

    if failures == cycles.len() && !cycles.is_empty() {
        return Err("all cycles failed".to_string());
    }
    Ok(())
}

fn confirm(config_path: PathBuf, audit_id: String, token: String) -> Result<(), String> {
    let (config, _) = load(&config_path)?;
    let gateway = infra::build_gateway(&config)?;
    let audit = infra::build_audit_store(&config)?;
    let expected_token = config.resolve_execution_token();

    let outcome = confirm_execution(
        &audit,
        &gateway,
        expected_token.as_deref(),
        &ConfirmRequest { audit_id, token },
    )
    .map_err(|err| err.to_string())?;

    println!(
        "executed proposal {} as {}",
        outcome.parent_audit_id, outcome.execute_audit_id
    );
    println!("{}", outcome.order_result);
    Ok(())
}

fn audit_recent(config_path: PathBuf, limit: usize) -> Result<(), String> {
    let (config, _) = load(&config_path)?;
    let audit = infra::build_audit_store(&config)?;
    let records = audit.recent(limit).map_err(|err| err.to_string())?;
    for record in records {
        let line = serde_json::to_string(&record)
            .map_err(|err| format!("failed to serialize audit record: {err}"))?;
        println!("{line}");
    }
    Ok(())
}

fn audit_get(config_path: PathBuf, audit_id: String) -> Result<(), String> {
    let (config, _) = load(&config_path)?;
    let audit = infra::build_audit_store(&config)?;
    match audit.get(&audit_id).map_err(|err| err.to_string())? {
        Some(record) => {
            let pretty = serde_json::to_string_pretty(&record)
                .map_err(|err| format!("failed to serialize audit record: {err}"))?;
            println!("{pretty}");
            Ok(())
        }
        None => Err(format!("audit record {audit_id} not found")),
    }
}

fn audit_rebuild(config_path: PathBuf) -> Result<(), String> {
    let (config, _) = load(&config_path)?;
    let audit = infra::build_audit_store(&config)?;
    let pushed = audit.rebuild_index()?;
    println!("rebuilt audit index from log: {pushed} row(s)");
    Ok(())
}

fn validate(config_path: PathBuf) -> Result<(), String> {
    let (config, _) = load(&config_path)?;
    let problems = validate_config(&config);
    if problems.is_empty() {
        println!("config OK");
        return Ok(());
    }
    for problem in &problems {
        println!("problem: {problem}");
    }
    Err(format!("{} config problem(s)", problems.len()))
}
