mod commands;
mod infra;
mod obs;

use clap::{Parser, Subcommand};
use commands::Command;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "signet")]
#[command(about = "Signet CLI", version, arg_required_else_help = true)]
#[command(
    after_help = "Examples:\n  signet backtest --config configs/sample.toml --out runs/\n  signet cycle --config configs/sample.toml\n  signet confirm --config configs/sample.toml --audit-id <id> --token <token>\n  signet audit-recent --config configs/sample.toml --limit 20\n  signet validate --config configs/sample.toml\n"
)]
struct Cli {
    /// Default log level when SIGNET_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
    /// Log format: text or json.
    #[arg(long, default_value = "text")]
    log_format: String,
    /// host:port for the Prometheus exporter.
    #[arg(long)]
    metrics_addr: Option<String>,
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Replay history through the signal policy and write run artifacts.
    Backtest {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Run one decision cycle per configured symbol against the venue.
    Cycle {
        #[arg(long)]
        config: PathBuf,
        /// Run only this symbol instead of run.symbols.
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Execute a previously recorded proposal by audit id.
    Confirm {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        audit_id: String,
        #[arg(long)]
        token: String,
    },
    /// Show the most recent audit records.
    AuditRecent {
        #[arg(long)]
        config: PathBuf,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Fetch one audit record by id.
    AuditGet {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        audit_id: String,
    },
    /// Rebuild the indexed table from the append-only log.
    AuditRebuild {
        #[arg(long)]
        config: PathBuf,
    },
    /// Check the config without trading.
    Validate {
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = obs::init_tracing(&cli.log_level, &cli.log_format) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
    if let Err(err) = obs::init_metrics(cli.metrics_addr.as_deref()) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }

    let command = match cli.command {
        CliCommand::Backtest { config, out } => Command::Backtest { config, out },
        CliCommand::Cycle { config, symbol } => Command::Cycle { config, symbol },
        CliCommand::Confirm {
            config,
            audit_id,
            token,
        } => Command::Confirm {
            config,
            audit_id,
            token,
        },
        CliCommand::AuditRecent { config, limit } => Command::AuditRecent { config, limit },
        CliCommand::AuditGet { config, audit_id } => Command::AuditGet { config, audit_id },
        CliCommand::AuditRebuild { config } => Command::AuditRebuild { config },
        CliCommand::Validate { config } => Command::Validate { config },
    };

    if let Err(err) = commands::run(command) {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
