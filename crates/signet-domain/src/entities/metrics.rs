use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::side::Side;
use crate::value_objects::trade::Trade;
use serde::Serialize;

pub const DEFAULT_ANNUALIZATION_DAYS: f64 = 252.0;

#[derive(Debug, Default, Clone, Serialize)]
pub struct BacktestSummary {
    pub bars_processed: usize,
    pub trades: usize,
    pub initial_capital: f64,
    pub final_cash: f64,
    pub final_value: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe: f64,
    /// Minimum of (value - running peak) / running peak, so 0.0 or negative.
    pub max_drawdown: f64,
    /// Fraction of SELL trades with positive realized P&L.
    pub win_rate: f64,
    /// Bars where a missing feature forced the signal to HOLD.
    pub holds_forced: usize,
}

/// Computed once, after the full replay.
pub fn summarize(
    initial_capital: f64,
    equity: &[EquityPoint],
    trades: &[Trade],
    annualization_days: f64,
) -> BacktestSummary {
    let mut summary = BacktestSummary {
        bars_processed: equity.len(),
        trades: trades.len(),
        initial_capital,
        ..BacktestSummary::default()
    };

    let Some(last) = equity.last() else {
        return summary;
    };

    summary.final_cash = last.cash;
    summary.final_value = last.equity;
    if initial_capital > 0.0 {
        summary.total_return = (last.equity - initial_capital) / initial_capital;
    }

    let bars = equity.len() as f64;
    if bars > 0.0 && summary.total_return > -1.0 {
        summary.annualized_return =
            (1.0 + summary.total_return).powf(annualization_days / bars) - 1.0;
    }

    summary.sharpe = sharpe_ratio(equity, annualization_days);
    summary.max_drawdown = max_drawdown(equity);
    summary.win_rate = win_rate(trades);
    summary
}

fn sharpe_ratio(equity: &[EquityPoint], annualization_days: f64) -> f64 {
    if equity.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = equity.iter().skip(1).map(|p| p.daily_return).collect();
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    if returns.len() < 2 {
        return 0.0;
    }
    let var = returns
        .iter()
        .map(|ret| {
            let diff = ret - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1.0);
    let std = var.sqrt();
    if std == 0.0 || !std.is_finite() {
        0.0
    } else {
        mean / std * annualization_days.sqrt()
    }
}

fn max_drawdown(equity: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for point in equity {
        if point.equity > peak {
            peak = point.equity;
        }
        if peak > 0.0 {
            let drawdown = (point.equity - peak) / peak;
            if drawdown < worst {
                worst = drawdown;
            }
        }
    }
    worst
}

fn win_rate(trades: &[Trade]) -> f64 {
    let mut wins = 0usize;
    let mut sells = 0usize;
    for trade in trades {
        if trade.side != Side::Sell {
            continue;
        }
        sells += 1;
        if trade.realized_pnl.unwrap_or(0.0) > 0.0 {
            wins += 1;
        }
    }
    if sells == 0 {
        0.0
    } else {
        wins as f64 / sells as f64
    }
}
