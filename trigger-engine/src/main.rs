use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;

use trigger_engine::{
    generate_synthetic_bars, load_file, BacktestEngine, BacktestResult, Bar, ExecutionConfig,
    GridFailure, OptimizationReport, Optimizer, StrategySpec, SweepSpec, Timeframe,
    WalkForwardReport, WalkForwardSpec,
};

#[derive(Parser, Debug)]
#[command(name = "trigger-engine")]
#[command(version)]
#[command(about = "Declarative trigger-strategy backtester", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log filter (overridden by TRIGGER_ENGINE_LOG)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Backtest a strategy once
    Run(CommonArgs),
    /// Sweep one trigger's threshold and backtest the best value
    Sweep {
        #[command(flatten)]
        common: CommonArgs,
        /// Index of the trigger whose value is swept
        #[arg(long)]
        trigger_index: usize,
        #[arg(long)]
        start: f64,
        #[arg(long)]
        end: f64,
        #[arg(long)]
        step: f64,
    },
    /// Search a grid of named parameters
    WalkForward {
        #[command(flatten)]
        common: CommonArgs,
        /// Parameter grid as JSON, e.g. {"rsi_period": [7, 14]}
        #[arg(long)]
        grid: PathBuf,
    },
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Strategy JSON file
    #[arg(short, long)]
    strategy: PathBuf,

    /// Data file path (CSV/JSON). If not provided, uses synthetic data.
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Number of synthetic bars
    #[arg(long, default_value = "500")]
    bars: usize,

    /// Seed for synthetic data
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Initial price for synthetic data
    #[arg(long, default_value = "100.0")]
    initial_price: f64,

    /// Base timeframe; inferred from the data when omitted
    #[arg(short, long)]
    timeframe: Option<Timeframe>,

    /// Slippage as a fraction of price (0.001 = 10 bps)
    #[arg(long, default_value = "0.0")]
    slippage: f64,

    /// Commission as a fraction of notional
    #[arg(long, default_value = "0.0")]
    commission: f64,

    #[arg(short, long, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pretty: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    Json,
    Text,
}

struct Session {
    strategy: StrategySpec,
    execution: ExecutionConfig,
    timeframe: Option<Timeframe>,
    bars: Vec<Bar>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    match cli.command {
        Command::Run(args) => {
            let session = prepare(&args)?;
            let mut engine =
                BacktestEngine::new(session.strategy).with_execution(session.execution);
            if let Some(tf) = session.timeframe {
                engine = engine.with_base_timeframe(tf);
            }
            let result = engine.run(&session.bars)?;
            emit(&args, &result, print_text_report)?;
        }
        Command::Sweep {
            common,
            trigger_index,
            start,
            end,
            step,
        } => {
            let session = prepare(&common)?;
            let spec = SweepSpec {
                trigger_index,
                start,
                end,
                step,
            };
            let result = optimizer(&session).sweep_result(&session.bars, &spec)?;
            emit(&common, &result, print_text_report)?;
        }
        Command::WalkForward { common, grid } => {
            let session = prepare(&common)?;
            let raw = std::fs::read_to_string(&grid)
                .with_context(|| format!("reading grid {}", grid.display()))?;
            let spec = WalkForwardSpec {
                parameters: serde_json::from_str(&raw).context("parsing parameter grid")?,
            };
            let report = optimizer(&session).walk_forward(&session.bars, &spec)?;
            emit(&common, &report, print_walk_forward_report)?;
        }
    }

    Ok(())
}

/// Logs go to stderr so JSON on stdout stays parseable
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = std::env::var("TRIGGER_ENGINE_LOG").unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| anyhow::anyhow!("invalid log filter: {err}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn prepare(args: &CommonArgs) -> Result<Session> {
    let strategy = StrategySpec::from_json_file(&args.strategy)
        .with_context(|| format!("loading strategy {}", args.strategy.display()))?;

    let execution = ExecutionConfig::default()
        .with_slippage(args.slippage)
        .with_commission(args.commission);

    // Load or generate data
    let bars = if let Some(path) = &args.data {
        load_file(path).with_context(|| format!("loading data {}", path.display()))?
    } else {
        let tf = args.timeframe.unwrap_or_else(|| Timeframe::days(1));
        tracing::info!(bars = args.bars, seed = args.seed, timeframe = %tf, "generating synthetic data");
        generate_synthetic_bars(args.bars, args.initial_price, args.seed, tf)
    };

    Ok(Session {
        strategy,
        execution,
        timeframe: args.timeframe,
        bars,
    })
}

fn optimizer(session: &Session) -> Optimizer {
    let optimizer =
        Optimizer::new(session.strategy.clone()).with_execution(session.execution.clone());
    match session.timeframe {
        Some(tf) => optimizer.with_base_timeframe(tf),
        None => optimizer,
    }
}

fn emit<T: Serialize>(args: &CommonArgs, value: &T, text: fn(&T)) -> Result<()> {
    match args.output {
        OutputFormat::Json => {
            let json = if args.pretty {
                serde_json::to_string_pretty(value)?
            } else {
                serde_json::to_string(value)?
            };
            println!("{}", json);
        }
        OutputFormat::Text => text(value),
    }
    Ok(())
}

fn print_text_report(result: &BacktestResult) {
    let m = &result.metrics;

    println!();
    println!("================================================================");
    println!("  BACKTEST REPORT - {}", result.strategy);
    println!("================================================================");
    println!();
    if let (Some(first), Some(last)) = (result.equity_curve.first(), result.equity_curve.last()) {
        println!("  Period: {} to {}", first.timestamp, last.timestamp);
    }
    println!("  Bars: {}", result.equity_curve.len());
    println!("  Mode: {:?}", result.mode);
    println!("  Execution Time: {}ms", result.execution_time_ms);
    println!();
    println!("----------------------------------------------------------------");
    println!("  CAPITAL");
    println!("----------------------------------------------------------------");
    println!("  Initial Capital:  ${:>12.2}", result.initial_capital);
    println!("  Final Equity:     ${:>12.2}", result.final_equity);
    println!(
        "  Total P&L:        ${:>12.2} ({:+.2}%)",
        m.total_pnl,
        m.total_return * 100.0
    );
    println!();
    println!("----------------------------------------------------------------");
    println!("  RISK METRICS");
    println!("----------------------------------------------------------------");
    println!("  Volatility (Ann): {:>12.2}%", m.volatility * 100.0);
    println!("  Sharpe Ratio:     {:>12.3}", m.sharpe_ratio);
    println!("  Sortino Ratio:    {:>12.3}", m.sortino_ratio);
    println!("  Max Drawdown:     {:>12.2}%", m.max_drawdown * 100.0);
    println!("  Max DD Duration:  {:>12} bars", m.max_drawdown_duration_bars);
    println!("  Calmar Ratio:     {:>12.3}", m.calmar_ratio);
    println!();
    println!("----------------------------------------------------------------");
    println!("  TRADE STATISTICS");
    println!("----------------------------------------------------------------");
    println!("  Total Trades:     {:>12}", m.trade_count);
    println!("  Winning Trades:   {:>12}", m.winning_trades);
    println!("  Losing Trades:    {:>12}", m.losing_trades);
    println!("  Win Rate:         {:>12.1}%", m.win_rate * 100.0);
    println!("  Avg Win:          ${:>12.2}", m.avg_win);
    println!("  Avg Loss:         ${:>12.2}", m.avg_loss);
    println!("  Profit Factor:    {:>12.3}", m.profit_factor);
    println!("  Expectancy:       ${:>12.2}", m.expectancy);
    println!("  Best Trade:       ${:>12.2}", m.best_trade);
    println!("  Worst Trade:      ${:>12.2}", m.worst_trade);
    println!("  Exposure:         {:>12.1}%", m.exposure_pct);
    println!();
    println!("================================================================");

    if !result.diagnostics.is_empty() {
        println!();
        println!("  DIAGNOSTICS");
        println!("----------------------------------------------------------------");
        for message in &result.diagnostics {
            println!("  {}", message);
        }
    }

    // Print recent trades if any
    if !result.trades.is_empty() {
        println!();
        println!("  RECENT TRADES (last 5)");
        println!("----------------------------------------------------------------");
        for trade in result.trades.iter().rev().take(5) {
            println!(
                "  {} -> {} | {:?} | P&L: ${:+.2} ({:+.1}%) | {} bars | {}",
                trade.entry_date.format("%Y-%m-%d %H:%M"),
                trade.exit_date.format("%Y-%m-%d %H:%M"),
                trade.side,
                trade.pnl,
                trade.pnl_pct,
                trade.holding_bars,
                trade.exit_reason
            );
        }
        println!();
    }

    if let Some(report) = &result.optimization {
        print_sweep_report(report);
    }
}

fn print_sweep_report(report: &OptimizationReport) {
    println!();
    println!("  SWEEP - trigger {}", report.trigger_index);
    println!("----------------------------------------------------------------");
    for point in &report.grid {
        let marker = if Some(point.value) == report.best_value { "*" } else { " " };
        println!(
            " {} value {:>10.4} | P&L: ${:>12.2} | {:>4} trades",
            marker, point.value, point.pnl, point.trade_count
        );
    }
    print_failures(&report.failures, report.cancelled);
}

fn print_walk_forward_report(report: &WalkForwardReport) {
    println!();
    println!("  WALK-FORWARD ({} combinations)", report.entries.len());
    println!("----------------------------------------------------------------");
    for entry in &report.entries {
        let params = entry
            .parameters
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "  P&L: ${:>12.2} | Sharpe {:>7.3} | {:>4} trades | {}",
            entry.pnl, entry.sharpe_ratio, entry.trade_count, params
        );
    }
    print_failures(&report.failures, report.cancelled);
}

fn print_failures(failures: &[GridFailure], cancelled: bool) {
    for failure in failures {
        println!("  FAILED {}: {}", failure.label, failure.error);
    }
    if cancelled {
        println!("  (cancelled before all points ran)");
    }
    println!();
}
