//! Trendfolio CLI: run, sweep and inspect commands.
//!
//! Commands:
//! - `run`: execute one portfolio backtest from a TOML config file
//! - `sweep`: run the config's parameter grid, checkpointed and resumable
//! - `inspect`: summarize a (possibly partial) sweep checkpoint
//!
//! Logging goes to stderr via `tracing`; set `RUST_LOG` to adjust.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use trendfolio_runner::export::write_run;
use trendfolio_runner::{
    leaderboard, load_data, run_backtest, BacktestConfig, Checkpoint, RunReport, Sweep, SweepUnit,
    UnitStatus,
};

#[derive(Parser)]
#[command(
    name = "trendfolio",
    about = "Trendfolio CLI: walk-forward portfolio backtesting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Override the window start (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// Override the window end (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        /// Output directory for artifacts. Defaults to the config's output.dir.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Run the config's parameter grid, skipping units already checkpointed.
    Sweep {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// JSONL checkpoint. Defaults to sweep.checkpoint or <output.dir>/sweep.jsonl.
        #[arg(long)]
        checkpoint: Option<PathBuf>,

        /// Override the config's sweep unit.
        #[arg(long, value_enum)]
        unit: Option<UnitArg>,

        /// Run units one at a time instead of on the thread pool.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
    /// Summarize a sweep checkpoint.
    Inspect {
        /// Path to the JSONL checkpoint.
        checkpoint: PathBuf,

        /// Number of leaderboard rows to show.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Print the leaderboard records as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    PerSymbol,
    Universe,
}

impl From<UnitArg> for SweepUnit {
    fn from(arg: UnitArg) -> Self {
        match arg {
            UnitArg::PerSymbol => SweepUnit::PerSymbol,
            UnitArg::Universe => SweepUnit::Universe,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            start,
            end,
            output_dir,
        } => run_cmd(&config, start.as_deref(), end.as_deref(), output_dir),
        Commands::Sweep {
            config,
            checkpoint,
            unit,
            sequential,
        } => sweep_cmd(&config, checkpoint, unit, sequential),
        Commands::Inspect {
            checkpoint,
            top,
            json,
        } => inspect_cmd(&checkpoint, top, json),
    }
}

fn parse_date(flag: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("--{flag}: expected YYYY-MM-DD, got '{value}'"))
}

fn run_cmd(
    config_path: &Path,
    start: Option<&str>,
    end: Option<&str>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let mut config = BacktestConfig::load(config_path)?;
    if let Some(start) = start {
        config.engine.start_date = Some(parse_date("start", start)?);
    }
    if let Some(end) = end {
        config.engine.end_date = Some(parse_date("end", end)?);
    }

    let report = run_backtest(&config)?;
    print_summary(&report);

    let out = output_dir.unwrap_or_else(|| config.output.dir.clone());
    let run_dir = write_run(&out, &report)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn sweep_cmd(
    config_path: &Path,
    checkpoint: Option<PathBuf>,
    unit: Option<UnitArg>,
    sequential: bool,
) -> Result<()> {
    let config = BacktestConfig::load(config_path)?;
    let configs = config.sweep.grid.generate(&config.engine);
    if configs.is_empty() {
        bail!(
            "parameter grid has no valid points ({} combinations, all rejected)",
            config.sweep.grid.size()
        );
    }
    let universe = load_data(&config.data)?;

    let checkpoint_path = checkpoint.unwrap_or_else(|| config.checkpoint_path());
    let checkpoint = Checkpoint::open(&checkpoint_path)?;
    let unit = unit.map_or(config.sweep.unit, SweepUnit::from);

    println!(
        "Sweeping {} parameter sets x {} symbols ({}), checkpoint {}",
        configs.len(),
        universe.len(),
        unit_label(unit),
        checkpoint_path.display()
    );

    let summary = Sweep::new(&universe, config.metrics)
        .with_unit(unit)
        .with_parallelism(!sequential)
        .run(&configs, &checkpoint)?;

    println!();
    println!("=== Sweep Summary ===");
    println!("Units:          {}", summary.total);
    println!("Completed:      {}", summary.completed);
    println!("Resumed:        {}", summary.resumed);
    println!("Skipped:        {}", summary.skipped);
    println!("Failed:         {}", summary.failed);
    Ok(())
}

fn unit_label(unit: SweepUnit) -> &'static str {
    match unit {
        SweepUnit::PerSymbol => "per symbol",
        SweepUnit::Universe => "whole universe",
    }
}

fn inspect_cmd(path: &Path, top: usize, json: bool) -> Result<()> {
    if !path.exists() {
        bail!("checkpoint not found: {}", path.display());
    }
    let records = Checkpoint::open(path)?.read_all()?;
    let best = leaderboard(&records, top);

    if json {
        println!("{}", serde_json::to_string_pretty(&best)?);
        return Ok(());
    }

    let count = |status: UnitStatus| records.iter().filter(|r| r.status == status).count();
    println!("Checkpoint:     {}", path.display());
    println!("Records:        {}", records.len());
    println!("Completed:      {}", count(UnitStatus::Completed));
    println!("Skipped:        {}", count(UnitStatus::Skipped));
    println!("Failed:         {}", count(UnitStatus::Failed));
    println!();
    println!(
        "{:<4} {:<10} {:>6} {:>6} {:>5} {:>6} {:>9} {:>8} {:>8} {:>7}",
        "#", "symbol", "entry", "exit", "maxp", "trades", "return", "sharpe", "max_dd", "win"
    );
    for (i, record) in best.iter().enumerate() {
        let Some(m) = record.report.as_ref() else {
            continue;
        };
        let e = &record.engine;
        println!(
            "{:<4} {:<10} {:>3}/{:<2} {:>3}/{:<2} {:>5} {:>6} {:>8.2}% {:>8.3} {:>7.2}% {:>6.1}%",
            i + 1,
            record.symbol.as_deref().unwrap_or("*"),
            e.entry_trend.period,
            e.entry_trend.multiplier,
            e.exit_trend.period,
            e.exit_trend.multiplier,
            e.max_positions,
            m.trade_count,
            m.total_return * 100.0,
            m.sharpe,
            m.max_drawdown * 100.0,
            m.win_rate * 100.0,
        );
    }
    Ok(())
}

fn print_summary(report: &RunReport) {
    let m = &report.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Run:            {}", &report.run_id[..12.min(report.run_id.len())]);
    println!("Symbols:        {}", report.symbols.len());
    if let (Some(first), Some(last)) = (report.equity_curve.first(), report.equity_curve.last()) {
        println!("Period:         {} to {}", first.date, last.date);
    }
    println!(
        "Dates:          {} ({} warmup)",
        report.diagnostics.dates, report.diagnostics.warmup_dates
    );
    println!("Trades:         {}", m.trade_count);
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   {:.2}", m.final_equity);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("CAGR:           {:.2}%", m.cagr * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Sortino:        {:.3}", m.sortino);
    println!("Calmar:         {:.3}", m.calmar);
    println!("Info Ratio:     {:.3}", m.information_ratio);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("DD Duration:    {} samples", m.max_drawdown_duration);
    println!("Exposure:       {:.1}%", m.exposure * 100.0);
    println!("Win Rate:       {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Avg Hold:       {:.1} bars", m.avg_hold_days);
    println!("Max Consec Win: {}", m.max_consecutive_wins);
    println!("Max Consec Loss:{}", m.max_consecutive_losses);
    println!(
        "VaR/CVaR ({:.0}%): {:.2}% / {:.2}%",
        report.tail.confidence * 100.0,
        m.value_at_risk * 100.0,
        m.conditional_var * 100.0
    );
    if !m.exit_reasons.is_empty() {
        println!();
        println!("--- Exit Reasons ---");
        for (reason, count) in &m.exit_reasons {
            println!("{:<20}{}", reason.as_str(), count);
        }
    }
    for skipped in &report.skipped {
        println!("WARNING: skipped {}: {}", skipped.symbol, skipped.reason);
    }
    println!();
}
