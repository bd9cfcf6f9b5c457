//! TickVault CLI — backfill, merge, and warehouse maintenance commands.
//!
//! Commands:
//! - `backfill` — request and run a historical collection job
//! - `job status|list|cancel` — inspect and control jobs
//! - `merge` — fold the update tier into the historical table
//! - `gaps` — report missing intervals in stored history
//! - `cleanup` / `retention` / `archive` / `backup` / `restore` — tier maintenance
//! - `verify` — integrity checks over a leaf
//! - `quality` — trend summary from recorded quality metrics
//! - `stats` — per-tier file and size breakdown
//! - `dlq stats|list` — dead-letter queue triage

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tickvault_core::domain::{Catalog, Timeframe};
use tickvault_core::quality::{QualityEngine, QualityHistory, TrendSummary};
use tickvault_core::source::{CircuitBreaker, CsvSource, MarketDataSource, SyntheticSource};
use tickvault_core::storage::ParquetStorage;
use tickvault_runner::config::PipelineConfig;
use tickvault_runner::dlq::DeadLetterQueue;
use tickvault_runner::gaps::identify_gaps;
use tickvault_runner::manager::{BackfillManager, BackfillRequest, JobStatusView};
use tickvault_runner::warehouse::{MergeStatus, Tier, Warehouse};

#[derive(Parser)]
#[command(name = "tickvault", about = "TickVault CLI — market-data warehouse")]
struct Cli {
    /// Pipeline config file (TOML). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog file (TOML) with supported symbols and timeframes.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a backfill job and run it to completion.
    Backfill {
        symbol: String,

        /// Timeframe (1m, 5m, 15m, 1h, 4h, 1d).
        #[arg(long, default_value = "1h")]
        timeframe: String,

        /// Start date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD), exclusive.
        #[arg(long)]
        end: String,

        /// Days per batch.
        #[arg(long, default_value_t = 7)]
        batch_size: u32,

        #[arg(long, default_value_t = 1)]
        priority: u8,

        /// Read fixture CSVs from this directory instead of the synthetic feed.
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// Seed for the synthetic feed.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Job inspection and control.
    Job {
        #[command(subcommand)]
        action: JobAction,
    },
    /// Fold staged update files into the historical table.
    Merge {
        symbol: String,
        #[arg(long, default_value = "1h")]
        timeframe: String,
    },
    /// Report missing intervals in stored history.
    Gaps {
        symbol: String,
        #[arg(long, default_value = "1h")]
        timeframe: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    /// Delete files older than the retention window in one tier.
    Cleanup {
        tier: String,
        #[arg(long)]
        retention_days: u32,
    },
    /// Apply the configured retention policy to the update and realtime tiers.
    Retention,
    /// Copy a leaf into the archive namespace without touching the source.
    Archive {
        name: String,
        symbol: String,
        #[arg(long, default_value = "1h")]
        timeframe: String,
        #[arg(long, default_value = "historical")]
        tier: String,
    },
    /// Copy a tier into a named backup with a hash manifest.
    Backup {
        name: String,
        #[arg(long, default_value = "historical")]
        tier: String,
        /// Restrict to these symbols.
        #[arg(long)]
        symbols: Vec<String>,
    },
    /// Restore a named backup, verifying manifest hashes.
    Restore {
        name: String,
        #[arg(long, default_value = "historical")]
        tier: String,
        #[arg(long)]
        symbols: Vec<String>,
    },
    /// Integrity-check every data file of a leaf.
    Verify {
        symbol: String,
        #[arg(long, default_value = "1h")]
        timeframe: String,
        #[arg(long, default_value = "historical")]
        tier: String,
    },
    /// Quality trend summary for one series.
    Quality {
        symbol: String,
        #[arg(long, default_value = "1h")]
        timeframe: String,
        /// Number of most recent observations to summarize.
        #[arg(long, default_value_t = 20)]
        window: usize,
    },
    /// Per-tier file counts and sizes.
    Stats,
    /// Dead-letter queue commands.
    Dlq {
        #[command(subcommand)]
        action: DlqAction,
    },
}

#[derive(Subcommand)]
enum JobAction {
    /// Show one job.
    Status { id: String },
    /// List all known jobs, newest first.
    List,
    /// Cancel a queued or running job.
    Cancel { id: String },
}

#[derive(Subcommand)]
enum DlqAction {
    /// Totals and per-error-type counts.
    Stats,
    /// Print captured failures.
    List {
        #[arg(long, default_value_t = false)]
        retryable_only: bool,
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    let catalog_path = cli.catalog;

    match cli.command {
        Commands::Backfill {
            symbol,
            timeframe,
            start,
            end,
            batch_size,
            priority,
            csv_dir,
            seed,
        } => run_backfill(
            &config,
            catalog_path.as_deref(),
            symbol,
            &timeframe,
            &start,
            &end,
            batch_size,
            priority,
            csv_dir,
            seed,
        ),
        Commands::Job { action } => match action {
            JobAction::Status { id } => {
                let mgr = build_manager(&config, catalog_path.as_deref())?;
                print_job(&mgr.job_status(&id)?);
                Ok(())
            }
            JobAction::List => run_job_list(&config, catalog_path.as_deref()),
            JobAction::Cancel { id } => {
                let mgr = build_manager(&config, catalog_path.as_deref())?;
                let view = mgr.cancel(&id)?;
                println!("Cancelled {} ({})", view.id, view.status);
                Ok(())
            }
        },
        Commands::Merge { symbol, timeframe } => run_merge(&config, &symbol, &timeframe),
        Commands::Gaps {
            symbol,
            timeframe,
            start,
            end,
        } => run_gaps(&config, &symbol, &timeframe, &start, &end),
        Commands::Cleanup {
            tier,
            retention_days,
        } => run_cleanup(&config, &tier, retention_days),
        Commands::Retention => run_retention_cmd(&config),
        Commands::Archive {
            name,
            symbol,
            timeframe,
            tier,
        } => run_archive(&config, &name, &symbol, &timeframe, &tier),
        Commands::Backup {
            name,
            tier,
            symbols,
        } => run_backup(&config, &name, &tier, symbols),
        Commands::Restore {
            name,
            tier,
            symbols,
        } => run_restore(&config, &name, &tier, symbols),
        Commands::Verify {
            symbol,
            timeframe,
            tier,
        } => run_verify(&config, &symbol, &timeframe, &tier),
        Commands::Quality {
            symbol,
            timeframe,
            window,
        } => run_quality(&config, &symbol, &timeframe, window),
        Commands::Stats => run_stats(&config),
        Commands::Dlq { action } => match action {
            DlqAction::Stats => run_dlq_stats(&config),
            DlqAction::List {
                retryable_only,
                limit,
            } => run_dlq_list(&config, retryable_only, limit),
        },
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<PipelineConfig> {
    match path {
        Some(p) => PipelineConfig::from_file(p)
            .with_context(|| format!("loading config from {}", p.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn build_warehouse(config: &PipelineConfig) -> Arc<Warehouse> {
    Arc::new(Warehouse::new(
        &config.warehouse_root.0,
        Arc::new(ParquetStorage),
    ))
}

fn build_manager(
    config: &PipelineConfig,
    catalog_path: Option<&std::path::Path>,
) -> Result<BackfillManager> {
    let warehouse = build_warehouse(config);
    let registry = tickvault_runner::registry::JobRegistry::new(
        warehouse.metadata_dir().join("jobs"),
    );
    registry.load()?;
    let dlq = DeadLetterQueue::new(&config.dlq.dir, config.dlq.max_segment_bytes);
    let catalog = match catalog_path {
        Some(path) => Catalog::from_file(path)
            .with_context(|| format!("loading catalog from {}", path.display()))?,
        None => Catalog::default_set(),
    };
    catalog.persist(&warehouse.metadata_dir())?;
    let history = build_history(config, &warehouse);
    Ok(BackfillManager::new(
        catalog,
        warehouse,
        registry,
        dlq,
        QualityEngine::new(config.quality.clone()),
        history,
        config.retry.policy(),
        CircuitBreaker::new(config.retry.breaker_cooldown()),
    ))
}

fn build_history(config: &PipelineConfig, warehouse: &Warehouse) -> QualityHistory {
    QualityHistory::new(
        warehouse.metadata_dir().join("quality"),
        config.retention.quality_history_days,
    )
}

fn parse_timeframe(s: &str) -> Result<Timeframe> {
    s.parse().map_err(|e: String| anyhow!(e))
}

fn parse_tier(s: &str) -> Result<Tier> {
    s.parse().map_err(|e: String| anyhow!(e))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

#[allow(clippy::too_many_arguments)]
fn run_backfill(
    config: &PipelineConfig,
    catalog_path: Option<&std::path::Path>,
    symbol: String,
    timeframe: &str,
    start: &str,
    end: &str,
    batch_size: u32,
    priority: u8,
    csv_dir: Option<PathBuf>,
    seed: u64,
) -> Result<()> {
    let mgr = build_manager(config, catalog_path)?;
    let request = BackfillRequest {
        symbol: symbol.clone(),
        timeframe: parse_timeframe(timeframe)?,
        start: parse_date(start)?,
        end: parse_date(end)?,
        batch_size_days: batch_size,
        priority,
    };
    let id = mgr.request_backfill(request)?;
    println!("Job {id} queued for {symbol}");

    let source: Box<dyn MarketDataSource> = match csv_dir {
        Some(dir) => Box::new(CsvSource::new(dir)),
        None => Box::new(SyntheticSource::new(seed)),
    };
    source.connect()?;
    let view = mgr.run_job(&id, source.as_ref())?;
    source.disconnect()?;

    print_job(&view);
    if !view.errors.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_job_list(config: &PipelineConfig, catalog_path: Option<&std::path::Path>) -> Result<()> {
    let mgr = build_manager(config, catalog_path)?;
    let jobs = mgr.registry().all();
    if jobs.is_empty() {
        println!("No jobs recorded.");
        return Ok(());
    }
    println!(
        "{:<18} {:<8} {:<4} {:<12} {:>9} {:>8}",
        "Id", "Symbol", "TF", "Status", "Batches", "Progress"
    );
    println!("{}", "-".repeat(64));
    for job in &jobs {
        println!(
            "{:<18} {:<8} {:<4} {:<12} {:>4}/{:<4} {:>7.1}%",
            job.id,
            job.symbol,
            job.timeframe.as_str(),
            job.status.to_string(),
            job.completed_batches,
            job.total_batches,
            job.progress()
        );
    }
    Ok(())
}

fn run_merge(config: &PipelineConfig, symbol: &str, timeframe: &str) -> Result<()> {
    let warehouse = build_warehouse(config);
    let report = warehouse.merge_update_to_historical(symbol, parse_timeframe(timeframe)?)?;
    match report.status {
        MergeStatus::NoData => println!("Nothing to merge for {symbol}."),
        MergeStatus::Merged => println!(
            "Merged {} update file(s) into historical: {} rows.",
            report.update_files_consumed, report.rows_merged
        ),
    }
    Ok(())
}

fn run_gaps(
    config: &PipelineConfig,
    symbol: &str,
    timeframe: &str,
    start: &str,
    end: &str,
) -> Result<()> {
    let warehouse = build_warehouse(config);
    let tf = parse_timeframe(timeframe)?;
    let from = parse_date(start)?
        .and_time(chrono::NaiveTime::MIN)
        .and_utc()
        .timestamp();
    let to = parse_date(end)?
        .and_time(chrono::NaiveTime::MIN)
        .and_utc()
        .timestamp();

    let gaps = identify_gaps(&warehouse, symbol, tf, from, to);
    if gaps.is_empty() {
        println!("No gaps for {symbol} {timeframe} in [{start}, {end}).");
        return Ok(());
    }
    println!("{} gap(s):", gaps.len());
    for (gap_from, gap_to) in gaps {
        let missing = (gap_to - gap_from) / tf.step_secs();
        println!("  [{gap_from}, {gap_to})  ~{missing} missing record(s)");
    }
    Ok(())
}

fn run_cleanup(config: &PipelineConfig, tier: &str, retention_days: u32) -> Result<()> {
    let warehouse = build_warehouse(config);
    let report = warehouse.cleanup(parse_tier(tier)?, retention_days)?;
    println!(
        "Deleted {} file(s), freed {}.",
        report.files_deleted,
        format_size(report.bytes_freed)
    );
    Ok(())
}

fn run_retention_cmd(config: &PipelineConfig) -> Result<()> {
    let warehouse = build_warehouse(config);
    let reports = tickvault_runner::warehouse::run_retention(&warehouse, &config.retention)?;
    for (tier, report) in &reports {
        println!(
            "{tier}: deleted {} file(s), freed {}.",
            report.files_deleted,
            format_size(report.bytes_freed)
        );
    }
    Ok(())
}

fn run_archive(
    config: &PipelineConfig,
    name: &str,
    symbol: &str,
    timeframe: &str,
    tier: &str,
) -> Result<()> {
    let warehouse = build_warehouse(config);
    let report = warehouse.archive(
        parse_tier(tier)?,
        name,
        symbol,
        parse_timeframe(timeframe)?,
    )?;
    println!("Archived {} file(s) as '{name}'.", report.files_copied);
    Ok(())
}

fn run_backup(
    config: &PipelineConfig,
    name: &str,
    tier: &str,
    symbols: Vec<String>,
) -> Result<()> {
    let warehouse = build_warehouse(config);
    let filter = if symbols.is_empty() {
        None
    } else {
        Some(symbols.as_slice())
    };
    let report = warehouse.backup(parse_tier(tier)?, name, filter, None)?;
    println!(
        "Backup '{name}': {} file(s), manifest at {}.",
        report.files_copied,
        report.manifest_path.display()
    );
    Ok(())
}

fn run_restore(
    config: &PipelineConfig,
    name: &str,
    tier: &str,
    symbols: Vec<String>,
) -> Result<()> {
    let warehouse = build_warehouse(config);
    let filter = if symbols.is_empty() {
        None
    } else {
        Some(symbols.as_slice())
    };
    let report = warehouse.restore(name, parse_tier(tier)?, filter, None)?;
    println!("Restored {} file(s) from '{name}'.", report.files_restored);
    Ok(())
}

fn run_verify(
    config: &PipelineConfig,
    symbol: &str,
    timeframe: &str,
    tier: &str,
) -> Result<()> {
    let warehouse = build_warehouse(config);
    let report = warehouse.validate_integrity(
        parse_tier(tier)?,
        symbol,
        parse_timeframe(timeframe)?,
    )?;

    println!(
        "Checked {} file(s): {}",
        report.files_checked,
        if report.is_valid { "OK" } else { "INVALID" }
    );
    for err in &report.errors {
        println!("  error:   {err}");
    }
    for warn in &report.warnings {
        println!("  warning: {warn}");
    }
    if !report.is_valid {
        bail!("integrity check failed");
    }
    Ok(())
}

fn run_quality(
    config: &PipelineConfig,
    symbol: &str,
    timeframe: &str,
    window: usize,
) -> Result<()> {
    let warehouse = build_warehouse(config);
    let history = build_history(config, &warehouse);
    let tf = parse_timeframe(timeframe)?;
    match history.summary(symbol, Some(tf), window)? {
        TrendSummary::NoData => println!("No quality history for {symbol} {timeframe}."),
        TrendSummary::Data {
            count,
            avg,
            min,
            max,
            direction,
        } => {
            println!("Quality trend for {symbol} {timeframe} (last {count} observation(s)):");
            println!("  avg {avg:.4}  min {min:.4}  max {max:.4}  trend {direction:?}");
        }
    }
    Ok(())
}

fn run_stats(config: &PipelineConfig) -> Result<()> {
    let warehouse = build_warehouse(config);
    let stats = warehouse.stats()?;

    println!("Warehouse: {}", warehouse.root().display());
    println!(
        "Total: {} file(s), {}",
        stats.total_files,
        format_size(stats.total_bytes)
    );
    for (tier, tier_stats) in &stats.tiers {
        println!();
        println!(
            "{tier}: {} file(s), {}",
            tier_stats.files,
            format_size(tier_stats.bytes)
        );
        for (instrument, inst) in &tier_stats.by_instrument {
            let tfs: Vec<String> = inst
                .by_timeframe
                .iter()
                .map(|(tf, n)| format!("{tf}:{n}"))
                .collect();
            println!(
                "  {:<10} {:>4} file(s) {:>10}  [{}]",
                instrument,
                inst.files,
                format_size(inst.bytes),
                tfs.join(" ")
            );
        }
    }
    Ok(())
}

fn run_dlq_stats(config: &PipelineConfig) -> Result<()> {
    let dlq = DeadLetterQueue::new(&config.dlq.dir, config.dlq.max_segment_bytes);
    let stats = dlq.statistics()?;

    println!("Dead-letter queue: {}", config.dlq.dir.display());
    println!("Entries:       {}", stats.total);
    println!("Retryable:     {}", stats.retryable);
    println!("Non-retryable: {}", stats.non_retryable);
    println!("Segments:      {}", stats.segments);
    if let (Some(oldest), Some(newest)) = (stats.oldest_ts, stats.newest_ts) {
        println!("Span:          {oldest} .. {newest}");
    }
    if !stats.by_error_type.is_empty() {
        println!();
        for (error_type, count) in &stats.by_error_type {
            println!("  {error_type:<12} {count}");
        }
    }
    Ok(())
}

fn run_dlq_list(
    config: &PipelineConfig,
    retryable_only: bool,
    limit: Option<usize>,
) -> Result<()> {
    let dlq = DeadLetterQueue::new(&config.dlq.dir, config.dlq.max_segment_bytes);
    let entries = dlq.failures(retryable_only, limit)?;
    if entries.is_empty() {
        println!("No captured failures.");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{} [{}] {}: {}",
            entry.ts,
            if entry.retryable { "retryable" } else { "permanent" },
            entry.error_type,
            entry.error_message
        );
        for (key, value) in &entry.context {
            println!("    {key} = {value}");
        }
    }
    Ok(())
}

fn print_job(view: &JobStatusView) {
    println!();
    println!("Job:      {}", view.id);
    println!("Series:   {} {}", view.symbol, view.timeframe.as_str());
    println!("Status:   {}", view.status);
    println!(
        "Batches:  {}/{} ({:.1}%)",
        view.completed_batches, view.total_batches, view.progress_pct
    );
    for warn in &view.warnings {
        println!("  warning: {warn}");
    }
    for err in &view.errors {
        println!("  error:   {err}");
    }
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}
