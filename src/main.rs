// file: src/main.rs
// description: commandline application entry point with command handling
// reference: application bootstrap and orchestration

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Span, error, info, warn};
use trendhub::utils::logging::{
    component_span, format_error, format_info, format_rank, format_success, format_warning,
    init_logger, root_span,
};
use trendhub::{
    Config, ContentCache, DailyCollector, JsonExporter, KeywordRules, Pipeline, PipelineParts,
    PushRecordStore, PushScheduler, PushTask, ReportMode, Store, load_rules,
};

#[derive(Parser)]
#[command(name = "trendhub")]
#[command(version = "0.1.0")]
#[command(about = "Trending-topic aggregation with keyword scoring and scheduled push", long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        default_value = "config/default.toml"
    )]
    config: PathBuf,

    /// Keyword rules file, overrides keywords.file
    #[arg(short, long, value_name = "FILE")]
    keywords: Option<PathBuf>,

    /// Database path, overrides app.db_path
    #[arg(long, value_name = "PATH")]
    db: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    color: bool,

    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one crawl, filter, rank and notify cycle
    Run {
        /// Overrides report.mode
        #[arg(long)]
        mode: Option<ReportMode>,

        /// Crawl, filter and rank only; nothing is stored or sent
        #[arg(long)]
        dry_run: bool,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Run the push scheduler (and the daily collector in daily mode) until Ctrl-C
    Serve {
        /// Seconds between config reloads, 0 disables reloading
        #[arg(long, default_value_t = 60)]
        reload_interval: u64,
    },

    /// List push attempts, most recent first
    Records {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Show stored crawl history
    History {
        #[arg(long, default_value_t = 7, conflicts_with = "date")]
        days: usize,

        /// Show a single day in full (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },

    /// Export crawl snapshots as JSON
    Export {
        /// Day to export (YYYY-MM-DD); all stored days when omitted
        #[arg(long)]
        date: Option<String>,

        #[arg(short, long, default_value = "./exports")]
        output: PathBuf,

        #[arg(short, long)]
        pretty: bool,
    },

    /// Drop expired ledger entries, old crawl history and old push records
    Prune,
}

/// Storage shared by every subcommand.
struct Services {
    store: Store,
    cache: Arc<ContentCache>,
    records: Arc<PushRecordStore>,
}

impl Services {
    fn open(config: &Config, root: &Span) -> Result<Self> {
        let store = Store::open(&config.app.db_path)
            .with_context(|| format!("Failed to open {}", config.app.db_path.display()))?;
        let cache = ContentCache::new(&store, &config.cache)
            .context("Failed to open content cache")?
            .with_span(component_span(root, "cache"));
        let records = PushRecordStore::new(&store)
            .context("Failed to open push records")?
            .with_span(component_span(root, "push_records"));

        Ok(Self {
            store,
            cache: Arc::new(cache),
            records: Arc::new(records),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_found = cli.config.exists();
    let mut config = if config_found {
        Config::load(Some(cli.config.as_path())).context("Failed to load configuration")?
    } else {
        Config::load(None).unwrap_or_else(|_| Config::default_config())
    };
    apply_overrides(&mut config, &cli);

    init_logger(cli.color, cli.verbose, config.app.log_file.as_deref())
        .context("Failed to initialize logging")?;
    colored::control::set_override(cli.color);

    let root = root_span();
    info!(parent: &root, "TrendHub");
    if config_found {
        info!("Loaded configuration from: {}", cli.config.display());
    } else {
        warn!(
            "Config file {} not found, using default configuration",
            cli.config.display()
        );
    }

    match &cli.command {
        Commands::Run {
            mode,
            dry_run,
            limit,
        } => {
            if let Some(mode) = *mode {
                config.report.mode = mode;
            }
            cmd_run(&config, &root, *dry_run, *limit).await?;
        }
        Commands::Serve { reload_interval } => {
            cmd_serve(config, &cli, &root, *reload_interval).await?;
        }
        Commands::Records { limit, offset } => {
            cmd_records(&config, &root, *limit, *offset)?;
        }
        Commands::History { days, date } => {
            cmd_history(&config, &root, *days, date.as_deref())?;
        }
        Commands::Export {
            date,
            output,
            pretty,
        } => {
            cmd_export(&config, &root, date.clone(), output, *pretty)?;
        }
        Commands::Prune => {
            cmd_prune(&config, &root).await?;
        }
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(keywords) = &cli.keywords {
        config.keywords.file = keywords.clone();
    }
    if let Some(db) = &cli.db {
        config.app.db_path = db.clone();
    }
    if let Some(log_file) = &cli.log_file {
        config.app.log_file = Some(log_file.clone());
    }
}

fn load_keyword_rules(config: &Config) -> Result<KeywordRules> {
    load_rules(&config.keywords.file).with_context(|| {
        format!(
            "Failed to load keyword rules from {}",
            config.keywords.file.display()
        )
    })
}

fn build_parts(config: &Config) -> Result<PipelineParts> {
    let rules = load_keyword_rules(config)?;
    PipelineParts::from_config(config, &rules).context("Failed to build pipeline")
}

/// Re-reads the config file and applies the command-line overrides again.
fn reload_config(cli: &Cli) -> Result<Config> {
    let path = cli.config.exists().then_some(cli.config.as_path());
    let mut config = Config::load(path).context("Failed to reload configuration")?;
    apply_overrides(&mut config, cli);
    Ok(config)
}

async fn cmd_run(config: &Config, root: &Span, dry_run: bool, limit: usize) -> Result<()> {
    let services = Services::open(config, root)?;
    let parts = build_parts(config)?;
    let crawler = Arc::clone(&parts.crawler);
    let crawl_timeout = parts.crawl_timeout;
    let pipeline = Pipeline::new(parts, Arc::clone(&services.cache))
        .with_span(component_span(root, "pipeline"));

    let items = if dry_run {
        info!("Dry run, nothing will be stored or sent");
        let raw = trendhub::crawler::crawl_with_deadline(
            crawler.as_ref(),
            crawl_timeout,
            &CancellationToken::new(),
        )
        .await
        .context("Crawl failed")?;
        pipeline.filter_and_rank(raw)
    } else {
        let report = pipeline.run_once().await.context("Cycle failed")?;
        println!(
            "{}",
            format_success(&format!(
                "{} mode: {} in, {} kept, {} notified",
                report.mode, report.crawled, report.filtered, report.notified
            ))
        );
        report.items
    };

    if items.is_empty() {
        println!("{}", format_warning("No matching items"));
    } else {
        for (index, item) in items.iter().take(limit).enumerate() {
            println!(
                "{}",
                format_rank(index + 1, &format!("[{}] {}", item.source_name, item.title))
            );
        }
        if items.len() > limit {
            println!(
                "{}",
                format_info(&format!("... {} more", items.len() - limit))
            );
        }
    }

    services.store.flush().await.context("Failed to flush database")?;
    Ok(())
}

async fn cmd_serve(config: Config, cli: &Cli, root: &Span, reload_interval: u64) -> Result<()> {
    let services = Services::open(&config, root)?;
    let shutdown = CancellationToken::new();

    match prune_storage(&config, &services) {
        Ok((reaped, history, records)) => info!(
            "Startup cleanup removed {} ledger entries, {} snapshots, {} push records",
            reaped, history, records
        ),
        Err(e) => warn!("Startup cleanup failed: {:#}", e),
    }

    let pipeline = Arc::new(
        Pipeline::new(build_parts(&config)?, Arc::clone(&services.cache))
            .with_span(component_span(root, "pipeline"))
            .with_shutdown(shutdown.clone()),
    );
    let task: Arc<dyn PushTask> = pipeline.clone();
    let scheduler = PushScheduler::with_span(
        config.notification.push_window.clone(),
        task,
        Arc::clone(&services.records),
        component_span(root, "scheduler"),
    );

    let mut collector = start_collector(&config, &pipeline, root, &shutdown);

    if !scheduler.start(&shutdown).await {
        warn!("Push window disabled, running a single cycle now");
        if let Err(e) = pipeline.run_once().await {
            error!("Cycle failed: {}", e);
        }
    }

    println!("{}", format_success("Serving, press Ctrl-C to stop"));

    let mut current = config;
    let mut reload = tokio::time::interval(Duration::from_secs(reload_interval.max(1)));
    reload.tick().await;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
            _ = reload.tick(), if reload_interval > 0 => {
                match reload_config(cli).and_then(|next| build_parts(&next).map(|parts| (next, parts))) {
                    Ok((next, parts)) => {
                        let collector_changed = next.report.mode != current.report.mode
                            || next.crawler.collect_interval() != current.crawler.collect_interval()
                            || next.crawler.enabled != current.crawler.enabled;

                        pipeline.reload(parts);
                        scheduler
                            .reload_config(next.notification.push_window.clone())
                            .await;

                        if collector_changed {
                            if let Some(old) = collector.take() {
                                old.stop().await;
                            }
                            collector = start_collector(&next, &pipeline, root, &shutdown);
                        }
                        current = next;
                    }
                    Err(e) => warn!("Config reload skipped, keeping previous settings: {:#}", e),
                }
            }
        }
    }

    info!("Shutting down");
    shutdown.cancel();
    scheduler.stop().await;
    if let Some(collector) = collector {
        collector.stop().await;
    }
    services.store.flush().await.context("Failed to flush database")?;
    println!("{}", format_success("Stopped"));
    Ok(())
}

fn start_collector(
    config: &Config,
    pipeline: &Pipeline,
    root: &Span,
    shutdown: &CancellationToken,
) -> Option<DailyCollector> {
    if config.report.mode != ReportMode::Daily || !config.crawler.enabled {
        return None;
    }

    let parts = pipeline.parts();
    let collector = DailyCollector::new(
        Arc::clone(&parts.crawler),
        Arc::clone(pipeline.cache()),
        config.crawler.collect_interval(),
        parts.crawl_timeout,
    )
    .with_span(component_span(root, "collector"));
    collector.start(shutdown);
    Some(collector)
}

fn cmd_records(config: &Config, root: &Span, limit: usize, offset: usize) -> Result<()> {
    let services = Services::open(config, root)?;
    let records = services
        .records
        .list(limit, offset)
        .context("Failed to read push records")?;

    if records.is_empty() {
        println!("{}", format_info("No push records"));
        return Ok(());
    }

    println!(
        "{}",
        format_info(&format!(
            "Showing {} of {} push records",
            records.len(),
            services.records.count()
        ))
    );
    for record in records {
        let when = record
            .timestamp
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S");
        let line = format!(
            "{} {} items={} {}ms {}",
            when,
            record.status,
            record.item_count,
            record.duration,
            record.notifiers.join(",")
        );
        if record.is_success() {
            println!("{}", format_success(&line));
        } else {
            let reason = record.error_msg.as_deref().unwrap_or("unknown error");
            println!("{}", format_error(&format!("{} ({})", line, reason)));
        }
    }
    Ok(())
}

fn cmd_history(config: &Config, root: &Span, days: usize, date: Option<&str>) -> Result<()> {
    let services = Services::open(config, root)?;

    if let Some(date) = date {
        let snapshot = services
            .cache
            .get_snapshot(date)
            .with_context(|| format!("No history for {}", date))?;
        println!(
            "{}",
            format_info(&format!(
                "{}: {} items from {} platforms",
                snapshot.date,
                snapshot.item_count,
                snapshot.data.len()
            ))
        );
        for (source, items) in &snapshot.data {
            println!("{}", format_success(&format!("{} ({})", source, items.len())));
            for (index, item) in items.iter().enumerate() {
                println!("{}", format_rank(index + 1, &item.title));
            }
        }
        return Ok(());
    }

    let summaries = services
        .cache
        .recent_summaries(days)
        .context("Failed to read crawl history")?;
    if summaries.is_empty() {
        println!("{}", format_info("No crawl history"));
        return Ok(());
    }
    for summary in summaries {
        let platforms = summary
            .platforms
            .iter()
            .map(|(source, count)| format!("{}={}", source, count))
            .collect::<Vec<_>>()
            .join(" ");
        println!(
            "{}",
            format_info(&format!(
                "{} {} items  {}",
                summary.date, summary.item_count, platforms
            ))
        );
    }
    Ok(())
}

fn cmd_export(
    config: &Config,
    root: &Span,
    date: Option<String>,
    output: &Path,
    pretty: bool,
) -> Result<()> {
    let services = Services::open(config, root)?;
    let exporter = JsonExporter::new(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let dates = match date {
        Some(date) => vec![date],
        None => services
            .cache
            .recent_summaries(usize::MAX)
            .context("Failed to read crawl history")?
            .into_iter()
            .map(|summary| summary.date)
            .collect(),
    };

    let manifest = exporter
        .export_dates(&services.cache, &dates, pretty)
        .context("Export failed")?;
    print_export(&manifest.files, manifest.total_items, exporter.output_dir());
    Ok(())
}

fn print_export(files: &[String], total_items: usize, dir: &Path) {
    if files.is_empty() {
        println!("{}", format_warning("Nothing exported"));
    } else {
        println!(
            "{}",
            format_success(&format!(
                "Exported {} items in {} files to {}",
                total_items,
                files.len(),
                dir.display()
            ))
        );
    }
}

/// Returns removed (ledger entries, snapshots, push records).
fn prune_storage(config: &Config, services: &Services) -> Result<(usize, usize, usize)> {
    let reaped = services
        .cache
        .reap_expired()
        .context("Failed to reap pushed ledger")?;
    let history = services
        .cache
        .prune_older_than(config.cache.history_retention_days)
        .context("Failed to prune crawl history")?;
    let records = services
        .records
        .delete_older_than(config.notification.push_window.push_record_retention_days)
        .context("Failed to prune push records")?;
    Ok((reaped, history, records))
}

async fn cmd_prune(config: &Config, root: &Span) -> Result<()> {
    let services = Services::open(config, root)?;
    let (reaped, history, records) = prune_storage(config, &services)?;

    println!(
        "{}",
        format_success(&format!(
            "Removed {} ledger entries, {} snapshots, {} push records",
            reaped, history, records
        ))
    );
    services.store.flush().await.context("Failed to flush database")?;
    Ok(())
}
