use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use gateway_check::duration::{format_duration, parse_duration};
use gateway_check::{
    CheckRunner, DirectoryInventory, InventoryLoad, InventorySource, RunReport, Settings,
};
use gateway_check_adapters::influxdb::InfluxSink;
use gateway_check_adapters::noc::NocStatusProvider;
use gateway_check_adapters::{MemorySink, MetricSink};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_LOG_FILTER: &str = "gateway_check=info,gateway_check_adapters=info";

/// Exit status when `--fail-on-error` is set and a gateway check failed.
const EXIT_CHECK_FAILED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "gateway-check", version)]
#[command(about = "Checks LoRaWAN gateway liveness against the TTN NOC and records it to InfluxDB")]
struct Args {
    /// Path to the configuration file (JSON, TOML or YAML)
    #[arg(short, long, env = "CONFIG_FILE")]
    config: PathBuf,

    /// Directory holding one JSON file per gateway
    #[arg(short, long, env = "INVENTORY")]
    inventory: PathBuf,

    /// Freshness window (e.g., "10m", "90s"), overrides check.freshness_window
    #[arg(short, long, value_parser = parse_duration)]
    window: Option<Duration>,

    /// Gateways checked at once, overrides check.concurrency
    #[arg(long)]
    concurrency: Option<usize>,

    /// Abandon a pass still running after this long, overrides check.deadline
    #[arg(long, value_parser = parse_duration)]
    deadline: Option<Duration>,

    /// Log the points instead of writing them to InfluxDB
    #[arg(long)]
    dry_run: bool,

    /// Repeat the check on this interval until interrupted
    #[arg(long, value_parser = parse_duration)]
    interval: Option<Duration>,

    /// Exit with status 2 if any gateway check failed
    #[arg(long)]
    fail_on_error: bool,

    /// Write the report of the last pass to this JSON file
    #[arg(short, long)]
    report: Option<PathBuf>,
}

impl Args {
    /// Apply command-line overrides on top of the loaded settings.
    fn apply(&self, settings: &mut Settings) {
        if let Some(window) = self.window {
            settings.check.freshness_window = window;
        }
        if let Some(concurrency) = self.concurrency {
            settings.check.concurrency = concurrency;
        }
        if self.deadline.is_some() {
            settings.check.deadline = self.deadline;
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %format!("{:#}", e), "gateway-check failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode> {
    let mut settings = Settings::load(&args.config)?;
    args.apply(&mut settings);
    settings.validate()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        inventory = %args.inventory.display(),
        window = %format_duration(settings.check.freshness_window),
        concurrency = settings.check.concurrency,
        dry_run = args.dry_run,
        "gateway-check starting"
    );

    let provider = NocStatusProvider::builder()
        .endpoint(settings.noc.base_url.as_str())
        .timeout(settings.noc.timeout)
        .build()
        .context("Failed to set up the NOC client")?;

    let dry_run_sink = args.dry_run.then(|| Arc::new(MemorySink::new()));
    let sink: Arc<dyn MetricSink> = match &dry_run_sink {
        Some(sink) => sink.clone(),
        None => {
            let influx = &settings.influxdb;
            Arc::new(
                InfluxSink::builder()
                    .host(influx.host.as_str())
                    .port(influx.port)
                    .ssl(influx.ssl)
                    .credentials(influx.username.as_str(), influx.password.as_str())
                    .database(influx.database.as_str())
                    .timeout(influx.timeout)
                    .build()
                    .context("Failed to set up the InfluxDB client")?,
            )
        }
    };

    let runner = CheckRunner::new(Arc::new(provider), sink)
        .with_window(settings.check.freshness_window)
        .with_concurrency(settings.check.concurrency)
        .with_deadline(settings.check.deadline)
        .with_span(info_span!("check_pass", dry_run = args.dry_run));

    let inventory = DirectoryInventory::new(&args.inventory);
    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling unfinished checks");
                cancel.cancel();
            }
        }
    });

    let pass = Pass {
        runner: &runner,
        inventory: &inventory,
        cancel: &cancel,
        dry_run: dry_run_sink.as_deref(),
    };

    let last = match args.interval {
        None => Some(pass.run().await?),
        Some(interval) => {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last = None;

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!("Stopping");
                        break;
                    }
                    _ = ticker.tick() => match pass.run().await {
                        Ok(report) => {
                            if let Some(path) = &args.report {
                                if let Err(e) = write_report(&report, path).await {
                                    error!(error = %format!("{:#}", e), "Failed to write report");
                                }
                            }
                            last = Some(report);
                        }
                        Err(e) => error!(error = %format!("{:#}", e), "Check pass skipped"),
                    },
                }
            }
            last
        }
    };

    if args.interval.is_none() {
        if let (Some(report), Some(path)) = (&last, &args.report) {
            write_report(report, path).await?;
        }
    }

    let failed = last.as_ref().map_or(0, RunReport::failed);
    if args.fail_on_error && failed > 0 {
        return Ok(ExitCode::from(EXIT_CHECK_FAILED));
    }
    Ok(ExitCode::SUCCESS)
}

/// Everything one pass over the inventory needs.
struct Pass<'a> {
    runner: &'a CheckRunner,
    inventory: &'a dyn InventorySource,
    cancel: &'a CancellationToken,
    dry_run: Option<&'a MemorySink>,
}

impl Pass<'_> {
    /// Load the inventory and check it. An empty inventory yields an empty report.
    async fn run(&self) -> Result<RunReport> {
        let gateways = match self.inventory.load() {
            InventoryLoad::Loaded(gateways) => gateways,
            InventoryLoad::Empty => {
                info!(
                    source = self.inventory.description(),
                    "Inventory lists no gateways, nothing to check"
                );
                Vec::new()
            }
            InventoryLoad::LoadFailed(reason) => {
                bail!("Inventory could not be loaded: {}", reason)
            }
        };

        let report = self.runner.run(&gateways, self.cancel).await;

        if let Some(sink) = self.dry_run {
            for point in sink.drain() {
                info!(point = %point.to_line_protocol(), "Dry run, not written");
            }
        }

        let elapsed = (report.finished_at - report.started_at)
            .to_std()
            .unwrap_or_default();
        info!(
            gateways = report.len(),
            online = report.online(),
            offline = report.offline(),
            failed = report.failed(),
            elapsed = %format_duration(elapsed),
            "Summary"
        );
        for outcome in report.outcomes.iter().filter(|o| !o.is_recorded()) {
            if let Some(failure) = outcome.failure() {
                warn!(gateway = %outcome.gateway(), kind = %failure.kind, "Not recorded");
            }
        }

        Ok(report)
    }
}

/// Write a report as pretty-printed JSON.
async fn write_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    info!(path = %path.display(), "Report written");
    Ok(())
}
