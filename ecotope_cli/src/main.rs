// Headless runner for the Ecotope simulator.
//
// Loads a simulation configuration and a species catalog (both JSON; the
// built-in temperate defaults are used when a path is not given), runs the
// simulation to its configured duration, and logs a yearly summary. With
// `--realtime` the ticks run on the background scheduler at the configured
// unit time; otherwise they run back to back on the main thread.
//
// Usage:
//   ecotope [OPTIONS]
//     --config <PATH>         SimulationConfiguration JSON
//     --catalog <PATH>        JSON array of species records
//     --months <N>            Override the run length
//     --seed <N>              Override the RNG seed
//     --unit-time-ms <MS>     Override the scheduler period
//     --realtime              Run on the scheduler thread
//     --stats-out <PATH>      Write the final species point sets as JSON
//
// Logging goes through `tracing`; set RUST_LOG (default `info`) for more.

use anyhow::{Context, Result};
use clap::Parser;
use ecotope_sim::config::SimulationConfiguration;
use ecotope_sim::export::{ClarkEvansAnalyzer, PointPatternAnalyzer, StatisticalSnapshot};
use ecotope_sim::simulator::{SimulatorManager, TickReport};
use ecotope_sim::species::InMemoryCatalog;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "ecotope", about = "Run a plant competition simulation headless")]
struct Args {
    /// Simulation configuration JSON.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Species catalog JSON.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Run length in months.
    #[arg(long)]
    months: Option<u64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Real-time milliseconds per simulated month.
    #[arg(long)]
    unit_time_ms: Option<u64>,

    /// Tick on the background scheduler instead of the main thread.
    #[arg(long)]
    realtime: bool,

    /// Where to write the final statistical snapshot.
    #[arg(long)]
    stats_out: Option<PathBuf>,
}

/// Writes the snapshot it is given to a JSON file.
struct JsonSnapshotWriter {
    path: PathBuf,
    outcome: Option<Result<()>>,
}

impl JsonSnapshotWriter {
    fn write(&self, snapshot: &StatisticalSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))
    }
}

impl PointPatternAnalyzer for JsonSnapshotWriter {
    fn analyze(&mut self, snapshot: &StatisticalSnapshot) {
        self.outcome = Some(self.write(snapshot));
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let catalog = match &args.catalog {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            InMemoryCatalog::from_json(&json)
                .with_context(|| format!("parsing species catalog {}", path.display()))?
        }
        None => InMemoryCatalog::temperate(),
    };

    tracing::info!(
        months = config.duration_months,
        seed = config.seed,
        species = config.species_quantities.len(),
        "starting simulation"
    );
    let mut manager =
        SimulatorManager::new(config, Arc::new(catalog)).context("setting up simulation")?;

    if args.realtime {
        let reports = manager.subscribe();
        manager.start().context("starting scheduler")?;
        loop {
            match reports.recv_timeout(Duration::from_millis(250)) {
                Ok(report) => {
                    log_progress(&report);
                    if report.finished {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) if manager.is_running() => {}
                Err(_) => break,
            }
        }
        manager.stop();
    } else {
        loop {
            let report = manager.step();
            log_progress(&report);
            if report.finished {
                break;
            }
        }
    }

    let (tx, rx) = mpsc::channel();
    manager
        .export_statistical_snapshot(ClarkEvansAnalyzer::default(), move |analyzer| {
            let _ = tx.send(analyzer.results);
        })
        .join()
        .map_err(|_| anyhow::anyhow!("statistics thread panicked"))?;
    for (species, index) in rx.recv().context("statistics thread hung up")? {
        tracing::info!(%species, clark_evans = index, "final spatial pattern");
    }

    if let Some(path) = args.stats_out {
        let (tx, rx) = mpsc::channel();
        let writer = JsonSnapshotWriter {
            path,
            outcome: None,
        };
        manager
            .export_statistical_snapshot(writer, move |writer| {
                let _ = tx.send(writer);
            })
            .join()
            .map_err(|_| anyhow::anyhow!("export thread panicked"))?;
        let writer = rx.recv().context("export thread hung up")?;
        writer.outcome.unwrap_or(Ok(()))?;
        tracing::info!(path = %writer.path.display(), "statistical snapshot written");
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<SimulationConfiguration> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            SimulationConfiguration::from_json(&json)
                .with_context(|| format!("parsing configuration {}", path.display()))?
        }
        None => SimulationConfiguration::default(),
    };
    if let Some(months) = args.months {
        config.duration_months = months;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(ms) = args.unit_time_ms {
        config.unit_time_ms = Some(ms);
    }
    Ok(config)
}

fn log_progress(report: &TickReport) {
    if report.elapsed_months % 12 == 0 || report.finished {
        tracing::info!(
            year = report.elapsed_months / 12,
            month = %report.month,
            population = report.population,
            births = report.births,
            deaths = report.deaths.len(),
            "progress"
        );
    }
}
