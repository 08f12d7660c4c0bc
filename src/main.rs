//! CLI entry point for the datagrapher application.
//!
//! Subcommands mirror the operator workflow:
//! - `collect` — run the live pipeline (serial balance, or a synthetic
//!   test source) and store samples under a new run.
//! - `list` — list stored runs.
//! - `dump` — export one run's records to a CSV file.
//! - `replay` — feed a stored run back through the presentation path.
//! - `ports` — list serial ports available for use.
//!
//! Exit status is 0 for any normal shutdown (including operator stop) and
//! 1 for fatal precondition failures such as a missing serial port or a
//! missing database file for read-only operations.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::unbounded;
use log::error;

use datagrapher::config::Settings;
use datagrapher::error::DaqError;
use datagrapher::export;
use datagrapher::pipeline::Pipeline;
use datagrapher::render::HeadlessRenderer;
use datagrapher::sample::Sample;
use datagrapher::signal::Signal;
use datagrapher::source::{self, ReplaySource, SampleSource, SawtoothSource, UniformSource};
use datagrapher::storage::{Database, NewRun};
use datagrapher::workers::{display, persist};
use datagrapher::workers::display::WindowHandle;
use datagrapher::workers::persist::PersistOptions;

#[derive(Parser)]
#[command(name = "datagrapher")]
#[command(about = "Collects, graphs and stores data from a serial balance", long_about = None)]
struct Cli {
    /// Name of the db to store data into
    #[arg(short = 'd', long = "db", global = true, default_value = "test.db")]
    db: String,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Synthetic source selection for capture tests.
#[derive(Copy, Clone, Debug, ValueEnum)]
enum TestMode {
    Random,
    Sawtooth,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect, graph and store data
    Collect {
        /// Perform a data capture and serialization test
        #[arg(short = 't', long = "test", value_enum)]
        test: Option<TestMode>,

        /// Name of the data collection
        #[arg(short = 'c', long = "collection-name", default_value = "Collection")]
        name: String,

        /// Notes related to the data collection
        #[arg(short = 'n', long)]
        notes: Option<String>,

        /// User performing the data collection
        #[arg(short = 'u', long = "username")]
        user: Option<String>,

        /// Serial port to connect to in order to collect data
        #[arg(short = 'p', long)]
        port: Option<String>,

        /// Only record stable values
        #[arg(short = 's', long)]
        stable_only: bool,

        /// Do not log the difference value written to the database
        #[arg(long = "no-print-diff")]
        no_print_diff: bool,

        /// Stop the collection after this many seconds
        #[arg(long)]
        duration: Option<f64>,
    },

    /// List stored runs
    List,

    /// Dump one run's records to a CSV file
    Dump {
        /// Run id to dump
        #[arg(short = 'i', long)]
        id: i64,

        /// File to dump the data out to
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },

    /// Replay the visualization for a stored run
    Replay {
        /// Run id to replay the data from
        #[arg(short = 'i', long)]
        id: i64,

        /// Rate in seconds at which to replay stored values
        #[arg(short = 'r', long = "replay-rate", default_value_t = 0.3)]
        replay_rate: f64,

        /// Stop the replay after this many seconds
        #[arg(long)]
        duration: Option<f64>,
    },

    /// List serial ports available for use
    Ports,
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".into())
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli) {
        error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let settings = Settings::new(None)?;
    let db = Database::new(&cli.db);
    match cli.command {
        Commands::Collect {
            test,
            name,
            notes,
            user,
            port,
            stable_only,
            no_print_diff,
            duration,
        } => {
            let interval = Duration::from_millis(settings.sample_interval_ms);
            let source: Box<dyn SampleSource> = match test {
                Some(TestMode::Random) => Box::new(UniformSource::new(interval)),
                Some(TestMode::Sawtooth) => Box::new(SawtoothSource::new(interval, 0.1)),
                None => balance_source(&settings, port, stable_only)?,
            };
            let options = PersistOptions {
                run: NewRun {
                    name,
                    notes,
                    user: user.unwrap_or_else(current_user),
                },
                print_diff: !no_print_diff,
            };
            collect(&settings, db, source, Some(options), duration)
        }
        Commands::List => {
            export::list_runs(&db, &mut std::io::stdout())?;
            Ok(())
        }
        Commands::Dump { id, output } => {
            if !db.exists() {
                return Err(DaqError::DatabaseMissing(cli.db).into());
            }
            let path = match output {
                Some(path) => path,
                None => export::default_dump_path(&db.run(id)?),
            };
            let written = export::dump_run(&db, id, &path)?;
            println!("Wrote {written} records to {}", path.display());
            Ok(())
        }
        Commands::Replay {
            id,
            replay_rate,
            duration,
        } => {
            if !db.exists() {
                return Err(DaqError::DatabaseMissing(cli.db).into());
            }
            let values = db.record_values(id)?;
            let source = ReplaySource::new(values, Duration::from_secs_f64(replay_rate))?;
            // Replay drives the presentation path only; nothing is persisted.
            collect(&settings, db, Box::new(source), None, duration)
        }
        Commands::Ports => list_ports(),
    }
}

/// Builds the serial balance source, or fails before any worker starts.
fn balance_source(
    settings: &Settings,
    port: Option<String>,
    stable_only: bool,
) -> Result<Box<dyn SampleSource>> {
    let port = port.ok_or(DaqError::PortRequired)?;
    #[cfg(feature = "instrument_serial")]
    {
        let reader = source::SerialLineReader::new(port, settings.serial.clone());
        Ok(Box::new(source::BalanceSource::new(reader, stable_only)))
    }
    #[cfg(not(feature = "instrument_serial"))]
    {
        let _ = (settings, port, stable_only);
        Err(DaqError::SerialFeatureDisabled.into())
    }
}

/// Wires up and runs one pipeline execution.
fn collect(
    settings: &Settings,
    db: Database,
    mut source: Box<dyn SampleSource>,
    persist_options: Option<PersistOptions>,
    duration: Option<f64>,
) -> Result<()> {
    // Fatal precondition: the source must open before anything spawns.
    source.open()?;

    let die = Signal::new();
    let (source_tx, source_rx) = unbounded::<Sample>();
    let window = WindowHandle::new(settings.window_capacity);

    let mut pipeline = Pipeline::new(die.clone(), source_rx);

    // Ctrl-C exits through the same coordinated shutdown as a viewer
    // close, so the run is stamped closed and the process exits 0.
    let interrupt = pipeline.interrupt_signal();
    ctrlc::set_handler(move || interrupt.set())
        .context("failed to install interrupt handler")?;

    pipeline.add_thread("source", source::spawn(source, source_tx, die.clone())?);

    if let Some(options) = persist_options {
        let (tx, rx) = unbounded();
        pipeline.add_thread("persist", persist::spawn(db, options, rx, die.clone())?);
        pipeline.add_consumer(tx);
    }

    let (tx, rx) = unbounded();
    pipeline.add_thread("display", display::spawn(window.clone(), rx, die.clone())?);
    pipeline.add_consumer(tx);

    let mut renderer = HeadlessRenderer::new(window, duration.map(Duration::from_secs_f64));
    pipeline.run(&mut renderer);
    Ok(())
}

#[cfg(feature = "instrument_serial")]
fn list_ports() -> Result<()> {
    let ports = serialport::available_ports().map_err(|e| DaqError::Serial(e.to_string()))?;
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }
    for port in ports {
        println!("{}", port.port_name);
    }
    Ok(())
}

#[cfg(not(feature = "instrument_serial"))]
fn list_ports() -> Result<()> {
    Err(DaqError::SerialFeatureDisabled.into())
}
