//! Operator tool for a field event station.
//!
//! Covers the bench and competition-day tasks that don't need a UI:
//! listing serial ports, browsing events on the results server, running a
//! calibrate-and-measure session, sampling wind, and flushing the cache of
//! undelivered results.

use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use field_station::{
    CalibrationState, CircleType, DeviceAddress, DeviceRole, Station, StationSettings,
};
use hardware::list_serial_ports;
use shared::{ConfigStorage, ResultPayload, ResultsClient};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "field_tool")]
#[command(about = "Field event measurement station")]
struct Cli {
    /// Storage directory (defaults to the user cache directory)
    #[arg(long, global = true)]
    storage: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial ports
    Ports,

    /// List events on the results server, or show one event
    Events {
        /// Results server as host:port
        #[arg(long)]
        server: String,

        /// Event to show in full
        #[arg(long)]
        event: Option<String>,
    },

    /// Calibrate against a circle and measure throws
    Session(SessionArgs),

    /// Sample a wind gauge, printing the trailing average every second
    Wind {
        #[command(flatten)]
        gauge: Endpoint,

        /// Seconds to listen
        #[arg(long, default_value = "5")]
        seconds: u64,
    },

    /// Try to deliver cached results now
    FlushCache {
        /// Results server host
        #[arg(long)]
        host: String,

        /// Results server port
        #[arg(long)]
        port: u16,
    },
}

/// Where a device is attached.
#[derive(Args, Debug)]
struct Endpoint {
    /// Serial port path (e.g., /dev/ttyUSB0)
    #[arg(long, conflicts_with = "host")]
    serial: Option<String>,

    /// Host of a serial-to-Ethernet bridge
    #[arg(long, requires = "port")]
    host: Option<String>,

    /// TCP port of the bridge
    #[arg(long)]
    port: Option<u16>,
}

impl Endpoint {
    fn address(&self) -> Option<DeviceAddress> {
        match (&self.serial, &self.host, self.port) {
            (Some(serial), _, _) => Some(DeviceAddress::serial(serial)),
            (None, Some(host), Some(port)) => Some(DeviceAddress::network(host, port)),
            _ => None,
        }
    }
}

#[derive(Args, Debug)]
struct SessionArgs {
    #[command(flatten)]
    edm: Endpoint,

    /// Scoreboard serial port
    #[arg(long)]
    scoreboard: Option<String>,

    /// Circle type (SHOT, DISCUS, HAMMER, JAVELIN_ARC)
    #[arg(long, default_value = "SHOT")]
    circle: CircleType,

    /// Use the simulated instrument
    #[arg(long)]
    demo: bool,

    /// Seed for the simulated instrument
    #[arg(long, requires = "demo")]
    seed: Option<u64>,

    /// Number of throws to measure
    #[arg(short, long, default_value = "3")]
    throws: u32,

    /// Pause between throws in seconds
    #[arg(long, default_value = "0")]
    pause_secs: u64,

    /// Post the series to this results server (host:port)
    #[arg(long, requires_all = ["event", "bib"])]
    server: Option<String>,

    /// Event id for the posted series
    #[arg(long)]
    event: Option<String>,

    /// Athlete bib for the posted series
    #[arg(long)]
    bib: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let storage = match &cli.storage {
        Some(path) => ConfigStorage::with_path(path.clone()),
        None => ConfigStorage::new().context("Failed to locate storage directory")?,
    };

    match cli.command {
        Command::Ports => {
            for port in list_serial_ports().context("Failed to enumerate serial ports")? {
                println!("{port}");
            }
        }
        Command::Events { server, event } => show_events(&server, event.as_deref())?,
        Command::Session(args) => run_session(&storage, args)?,
        Command::Wind { gauge, seconds } => sample_wind(&storage, &gauge, seconds)?,
        Command::FlushCache { host, port } => {
            let station = Station::open(&storage, StationSettings::load(&storage));
            station.set_server_address(&host, port);
            let report = station.retry_cached_now();
            println!(
                "Attempted {}, delivered {}, {} still cached",
                report.attempted, report.delivered, report.remaining
            );
        }
    }
    Ok(())
}

fn show_events(server: &str, event: Option<&str>) -> Result<()> {
    let client = ResultsClient::new(server);
    match event {
        Some(id) => {
            let event = client
                .fetch_event(id)
                .with_context(|| format!("Failed to fetch event {id}"))?;
            println!("{} ({}) {}", event.name, event.event_type, event.id);
            if let Some(rules) = &event.rules {
                println!(
                    "  {} attempts, cut {} (top {})",
                    rules.attempts,
                    if rules.cut_enabled { "on" } else { "off" },
                    rules.cut_qualifiers
                );
            }
            for athlete in &event.athletes {
                println!(
                    "  {:>3}  #{:<5} {} ({})",
                    athlete.order, athlete.bib, athlete.name, athlete.club
                );
            }
        }
        None => {
            for event in client.fetch_events().context("Failed to fetch events")? {
                println!("{:<12} {:<10} {}", event.id, event.event_type, event.name);
            }
        }
    }
    Ok(())
}

fn run_session(storage: &ConfigStorage, args: SessionArgs) -> Result<()> {
    let station = Station::open(storage, StationSettings::load(storage));
    station.start()?;

    let role = DeviceRole::Edm;
    if args.demo {
        station.set_demo_mode(true);
        if let Some(seed) = args.seed {
            station.seed_simulation(role, seed);
        }
    } else {
        let Some(address) = args.edm.address() else {
            bail!("Specify --demo, --serial or --host/--port for the EDM");
        };
        println!("{}", station.connect(role, &address)?);
    }
    if let Some(port) = &args.scoreboard {
        println!(
            "{}",
            station.connect(DeviceRole::Scoreboard, &DeviceAddress::serial(port))?
        );
    }

    station.select_circle(role, args.circle);
    let record = station.set_centre(role).context("Setting centre failed")?;
    println!(
        "Centre set, instrument at ({:.3}, {:.3}) m",
        record.station.x, record.station.y
    );

    let record = station.verify_edge(role).context("Edge verification failed")?;
    if let Some(edge) = &record.edge_verification {
        println!(
            "Edge radius {:.4} m ({:+.1} mm, limit {:.1} mm) {}",
            edge.measured_radius_m,
            edge.difference_mm,
            edge.tolerance_mm,
            if edge.in_tolerance { "OK" } else { "OUT OF TOLERANCE" }
        );
    }
    if station.calibration_state(role) != CalibrationState::EdgeVerified {
        warn!("Edge not verified; throws may be refused");
    }

    let mut payload = args
        .event
        .as_deref()
        .zip(args.bib.as_deref())
        .map(|(event, bib)| ResultPayload::new(event, bib));

    for attempt in 1..=args.throws {
        if attempt > 1 && args.pause_secs > 0 {
            thread::sleep(Duration::from_secs(args.pause_secs));
        }
        match station.measure_throw(role) {
            Ok(mark) => {
                println!("Attempt {attempt}: {mark}");
                payload = payload.map(|p| {
                    p.with_attempt(mark.trim_end_matches(" m"), "m", None, true)
                });
            }
            Err(e) => {
                warn!("Attempt {attempt} failed: {e}");
                payload = payload.map(|p| p.with_attempt("X", "m", None, false));
            }
        }
    }

    if let (Some(server), Some(payload)) = (&args.server, &payload) {
        match station.post_result(server, payload) {
            Ok(()) => println!("Series posted"),
            Err(e) => println!("{e}"),
        }
    }

    station.shutdown();
    Ok(())
}

fn sample_wind(storage: &ConfigStorage, gauge: &Endpoint, seconds: u64) -> Result<()> {
    let Some(address) = gauge.address() else {
        bail!("Specify --serial or --host/--port for the wind gauge");
    };
    let station = Station::open(storage, StationSettings::load(storage));
    println!("{}", station.connect(DeviceRole::Wind, &address)?);

    info!("Listening for {seconds}s");
    for elapsed in 1..=seconds {
        thread::sleep(Duration::from_secs(1));
        match station.measure_wind(DeviceRole::Wind) {
            Ok(wind) => println!("{elapsed:>4}s  {wind}"),
            Err(e) => println!("{elapsed:>4}s  {e}"),
        }
    }
    station.shutdown();
    Ok(())
}
