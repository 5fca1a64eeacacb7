//! Bench probe for an EDM instrument.
//!
//! Opens a serial port or TCP bridge, triggers a number of reads and prints
//! the decoded readings. Useful for checking cabling and angle encoding
//! before a competition.

use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use hardware::edm::{parse_edm_line, READ_COMMAND};
use hardware::link::{list_serial_ports, DeviceLink, DEFAULT_DIAL_TIMEOUT};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "edm_probe")]
#[command(about = "Trigger and decode EDM readings")]
struct Args {
    /// Serial port path (e.g., /dev/ttyUSB0)
    #[arg(long, conflicts_with = "host")]
    serial: Option<String>,

    /// Host of a serial-to-Ethernet bridge
    #[arg(long, requires = "port")]
    host: Option<String>,

    /// TCP port of the bridge
    #[arg(long)]
    port: Option<u16>,

    /// Number of reads to trigger
    #[arg(short, long, default_value = "1")]
    count: u32,

    /// Pause between reads in milliseconds
    #[arg(long, default_value = "250")]
    interval_ms: u64,

    /// List serial ports and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.list {
        for port in list_serial_ports().context("Failed to enumerate serial ports")? {
            println!("{port}");
        }
        return Ok(());
    }

    let mut link = match (&args.serial, &args.host, args.port) {
        (Some(serial), _, _) => DeviceLink::open_serial(serial)?,
        (None, Some(host), Some(port)) => DeviceLink::open_network(host, port, DEFAULT_DIAL_TIMEOUT)?,
        _ => bail!("Specify either --serial or --host/--port"),
    };
    info!("Connected to {} ({})", link.address(), link.kind());

    for i in 0..args.count {
        if i > 0 {
            thread::sleep(Duration::from_millis(args.interval_ms));
        }

        let line = link
            .query_line(&READ_COMMAND)
            .with_context(|| format!("Read {} failed", i + 1))?;

        match parse_edm_line(&line) {
            Ok(reading) => info!(
                "#{}: SD={:.0} mm  V={:.4}°  H={:.4}°",
                i + 1,
                reading.slope_distance_mm,
                reading.vertical_angle_deg,
                reading.horizontal_angle_deg
            ),
            Err(e) => warn!("#{}: {e} (raw {:?})", i + 1, line.trim_end()),
        }
    }

    link.close();
    Ok(())
}
