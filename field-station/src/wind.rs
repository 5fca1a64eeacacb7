//! Rolling wind readings.
//!
//! A listener thread per wind connection parses `$WI,<signed speed>,...`
//! lines into a [`WindAverager`]; measurement averages whatever arrived in
//! the trailing window.

use std::io::{self, BufRead, BufReader, Read};
use std::time::{Duration, Instant};

use hardware::parse_wind_line;
use shared::TimedRing;
use tracing::{debug, info, warn};

use crate::error::{StationError, StationResult};
use crate::role::DeviceRole;
use crate::supervisor::CancelToken;

/// How often a listener wakes to check for cancellation.
pub const LISTENER_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Time-stamped wind samples with a bounded history.
#[derive(Debug, Clone)]
pub struct WindAverager {
    samples: TimedRing<f64>,
    window: Duration,
}

impl WindAverager {
    pub fn new(capacity: usize, window: Duration) -> Self {
        Self {
            samples: TimedRing::new(capacity),
            window,
        }
    }

    pub fn record(&mut self, speed: f64) {
        self.record_at(Instant::now(), speed);
    }

    pub fn record_at(&mut self, at: Instant, speed: f64) {
        self.samples.push_at(at, speed);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn average(&self) -> StationResult<f64> {
        self.average_at(Instant::now())
    }

    /// Mean of samples strictly newer than `now - window`.
    pub fn average_at(&self, now: Instant) -> StationResult<f64> {
        let (sum, count) = match now.checked_sub(self.window) {
            Some(cutoff) => self
                .samples
                .since(cutoff)
                .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1)),
            None => self
                .samples
                .iter()
                .fold((0.0, 0usize), |(s, n), (_, v)| (s + v, n + 1)),
        };
        if count == 0 {
            return Err(StationError::NoWindSamples {
                window_secs: self.window.as_secs_f64(),
            });
        }
        Ok(sum / count as f64)
    }
}

/// Display form of a wind reading, e.g. `+1.2 m/s`.
pub fn format_wind(speed: f64) -> String {
    format!("{speed:+.1} m/s")
}

/// Read wind lines from `stream` until cancelled or the stream ends.
///
/// `stream` should have a short read timeout so cancellation is noticed
/// between lines. Every parsed speed is handed to `on_sample`.
pub fn listen<R, F>(role: DeviceRole, stream: R, cancel: CancelToken, mut on_sample: F)
where
    R: Read,
    F: FnMut(f64),
{
    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    info!("Wind listener started for {role}");
    loop {
        if cancel.is_cancelled() {
            break;
        }
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => {
                info!("Wind stream for {role} closed");
                break;
            }
            Ok(_) => {
                if cancel.is_cancelled() {
                    break;
                }
                let text = String::from_utf8_lossy(&line);
                match parse_wind_line(&text) {
                    Some(speed) => on_sample(speed),
                    None => debug!("Ignoring wind line {:?}", text.trim_end()),
                }
                line.clear();
            }
            // Partial line stays buffered until the rest arrives
            Err(e)
                if e.kind() == io::ErrorKind::TimedOut
                    || e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => {
                if !cancel.is_cancelled() {
                    warn!("Wind listener for {role} stopped: {e}");
                }
                break;
            }
        }
    }
    info!("Wind listener stopped for {role}");
}
