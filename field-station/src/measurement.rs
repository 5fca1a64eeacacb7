//! Throw and wind measurement, and scoreboard output.

use chrono::Utc;
use hardware::scoreboard;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::{StationError, StationResult};
use crate::instrument::Aim;
use crate::role::DeviceRole;
use crate::settings::EdgePolicy;
use crate::station::Station;
use crate::throw_log::ThrowRecord;
use crate::wind::format_wind;

/// Demo wind readings are drawn from this range, m/s
const DEMO_WIND_RANGE: (f64, f64) = (-2.0, 2.0);

/// Display form of a throw distance, e.g. `12.34 m`.
pub fn format_mark(distance_m: f64) -> String {
    format!("{distance_m:.2} m")
}

impl Station {
    /// Measure a landing mark and return it formatted, e.g. `12.34 m`.
    ///
    /// The distance is also sent to the scoreboard and appended to the
    /// throw log.
    pub fn measure_throw(&self, role: DeviceRole) -> StationResult<String> {
        let circle = {
            let state = self.state();
            let require_edge =
                !state.demo && self.settings().edge_policy == EdgePolicy::Required;
            let record = state
                .calibrations
                .get(&role)
                .ok_or(StationError::CentreNotSet(role))?;
            record.ready_for_throw(require_edge)?;
            record.circle_type
        };

        let reading = self.acquire_reading(role, Aim::Landing { circle })?;

        let (distance_m, record) = {
            let mut state = self.state();
            let calibration = state
                .calibrations
                .get(&role)
                .ok_or(StationError::CentreNotSet(role))?;
            let landing = calibration.sight(&reading)?;
            let distance_m = landing.norm() - calibration.target_radius_m;
            let record = ThrowRecord {
                device_role: role,
                circle_type: calibration.circle_type,
                landing: landing.into(),
                distance_m,
                reading,
                timestamp: Utc::now(),
            };
            if let Err(e) = state.throws.append(record.clone()) {
                warn!("Failed to write throw log: {e}");
            }
            (distance_m, record)
        };

        let mark = format_mark(distance_m);
        info!(
            "{role}: {} throw {mark} landing at ({:.3}, {:.3})",
            record.circle_type, record.landing.x, record.landing.y
        );
        self.forward_to_scoreboard(format!("{distance_m:.2}"));
        Ok(mark)
    }

    /// Average recent wind and return it formatted, e.g. `+1.2 m/s`.
    pub fn measure_wind(&self, role: DeviceRole) -> StationResult<String> {
        let speed = {
            let state = self.state();
            if state.demo {
                rand::rng().random_range(DEMO_WIND_RANGE.0..DEMO_WIND_RANGE.1)
            } else {
                if !state.registry.contains(role) {
                    return Err(StationError::NotConnected(role));
                }
                state.wind.average()?
            }
        };
        let result = format_wind(speed);
        info!("{role}: wind {result}");
        self.forward_to_scoreboard(result.clone());
        Ok(result)
    }

    /// Write `value` to the scoreboard and wait for the write to finish.
    pub fn send_to_scoreboard(&self, value: &str) -> StationResult<()> {
        let link = {
            let state = self.state();
            if state.demo {
                info!("Demo: would send {value:?} to scoreboard");
                return Ok(());
            }
            state
                .registry
                .link(DeviceRole::Scoreboard)
                .ok_or(StationError::NotConnected(DeviceRole::Scoreboard))?
        };
        let mut link = link.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        link.send(&scoreboard::frame(value))
            .map_err(|e| StationError::transport("write to scoreboard", e))
    }

    /// Send to the scoreboard in the background. Failures are logged.
    pub(crate) fn forward_to_scoreboard(&self, value: String) {
        let station = self.clone();
        let spawned = self.spawn("scoreboard-write", move || {
            match station.send_to_scoreboard(&value) {
                Ok(()) => debug!("Scoreboard shows {value:?}"),
                Err(StationError::NotConnected(_)) => {
                    debug!("No scoreboard for {value:?}")
                }
                Err(e) => warn!("Scoreboard update failed: {e}"),
            }
        });
        if let Err(e) = spawned {
            warn!("{e}");
        }
    }
}
