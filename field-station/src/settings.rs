//! Station tuning, persisted as JSON next to the result cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared::ConfigStorage;
use tracing::{info, warn};

/// Whether a throw needs a verified, in-tolerance edge first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgePolicy {
    #[default]
    Required,
    Optional,
}

/// Tunable timings and tolerances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StationSettings {
    /// Pause between the two readings of a pair
    pub settle_delay_ms: u64,
    /// Maximum slope distance disagreement within a pair
    pub slope_tolerance_mm: f64,
    /// Per-request read deadline on network EDMs
    pub network_read_timeout_ms: u64,
    /// TCP connect timeout
    pub dial_timeout_ms: u64,
    /// Wind averaging window
    pub wind_window_ms: u64,
    /// Wind samples kept
    pub wind_capacity: usize,
    /// Interval between cached result delivery attempts
    pub retry_interval_secs: u64,
    pub edge_policy: EdgePolicy,
}

impl Default for StationSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: 250,
            slope_tolerance_mm: 3.0,
            network_read_timeout_ms: 10_000,
            dial_timeout_ms: 5_000,
            wind_window_ms: 5_000,
            wind_capacity: 120,
            retry_interval_secs: 120,
            edge_policy: EdgePolicy::Required,
        }
    }
}

impl StationSettings {
    /// Load from storage, falling back to defaults when the file is
    /// missing or unreadable.
    pub fn load(storage: &ConfigStorage) -> Self {
        match storage.load_json::<StationSettings>(ConfigStorage::settings_file_name()) {
            Some(Ok(settings)) => {
                info!("Loaded station settings from {:?}", storage.settings_path());
                settings.sanitized()
            }
            Some(Err(e)) => {
                warn!("Ignoring station settings: {e}");
                Self::default()
            }
            None => Self::default(),
        }
    }

    pub fn save(&self, storage: &ConfigStorage) -> std::io::Result<()> {
        storage.save_json(ConfigStorage::settings_file_name(), self).map(|_| ())
    }

    fn sanitized(mut self) -> Self {
        if self.wind_capacity == 0 {
            warn!("wind_capacity must be > 0, using default");
            self.wind_capacity = Self::default().wind_capacity;
        }
        if self.retry_interval_secs == 0 {
            warn!("retry_interval_secs must be > 0, using default");
            self.retry_interval_secs = Self::default().retry_interval_secs;
        }
        if self.dial_timeout_ms == 0 {
            warn!("dial_timeout_ms must be > 0, using default");
            self.dial_timeout_ms = Self::default().dial_timeout_ms;
        }
        if self.network_read_timeout_ms == 0 {
            warn!("network_read_timeout_ms must be > 0, using default");
            self.network_read_timeout_ms = Self::default().network_read_timeout_ms;
        }
        self
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn network_read_timeout(&self) -> Duration {
        Duration::from_millis(self.network_read_timeout_ms)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn wind_window(&self) -> Duration {
        Duration::from_millis(self.wind_window_ms)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}
