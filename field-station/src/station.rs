//! The station: device registry, calibration, measurement and result
//! delivery behind one handle.
//!
//! All mutable state sits behind a single mutex. Operations copy what they
//! need out of it and release it before any device or network I/O, so a
//! slow instrument never blocks unrelated calls.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::{ConfigStorage, ResultCache};
use tracing::info;

use crate::calibration::CalibrationRecord;
use crate::delivery::{HttpResultSink, ResultSink};
use crate::error::{StationError, StationResult};
use crate::instrument::{AveragedReading, Aim, DeviceInstrument, Instrument};
use crate::registry::DeviceRegistry;
use crate::role::DeviceRole;
use crate::settings::StationSettings;
use crate::simulated::SimulatedInstrument;
use crate::supervisor::TaskSupervisor;
use crate::throw_log::{ThrowLog, ThrowRecord};
use crate::wind::WindAverager;

pub(crate) struct StationState {
    pub(crate) registry: DeviceRegistry,
    pub(crate) calibrations: HashMap<DeviceRole, CalibrationRecord>,
    pub(crate) simulations: HashMap<DeviceRole, Arc<Mutex<SimulatedInstrument>>>,
    pub(crate) wind: WindAverager,
    pub(crate) cache: ResultCache,
    pub(crate) throws: ThrowLog,
    pub(crate) demo: bool,
    pub(crate) server_address: Option<String>,
}

pub(crate) struct Inner {
    state: Mutex<StationState>,
    pub(crate) settings: StationSettings,
    pub(crate) sink: Arc<dyn ResultSink>,
    pub(crate) supervisor: TaskSupervisor,
    /// Serializes cache retry passes
    pub(crate) retry_guard: Mutex<()>,
}

impl Inner {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, StationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Cheaply cloneable handle to a running station.
#[derive(Clone)]
pub struct Station {
    pub(crate) inner: Arc<Inner>,
}

impl Station {
    /// Station with in-memory storage that posts results over HTTP.
    pub fn new(settings: StationSettings) -> Self {
        Self::with_parts(
            settings,
            ResultCache::in_memory(),
            ThrowLog::in_memory(),
            Arc::new(HttpResultSink),
        )
    }

    /// Station whose result cache and throw log live under `storage`.
    pub fn open(storage: &ConfigStorage, settings: StationSettings) -> Self {
        Self::with_parts(
            settings,
            ResultCache::load(&storage.result_cache_path()),
            ThrowLog::open(&storage.throw_log_path()),
            Arc::new(HttpResultSink),
        )
    }

    pub fn with_parts(
        settings: StationSettings,
        cache: ResultCache,
        throws: ThrowLog,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        let wind = WindAverager::new(settings.wind_capacity.max(1), settings.wind_window());
        let state = StationState {
            registry: DeviceRegistry::default(),
            calibrations: HashMap::new(),
            simulations: HashMap::new(),
            wind,
            cache,
            throws,
            demo: false,
            server_address: None,
        };
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                settings,
                sink,
                supervisor: TaskSupervisor::new(),
                retry_guard: Mutex::new(()),
            }),
        }
    }

    /// Start background work: the cached result retry loop.
    pub fn start(&self) -> StationResult<()> {
        let pending = self.state().cache.len();
        if pending > 0 {
            info!("{pending} cached result(s) waiting for delivery");
        }
        self.start_retry_loop()
    }

    /// Close every device and join all background tasks.
    pub fn shutdown(&self) {
        let devices = self.state().registry.drain();
        for device in devices {
            device.shutdown();
        }
        self.inner.supervisor.shutdown();
        info!("Station shut down");
    }

    pub fn settings(&self) -> &StationSettings {
        &self.inner.settings
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, StationState> {
        self.inner.lock_state()
    }

    pub(crate) fn spawn<F>(&self, name: &str, task: F) -> StationResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.inner
            .supervisor
            .spawn(name, task)
            .map_err(|source| StationError::Spawn {
                task: name.to_string(),
                source,
            })
    }

    /// Background threads still running.
    pub fn background_tasks(&self) -> usize {
        self.inner.supervisor.active()
    }

    /// In demo mode every role is served by a simulated instrument.
    pub fn set_demo_mode(&self, enabled: bool) {
        self.state().demo = enabled;
        info!("Demo mode {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_demo_mode(&self) -> bool {
        self.state().demo
    }

    /// Replace the simulated instrument for `role` with a seeded one.
    pub fn seed_simulation(&self, role: DeviceRole, seed: u64) {
        self.state()
            .simulations
            .insert(role, Arc::new(Mutex::new(SimulatedInstrument::seeded(seed))));
    }

    /// Take one paired, consistency-checked reading for `role`.
    pub fn acquire_reading(&self, role: DeviceRole, aim: Aim) -> StationResult<AveragedReading> {
        let mut instrument = self.instrument_for(role)?;
        instrument.acquire(aim)
    }

    fn instrument_for(&self, role: DeviceRole) -> StationResult<Box<dyn Instrument>> {
        let mut state = self.state();
        if state.demo {
            let simulation = state
                .simulations
                .entry(role)
                .or_insert_with(|| Arc::new(Mutex::new(SimulatedInstrument::new())))
                .clone();
            return Ok(Box::new(simulation));
        }
        let link = state
            .registry
            .link(role)
            .ok_or(StationError::NotConnected(role))?;
        Ok(Box::new(DeviceInstrument::new(role, link, &self.inner.settings)))
    }

    /// Throws measured so far, oldest first.
    pub fn throw_log(&self) -> Vec<ThrowRecord> {
        self.state().throws.records().to_vec()
    }

    /// Record a wind sample as if it had come from a gauge.
    pub fn record_wind(&self, speed: f64) {
        self.state().wind.record(speed);
    }
}
