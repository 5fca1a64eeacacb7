//! Device registry: at most one live connection per role.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use hardware::scoreboard::TEST_PATTERN;
use hardware::{DeviceLink, LineStream, LinkError, TransportKind};
use tracing::{debug, info, warn};

use crate::error::{StationError, StationResult};
use crate::role::{DeviceAddress, DeviceRole};
use crate::station::Station;
use crate::supervisor::{cancel_pair, CancelHandle, CancelToken};
use crate::wind::{listen, LISTENER_POLL_INTERVAL};

/// Public view of a registered device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    pub role: DeviceRole,
    pub kind: TransportKind,
    pub address: String,
}

/// Upper bound on waiting for a listener to release its stream handle.
const LISTENER_EXIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Cancel side of a wind listener plus a signal that fires once its thread
/// has dropped its stream handle.
pub(crate) struct ListenerHandle {
    cancel: CancelHandle,
    exited: CancelToken,
}

/// A registered connection and the background work tied to it.
pub(crate) struct Device {
    role: DeviceRole,
    kind: TransportKind,
    address: String,
    link: Arc<Mutex<DeviceLink>>,
    /// Second handle on the stream so closing never waits on the link lock
    closer: Option<Box<dyn LineStream>>,
    listener: Option<ListenerHandle>,
}

impl Device {
    fn new(role: DeviceRole, link: DeviceLink) -> Self {
        let closer = link.try_clone_stream().ok();
        Self {
            role,
            kind: link.kind(),
            address: link.address().to_string(),
            link: Arc::new(Mutex::new(link)),
            closer,
            listener: None,
        }
    }

    fn summary(&self) -> DeviceSummary {
        DeviceSummary {
            role: self.role,
            kind: self.kind,
            address: self.address.clone(),
        }
    }

    /// Stop the listener and close the transport.
    ///
    /// Returns once the listener thread has released its handle, so the
    /// port can be reopened straight away.
    pub(crate) fn shutdown(mut self) {
        let listener = self.listener.take().map(|mut listener| {
            listener.cancel.cancel();
            listener.exited
        });
        match self.closer.as_mut() {
            Some(closer) => {
                if let Err(e) = closer.close() {
                    debug!("Error closing {} ({}): {e}", self.role, self.address);
                }
            }
            None => self
                .link
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .close(),
        }
        if let Some(exited) = listener {
            if !exited.wait_timeout(LISTENER_EXIT_TIMEOUT) {
                warn!("{} listener still running after close", self.role);
            }
        }
        debug!("Closed {} on {}", self.role, self.address);
    }
}

#[derive(Default)]
pub(crate) struct DeviceRegistry {
    devices: HashMap<DeviceRole, Device>,
}

impl DeviceRegistry {
    /// Register `device`, returning whatever held the role before.
    fn insert(&mut self, device: Device) -> Option<Device> {
        self.devices.insert(device.role, device)
    }

    pub(crate) fn remove(&mut self, role: DeviceRole) -> Option<Device> {
        self.devices.remove(&role)
    }

    pub(crate) fn link(&self, role: DeviceRole) -> Option<Arc<Mutex<DeviceLink>>> {
        self.devices.get(&role).map(|d| d.link.clone())
    }

    pub(crate) fn contains(&self, role: DeviceRole) -> bool {
        self.devices.contains_key(&role)
    }

    pub(crate) fn summaries(&self) -> Vec<DeviceSummary> {
        let mut all: Vec<DeviceSummary> = self.devices.values().map(Device::summary).collect();
        all.sort_by_key(|d| d.role as u8);
        all
    }

    pub(crate) fn drain(&mut self) -> Vec<Device> {
        self.devices.drain().map(|(_, d)| d).collect()
    }
}

impl Station {
    /// Open a connection for `role`, replacing any existing one.
    ///
    /// Returns a status line such as `Connected to edm at 10.0.0.5:4001`.
    pub fn connect(&self, role: DeviceRole, address: &DeviceAddress) -> StationResult<String> {
        let previous = self.state().registry.remove(role);
        if let Some(previous) = previous {
            info!("Replacing existing {role} connection");
            previous.shutdown();
        }

        let link = match address {
            DeviceAddress::Serial { port } => DeviceLink::open_serial(port),
            DeviceAddress::Network { host, port } => {
                DeviceLink::open_network(host, *port, self.settings().dial_timeout())
            }
        }
        .map_err(|e| StationError::transport(format!("connect {role}"), e))?;

        self.attach(role, link)
    }

    /// Register an already-open link for `role`, replacing any existing one.
    pub fn attach(&self, role: DeviceRole, mut link: DeviceLink) -> StationResult<String> {
        link.set_read_deadline(self.settings().network_read_timeout());
        let preposition = match link.kind() {
            TransportKind::Serial => "on",
            TransportKind::Network => "at",
        };
        let status = format!("Connected to {role} {preposition} {}", link.address());

        let mut device = Device::new(role, link);
        if role == DeviceRole::Wind {
            device.listener = Some(self.start_wind_listener(&device)?);
        }

        let previous = self.state().registry.insert(device);
        if let Some(previous) = previous {
            previous.shutdown();
        }

        if role == DeviceRole::Scoreboard {
            self.forward_to_scoreboard(TEST_PATTERN.to_string());
        }
        info!("{status}");
        Ok(status)
    }

    /// Close the connection for `role`.
    pub fn disconnect(&self, role: DeviceRole) -> StationResult<String> {
        let device = self
            .state()
            .registry
            .remove(role)
            .ok_or(StationError::NotRegistered(role))?;
        device.shutdown();
        let status = format!("Disconnected {role}");
        info!("{status}");
        Ok(status)
    }

    pub fn is_connected(&self, role: DeviceRole) -> bool {
        self.state().registry.contains(role)
    }

    pub fn connected_devices(&self) -> Vec<DeviceSummary> {
        self.state().registry.summaries()
    }

    fn start_wind_listener(&self, device: &Device) -> StationResult<ListenerHandle> {
        let role = device.role;
        let mut stream = device
            .link
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .try_clone_stream()
            .map_err(|e| StationError::transport(format!("start {role} listener"), e))?;
        stream
            .set_read_timeout(Some(LISTENER_POLL_INTERVAL))
            .map_err(|e| StationError::transport(format!("start {role} listener"), LinkError::Io(e)))?;

        let (cancel, token) = cancel_pair();
        let (exit_signal, exited) = cancel_pair();
        let weak = Arc::downgrade(&self.inner);
        self.spawn(&format!("{role}-listener"), move || {
            listen(role, stream, token, |speed| {
                if let Some(inner) = weak.upgrade() {
                    inner.lock_state().wind.record(speed);
                }
            });
            drop(exit_signal);
        })?;
        Ok(ListenerHandle { cancel, exited })
    }
}
