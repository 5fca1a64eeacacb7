//! Logical device roles and how to reach them.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Role a device plays on the field. At most one live device per role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum DeviceRole {
    /// Total station measuring throws
    Edm,
    /// Wind gauge for jumps and sprints
    Wind,
    /// Results display
    Scoreboard,
}

/// Where a device is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceAddress {
    Serial { port: String },
    Network { host: String, port: u16 },
}

impl DeviceAddress {
    pub fn serial(port: &str) -> Self {
        DeviceAddress::Serial {
            port: port.to_string(),
        }
    }

    pub fn network(host: &str, port: u16) -> Self {
        DeviceAddress::Network {
            host: host.to_string(),
            port,
        }
    }
}
