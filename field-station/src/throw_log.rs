//! History of measured throws, appended to a JSON-lines file.

use std::fs::OpenOptions;
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::circle::CircleType;
use crate::geometry::PlanePoint;
use crate::instrument::AveragedReading;
use crate::role::DeviceRole;

/// One measured throw.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThrowRecord {
    pub device_role: DeviceRole,
    pub circle_type: CircleType,
    /// Landing point in the circle frame
    pub landing: PlanePoint,
    pub distance_m: f64,
    pub reading: AveragedReading,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ThrowLog {
    path: Option<PathBuf>,
    records: Vec<ThrowRecord>,
}

impl ThrowLog {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the log at `path`, reading back any earlier records. Lines
    /// that fail to parse are skipped.
    pub fn open(path: &Path) -> Self {
        let mut records = Vec::new();
        match std::fs::File::open(path) {
            Ok(file) => {
                for (n, line) in BufReader::new(file).lines().enumerate() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            warn!("Stopped reading throw log {}: {e}", path.display());
                            break;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str(&line) {
                        Ok(record) => records.push(record),
                        Err(e) => warn!("Skipping throw log line {}: {e}", n + 1),
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("Error reading throw log {}: {e}", path.display()),
        }
        debug!("Loaded {} throw(s) from {}", records.len(), path.display());
        Self {
            path: Some(path.to_path_buf()),
            records,
        }
    }

    /// Record a throw. The record is kept in memory even if the file write
    /// fails.
    pub fn append(&mut self, record: ThrowRecord) -> io::Result<()> {
        let line = serde_json::to_string(&record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.records.push(record);
        if let Some(path) = &self.path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    pub fn records(&self) -> &[ThrowRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
