//! Error types for station operations.

use hardware::{EdmError, LinkError};
use thiserror::Error;

use crate::role::DeviceRole;

/// Broad class of a [`StationError`], for operator-facing handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect, read or write failed
    Transport,
    /// Device answered with something undecodable
    Protocol,
    /// Paired readings disagreed
    Reliability,
    /// Operation invoked before a required prior step
    Precondition,
}

/// Errors from device, calibration and measurement operations.
///
/// Every failure is scoped to the operation that produced it; stored
/// calibration and device state are left as they were.
#[derive(Error, Debug)]
pub enum StationError {
    /// Transport failure while talking to a device.
    #[error("{context} failed: {source}")]
    Transport {
        context: String,
        #[source]
        source: LinkError,
    },

    /// Device response could not be decoded.
    #[error("{context}: {source}")]
    Protocol {
        context: String,
        #[source]
        source: EdmError,
    },

    /// The two readings of a pair disagreed beyond tolerance.
    #[error(
        "Readings inconsistent. R1(SD): {first_mm:.0}mm, R2(SD): {second_mm:.0}mm (tolerance {tolerance_mm:.0}mm)"
    )]
    Inconsistent {
        first_mm: f64,
        second_mm: f64,
        tolerance_mm: f64,
    },

    /// No live connection for the role.
    #[error("{0} device not connected")]
    NotConnected(DeviceRole),

    /// Disconnect requested for a role that was never registered.
    #[error("{0} not connected")]
    NotRegistered(DeviceRole),

    #[error("No circle type selected for {0}; select a circle first")]
    NoCircleSelected(DeviceRole),

    #[error("Circle centre not set for {0}; set the centre first")]
    CentreNotSet(DeviceRole),

    #[error("Circle edge not verified for {0}; verify the edge first")]
    EdgeNotVerified(DeviceRole),

    #[error(
        "Edge verification for {role} out of tolerance ({difference_mm:+.1}mm, limit {tolerance_mm:.1}mm); verify the edge again"
    )]
    EdgeOutOfTolerance {
        role: DeviceRole,
        difference_mm: f64,
        tolerance_mm: f64,
    },

    #[error("No wind readings in the last {window_secs:.0} seconds")]
    NoWindSamples { window_secs: f64 },

    /// Background task could not be started.
    #[error("Failed to start {task}: {source}")]
    Spawn {
        task: String,
        #[source]
        source: std::io::Error,
    },
}

impl StationError {
    pub fn transport(context: impl Into<String>, source: LinkError) -> Self {
        StationError::Transport {
            context: context.into(),
            source,
        }
    }

    pub fn protocol(context: impl Into<String>, source: EdmError) -> Self {
        StationError::Protocol {
            context: context.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StationError::Transport { .. } | StationError::Spawn { .. } => ErrorKind::Transport,
            StationError::Protocol { .. } => ErrorKind::Protocol,
            StationError::Inconsistent { .. } => ErrorKind::Reliability,
            StationError::NotConnected(_)
            | StationError::NotRegistered(_)
            | StationError::NoCircleSelected(_)
            | StationError::CentreNotSet(_)
            | StationError::EdgeNotVerified(_)
            | StationError::EdgeOutOfTolerance { .. }
            | StationError::NoWindSamples { .. } => ErrorKind::Precondition,
        }
    }
}

/// Result type for station operations.
pub type StationResult<T> = Result<T, StationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inconsistent_message_reports_both_values() {
        let err = StationError::Inconsistent {
            first_mm: 4297.0,
            second_mm: 4310.0,
            tolerance_mm: 3.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("4297mm"));
        assert!(msg.contains("4310mm"));
        assert_eq!(err.kind(), ErrorKind::Reliability);
    }

    #[test]
    fn test_precondition_names_missing_step() {
        let err = StationError::CentreNotSet(DeviceRole::Edm);
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert!(err.to_string().contains("set the centre first"));
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            StationError::transport("first read", LinkError::Timeout).kind(),
            ErrorKind::Transport
        );
        assert_eq!(
            StationError::protocol("second read", EdmError::InvalidNumber("x".into())).kind(),
            ErrorKind::Protocol
        );
    }
}
