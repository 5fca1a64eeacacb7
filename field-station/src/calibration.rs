//! Per-role circle calibration.
//!
//! A role moves through select circle, set centre and verify edge. Setting
//! the centre fixes the instrument position in the circle frame; every
//! later reading is turned into a circle-frame point from there.

use chrono::{DateTime, Utc};
use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::circle::CircleType;
use crate::error::{StationError, StationResult};
use crate::geometry::{sighted_point, station_from_centre_sighting, PlanePoint};
use crate::instrument::{AveragedReading, Aim};
use crate::role::DeviceRole;
use crate::station::Station;

/// Differences within this many millimetres of the limit still pass.
const TOLERANCE_EPSILON_MM: f64 = 1e-6;

/// Where a role is in the calibration sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationState {
    Uncalibrated,
    CircleSelected,
    CentreSet,
    EdgeVerified,
}

/// Outcome of measuring a point on the circle edge.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeVerification {
    pub measured_radius_m: f64,
    /// Measured minus official radius
    pub difference_mm: f64,
    pub tolerance_mm: f64,
    pub in_tolerance: bool,
}

impl EdgeVerification {
    pub fn evaluate(measured_radius_m: f64, circle: CircleType) -> Self {
        let difference_mm = (measured_radius_m - circle.radius_m()) * 1000.0;
        let tolerance_mm = circle.edge_tolerance_mm();
        Self {
            measured_radius_m,
            difference_mm,
            tolerance_mm,
            in_tolerance: difference_mm.abs() <= tolerance_mm + TOLERANCE_EPSILON_MM,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationRecord {
    pub device_role: DeviceRole,
    pub circle_type: CircleType,
    pub target_radius_m: f64,
    /// Instrument position in the circle frame, valid once the centre is set
    pub station: PlanePoint,
    pub centre_set: bool,
    pub edge_verification: Option<EdgeVerification>,
    pub timestamp: DateTime<Utc>,
}

impl CalibrationRecord {
    pub fn new(device_role: DeviceRole, circle_type: CircleType) -> Self {
        Self {
            device_role,
            circle_type,
            target_radius_m: circle_type.radius_m(),
            station: PlanePoint::default(),
            centre_set: false,
            edge_verification: None,
            timestamp: Utc::now(),
        }
    }

    pub fn state(&self) -> CalibrationState {
        match (self.centre_set, &self.edge_verification) {
            (false, _) => CalibrationState::CircleSelected,
            (true, Some(edge)) if edge.in_tolerance => CalibrationState::EdgeVerified,
            (true, _) => CalibrationState::CentreSet,
        }
    }

    /// Switch circle type. Centre and edge must be redone; the timestamp
    /// is kept.
    pub fn select_circle(&mut self, circle_type: CircleType) {
        self.circle_type = circle_type;
        self.target_radius_m = circle_type.radius_m();
        self.station = PlanePoint::default();
        self.centre_set = false;
        self.edge_verification = None;
    }

    /// Fix the instrument position from a sighting of the centre.
    pub fn set_centre(&mut self, reading: &AveragedReading) {
        self.station = station_from_centre_sighting(reading).into();
        self.centre_set = true;
        self.edge_verification = None;
        self.timestamp = Utc::now();
    }

    /// Evaluate a sighting of the circle edge and store the result.
    pub fn verify_edge(&mut self, reading: &AveragedReading) -> StationResult<EdgeVerification> {
        let radius = self.sight(reading)?.norm();
        let verification = EdgeVerification::evaluate(radius, self.circle_type);
        self.edge_verification = Some(verification);
        self.timestamp = Utc::now();
        Ok(verification)
    }

    /// Circle-frame point a reading sights.
    pub fn sight(&self, reading: &AveragedReading) -> StationResult<Vector2<f64>> {
        if !self.centre_set {
            return Err(StationError::CentreNotSet(self.device_role));
        }
        Ok(sighted_point(self.station.to_vector(), reading))
    }

    /// Check this record allows measuring a throw.
    pub fn ready_for_throw(&self, require_edge: bool) -> StationResult<()> {
        if !self.centre_set {
            return Err(StationError::CentreNotSet(self.device_role));
        }
        if !require_edge {
            return Ok(());
        }
        match &self.edge_verification {
            None => Err(StationError::EdgeNotVerified(self.device_role)),
            Some(edge) if !edge.in_tolerance => Err(StationError::EdgeOutOfTolerance {
                role: self.device_role,
                difference_mm: edge.difference_mm,
                tolerance_mm: edge.tolerance_mm,
            }),
            Some(_) => Ok(()),
        }
    }
}

impl Station {
    /// Current calibration for `role`, or a fresh default view (shot
    /// circle, nothing set) when none is stored. The default is not stored.
    pub fn calibration(&self, role: DeviceRole) -> CalibrationRecord {
        self.state()
            .calibrations
            .get(&role)
            .cloned()
            .unwrap_or_else(|| CalibrationRecord::new(role, CircleType::default()))
    }

    pub fn calibration_state(&self, role: DeviceRole) -> CalibrationState {
        self.state()
            .calibrations
            .get(&role)
            .map(CalibrationRecord::state)
            .unwrap_or(CalibrationState::Uncalibrated)
    }

    /// Store a record as-is, keeping the timestamp of any existing one.
    pub fn save_calibration(&self, role: DeviceRole, mut record: CalibrationRecord) {
        let mut state = self.state();
        if let Some(existing) = state.calibrations.get(&role) {
            record.timestamp = existing.timestamp;
        }
        record.device_role = role;
        state.calibrations.insert(role, record);
    }

    pub fn select_circle(&self, role: DeviceRole, circle_type: CircleType) -> CalibrationRecord {
        let mut state = self.state();
        let record = state
            .calibrations
            .entry(role)
            .and_modify(|r| r.select_circle(circle_type))
            .or_insert_with(|| CalibrationRecord::new(role, circle_type));
        info!(
            "{role}: selected {circle_type} (radius {:.4}m)",
            record.target_radius_m
        );
        record.clone()
    }

    pub fn set_centre(&self, role: DeviceRole) -> StationResult<CalibrationRecord> {
        if !self.state().calibrations.contains_key(&role) {
            return Err(StationError::NoCircleSelected(role));
        }
        let reading = self.acquire_reading(role, Aim::Centre)?;

        let mut state = self.state();
        let record = state
            .calibrations
            .get_mut(&role)
            .ok_or(StationError::NoCircleSelected(role))?;
        record.set_centre(&reading);
        info!(
            "{role}: centre set, instrument at ({:.3}, {:.3})",
            record.station.x, record.station.y
        );
        Ok(record.clone())
    }

    pub fn verify_edge(&self, role: DeviceRole) -> StationResult<CalibrationRecord> {
        let radius_m = {
            let state = self.state();
            let record = state
                .calibrations
                .get(&role)
                .ok_or(StationError::NoCircleSelected(role))?;
            if !record.centre_set {
                return Err(StationError::CentreNotSet(role));
            }
            record.target_radius_m
        };
        let reading = self.acquire_reading(role, Aim::Edge { radius_m })?;

        let mut state = self.state();
        let record = state
            .calibrations
            .get_mut(&role)
            .ok_or(StationError::NoCircleSelected(role))?;
        let edge = record.verify_edge(&reading)?;
        if edge.in_tolerance {
            info!(
                "{role}: edge verified, {:+.1}mm (limit {:.1}mm)",
                edge.difference_mm, edge.tolerance_mm
            );
        } else {
            warn!(
                "{role}: edge out of tolerance, {:+.1}mm (limit {:.1}mm)",
                edge.difference_mm, edge.tolerance_mm
            );
        }
        Ok(record.clone())
    }

    /// Forget the calibration for `role`, returning it to uncalibrated.
    pub fn reset_calibration(&self, role: DeviceRole) {
        let mut state = self.state();
        state.calibrations.remove(&role);
        state.simulations.remove(&role);
        info!("{role}: calibration reset");
    }
}
