//! Paired, consistency-checked acquisition of EDM readings.
//!
//! Each acquisition takes two single readings separated by a settle delay.
//! When their slope distances agree within tolerance the three fields are
//! averaged; otherwise the pair is rejected.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use hardware::{parse_edm_line, DeviceLink, RawReading, READ_COMMAND};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::circle::CircleType;
use crate::error::{StationError, StationResult};
use crate::role::DeviceRole;
use crate::settings::StationSettings;

/// Mean of two agreeing readings. Same fields as [`RawReading`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AveragedReading {
    pub slope_distance_mm: f64,
    pub vertical_angle_deg: f64,
    pub horizontal_angle_deg: f64,
}

impl AveragedReading {
    pub fn new(slope_distance_mm: f64, vertical_angle_deg: f64, horizontal_angle_deg: f64) -> Self {
        Self {
            slope_distance_mm,
            vertical_angle_deg,
            horizontal_angle_deg,
        }
    }
}

impl From<RawReading> for AveragedReading {
    fn from(r: RawReading) -> Self {
        Self::new(r.slope_distance_mm, r.vertical_angle_deg, r.horizontal_angle_deg)
    }
}

/// What the operator is sighting. Real instruments ignore it; the
/// simulated instrument uses it to produce a plausible reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aim {
    Centre,
    Edge { radius_m: f64 },
    Landing { circle: CircleType },
}

/// Source of averaged readings.
pub trait Instrument: Send {
    fn acquire(&mut self, aim: Aim) -> StationResult<AveragedReading>;
}

impl<I: Instrument> Instrument for Arc<Mutex<I>> {
    fn acquire(&mut self, aim: Aim) -> StationResult<AveragedReading> {
        self.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .acquire(aim)
    }
}

/// Average two readings, rejecting the pair when slope distances differ by
/// more than `tolerance_mm`.
pub fn average_pair(
    first: &RawReading,
    second: &RawReading,
    tolerance_mm: f64,
) -> StationResult<AveragedReading> {
    if (first.slope_distance_mm - second.slope_distance_mm).abs() > tolerance_mm {
        return Err(StationError::Inconsistent {
            first_mm: first.slope_distance_mm,
            second_mm: second.slope_distance_mm,
            tolerance_mm,
        });
    }
    Ok(AveragedReading::new(
        (first.slope_distance_mm + second.slope_distance_mm) / 2.0,
        (first.vertical_angle_deg + second.vertical_angle_deg) / 2.0,
        mean_bearing_deg(first.horizontal_angle_deg, second.horizontal_angle_deg),
    ))
}

/// Mean of two bearings taken the short way round, in `[0, 360)`.
fn mean_bearing_deg(first: f64, second: f64) -> f64 {
    let mut second = second;
    if second - first > 180.0 {
        second -= 360.0;
    } else if first - second > 180.0 {
        second += 360.0;
    }
    let mean = ((first + second) / 2.0).rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360
    if mean >= 360.0 {
        0.0
    } else {
        mean
    }
}

/// EDM attached over a [`DeviceLink`].
pub struct DeviceInstrument {
    role: DeviceRole,
    link: Arc<Mutex<DeviceLink>>,
    settle_delay: Duration,
    tolerance_mm: f64,
}

impl DeviceInstrument {
    pub fn new(role: DeviceRole, link: Arc<Mutex<DeviceLink>>, settings: &StationSettings) -> Self {
        Self {
            role,
            link,
            settle_delay: settings.settle_delay(),
            tolerance_mm: settings.slope_tolerance_mm,
        }
    }

    fn single_read(link: &mut DeviceLink, stage: &str) -> StationResult<RawReading> {
        let line = link
            .query_line(&READ_COMMAND)
            .map_err(|e| StationError::transport(stage, e))?;
        debug!("{stage} raw response: {:?}", line.trim_end());
        parse_edm_line(&line).map_err(|e| StationError::protocol(stage, e))
    }
}

impl Instrument for DeviceInstrument {
    fn acquire(&mut self, _aim: Aim) -> StationResult<AveragedReading> {
        // Hold the link for the whole pair so no other command interleaves.
        let mut link = self.link.lock().unwrap_or_else(PoisonError::into_inner);
        let first = Self::single_read(&mut link, "first read")?;
        thread::sleep(self.settle_delay);
        let second = Self::single_read(&mut link, "second read")?;
        let averaged = average_pair(&first, &second, self.tolerance_mm)?;
        info!(
            "{} reading: SD {:.1}mm VA {:.4} HA {:.4}",
            self.role,
            averaged.slope_distance_mm,
            averaged.vertical_angle_deg,
            averaged.horizontal_angle_deg
        );
        Ok(averaged)
    }
}
