//! Synthetic instrument for demo mode.
//!
//! The instrument is placed once, at a random distance and bearing from the
//! circle centre, and every reading is generated by sighting a point in the
//! circle frame from that fixed position. Centre, edge and landing
//! readings therefore agree with each other the way a real set-up would.

use std::f64::consts::PI;

use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::StationResult;
use crate::geometry::reading_towards;
use crate::instrument::{AveragedReading, Aim, Instrument};

/// Instrument distance from centre, metres
const STATION_DISTANCE_M: (f64, f64) = (12.0, 25.0);
/// Zenith angles for a tripod-height instrument sighting a ground prism
const ZENITH_DEG: (f64, f64) = (91.0, 94.0);
/// Edge placement noise, millimetres
const EDGE_NOISE_MM: f64 = 2.0;
/// Half-width of the landing sector, radians
const SECTOR_HALF_WIDTH_RAD: f64 = 0.3;

/// Deterministic-when-seeded stand-in for an EDM.
#[derive(Debug)]
pub struct SimulatedInstrument {
    station: Vector2<f64>,
    rng: StdRng,
}

impl SimulatedInstrument {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(mut rng: StdRng) -> Self {
        let distance = rng.random_range(STATION_DISTANCE_M.0..STATION_DISTANCE_M.1);
        let bearing = rng.random_range(0.0..2.0 * PI);
        let station = Vector2::new(distance * bearing.cos(), distance * bearing.sin());
        debug!(
            "Simulated instrument placed at ({:.3}, {:.3})",
            station.x, station.y
        );
        Self { station, rng }
    }

    /// Fixed instrument position in the circle frame.
    pub fn station(&self) -> Vector2<f64> {
        self.station
    }

    fn sight(&mut self, target: Vector2<f64>) -> AveragedReading {
        let zenith = self.rng.random_range(ZENITH_DEG.0..ZENITH_DEG.1);
        reading_towards(self.station, target, zenith)
    }
}

fn point_at(radius_m: f64, bearing: f64) -> Vector2<f64> {
    Vector2::new(radius_m * bearing.cos(), radius_m * bearing.sin())
}

impl Default for SimulatedInstrument {
    fn default() -> Self {
        Self::new()
    }
}

impl Instrument for SimulatedInstrument {
    fn acquire(&mut self, aim: Aim) -> StationResult<AveragedReading> {
        let target = match aim {
            Aim::Centre => Vector2::zeros(),
            Aim::Edge { radius_m } => {
                let noise_mm = self.rng.random_range(-EDGE_NOISE_MM..EDGE_NOISE_MM);
                let bearing = self.rng.random_range(0.0..2.0 * PI);
                point_at(radius_m + noise_mm / 1000.0, bearing)
            }
            Aim::Landing { circle } => {
                // Landings fall in a sector on the far side of the circle
                let (lo, hi) = circle.typical_marks_m();
                let mark = self.rng.random_range(lo..hi);
                let away = (-self.station.y).atan2(-self.station.x);
                let bearing =
                    away + self.rng.random_range(-SECTOR_HALF_WIDTH_RAD..SECTOR_HALF_WIDTH_RAD);
                point_at(circle.radius_m() + mark, bearing)
            }
        };
        Ok(self.sight(target))
    }
}
