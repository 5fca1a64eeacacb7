//! Plane geometry for circle-frame coordinates.
//!
//! The circle frame has its origin at the circle centre with x/y in metres.
//! A reading sights a point from the instrument; its horizontal projection
//! gives the offset from instrument to target:
//!
//! ```text
//! hd     = (slope_distance_mm / 1000) * sin(vertical_angle)
//! offset = hd * (cos(horizontal_angle), sin(horizontal_angle))
//! ```

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::instrument::AveragedReading;

/// Serializable point in the circle frame, in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlanePoint {
    pub x: f64,
    pub y: f64,
}

impl PlanePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn to_vector(self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
}

impl From<Vector2<f64>> for PlanePoint {
    fn from(v: Vector2<f64>) -> Self {
        Self { x: v.x, y: v.y }
    }
}

/// Horizontal distance in metres for a reading.
pub fn horizontal_distance_m(reading: &AveragedReading) -> f64 {
    let slope_m = reading.slope_distance_mm / 1000.0;
    slope_m * reading.vertical_angle_deg.to_radians().sin()
}

/// Vector from the instrument to the sighted point.
pub fn horizontal_offset(reading: &AveragedReading) -> Vector2<f64> {
    let hd = horizontal_distance_m(reading);
    let har = reading.horizontal_angle_deg.to_radians();
    Vector2::new(hd * har.cos(), hd * har.sin())
}

/// Instrument position, given a sighting of the circle centre.
pub fn station_from_centre_sighting(reading: &AveragedReading) -> Vector2<f64> {
    -horizontal_offset(reading)
}

/// Circle-frame position of the point a reading sights.
pub fn sighted_point(station: Vector2<f64>, reading: &AveragedReading) -> Vector2<f64> {
    station + horizontal_offset(reading)
}

/// Reading an instrument at `station` would report when sighting `target`
/// with the given zenith angle.
pub fn reading_towards(
    station: Vector2<f64>,
    target: Vector2<f64>,
    vertical_angle_deg: f64,
) -> AveragedReading {
    let delta = target - station;
    let hd = delta.norm();
    let har = delta.y.atan2(delta.x).to_degrees().rem_euclid(360.0);
    let sd_mm = hd / vertical_angle_deg.to_radians().sin() * 1000.0;
    AveragedReading::new(sd_mm, vertical_angle_deg, har)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_level_sighting_due_east() {
        let reading = AveragedReading::new(20000.0, 90.0, 0.0);
        let offset = horizontal_offset(&reading);
        assert_relative_eq!(offset.x, 20.0, epsilon = 1e-9);
        assert_relative_eq!(offset.y, 0.0, epsilon = 1e-9);
        let station = station_from_centre_sighting(&reading);
        assert_relative_eq!(station.x, -20.0, epsilon = 1e-9);
    }

    #[test]
    fn test_centre_sighting_maps_to_origin() {
        let reading = AveragedReading::new(18342.0, 92.4350, 210.1836);
        let station = station_from_centre_sighting(&reading);
        let centre = sighted_point(station, &reading);
        assert_relative_eq!(centre.norm(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_inclined_sighting_shortens_horizontal() {
        let reading = AveragedReading::new(10000.0, 60.0, 90.0);
        assert_relative_eq!(horizontal_distance_m(&reading), 8.660254, epsilon = 1e-6);
        let offset = horizontal_offset(&reading);
        assert_relative_eq!(offset.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(offset.y, 8.660254, epsilon = 1e-6);
    }

    #[test]
    fn test_reading_towards_inverts_offset() {
        let station = Vector2::new(-12.5, 7.25);
        let target = Vector2::new(30.0, -4.0);
        let reading = reading_towards(station, target, 92.5);
        let point = sighted_point(station, &reading);
        assert_relative_eq!(point.x, target.x, epsilon = 1e-9);
        assert_relative_eq!(point.y, target.y, epsilon = 1e-9);
        assert!(reading.horizontal_angle_deg >= 0.0 && reading.horizontal_angle_deg < 360.0);
    }
}
