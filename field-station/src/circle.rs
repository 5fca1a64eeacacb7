//! Official throwing circles and arcs.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Shot put circle radius in metres (2.135 m diameter)
pub const RADIUS_SHOT_M: f64 = 1.0675;
/// Discus circle radius in metres (2.50 m diameter)
pub const RADIUS_DISCUS_M: f64 = 1.250;
/// Hammer circle radius in metres (2.135 m diameter)
pub const RADIUS_HAMMER_M: f64 = 1.0675;
/// Javelin scoring arc radius in metres
pub const RADIUS_JAVELIN_ARC_M: f64 = 8.000;

/// Edge verification tolerance for circles, in millimetres
pub const TOLERANCE_CIRCLE_MM: f64 = 5.0;
/// Edge verification tolerance for the javelin arc, in millimetres
pub const TOLERANCE_JAVELIN_MM: f64 = 10.0;

/// Event-specific circle (or arc) the instrument is calibrated against.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircleType {
    #[default]
    Shot,
    Discus,
    Hammer,
    JavelinArc,
}

impl CircleType {
    /// Official radius in metres.
    pub fn radius_m(self) -> f64 {
        match self {
            CircleType::Shot => RADIUS_SHOT_M,
            CircleType::Discus => RADIUS_DISCUS_M,
            CircleType::Hammer => RADIUS_HAMMER_M,
            CircleType::JavelinArc => RADIUS_JAVELIN_ARC_M,
        }
    }

    /// Allowed edge verification difference in millimetres.
    pub fn edge_tolerance_mm(self) -> f64 {
        match self {
            CircleType::JavelinArc => TOLERANCE_JAVELIN_MM,
            _ => TOLERANCE_CIRCLE_MM,
        }
    }

    /// Plausible range of marks in metres, used for synthetic landings.
    pub fn typical_marks_m(self) -> (f64, f64) {
        match self {
            CircleType::Shot => (6.0, 15.0),
            CircleType::JavelinArc => (20.0, 75.0),
            _ => (15.0, 60.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_official_radii() {
        assert_eq!(CircleType::Shot.radius_m(), 1.0675);
        assert_eq!(CircleType::Discus.radius_m(), 1.25);
        assert_eq!(CircleType::Hammer.radius_m(), 1.0675);
        assert_eq!(CircleType::JavelinArc.radius_m(), 8.0);
    }

    #[test]
    fn test_tolerances() {
        assert_eq!(CircleType::Discus.edge_tolerance_mm(), 5.0);
        assert_eq!(CircleType::JavelinArc.edge_tolerance_mm(), 10.0);
    }

    #[test]
    fn test_names() {
        assert_eq!(CircleType::JavelinArc.to_string(), "JAVELIN_ARC");
        assert_eq!("discus".parse::<CircleType>().unwrap(), CircleType::Discus);
        assert_eq!(
            serde_json::to_string(&CircleType::JavelinArc).unwrap(),
            "\"JAVELIN_ARC\""
        );
    }
}
