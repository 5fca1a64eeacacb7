//! EDM (Electronic Distance Measurement) wire protocol
//!
//! The instrument is triggered by the three byte sequence `0x11 0x0D 0x0A`
//! and answers with one ASCII line:
//!
//! ```text
//! <slope distance mm> <vertical angle DDDMMSS> <horizontal angle DDDMMSS> <status>
//! 0004297 0922606 2101101 85
//! ```
//!
//! The vertical angle is a zenith angle (90° is level). The status code is
//! passed through untouched.

pub mod angle;

pub use angle::parse_dddmmss;

use thiserror::Error;

/// Byte sequence that triggers a single EDM measurement.
pub const READ_COMMAND: [u8; 3] = [0x11, 0x0D, 0x0A];

/// Minimum number of whitespace separated fields in a response.
const MIN_FIELDS: usize = 4;

/// Errors produced while decoding an EDM response line.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EdmError {
    /// Response did not have the expected shape.
    #[error("Malformed EDM response: {0}")]
    MalformedResponse(String),

    /// A numeric field could not be parsed.
    #[error("Invalid number in EDM response: '{0}'")]
    InvalidNumber(String),

    /// Sexagesimal angle had minutes or seconds >= 60.
    #[error("Invalid angle '{field}' (minutes={minutes}, seconds={seconds})")]
    InvalidAngle {
        field: String,
        minutes: u32,
        seconds: u32,
    },
}

/// One decoded EDM measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawReading {
    /// Straight-line instrument to prism distance in millimetres
    pub slope_distance_mm: f64,
    /// Zenith angle in decimal degrees
    pub vertical_angle_deg: f64,
    /// Horizontal angle in decimal degrees
    pub horizontal_angle_deg: f64,
}

impl RawReading {
    pub fn new(slope_distance_mm: f64, vertical_angle_deg: f64, horizontal_angle_deg: f64) -> Self {
        Self {
            slope_distance_mm,
            vertical_angle_deg,
            horizontal_angle_deg,
        }
    }

    /// Render this reading the way an instrument would send it.
    ///
    /// Distances are rounded to whole millimetres and angles to whole
    /// seconds, so a round trip through [`parse_edm_line`] is only exact for
    /// readings already on that grid.
    pub fn to_wire_line(&self, status: u8) -> String {
        format!(
            "{:07.0} {} {} {status}\r\n",
            self.slope_distance_mm,
            encode_dddmmss(self.vertical_angle_deg),
            encode_dddmmss(self.horizontal_angle_deg)
        )
    }
}

/// Parse one EDM response line.
///
/// Requires at least four whitespace separated fields. The fourth field
/// (status) is accepted without validation.
pub fn parse_edm_line(raw: &str) -> Result<RawReading, EdmError> {
    let fields: Vec<&str> = raw.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return Err(EdmError::MalformedResponse(format!(
            "expected {MIN_FIELDS} fields, got {} in {:?}",
            fields.len(),
            raw.trim()
        )));
    }

    let slope_distance_mm: f64 = fields[0]
        .parse()
        .map_err(|_| EdmError::InvalidNumber(fields[0].to_string()))?;
    let vertical_angle_deg = parse_dddmmss(fields[1])?;
    let horizontal_angle_deg = parse_dddmmss(fields[2])?;

    Ok(RawReading {
        slope_distance_mm,
        vertical_angle_deg,
        horizontal_angle_deg,
    })
}

/// Pack decimal degrees into 7 digit `DDDMMSS`, rounding to whole seconds.
pub fn encode_dddmmss(degrees: f64) -> String {
    let total_seconds = (degrees.rem_euclid(360.0) * 3600.0).round() as u64 % (360 * 3600);
    let ddd = total_seconds / 3600;
    let mm = (total_seconds % 3600) / 60;
    let ss = total_seconds % 60;
    format!("{ddd:03}{mm:02}{ss:02}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_parse_reference_line() {
        let reading = parse_edm_line("0004297 0922606 2101101 85\r\n").unwrap();
        assert_eq!(reading.slope_distance_mm, 4297.0);
        assert_relative_eq!(reading.vertical_angle_deg, 92.435, epsilon = 1e-9);
        assert_relative_eq!(
            reading.horizontal_angle_deg,
            210.0 + 11.0 / 60.0 + 1.0 / 3600.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_three_fields_is_malformed() {
        let err = parse_edm_line("0004297 0922606 2101101").unwrap_err();
        assert!(matches!(err, EdmError::MalformedResponse(_)));
    }

    #[test]
    fn test_empty_line_is_malformed() {
        assert!(matches!(
            parse_edm_line("\n"),
            Err(EdmError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_non_numeric_distance() {
        let err = parse_edm_line("ERR 0922606 2101101 85").unwrap_err();
        assert_eq!(err, EdmError::InvalidNumber("ERR".to_string()));
    }

    #[test]
    fn test_invalid_angle_propagates() {
        let err = parse_edm_line("0004297 929960 2101101 85").unwrap_err();
        assert!(matches!(err, EdmError::InvalidAngle { .. }));
    }

    #[test]
    fn test_status_field_is_not_validated() {
        assert!(parse_edm_line("0004297 0922606 2101101 ??").is_ok());
    }

    #[test]
    fn test_encode_dddmmss() {
        assert_eq!(encode_dddmmss(92.435), "0922606");
        assert_eq!(encode_dddmmss(0.0), "0000000");
        assert_eq!(encode_dddmmss(359.99999), "0000000");
        assert_eq!(encode_dddmmss(-90.0), "2700000");
    }

    #[test]
    fn test_wire_line_parses_back() {
        let reading = RawReading::new(18750.0, 90.0, 45.5);
        let line = reading.to_wire_line(85);
        assert_eq!(line, "0018750 0900000 0453000 85\r\n");
        assert_eq!(parse_edm_line(&line).unwrap(), reading);
    }
}
