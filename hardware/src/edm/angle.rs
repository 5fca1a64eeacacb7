//! Sexagesimal angle decoding for EDM responses
//!
//! Angles arrive packed as `DDDMMSS` digits (degrees, minutes, seconds).
//! Some instruments drop the leading zero and send six digits instead.

use super::EdmError;

/// Minutes per degree and seconds per minute
const SEXAGESIMAL_BASE: u32 = 60;

/// Decode a packed `DDDMMSS` angle into decimal degrees.
///
/// Accepts 7 digits, or 6 digits which are left-padded with a single zero.
/// Minutes and seconds must both be below 60.
pub fn parse_dddmmss(field: &str) -> Result<f64, EdmError> {
    if !(6..=7).contains(&field.len()) {
        return Err(EdmError::MalformedResponse(format!(
            "angle field '{field}' has {} characters, expected 6 or 7",
            field.len()
        )));
    }
    if !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EdmError::InvalidNumber(field.to_string()));
    }

    let padded = if field.len() == 6 {
        format!("0{field}")
    } else {
        field.to_string()
    };

    let degrees = digits(&padded[0..3], field)?;
    let minutes = digits(&padded[3..5], field)?;
    let seconds = digits(&padded[5..7], field)?;

    if minutes >= SEXAGESIMAL_BASE || seconds >= SEXAGESIMAL_BASE {
        return Err(EdmError::InvalidAngle {
            field: field.to_string(),
            minutes,
            seconds,
        });
    }

    Ok(degrees as f64 + minutes as f64 / 60.0 + seconds as f64 / 3600.0)
}

fn digits(slice: &str, field: &str) -> Result<u32, EdmError> {
    slice
        .parse()
        .map_err(|_| EdmError::InvalidNumber(field.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_seven_digit_angle() {
        let deg = parse_dddmmss("0922606").unwrap();
        assert_relative_eq!(deg, 92.0 + 26.0 / 60.0 + 6.0 / 3600.0, epsilon = 1e-12);
        assert_relative_eq!(deg, 92.4350, epsilon = 1e-4);
    }

    #[test]
    fn test_six_digit_angle_is_zero_padded() {
        assert_eq!(
            parse_dddmmss("922606").unwrap(),
            parse_dddmmss("0922606").unwrap()
        );
    }

    #[test]
    fn test_three_digit_degrees() {
        let deg = parse_dddmmss("2101101").unwrap();
        assert_relative_eq!(deg, 210.0 + 11.0 / 60.0 + 1.0 / 3600.0, epsilon = 1e-12);
    }

    #[test]
    fn test_seconds_out_of_range() {
        let err = parse_dddmmss("929960").unwrap_err();
        assert!(matches!(err, EdmError::InvalidAngle { seconds: 60, .. }));
    }

    #[test]
    fn test_minutes_out_of_range() {
        let err = parse_dddmmss("0926000").unwrap_err();
        assert!(matches!(err, EdmError::InvalidAngle { minutes: 60, .. }));
    }

    #[test]
    fn test_bad_length_and_digits() {
        assert!(matches!(
            parse_dddmmss("12345"),
            Err(EdmError::MalformedResponse(_))
        ));
        assert!(matches!(
            parse_dddmmss("09226O6"),
            Err(EdmError::InvalidNumber(_))
        ));
    }
}
