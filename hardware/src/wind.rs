//! Wind gauge line protocol
//!
//! Gauges stream comma separated ASCII records. The second field carries the
//! signed wind speed in m/s (for example `"W,+1.3,M,00"`). Anything else on
//! the line is ignored, and lines without a signed second field are noise.

/// Extract the signed wind speed from one gauge line.
///
/// Returns `None` for lines that don't carry a reading. Noise lines are
/// expected on the wire, so this is not an error.
pub fn parse_wind_line(raw: &str) -> Option<f64> {
    let field = raw.trim().split(',').nth(1)?;
    if !(field.starts_with('+') || field.starts_with('-')) {
        return None;
    }
    field.parse().ok().filter(|speed: &f64| speed.is_finite())
}
