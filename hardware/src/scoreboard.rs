//! Scoreboard display framing
//!
//! Scoreboards accept a plain ASCII value terminated by CR LF.

/// Value written when a scoreboard is first connected, lighting every segment.
pub const TEST_PATTERN: &str = "88:88";

/// Frame a display value for transmission.
pub fn frame(value: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(value.len() + 2);
    bytes.extend_from_slice(value.trim_end().as_bytes());
    bytes.extend_from_slice(b"\r\n");
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_appends_crlf() {
        assert_eq!(frame("12.34"), b"12.34\r\n".to_vec());
        assert_eq!(frame("+1.2 m/s"), b"+1.2 m/s\r\n".to_vec());
    }

    #[test]
    fn test_frame_does_not_double_terminate() {
        assert_eq!(frame("88:88\r\n"), b"88:88\r\n".to_vec());
    }
}
