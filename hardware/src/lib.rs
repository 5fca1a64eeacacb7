//! Wire protocols and transports for athletics field instruments.
//!
//! This crate knows how to talk to the devices used on a throws or jumps
//! field: it frames and parses their line protocols and opens the serial or
//! TCP connections they sit behind. It holds no measurement state.
//!
//! # Modules
//!
//! - `edm` - EDM total station read command and response decoding
//! - `wind` - Wind gauge record decoding
//! - `scoreboard` - Scoreboard display framing
//! - `link` - Serial (9600-8-N-1) and TCP transports, port enumeration

pub mod edm;
pub mod link;
pub mod scoreboard;
pub mod wind;

pub use edm::{parse_edm_line, EdmError, RawReading, READ_COMMAND};
pub use link::{list_serial_ports, DeviceLink, LineStream, LinkError, LinkResult, TransportKind};
pub use wind::parse_wind_line;
