//! Serial and TCP transports for field instruments
//!
//! Every instrument on the field (EDM, wind gauge, scoreboard) speaks a
//! line-oriented ASCII protocol over either an RS-232 port or a TCP socket
//! (usually a serial-to-Ethernet bridge). [`DeviceLink`] hides which one is
//! in use.
//!
//! # Transport settings
//!
//! - Serial: 9600 baud, 8 data bits, no parity, 1 stop bit, no flow control.
//! - Network: plain TCP to `host:port`, dialled with a bounded connect timeout.
//!
//! Network reads get a deadline for the duration of one query which is
//! cleared afterwards. Serial reads rely on the port's long idle timeout.
//!
//! # Example
//!
//! ```no_run
//! use hardware::edm::{parse_edm_line, READ_COMMAND};
//! use hardware::link::DeviceLink;
//! use std::time::Duration;
//!
//! let mut link = DeviceLink::open_network("192.168.1.50", 4001, Duration::from_secs(5))?;
//! let line = link.query_line(&READ_COMMAND)?;
//! println!("{:?}", parse_edm_line(&line));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, trace};

/// Serial line speed used by all supported instruments.
pub const SERIAL_BAUD_RATE: u32 = 9600;

/// Idle timeout applied to serial ports.
///
/// The serial driver needs some timeout; this one is long enough to behave
/// like "wait for the instrument" in practice.
pub const SERIAL_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Default TCP connect timeout.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default deadline for one network query.
pub const DEFAULT_READ_DEADLINE: Duration = Duration::from_secs(10);

/// Longest line accepted before the peer is considered broken.
const MAX_LINE_BYTES: usize = 4096;

/// Errors from opening or talking over a transport.
#[derive(Error, Debug)]
pub enum LinkError {
    /// Low-level read/write failure.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serial driver failure (open, configure, clone).
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Could not establish the connection at all.
    #[error("Connection to {address} failed: {reason}")]
    ConnectionFailed { address: String, reason: String },

    /// No complete line arrived within the read deadline.
    #[error("Timeout waiting for response")]
    Timeout,

    /// Peer closed the connection.
    #[error("Connection closed by device")]
    Closed,

    /// Line exceeded the maximum accepted length.
    #[error("Response exceeded {0} bytes without a line terminator")]
    Overlong(usize),
}

/// Result type for transport operations.
pub type LinkResult<T> = Result<T, LinkError>;

/// How an instrument is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum TransportKind {
    Serial,
    Network,
}

/// Byte stream an instrument can be driven over.
///
/// Implemented for TCP sockets and serial ports, and by in-memory fakes in
/// tests.
pub trait LineStream: Read + Write + Send {
    /// Set or clear (`None`) the read timeout.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Independent handle onto the same underlying connection.
    fn try_clone_stream(&self) -> io::Result<Box<dyn LineStream>>;

    /// Close the connection so that blocked readers on clones wake up.
    fn close(&mut self) -> io::Result<()>;
}

impl LineStream for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn try_clone_stream(&self) -> io::Result<Box<dyn LineStream>> {
        Ok(Box::new(self.try_clone()?))
    }

    fn close(&mut self) -> io::Result<()> {
        match self.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            other => other,
        }
    }
}

impl LineStream for Box<dyn SerialPort> {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.set_timeout(timeout.unwrap_or(SERIAL_READ_TIMEOUT))
            .map_err(io::Error::from)
    }

    fn try_clone_stream(&self) -> io::Result<Box<dyn LineStream>> {
        let clone = self.try_clone().map_err(io::Error::from)?;
        Ok(Box::new(clone))
    }

    fn close(&mut self) -> io::Result<()> {
        // The port closes on drop; clones poll with their own timeout.
        Ok(())
    }
}

/// An open connection to one instrument.
pub struct DeviceLink {
    kind: TransportKind,
    address: String,
    stream: Box<dyn LineStream>,
    read_deadline: Duration,
}

impl DeviceLink {
    /// Open a serial port at 9600-8-N-1.
    pub fn open_serial(port_name: &str) -> LinkResult<Self> {
        let port = serialport::new(port_name, SERIAL_BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(SERIAL_READ_TIMEOUT)
            .open()
            .map_err(|e| LinkError::ConnectionFailed {
                address: port_name.to_string(),
                reason: e.to_string(),
            })?;

        debug!("Opened serial port {port_name} at {SERIAL_BAUD_RATE} baud");
        Ok(Self::from_stream(
            TransportKind::Serial,
            port_name,
            Box::new(port),
        ))
    }

    /// Dial a TCP instrument, giving up after `dial_timeout`.
    pub fn open_network(host: &str, port: u16, dial_timeout: Duration) -> LinkResult<Self> {
        let address = join_host_port(host, port);
        let candidates = (host, port)
            .to_socket_addrs()
            .map_err(|e| LinkError::ConnectionFailed {
                address: address.clone(),
                reason: e.to_string(),
            })?;

        let mut last_error = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, dial_timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    debug!("Connected to {address} via TCP");
                    return Ok(Self::from_stream(
                        TransportKind::Network,
                        &address,
                        Box::new(stream),
                    ));
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(LinkError::ConnectionFailed {
            address,
            reason: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no addresses resolved".to_string()),
        })
    }

    /// Wrap an already open stream.
    pub fn from_stream(kind: TransportKind, address: &str, stream: Box<dyn LineStream>) -> Self {
        Self {
            kind,
            address: address.to_string(),
            stream,
            read_deadline: DEFAULT_READ_DEADLINE,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Change the per-query deadline used on network links.
    pub fn set_read_deadline(&mut self, deadline: Duration) {
        self.read_deadline = deadline;
    }

    /// Write raw bytes and flush.
    pub fn send(&mut self, bytes: &[u8]) -> LinkResult<()> {
        trace!("{} send: {:02X?}", self.address, bytes);
        self.stream.write_all(bytes)?;
        self.stream.flush()?;
        Ok(())
    }

    /// Read one `\n` terminated line, returned with its terminator.
    pub fn read_line(&mut self) -> LinkResult<String> {
        let mut byte = [0u8; 1];
        let mut bytes = Vec::new();

        loop {
            match self.stream.read(&mut byte) {
                Ok(0) => return Err(LinkError::Closed),
                Ok(_) => {
                    bytes.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                    if bytes.len() >= MAX_LINE_BYTES {
                        return Err(LinkError::Overlong(MAX_LINE_BYTES));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if e.kind() == io::ErrorKind::TimedOut
                        || e.kind() == io::ErrorKind::WouldBlock =>
                {
                    return Err(LinkError::Timeout);
                }
                Err(e) => return Err(e.into()),
            }
        }

        let line = String::from_utf8_lossy(&bytes).into_owned();
        trace!("{} recv: {:?}", self.address, line);
        Ok(line)
    }

    /// Send a command and read the single line answer.
    ///
    /// On network links the read deadline is armed for this exchange only
    /// and cleared afterwards, whatever the outcome.
    pub fn query_line(&mut self, command: &[u8]) -> LinkResult<String> {
        self.send(command)?;

        if self.kind != TransportKind::Network {
            return self.read_line();
        }

        self.stream.set_read_timeout(Some(self.read_deadline))?;
        let result = self.read_line();
        self.stream.set_read_timeout(None)?;
        result
    }

    /// Independent reader onto this connection, for background listeners.
    pub fn try_clone_stream(&self) -> LinkResult<Box<dyn LineStream>> {
        Ok(self.stream.try_clone_stream()?)
    }

    /// Close the connection. Errors are logged, not returned.
    pub fn close(&mut self) {
        if let Err(e) = self.stream.close() {
            debug!("Error closing {}: {e}", self.address);
        }
    }
}

impl std::fmt::Debug for DeviceLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceLink")
            .field("kind", &self.kind)
            .field("address", &self.address)
            .finish()
    }
}

/// Names of the serial ports present on this machine.
pub fn list_serial_ports() -> LinkResult<Vec<String>> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|p| p.port_name)
        .collect())
}

/// Format `host:port`, bracketing IPv6 literals.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_join_host_port() {
        assert_eq!(join_host_port("10.0.0.5", 4001), "10.0.0.5:4001");
        assert_eq!(join_host_port("::1", 80), "[::1]:80");
        assert_eq!(join_host_port("[::1]", 80), "[::1]:80");
    }

    #[test]
    fn test_transport_kind_names() {
        assert_eq!(TransportKind::Serial.to_string(), "serial");
        assert_eq!("network".parse::<TransportKind>().unwrap(), TransportKind::Network);
    }

    #[test]
    fn test_query_line_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut writer = stream.try_clone().unwrap();
            let mut reader = BufReader::new(stream);
            let mut command = Vec::new();
            reader.read_until(b'\n', &mut command).unwrap();
            assert_eq!(command, vec![0x11, 0x0D, 0x0A]);
            writer.write_all(b"0004297 0922606 2101101 85\r\n").unwrap();
        });

        let mut link = DeviceLink::open_network("127.0.0.1", port, DEFAULT_DIAL_TIMEOUT).unwrap();
        assert_eq!(link.kind(), TransportKind::Network);
        assert_eq!(link.address(), format!("127.0.0.1:{port}"));

        let line = link.query_line(&crate::edm::READ_COMMAND).unwrap();
        assert_eq!(line, "0004297 0922606 2101101 85\r\n");
        server.join().unwrap();
    }

    #[test]
    fn test_read_deadline_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(400));
            drop(stream);
        });

        let mut link = DeviceLink::open_network("127.0.0.1", port, DEFAULT_DIAL_TIMEOUT).unwrap();
        link.set_read_deadline(Duration::from_millis(50));
        let err = link.query_line(&crate::edm::READ_COMMAND).unwrap_err();
        assert!(matches!(err, LinkError::Timeout));
        server.join().unwrap();
    }

    #[test]
    fn test_closed_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut link = DeviceLink::open_network("127.0.0.1", port, DEFAULT_DIAL_TIMEOUT).unwrap();
        server.join().unwrap();
        assert!(matches!(link.read_line(), Err(LinkError::Closed)));
    }

    #[test]
    fn test_dial_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = DeviceLink::open_network("127.0.0.1", port, Duration::from_millis(500)).unwrap_err();
        assert!(matches!(err, LinkError::ConnectionFailed { .. }));
    }
}
