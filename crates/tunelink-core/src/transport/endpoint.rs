//! Endpoint identifiers
//!
//! Typed view of the strings a [`HardwareSnapshot`] lists, and the entry
//! point for opening a channel to one of them.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::str::FromStr;

use tracing::info;

use super::serial::{clear_buffers, open_port};
use super::{SerialChannel, TcpChannel, Transport, TransportError};
use crate::config::TransportConfig;
use crate::hardware::{HardwareSnapshot, AUTO_SERIAL, PCAN, SOCKET_CAN};

/// Something a transport can be opened to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Pick a serial port automatically
    AutoSerial,
    /// A named serial port ("COM3", "/dev/ttyACM0")
    Serial(String),
    /// A TCP port on this machine, usually the simulator
    Tcp(u16),
    /// PCAN USB adapter
    Pcan,
    /// Linux SocketCAN interface
    SocketCan,
}

impl Endpoint {
    /// Parse an identifier as listed in a snapshot.
    ///
    /// Bare numbers and `localhost:<port>` / `127.0.0.1:<port>` are TCP ports;
    /// anything else that is not a marker is a serial port name.
    pub fn parse(id: &str) -> Result<Self, TransportError> {
        let id = id.trim();
        match id {
            "" => return Err(TransportError::InvalidEndpoint(id.to_string())),
            AUTO_SERIAL => return Ok(Endpoint::AutoSerial),
            PCAN => return Ok(Endpoint::Pcan),
            SOCKET_CAN => return Ok(Endpoint::SocketCan),
            _ => {}
        }

        if id.bytes().all(|b| b.is_ascii_digit()) {
            return parse_tcp_port(id, id);
        }
        if let Some((host, port)) = id.rsplit_once(':') {
            if host == "localhost" || host == "127.0.0.1" {
                return parse_tcp_port(id, port);
            }
        }
        Ok(Endpoint::Serial(id.to_string()))
    }

    /// Whether this is a CAN endpoint
    pub fn is_can(&self) -> bool {
        matches!(self, Endpoint::Pcan | Endpoint::SocketCan)
    }
}

fn parse_tcp_port(id: &str, port: &str) -> Result<Endpoint, TransportError> {
    match port.parse::<u16>() {
        Ok(port) if port != 0 => Ok(Endpoint::Tcp(port)),
        _ => Err(TransportError::InvalidEndpoint(id.to_string())),
    }
}

impl FromStr for Endpoint {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::parse(s)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::AutoSerial => f.write_str(AUTO_SERIAL),
            Endpoint::Serial(name) => f.write_str(name),
            Endpoint::Tcp(port) => write!(f, "{}", port),
            Endpoint::Pcan => f.write_str(PCAN),
            Endpoint::SocketCan => f.write_str(SOCKET_CAN),
        }
    }
}

/// Turn [`Endpoint::AutoSerial`] into the first real serial port of `snapshot`
pub fn resolve_auto_serial(snapshot: &HardwareSnapshot) -> Result<Endpoint, TransportError> {
    snapshot
        .serial_ports()
        .next()
        .map(|name| Endpoint::Serial(name.to_string()))
        .ok_or(TransportError::NoSerialPort)
}

/// Open a channel to `endpoint`.
///
/// [`Endpoint::AutoSerial`] has to be resolved with [`resolve_auto_serial`]
/// first. CAN endpoints are listed by the scanner but carry framed traffic
/// this crate does not speak.
pub fn open_endpoint(
    endpoint: &Endpoint,
    config: &TransportConfig,
) -> Result<Box<dyn Transport>, TransportError> {
    match endpoint {
        Endpoint::Serial(name) => {
            info!("Opening serial port {} at {} baud", name, config.baud_rate);
            let mut port = open_port(name, config)?;
            // Drop bytes left over from a previous session
            clear_buffers(port.as_mut())?;
            Ok(Box::new(SerialChannel::new(port)))
        }
        Endpoint::Tcp(port) => {
            info!("Connecting to localhost:{}", port);
            let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, *port));
            let stream = TcpStream::connect_timeout(&addr, config.timeout())?;
            stream.set_nodelay(true)?;
            Ok(Box::new(TcpChannel::new(stream)))
        }
        Endpoint::AutoSerial => Err(TransportError::Unsupported(
            "auto serial must be resolved to a port first".to_string(),
        )),
        Endpoint::Pcan | Endpoint::SocketCan => {
            Err(TransportError::Unsupported(endpoint.to_string()))
        }
    }
}
