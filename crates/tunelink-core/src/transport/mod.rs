//! Transports
//!
//! Opens serial and TCP channels to an ECU and runs the reader loop that
//! pulls bytes off an open channel.
//!
//! Protocol framing is left to the consumer; this module only moves bytes.

mod endpoint;
mod error;
mod reader;
pub mod serial;
mod stream;

pub use endpoint::{open_endpoint, resolve_auto_serial, Endpoint};
pub use error::TransportError;
pub use reader::{ReaderHandle, StreamReader};
pub use stream::{ByteReader, SerialChannel, TcpChannel, Transport};

/// Default baud rate for ECU communication
pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Default serial read timeout and TCP connect timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Largest block the ECU sends in one response
pub const BLOCKING_FACTOR: usize = 1500;

/// Size of the reader loop's reusable buffer
pub const READ_BUFFER_SIZE: usize = BLOCKING_FACTOR * 2;
