//! Transport errors

use thiserror::Error;

/// Errors that can occur while opening a transport
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Serial port error: {0}")]
    Serial(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("No serial port available for auto-detection")]
    NoSerialPort,

    #[error("Unsupported endpoint: {0}")]
    Unsupported(String),
}

impl From<serialport::Error> for TransportError {
    fn from(e: serialport::Error) -> Self {
        TransportError::Serial(e.to_string())
    }
}
