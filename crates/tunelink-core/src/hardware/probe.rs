//! Hardware probe interface

use thiserror::Error;

/// Errors a single probe can hit. The scanner treats every one of them as
/// "not detected".
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial enumeration failed: {0}")]
    Serial(#[from] serialport::Error),

    #[error("Probe not supported on this platform")]
    Unsupported,

    #[error("Probe failed: {0}")]
    Failed(String),
}

/// Source of raw hardware facts for the scanner.
///
/// Serial enumeration is the cheap probe and runs every cycle; the others may
/// spawn processes or walk device trees and only run on slow cycles.
pub trait HardwareProbe: Send + Sync {
    /// Raw serial port names, unfiltered
    fn serial_ports(&self) -> Result<Vec<String>, ProbeError>;

    /// Identifiers of reachable simulator TCP ports
    fn simulator_ports(&self) -> Result<Vec<String>, ProbeError>;

    /// Whether a microcontroller bootloader in DFU mode is attached
    fn dfu_bootloader(&self) -> Result<bool, ProbeError>;

    /// Whether an ST-Link programmer is attached
    fn st_link(&self) -> Result<bool, ProbeError>;

    /// Whether a USB CAN adapter is attached
    fn can_adapter(&self) -> Result<bool, ProbeError>;
}
