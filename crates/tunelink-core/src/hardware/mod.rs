//! Hardware Discovery
//!
//! Watches the host for endpoints an ECU can be reached through: serial ports,
//! the local simulator TCP port, CAN adapters, and USB bootloader/programmer
//! states.
//!
//! The [`PortScanner`] polls a [`HardwareProbe`] on a background thread and
//! hands a fresh [`HardwareSnapshot`] to its listeners whenever the result
//! differs from the previous cycle.

mod filter;
mod probe;
mod scanner;
mod snapshot;
pub mod system;

pub use filter::{filter_ports, PortFilter};
pub use probe::{HardwareProbe, ProbeError};
pub use scanner::{
    poll_hardware, PortScanner, ScannerError, SleepInterrupted, Sleeper, ThreadSleeper,
};
pub use snapshot::HardwareSnapshot;
pub use system::SystemProbe;

/// Marker listed first whenever at least one real serial port is present
pub const AUTO_SERIAL: &str = "Auto Serial";

/// Identifier for a detected PCAN USB adapter
pub const PCAN: &str = "PCAN";

/// Identifier for the Linux SocketCAN interface
pub const SOCKET_CAN: &str = "SocketCAN";

/// Default TCP port of the ECU simulator
pub const SIMULATOR_TCP_PORT: u16 = 29001;
