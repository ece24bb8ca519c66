//! # TuneLink Core Library
//!
//! Endpoint discovery and byte-stream plumbing for ECU tuning software.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - A background scanner that watches for serial ports, the local simulator,
//!   CAN adapters and USB bootloader/programmer states
//! - Serial and TCP channels for talking to an ECU
//! - A reader loop that pulls bytes off an open channel and reports disconnects
//!
//! ## Example
//!
//! ```rust,ignore
//! use tunelink_core::prelude::*;
//!
//! let scanner = PortScanner::system(ScannerConfig::default());
//! scanner.register(|hw: &HardwareSnapshot| {
//!     println!("ports: {:?}", hw.known_ports());
//! })?;
//!
//! let channel = open_endpoint(&Endpoint::Tcp(29001), &TransportConfig::default())?;
//! let reader = StreamReader::new().run(
//!     channel,
//!     |bytes| println!("{} bytes", bytes.len()),
//!     || println!("disconnected"),
//! )?;
//! ```

pub mod config;
pub mod hardware;
pub mod transport;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{LinkConfig, ReaderConfig, ScannerConfig, TransportConfig};
    pub use crate::hardware::{
        HardwareProbe, HardwareSnapshot, PortFilter, PortScanner, SystemProbe,
    };
    pub use crate::transport::{
        open_endpoint, ByteReader, Endpoint, ReaderHandle, StreamReader, Transport,
        TransportError,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
