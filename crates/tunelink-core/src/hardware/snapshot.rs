//! Snapshot of detected hardware

use serde::{Deserialize, Serialize};

use crate::transport::Endpoint;

/// Immutable result of one scanner cycle.
///
/// Two snapshots are equal when every field is equal, including the order of
/// `ports`. The scanner relies on this equality alone to decide whether
/// listeners hear about a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareSnapshot {
    ports: Vec<String>,
    dfu_found: bool,
    st_link_connected: bool,
    can_adapter_connected: bool,
}

impl HardwareSnapshot {
    /// Create a snapshot from its parts
    pub fn new(
        ports: Vec<String>,
        dfu_found: bool,
        st_link_connected: bool,
        can_adapter_connected: bool,
    ) -> Self {
        Self {
            ports,
            dfu_found,
            st_link_connected,
            can_adapter_connected,
        }
    }

    /// Snapshot with nothing detected
    pub fn empty() -> Self {
        Self::default()
    }

    /// Endpoint identifiers in discovery order
    pub fn ports(&self) -> &[String] {
        &self.ports
    }

    /// Owned copy of the endpoint identifiers
    pub fn known_ports(&self) -> Vec<String> {
        self.ports.clone()
    }

    /// Real serial port names, without the auto-detect marker or
    /// TCP/CAN identifiers
    pub fn serial_ports(&self) -> impl Iterator<Item = &str> {
        self.ports
            .iter()
            .map(String::as_str)
            .filter(|p| matches!(Endpoint::parse(p), Ok(Endpoint::Serial(_))))
    }

    /// Whether a USB bootloader in DFU mode was seen
    pub fn is_dfu_found(&self) -> bool {
        self.dfu_found
    }

    /// Whether an ST-Link programmer was seen
    pub fn is_st_link_connected(&self) -> bool {
        self.st_link_connected
    }

    /// Whether a USB CAN adapter was seen
    pub fn is_can_adapter_connected(&self) -> bool {
        self.can_adapter_connected
    }

    /// True when no endpoint and no programmer state was detected
    pub fn is_empty(&self) -> bool {
        !self.dfu_found
            && !self.st_link_connected
            && !self.can_adapter_connected
            && self.ports.is_empty()
    }
}
