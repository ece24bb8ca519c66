//! Probes backed by the host operating system
//!
//! Serial ports come from the `serialport` crate with `/dev` fallbacks on
//! Linux. USB programmer and adapter detection matches vendor/product IDs
//! from sysfs and is only available on Linux; other platforms report
//! [`ProbeError::Unsupported`], which the scanner reads as "not detected".

use std::collections::HashSet;
#[cfg(target_os = "linux")]
use std::fs;
use std::net::{Ipv4Addr, SocketAddr, TcpStream};
#[cfg(target_os = "linux")]
use std::path::Path;
use std::time::Duration;

use super::{HardwareProbe, ProbeError};
use crate::config::ScannerConfig;

/// ST microelectronics USB vendor ID
pub const ST_VENDOR_ID: u16 = 0x0483;

/// Product ID of the STM32 system bootloader in DFU mode
pub const STM32_DFU_PRODUCT_ID: u16 = 0xdf11;

/// Product IDs of the ST-Link programmer family
pub const ST_LINK_PRODUCT_IDS: &[u16] = &[0x3744, 0x3748, 0x374b, 0x374e, 0x374f, 0x3752, 0x3753];

/// PEAK-System vendor ID (PCAN adapters)
pub const PEAK_VENDOR_ID: u16 = 0x0c72;

/// A USB device seen on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
}

/// Probes the real machine
#[derive(Debug, Clone)]
pub struct SystemProbe {
    simulator_port: u16,
    connect_timeout: Duration,
}

impl SystemProbe {
    /// Create a probe using the simulator port and timeout from `config`
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            simulator_port: config.simulator_port,
            connect_timeout: config.probe_timeout(),
        }
    }

    fn any_usb_device(&self, matches: impl Fn(UsbId) -> bool) -> Result<bool, ProbeError> {
        Ok(list_usb_devices()?.into_iter().any(matches))
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new(&ScannerConfig::default())
    }
}

impl HardwareProbe for SystemProbe {
    fn serial_ports(&self) -> Result<Vec<String>, ProbeError> {
        list_serial_ports()
    }

    fn simulator_ports(&self) -> Result<Vec<String>, ProbeError> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, self.simulator_port));
        match TcpStream::connect_timeout(&addr, self.connect_timeout) {
            Ok(_) => Ok(vec![self.simulator_port.to_string()]),
            Err(_) => Ok(Vec::new()),
        }
    }

    fn dfu_bootloader(&self) -> Result<bool, ProbeError> {
        self.any_usb_device(|id| id.vid == ST_VENDOR_ID && id.pid == STM32_DFU_PRODUCT_ID)
    }

    fn st_link(&self) -> Result<bool, ProbeError> {
        self.any_usb_device(|id| id.vid == ST_VENDOR_ID && ST_LINK_PRODUCT_IDS.contains(&id.pid))
    }

    fn can_adapter(&self) -> Result<bool, ProbeError> {
        self.any_usb_device(|id| id.vid == PEAK_VENDOR_ID)
    }
}

/// Sort key putting ttyACM* first, then ttyUSB* (both by numeric suffix),
/// then everything else by name
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List serial port names with /dev fallbacks and deterministic ordering
pub fn list_serial_ports() -> Result<Vec<String>, ProbeError> {
    let mut names: HashSet<String> = serialport::available_ports()?
        .into_iter()
        .map(|info| info.port_name)
        .collect();

    // udev-less containers may miss ports the kernel already created
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyACM") || fname.starts_with("ttyUSB") {
                    names.insert(format!("/dev/{}", fname));
                }
            }
        }
    }

    let mut v: Vec<String> = names.into_iter().collect();
    v.sort_by_key(|name| port_sort_key(name));
    Ok(v)
}

/// Enumerate USB devices from sysfs
#[cfg(target_os = "linux")]
pub fn list_usb_devices() -> Result<Vec<UsbId>, ProbeError> {
    list_usb_devices_in(Path::new("/sys/bus/usb/devices"))
}

/// Enumerate USB devices (unavailable on this platform)
#[cfg(not(target_os = "linux"))]
pub fn list_usb_devices() -> Result<Vec<UsbId>, ProbeError> {
    Err(ProbeError::Unsupported)
}

#[cfg(target_os = "linux")]
fn list_usb_devices_in(root: &Path) -> Result<Vec<UsbId>, ProbeError> {
    let mut devices = Vec::new();
    for entry in fs::read_dir(root)?.flatten() {
        let dir = entry.path();
        // Interfaces ("1-1:1.0") have no idVendor file and are skipped here
        let (Some(vid), Some(pid)) = (
            read_hex_id(&dir.join("idVendor")),
            read_hex_id(&dir.join("idProduct")),
        ) else {
            continue;
        };
        devices.push(UsbId { vid, pid });
    }
    Ok(devices)
}

#[cfg(target_os = "linux")]
fn read_hex_id(path: &Path) -> Option<u16> {
    let text = fs::read_to_string(path).ok()?;
    u16::from_str_radix(text.trim(), 16).ok()
}
