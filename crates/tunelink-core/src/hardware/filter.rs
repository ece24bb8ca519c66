//! Serial port name filtering
//!
//! Some platforms list virtual ports that never lead to an ECU (Bluetooth
//! incoming ports, Wi-Fi debug ports, macOS call-out devices). They are
//! dropped before a snapshot is built.

use serde::{Deserialize, Serialize};

/// One blacklist rule for serial port names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "match", content = "pattern", rename_all = "snake_case")]
pub enum PortFilter {
    /// Drop names containing the pattern anywhere
    Contains(String),
    /// Drop names whose last path component starts with the pattern
    Prefix(String),
}

impl PortFilter {
    /// The built-in blacklist
    pub fn defaults() -> Vec<PortFilter> {
        vec![
            PortFilter::Contains("wlan-debug".to_string()),
            PortFilter::Contains("Bluetooth-Incoming-Port".to_string()),
            PortFilter::Prefix("cu.".to_string()),
        ]
    }

    /// Whether this rule rejects `name`
    pub fn matches(&self, name: &str) -> bool {
        match self {
            PortFilter::Contains(pattern) => name.contains(pattern.as_str()),
            PortFilter::Prefix(pattern) => {
                // "/dev/cu.usbmodem1" and "cu.usbmodem1" name the same device
                let basename = name.rsplit('/').next().unwrap_or(name);
                basename.starts_with(pattern.as_str())
            }
        }
    }
}

/// Keep the names no filter rejects, preserving their order
pub fn filter_ports(names: Vec<String>, filters: &[PortFilter]) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| !filters.iter().any(|f| f.matches(name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_filters() {
        let kept = filter_ports(
            names(&[
                "/dev/tty.Bluetooth-Incoming-Port",
                "/dev/tty.wlan-debug",
                "cu.usbmodem1401",
                "/dev/cu.usbmodem1401",
                "/dev/tty.usbmodem1401",
                "COM3",
            ]),
            &PortFilter::defaults(),
        );
        assert_eq!(kept, names(&["/dev/tty.usbmodem1401", "COM3"]));
    }

    #[test]
    fn test_prefix_only_checks_start_of_basename() {
        let filter = PortFilter::Prefix("cu.".to_string());
        assert!(filter.matches("cu.debug"));
        assert!(!filter.matches("/dev/ttyACM0"));
        assert!(!filter.matches("/dev/tty.cu.thing"));
    }

    #[test]
    fn test_no_filters_keeps_everything() {
        let input = names(&["cu.a", "b"]);
        assert_eq!(filter_ports(input.clone(), &[]), input);
    }

    #[test]
    fn test_filter_serde_shape() {
        let json = serde_json::to_string(&PortFilter::Prefix("cu.".to_string())).unwrap();
        assert_eq!(json, r#"{"match":"prefix","pattern":"cu."}"#);
    }
}
