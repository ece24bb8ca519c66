//! Serial port handling
//!
//! Opens and configures serial ports for ECU communication.

use serialport::SerialPort;
use tracing::debug;

use super::{TransportError, DEFAULT_BAUD_RATE};
use crate::config::TransportConfig;

/// Open a serial port and configure it 8N1 without flow control
pub fn open_port(
    name: &str,
    config: &TransportConfig,
) -> Result<Box<dyn SerialPort>, TransportError> {
    let baud = if config.baud_rate == 0 {
        debug!("open_port: baud rate 0, using {}", DEFAULT_BAUD_RATE);
        DEFAULT_BAUD_RATE
    } else {
        config.baud_rate
    };

    let mut port = serialport::new(name, baud)
        .timeout(config.timeout())
        .open()?;
    configure_port(port.as_mut())?;
    Ok(port)
}

/// Configure a serial port for ECU communication
pub fn configure_port(port: &mut dyn SerialPort) -> Result<(), TransportError> {
    port.set_data_bits(serialport::DataBits::Eight)?;
    port.set_parity(serialport::Parity::None)?;
    port.set_stop_bits(serialport::StopBits::One)?;
    port.set_flow_control(serialport::FlowControl::None)?;

    // Opening a port toggles DTR, which resets Arduino-style boards.
    // Holding DTR and RTS high keeps the ECU out of its bootloader.
    if let Err(e) = port.write_data_terminal_ready(true) {
        debug!("configure_port: failed to set DTR high: {} (continuing)", e);
    }
    if let Err(e) = port.write_request_to_send(true) {
        debug!("configure_port: failed to set RTS high: {} (continuing)", e);
    }

    Ok(())
}

/// Discard anything buffered in either direction
pub fn clear_buffers(port: &mut dyn SerialPort) -> Result<(), TransportError> {
    port.clear(serialport::ClearBuffer::All)?;
    Ok(())
}
