//! Serial port for the engraver

use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use crate::error::{DriverError, Result};

/// Line speed of the engraver's USB serial bridge.
pub const BAUD_RATE: u32 = 115_200;

/// Ports tried when no device is given.
pub fn default_devices() -> &'static [&'static str] {
    if cfg!(windows) {
        &["COM3"]
    } else if cfg!(target_os = "linux") {
        &["/dev/ttyUSB0", "/dev/ttyUSB1"]
    } else {
        &[]
    }
}

/// Open `dev`, or the first default device that opens.
pub fn open(dev: Option<&str>) -> Result<SerialStream> {
    let devices: Vec<&str> = match dev {
        Some(d) => vec![d],
        None => default_devices().to_vec(),
    };
    let mut first_err = None;
    for d in devices {
        let port = tokio_serial::new(d, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async();
        match port {
            Ok(p) => {
                tracing::info!("Opened engraver at {}", d);
                return Ok(p);
            }
            Err(e) => {
                tracing::debug!("Failed to open {}: {}", d, e);
                first_err.get_or_insert(e);
            }
        }
    }
    Err(first_err.map_or(DriverError::NoDevice, DriverError::Serial))
}
