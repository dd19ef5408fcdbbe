//! # Serial Bridge Transport
//!
//! Mirrors PIF RAM over a serial link to a bridge microcontroller that owns
//! the physical joybus lines.
//!
//! Link protocol:
//! - write: the full 64-byte RAM image, which the bridge executes
//! - read: the request byte `0x52`, answered with the 64-byte result image

use std::io::{Read, Write};
use std::time::Duration;

use tracing::{debug, info};

use super::transport::{Direction, Transport};
use crate::error::{JoybusError, Result};
use crate::pif::protocol::PifFrame;

/// Default link speed
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Byte asking the bridge to send back PIF RAM
pub const BRIDGE_READ_REQUEST: u8 = 0x52;

/// Reply timeout for one transfer
const LINK_TIMEOUT: Duration = Duration::from_millis(100);

/// Transport over a serial bridge
pub struct SerialTransport<P = Box<dyn tokio_serial::SerialPort>> {
    port: P,
    device_path: String,
    held: bool,
}

impl<P> std::fmt::Debug for SerialTransport<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("device_path", &self.device_path)
            .field("held", &self.held)
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    /// Open the bridge at `path`
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joybus_bridge::bus::serial::{SerialTransport, DEFAULT_BAUD_RATE};
    ///
    /// fn main() -> anyhow::Result<()> {
    ///     let transport = SerialTransport::open("/dev/ttyACM0", DEFAULT_BAUD_RATE)?;
    ///     println!("{}", transport.device_path());
    ///     Ok(())
    /// }
    /// ```
    pub fn open(path: &str, baud_rate: u32) -> Result<Self> {
        debug!("Opening joybus bridge at {} ({} baud)", path, baud_rate);
        let port = tokio_serial::new(path, baud_rate)
            .data_bits(tokio_serial::DataBits::Eight)
            .parity(tokio_serial::Parity::None)
            .stop_bits(tokio_serial::StopBits::One)
            .flow_control(tokio_serial::FlowControl::None)
            .timeout(LINK_TIMEOUT)
            .open()
            .map_err(|e| JoybusError::Serial(format!("Failed to open {}: {}", path, e)))?;

        info!("Opened joybus bridge at {}", path);
        Ok(Self::from_port(port, path))
    }
}

impl<P: Read + Write> SerialTransport<P> {
    /// Wrap an already open port.
    pub fn from_port(port: P, device_path: &str) -> Self {
        Self {
            port,
            device_path: device_path.to_string(),
            held: false,
        }
    }

    pub fn device_path(&self) -> &str {
        &self.device_path
    }

    fn link_error(&self, action: &str, e: std::io::Error) -> JoybusError {
        JoybusError::Serial(format!("{} on {} failed: {}", action, self.device_path, e))
    }
}

impl<P: Read + Write> Transport for SerialTransport<P> {
    fn acquire(&mut self) -> Result<()> {
        if self.held {
            return Err(JoybusError::Transport(format!("{} is already held", self.device_path)));
        }
        self.held = true;
        Ok(())
    }

    fn release(&mut self) {
        self.held = false;
    }

    fn start_dma(&mut self, direction: Direction, frame: &mut PifFrame) -> Result<()> {
        match direction {
            Direction::Write => {
                let result = self.port.write_all(frame.as_bytes()).and_then(|_| self.port.flush());
                result.map_err(|e| self.link_error("Write", e))
            }
            Direction::Read => {
                let result = self
                    .port
                    .write_all(&[BRIDGE_READ_REQUEST])
                    .and_then(|_| self.port.flush())
                    .and_then(|_| self.port.read_exact(frame.as_bytes_mut()));
                result.map_err(|e| self.link_error("Read", e))
            }
        }
    }

    fn wait_complete(&mut self) -> Result<()> {
        // Transfers finish inside start_dma
        Ok(())
    }
}
