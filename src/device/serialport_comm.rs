use super::serial_comm::{platform_candidates, PortProvider, SerialComm};
use super::{Error, Result};
use log::trace;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Communicate with a serial device using the
/// serialport library
///
/// /dev/tty* or similar on unix-like systems
/// COM devices on Windows systems
pub struct SerialPort {
    device: Box<dyn serialport::SerialPort>,
}

impl SerialPort {
    /// Opens `path` at `baud_rate`, 8N1, with a zero read timeout
    pub fn new(path: &str, baud_rate: u32) -> Result<Self> {
        let device = serialport::new(path, baud_rate)
            .timeout(Duration::ZERO)
            .parity(serialport::Parity::None)
            .data_bits(serialport::DataBits::Eight)
            .stop_bits(serialport::StopBits::One)
            .open()?;

        Ok(Self { device })
    }
}

impl SerialComm for SerialPort {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.device.write_all(data)?;
        Ok(self.device.flush()?)
    }

    fn read(&mut self, data: &mut [u8]) -> Result<usize> {
        match self.device.read(data) {
            Ok(len) => Ok(len),
            // a zero timeout reports an empty input queue as a timeout
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

/// [PortProvider] for the ports of the host, opened with [SerialPort]
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPortProvider;

impl PortProvider for SerialPortProvider {
    fn candidates(&self) -> crate::Result<Vec<String>> {
        let found = serialport::available_ports().map_err(Error::from)?;
        trace!("candidates: driver reports {:?}", found);
        platform_candidates(
            std::env::consts::OS,
            found.into_iter().map(|info| info.port_name),
        )
    }

    fn open(&self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialComm>> {
        Ok(Box::new(SerialPort::new(path, baud_rate)?))
    }
}
