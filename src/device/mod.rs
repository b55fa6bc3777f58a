//! Access to the physical ports
//!
//! Everything that depends on the host operating system or on the serial driver lives behind
//! [PortProvider] and [SerialComm], so the rest of the crate can be driven by the in-memory
//! [mock] provider as easily as by real hardware.

mod serial_comm;
pub use serial_comm::{platform_candidates, PortProvider, SerialComm, ENUMERATION_BAUD_RATE};

#[cfg(feature = "serialport_comm")]
mod serialport_comm;
#[cfg(feature = "serialport_comm")]
pub use serialport_comm::{SerialPort, SerialPortProvider};

pub mod mock;

type Result<T> = std::result::Result<T, Error>;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[cfg(feature = "serialport_comm")]
    #[error("Serial port error: `{0:?}`")]
    Serialport(serialport::Error),
    #[error("IO error: `{0:?}`")]
    IO(std::io::Error),
    #[error("Communication error: `{0}`")]
    Communication(String),
    #[error("Device disconnected")]
    Disconnected,
}

#[cfg(feature = "serialport_comm")]
impl From<serialport::Error> for Error {
    fn from(e: serialport::Error) -> Self {
        Error::Serialport(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IO(e)
    }
}
