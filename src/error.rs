pub type Result<T> = std::result::Result<T, Error>;

/// An error managing a serial connection
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// An error occurred opening or talking to a port
    #[error("Device error: `{0:?}`")]
    Device(DeviceError),

    /// The host operating system has no known serial port naming scheme
    #[error("Unsupported platform `{0}`")]
    UnsupportedPlatform(String),

    /// An operation needed an open port and there was none
    #[error("Port is not open")]
    NotOpen,

    /// A negotiation is already running on this connection
    #[error("Negotiation already in progress")]
    NegotiationInProgress,

    /// The task runner could not start a background task
    #[error("Could not start task: `{0}`")]
    Task(String),

    /// Another error occurred
    #[error("Other serial error: `{0}`")]
    Other(String),
}

#[derive(Debug)]
pub struct DeviceError(crate::device::Error);

impl DeviceError {
    pub fn inner(&self) -> &crate::device::Error {
        &self.0
    }
}

impl From<crate::device::Error> for Error {
    fn from(e: crate::device::Error) -> Self {
        Error::Device(DeviceError(e))
    }
}
