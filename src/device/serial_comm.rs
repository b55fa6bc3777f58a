use log::trace;

use super::Result;

/// Baud rate used when checking whether a candidate port can be opened at all
pub const ENUMERATION_BAUD_RATE: u32 = 9_600;

/// An API to communicate with an open serial device
///
/// Dropping the value closes the port.
pub trait SerialComm: Send {
    fn write_all(&mut self, data: &[u8]) -> Result<()>;

    /// Read whatever is available without waiting
    ///
    /// Returns `Ok(0)` when no bytes are pending.
    fn read(&mut self, data: &mut [u8]) -> Result<usize>;
}

/// Source of serial ports: what exists and how to open it
pub trait PortProvider: Send + Sync {
    /// Raw candidate identifiers, before any liveness filtering
    fn candidates(&self) -> crate::Result<Vec<String>>;

    /// Open `path` at `baud_rate` with non-blocking reads
    fn open(&self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialComm>>;
}

/// Candidate device names following the naming scheme of `os`
///
/// `os` takes the values of [std::env::consts::OS]; `found` are the ports the driver reported.
/// Windows gets every `COM` name whether reported or not, unix-likes only the reported `tty`
/// devices.
pub fn platform_candidates(
    os: &str,
    found: impl IntoIterator<Item = String>,
) -> crate::Result<Vec<String>> {
    let mut ports: Vec<String> = match os {
        "windows" => (1..=256)
            .map(|i| format!("COM{}", i))
            .chain(found.into_iter().filter(|name| name.starts_with("COM")))
            .collect(),
        // `tty` followed by a letter, which leaves out the controlling terminal `/dev/tty`
        "linux" | "android" | "cygwin" => found
            .into_iter()
            .filter(|name| {
                name.strip_prefix("/dev/tty")
                    .and_then(|rest| rest.chars().next())
                    .is_some_and(|c| c.is_ascii_alphabetic())
            })
            .collect(),
        "macos" => found
            .into_iter()
            .filter(|name| name.starts_with("/dev/tty."))
            .collect(),
        other => return Err(crate::Error::UnsupportedPlatform(other.to_owned())),
    };
    ports.sort();
    ports.dedup();

    trace!("platform_candidates: {} candidates for {}", ports.len(), os);
    Ok(ports)
}
