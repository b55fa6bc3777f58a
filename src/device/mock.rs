//! In-memory ports for tests and simulations
//!
//! A [MockProvider] owns a set of named [MockDevice]s. A device only talks at its configured baud
//! rate: opened at any other rate it accepts writes but never answers, which is how a real device
//! at the wrong baud behaves from the host's point of view.

use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::{Arc, Mutex};

use log::trace;

use super::serial_comm::{PortProvider, SerialComm};
use super::{Error, Result};
use crate::lock;

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

#[derive(Default)]
struct DeviceState {
    baud_rate: Option<u32>,
    present: bool,
    failing_opens: usize,
    failing_writes: usize,
    opens: Vec<u32>,
    open_handles: usize,
    rx: VecDeque<u8>,
    written: Vec<u8>,
    writes: Vec<Vec<u8>>,
    responder: Option<Responder>,
}

/// Handle to one simulated device
#[derive(Clone)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

impl MockDevice {
    fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                present: true,
                ..Default::default()
            })),
        }
    }

    /// Only exchange data when opened at `baud_rate`
    pub fn talks_at(&self, baud_rate: u32) -> &Self {
        lock(&self.state).baud_rate = Some(baud_rate);
        self
    }

    /// Answer every write with the bytes returned by `responder`
    pub fn respond_with(&self, responder: impl FnMut(&[u8]) -> Vec<u8> + Send + 'static) -> &Self {
        lock(&self.state).responder = Some(Box::new(responder));
        self
    }

    /// Make the next `count` opens fail
    pub fn fail_opens(&self, count: usize) -> &Self {
        lock(&self.state).failing_opens = count;
        self
    }

    /// Make the next `count` writes fail
    pub fn fail_writes(&self, count: usize) -> &Self {
        lock(&self.state).failing_writes = count;
        self
    }

    /// Queue bytes for the host to read
    pub fn push_rx(&self, data: &[u8]) {
        lock(&self.state).rx.extend(data);
    }

    /// Remove the device; open handles start failing
    pub fn unplug(&self) {
        lock(&self.state).present = false;
    }

    /// Put the device back; it can be opened again
    pub fn plug_in(&self) {
        lock(&self.state).present = true;
    }

    /// Baud rates of every successful open, in order
    pub fn opens(&self) -> Vec<u32> {
        lock(&self.state).opens.clone()
    }

    /// Number of handles currently open
    pub fn open_handles(&self) -> usize {
        lock(&self.state).open_handles
    }

    /// Every byte successfully written, concatenated
    pub fn written(&self) -> Vec<u8> {
        lock(&self.state).written.clone()
    }

    /// Every successful write call, in order
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.state).writes.clone()
    }
}

/// A [PortProvider] backed by [MockDevice]s
#[derive(Clone, Default)]
pub struct MockProvider {
    devices: Arc<Mutex<BTreeMap<String, MockDevice>>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device at `path`, or return the existing one
    pub fn add_device(&self, path: &str) -> MockDevice {
        lock(&self.devices)
            .entry(path.to_owned())
            .or_insert_with(MockDevice::new)
            .clone()
    }

    pub fn device(&self, path: &str) -> Option<MockDevice> {
        lock(&self.devices)
            .get(path)
            .cloned()
    }
}

impl PortProvider for MockProvider {
    fn candidates(&self) -> crate::Result<Vec<String>> {
        Ok(lock(&self.devices).keys().cloned().collect())
    }

    fn open(&self, path: &str, baud_rate: u32) -> Result<Box<dyn SerialComm>> {
        let device = self.device(path).ok_or_else(|| {
            Error::IO(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such device {}", path),
            ))
        })?;

        let mut state = lock(&device.state);
        if !state.present {
            return Err(Error::Disconnected);
        }
        if state.failing_opens > 0 {
            state.failing_opens -= 1;
            return Err(Error::Communication(format!("{} is busy", path)));
        }
        state.opens.push(baud_rate);
        state.open_handles += 1;
        trace!("mock: opened {} at {}", path, baud_rate);
        drop(state);

        Ok(Box::new(MockPort {
            state: device.state,
            baud_rate,
        }))
    }
}

struct MockPort {
    state: Arc<Mutex<DeviceState>>,
    baud_rate: u32,
}

impl MockPort {
    fn in_sync(&self, state: &DeviceState) -> bool {
        state.baud_rate.map_or(true, |b| b == self.baud_rate)
    }
}

impl SerialComm for MockPort {
    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.present {
            return Err(Error::Disconnected);
        }
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(Error::IO(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "simulated write fault",
            )));
        }
        state.written.extend_from_slice(data);
        state.writes.push(data.to_vec());

        if self.in_sync(&state) {
            if let Some(mut responder) = state.responder.take() {
                let reply = responder(data);
                state.rx.extend(reply);
                state.responder = Some(responder);
            }
        }
        Ok(())
    }

    fn read(&mut self, data: &mut [u8]) -> Result<usize> {
        let mut state = lock(&self.state);
        if !state.present {
            return Err(Error::Disconnected);
        }
        if !self.in_sync(&state) {
            return Ok(0);
        }
        let mut len = 0;
        while len < data.len() {
            let Some(b) = state.rx.pop_front() else { break };
            data[len] = b;
            len += 1;
        }
        Ok(len)
    }
}

impl Drop for MockPort {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.open_handles = state.open_handles.saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_at_wrong_baud() {
        let provider = MockProvider::new();
        let device = provider.add_device("/dev/ttyMOCK0");
        device.talks_at(115_200).respond_with(|d| d.to_vec());

        let mut port = provider.open("/dev/ttyMOCK0", 9_600).unwrap();
        port.write_all(b"hi").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(port.read(&mut buf).unwrap(), 0);

        let mut port = provider.open("/dev/ttyMOCK0", 115_200).unwrap();
        port.write_all(b"hi").unwrap();
        assert_eq!(port.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"hi");

        assert_eq!(device.opens(), vec![9_600, 115_200]);
    }

    #[test]
    fn handles_are_counted() {
        let provider = MockProvider::new();
        let device = provider.add_device("COM3");
        let port = provider.open("COM3", 9_600).unwrap();
        assert_eq!(device.open_handles(), 1);
        drop(port);
        assert_eq!(device.open_handles(), 0);
    }

    #[test]
    fn unknown_and_unplugged_devices_fail_to_open() {
        let provider = MockProvider::new();
        assert!(provider.open("COM9", 9_600).is_err());

        let device = provider.add_device("COM9");
        device.unplug();
        assert!(matches!(provider.open("COM9", 9_600), Err(Error::Disconnected)));
    }
}
