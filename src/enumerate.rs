use std::collections::HashSet;

use log::{debug, trace};

use crate::device::{PortProvider, ENUMERATION_BAUD_RATE};
use crate::Result;

/// Lists the ports that could carry a device right now
pub struct PortEnumerator<'a> {
    provider: &'a dyn PortProvider,
}

impl<'a> PortEnumerator<'a> {
    pub fn new(provider: &'a dyn PortProvider) -> Self {
        Self { provider }
    }

    /// Candidate ports not in `ignore` that can be opened and closed again
    ///
    /// Opening only proves the port exists and is free, not that the wanted device is behind it.
    pub fn enumerate(&self, ignore: &HashSet<String>) -> Result<HashSet<String>> {
        let candidates: HashSet<String> = self.provider.candidates()?.into_iter().collect();

        let ports: HashSet<String> = candidates
            .difference(ignore)
            .filter(|port| match self.provider.open(port, ENUMERATION_BAUD_RATE) {
                Ok(handle) => {
                    drop(handle);
                    true
                }
                Err(e) => {
                    trace!("enumerate: skipping {}: {:?}", port, e);
                    false
                }
            })
            .cloned()
            .collect();

        debug!("enumerate: available ports {:?}", ports);
        Ok(ports)
    }
}

/// Shortcut for [PortEnumerator::enumerate]
pub fn available_ports(provider: &dyn PortProvider, ignore: &HashSet<String>) -> Result<HashSet<String>> {
    PortEnumerator::new(provider).enumerate(ignore)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockProvider;

    #[test]
    fn drops_ignored_and_unopenable_ports() {
        let provider = MockProvider::new();
        provider.add_device("/dev/ttyUSB0");
        provider.add_device("/dev/ttyUSB1").unplug();
        provider.add_device("/dev/ttyACM0");
        provider.add_device("/dev/ttyS0").fail_opens(1);

        let ignore = HashSet::from(["/dev/ttyACM0".to_owned()]);
        let ports = available_ports(&provider, &ignore).unwrap();

        assert_eq!(ports, HashSet::from(["/dev/ttyUSB0".to_owned()]));
    }

    #[test]
    fn every_result_opens_and_closes_again() {
        let provider = MockProvider::new();
        for path in ["COM1", "COM2", "COM3"] {
            provider.add_device(path);
        }

        let ports = available_ports(&provider, &HashSet::new()).unwrap();
        assert_eq!(ports.len(), 3);
        for port in &ports {
            let device = provider.device(port).unwrap();
            assert_eq!(device.open_handles(), 0);
            assert_eq!(device.opens(), vec![ENUMERATION_BAUD_RATE]);
            let handle = provider.open(port, ENUMERATION_BAUD_RATE).unwrap();
            drop(handle);
            assert_eq!(device.open_handles(), 0);
        }
    }
}
