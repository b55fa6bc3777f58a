use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::queue::SendItem;
use crate::{lock, Error, Result, SerialConnection};

/// Named requests a device understands
///
/// Each device owns its registry, so devices of the same kind can still differ.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct QueryRegistry {
    queries: HashMap<String, Vec<u8>>,
}

impl QueryRegistry {
    /// Register `payload` under `name`, returning the payload it replaced
    pub fn register(&mut self, name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        self.queries.insert(name.into(), payload.into())
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.queries.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.queries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

#[derive(Debug, Default)]
struct DeviceRecord {
    properties: HashMap<String, String>,
    status: HashMap<String, String>,
}

/// A device reached through a [SerialConnection]
///
/// Adds a query registry and in-memory property and status tables on top of the connection.
/// Clones share the tables.
#[derive(Clone)]
pub struct SerialDevice {
    connection: SerialConnection,
    queries: Arc<Mutex<QueryRegistry>>,
    record: Arc<Mutex<DeviceRecord>>,
}

impl SerialDevice {
    pub fn new(connection: SerialConnection) -> Self {
        Self {
            connection,
            queries: Arc::default(),
            record: Arc::default(),
        }
    }

    pub fn connection(&self) -> &SerialConnection {
        &self.connection
    }

    pub fn register_query(&self, name: impl Into<String>, payload: impl Into<Vec<u8>>) {
        let name = name.into();
        if lock(&self.queries).register(name.clone(), payload).is_some() {
            warn!("register_query: replaced query {}", name);
        }
    }

    pub fn queries(&self) -> QueryRegistry {
        lock(&self.queries).clone()
    }

    /// Queue the payload registered as `name`
    pub fn query(&self, name: &str) -> Result<()> {
        let payload = lock(&self.queries)
            .get(name)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| Error::Other(format!("unknown query {}", name)))?;
        debug!("query: {} -> {:?}", name, payload);
        self.connection.write_to_port(SendItem::new(payload));
        Ok(())
    }

    pub fn set_device_property(&self, name: impl Into<String>, value: impl Into<String>) {
        lock(&self.record).properties.insert(name.into(), value.into());
    }

    pub fn device_property(&self, name: &str) -> Option<String> {
        lock(&self.record).properties.get(name).cloned()
    }

    pub fn set_device_status(&self, name: impl Into<String>, value: impl Into<String>) {
        lock(&self.record).status.insert(name.into(), value.into());
    }

    pub fn device_status(&self, name: &str) -> Option<String> {
        lock(&self.record).status.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockProvider;
    use crate::test_util::wait_until;
    use crate::{ConnectionConfig, ThreadRunner};

    fn device(provider: &MockProvider) -> SerialDevice {
        SerialDevice::new(SerialConnection::with_provider(
            ConnectionConfig::default(),
            provider.clone(),
            ThreadRunner,
        ))
    }

    #[test]
    fn registries_are_per_device() {
        let provider = MockProvider::new();
        let a = device(&provider);
        let b = device(&provider);

        a.register_query("version", *b"V?\n");
        a.register_query("status", *b"S?\n");
        a.register_query("version", *b"VER?\n");
        let queries = a.queries();
        assert_eq!(queries.get("version"), Some(&b"VER?\n"[..]));
        assert_eq!(queries.len(), 2);
        let mut names: Vec<&str> = queries.names().collect();
        names.sort_unstable();
        assert_eq!(names, ["status", "version"]);
        assert!(b.queries().is_empty());
        assert!(b.query("version").is_err());
    }

    #[test]
    fn query_queues_registered_payload() {
        let provider = MockProvider::new();
        let port = provider.add_device("COM7");
        let device = device(&provider);
        device.register_query("temperature", *b"T?\n");

        device.query("temperature").unwrap();
        assert_eq!(device.connection().pending_writes(), 1);

        device.connection().open_port("COM7", 9_600).unwrap();
        assert!(wait_until(|| port.written() == b"T?\n"));
    }

    #[test]
    fn properties_and_status() {
        let provider = MockProvider::new();
        let device = device(&provider);
        device.set_device_property("serial", "A1234");
        device.set_device_status("mode", "idle");
        device.set_device_status("mode", "running");

        assert_eq!(device.device_property("serial").as_deref(), Some("A1234"));
        assert_eq!(device.device_status("mode").as_deref(), Some("running"));
        assert_eq!(device.device_status("serial"), None);
    }
}
