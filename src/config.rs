use std::time::Duration;

/// Rates tried during negotiation, in scan order
pub const POSSIBLE_BAUD_RATES: [u32; 11] = [
    460_800, 230_400, 115_200, 57_600, 38_400, 19_200, 14_400, 9_600, 4_800, 2_400, 1_200,
];

pub const DEFAULT_RETRIES: usize = 3;

/// Pause between two passes of the port I/O loop
pub const PORT_READ_TIME: Duration = Duration::from_millis(10);

/// Pause after a port fails to open during the baud scan
pub const FAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Settings for a [SerialConnection](crate::SerialConnection)
///
/// The defaults scan every rate of [POSSIBLE_BAUD_RATES] three times, poll the port every 10 ms,
/// back off for one second after a port fault, and look for the device on every port when
/// attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Port to try first when attaching
    pub port: Option<String>,
    /// Search all ports when attaching without a known port (or when it fails)
    pub auto_port: bool,
    pub baud_rates: Vec<u32>,
    pub retries: usize,
    pub loop_interval: Duration,
    pub fault_backoff: Duration,
    /// Ports never touched by automatic search
    pub excluded_ports: Vec<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: None,
            auto_port: true,
            baud_rates: POSSIBLE_BAUD_RATES.to_vec(),
            retries: DEFAULT_RETRIES,
            loop_interval: PORT_READ_TIME,
            fault_backoff: FAULT_BACKOFF,
            excluded_ports: Vec::new(),
        }
    }
}

impl ConnectionConfig {
    pub fn port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn auto_port(mut self, auto_port: bool) -> Self {
        self.auto_port = auto_port;
        self
    }

    pub fn baud_rates(mut self, baud_rates: impl Into<Vec<u32>>) -> Self {
        self.baud_rates = baud_rates.into();
        self
    }

    pub fn retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }

    pub fn loop_interval(mut self, interval: Duration) -> Self {
        self.loop_interval = interval;
        self
    }

    pub fn fault_backoff(mut self, backoff: Duration) -> Self {
        self.fault_backoff = backoff;
        self
    }

    pub fn exclude_port(mut self, port: impl Into<String>) -> Self {
        self.excluded_ports.push(port.into());
        self
    }
}
