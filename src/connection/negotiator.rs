//! Finding the port and baud rate of the device

use std::collections::HashSet;
use std::sync::atomic::Ordering;
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread;

use log::{debug, error, info, warn};

use super::{Shared, SerialConnection};
use crate::enumerate::PortEnumerator;
use crate::{lock, Error, Result};

/// Progress of the most recent negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationState {
    Idle,
    ScanningPort,
    ScanningBaud,
    Verifying,
    Connected,
    Failed,
}

/// Marks a connection as negotiating for as long as it lives
struct NegotiationGuard {
    shared: Arc<Shared>,
}

impl NegotiationGuard {
    fn acquire(shared: &Arc<Shared>) -> Result<Self> {
        shared
            .negotiating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::NegotiationInProgress)?;
        Ok(Self {
            shared: Arc::clone(shared),
        })
    }
}

impl Drop for NegotiationGuard {
    fn drop(&mut self) {
        self.shared.negotiating.store(false, Ordering::Release);
    }
}

impl SerialConnection {
    /// Search every available port not in `excluded` for the device, blocking until done
    ///
    /// Ports listed in [ConnectionConfig::excluded_ports](crate::ConnectionConfig) are skipped as
    /// well. Returns the port the connection is now open on, or `None` when no port and baud rate
    /// passed the connection checks.
    pub fn find_port(&self, excluded: &HashSet<String>, retries: usize) -> Result<Option<String>> {
        let _guard = NegotiationGuard::acquire(&self.shared)?;
        self.scan_ports(excluded, retries)
    }

    /// Like [find_port](Self::find_port), but runs on the task runner
    ///
    /// The outcome is sent on the returned channel; dropping the receiver just discards it.
    pub fn find_port_in_background(
        &self,
        excluded: HashSet<String>,
        retries: usize,
    ) -> Result<Receiver<Option<String>>> {
        let guard = NegotiationGuard::acquire(&self.shared)?;
        let (tx, rx) = mpsc::channel();
        let connection = self.clone();

        self.shared.runner.run_task(
            "serial-negotiate",
            Box::new(move || {
                let _guard = guard;
                let found = connection
                    .scan_ports(&excluded, retries)
                    .unwrap_or_else(|e| {
                        error!("find_port: {}", e);
                        connection.set_negotiation(NegotiationState::Failed);
                        None
                    });
                // nobody listening is fine
                let _ = tx.send(found);
            }),
            false,
        )?;
        Ok(rx)
    }

    /// Try every baud rate on `port`, `retries` times over, until the connection checks pass
    pub fn connect_to_port(&self, port: &str, retries: usize) -> Result<Option<String>> {
        let _guard = NegotiationGuard::acquire(&self.shared)?;
        Ok(self.try_port(port, retries))
    }

    pub fn negotiation_state(&self) -> NegotiationState {
        *lock(&self.shared.negotiation)
    }

    /// Connect to the configured port, falling back to searching all ports
    ///
    /// The search only starts when [auto_port](crate::ConnectionConfig::auto_port) is set and an
    /// interpreter is installed, and then runs in the background.
    pub fn attach(&self) -> Result<()> {
        let retries = self.shared.config.retries;
        if let Some(port) = self.shared.config.port.clone() {
            self.connect_to_port(&port, retries)?;
        }

        if !self.is_connected() && self.shared.config.auto_port && self.has_interpreter() {
            self.find_port_in_background(HashSet::new(), retries)?;
        }
        Ok(())
    }

    pub(super) fn set_negotiation(&self, state: NegotiationState) {
        *lock(&self.shared.negotiation) = state;
    }

    fn scan_ports(&self, excluded: &HashSet<String>, retries: usize) -> Result<Option<String>> {
        self.set_negotiation(NegotiationState::ScanningPort);

        let mut ignore = excluded.clone();
        ignore.extend(self.shared.config.excluded_ports.iter().cloned());

        let mut ports: Vec<String> = PortEnumerator::new(self.shared.provider.as_ref())
            .enumerate(&ignore)?
            .into_iter()
            .collect();
        ports.sort();

        for port in ports {
            if let Some(port) = self.try_port(&port, retries) {
                return Ok(Some(port));
            }
        }

        info!("find_port: no device found");
        self.set_negotiation(NegotiationState::Failed);
        Ok(None)
    }

    fn try_port(&self, port: &str, retries: usize) -> Option<String> {
        let config = &self.shared.config;
        self.set_negotiation(NegotiationState::ScanningPort);

        for attempt in 1..=retries {
            debug!("try connecting to port {} try {}/{}", port, attempt, retries);
            for &baud_rate in &config.baud_rates {
                debug!("try connecting to port {} with baud {}", port, baud_rate);
                self.set_negotiation(NegotiationState::ScanningBaud);

                if let Err(e) = self.open_port(port, baud_rate) {
                    warn!("cannot open {} with baud {}: {}", port, baud_rate, e);
                    thread::sleep(config.fault_backoff);
                    continue;
                }

                self.set_negotiation(NegotiationState::Verifying);
                if self.run_checks() && self.mark_connected(port) {
                    info!("successfully connected to {} with baud {}", port, baud_rate);
                    self.set_negotiation(NegotiationState::Connected);
                    self.notify_connected();
                    return Some(port.to_owned());
                }

                debug!("checks failed on {} with baud {}", port, baud_rate);
                self.stop_read(true);
                // whatever arrived at this rate must not prefix the next one
                lock(&self.shared.read_buffer).take();
            }
        }

        self.set_negotiation(NegotiationState::Failed);
        None
    }

    fn run_checks(&self) -> bool {
        lock(&self.shared.checks)
            .iter_mut()
            .all(|check| check.check())
    }

    /// Flag the connection as verified if `port` is still the one open
    fn mark_connected(&self, port: &str) -> bool {
        let mut state = lock(&self.shared.state);
        if state.is_open && state.port.as_deref() == Some(port) {
            state.connected = true;
            true
        } else {
            false
        }
    }

    fn notify_connected(&self) {
        if let Some(callback) = lock(&self.shared.on_connect).as_mut() {
            callback();
        }
    }
}
