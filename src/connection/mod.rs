//! A self-healing connection to one serial device
//!
//! [SerialConnection] finds the port and baud rate of a device (see [negotiator]), keeps a
//! background loop exchanging data with it (see [io_loop]) and reopens the port whenever that loop
//! stops on a fault.

use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, Weak};

use log::{error, info, trace};

use crate::device::{PortProvider, SerialComm};
use crate::queue::{ReadBuffer, SendQueue, Sendable};
use crate::runner::TaskRunner;
use crate::{lock, ConnectionCheck, ConnectionConfig, Interpreter, Result};

mod io_loop;
mod negotiator;
pub use negotiator::NegotiationState;

/// Snapshot of where a connection stands
///
/// `connected` implies `is_open`, which implies `port` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    pub connected: bool,
    pub is_open: bool,
}

/// Result of reading one byte from the port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// There is no open port (or it was replaced by a newer one)
    NotOpen,
    /// The port is open but nothing is waiting
    NoData,
    Byte(u8),
}

#[derive(Default)]
struct PortState {
    handle: Option<Box<dyn SerialComm>>,
    port: Option<String>,
    baud_rate: Option<u32>,
    is_open: bool,
    connected: bool,
    /// Incremented on every open; identifies the I/O loop that owns the handle
    session: u64,
}

impl PortState {
    fn owned_by(&self, session: u64) -> bool {
        self.is_open && self.session == session
    }
}

type ConnectCallback = Box<dyn FnMut() + Send>;

pub(crate) struct Shared {
    config: ConnectionConfig,
    provider: Box<dyn PortProvider>,
    runner: Box<dyn TaskRunner>,
    state: Mutex<PortState>,
    send_queue: Mutex<SendQueue>,
    read_buffer: Mutex<ReadBuffer>,
    interpreter: Mutex<Option<Box<dyn Interpreter>>>,
    checks: Mutex<Vec<Box<dyn ConnectionCheck>>>,
    on_connect: Mutex<Option<ConnectCallback>>,
    negotiation: Mutex<NegotiationState>,
    negotiating: AtomicBool,
}

/// Handle to a serial connection
///
/// Clones share the same connection. The port is closed once every handle is dropped, or earlier
/// with [detach](Self::detach).
#[derive(Clone)]
pub struct SerialConnection {
    shared: Arc<Shared>,
}

impl SerialConnection {
    /// A connection to the host's serial ports, with background work on [ThreadRunner](crate::ThreadRunner)
    #[cfg(feature = "serialport_comm")]
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_provider(config, crate::device::SerialPortProvider, crate::ThreadRunner)
    }

    pub fn with_provider(
        config: ConnectionConfig,
        provider: impl PortProvider + 'static,
        runner: impl TaskRunner + 'static,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                provider: Box::new(provider),
                runner: Box::new(runner),
                state: Mutex::default(),
                send_queue: Mutex::default(),
                read_buffer: Mutex::default(),
                interpreter: Mutex::new(None),
                checks: Mutex::default(),
                on_connect: Mutex::new(None),
                negotiation: Mutex::new(NegotiationState::Idle),
                negotiating: AtomicBool::new(false),
            }),
        }
    }

    fn upgrade(shared: &Weak<Shared>) -> Option<Self> {
        shared.upgrade().map(|shared| Self { shared })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    pub fn state(&self) -> ConnectionState {
        let state = lock(&self.shared.state);
        ConnectionState {
            port: state.port.clone(),
            baud_rate: state.baud_rate,
            connected: state.connected,
            is_open: state.is_open,
        }
    }

    pub fn is_open(&self) -> bool {
        lock(&self.shared.state).is_open
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared.state).connected
    }

    pub fn port(&self) -> Option<String> {
        lock(&self.shared.state).port.clone()
    }

    pub fn baud_rate(&self) -> Option<u32> {
        lock(&self.shared.state).baud_rate
    }

    /// Install the interpreter fed with every byte read
    ///
    /// Without an interpreter, read bytes accumulate in the read buffer. Must not be called from
    /// inside [Interpreter::decode_data].
    pub fn set_interpreter(&self, interpreter: impl Interpreter + 'static) {
        *lock(&self.shared.interpreter) = Some(Box::new(interpreter));
    }

    pub fn has_interpreter(&self) -> bool {
        lock(&self.shared.interpreter).is_some()
    }

    /// Add a check that must pass before a port and baud rate are accepted
    ///
    /// Checks must not add further checks from inside [ConnectionCheck::check].
    pub fn add_connection_check(&self, check: impl ConnectionCheck + 'static) {
        lock(&self.shared.checks).push(Box::new(check));
    }

    /// Called once every time a negotiation succeeds
    pub fn set_on_connect(&self, callback: impl FnMut() + Send + 'static) {
        *lock(&self.shared.on_connect) = Some(Box::new(callback));
    }

    /// Queue `item` for the I/O loop
    pub fn write_to_port(&self, item: impl Sendable + 'static) {
        lock(&self.shared.send_queue).push(Box::new(item));
    }

    /// Number of queued items not written yet
    pub fn pending_writes(&self) -> usize {
        lock(&self.shared.send_queue).len()
    }

    /// Bytes read but not consumed by the interpreter
    pub fn read_buffer(&self) -> Vec<u8> {
        lock(&self.shared.read_buffer).as_slice().to_vec()
    }

    /// Close the port and keep it closed
    pub fn detach(&self) {
        self.stop_read(true);
        self.set_negotiation(NegotiationState::Idle);
    }

    /// Close the port, then reopen it at the same port and baud rate unless `permanently`
    pub fn stop_read(&self, permanently: bool) {
        let mut state = lock(&self.shared.state);
        self.stop_locked(&mut state, permanently);
    }

    /// Open `port` at `baud_rate` and start its I/O loop, closing whatever was open
    pub(crate) fn open_port(&self, port: &str, baud_rate: u32) -> Result<()> {
        let mut state = lock(&self.shared.state);
        self.open_locked(&mut state, port, baud_rate)
    }

    fn open_locked(&self, state: &mut PortState, port: &str, baud_rate: u32) -> Result<()> {
        if state.handle.is_some() || state.is_open {
            close_locked(state);
        }

        let handle = self.shared.provider.open(port, baud_rate)?;
        state.handle = Some(handle);
        state.port = Some(port.to_owned());
        state.baud_rate = Some(baud_rate);
        state.is_open = true;
        state.session += 1;
        trace!("open_port: {} at {} (session {})", port, baud_rate, state.session);

        let session = state.session;
        let shared = Arc::downgrade(&self.shared);
        let started = self.shared.runner.spawn(
            "serial-io",
            Box::new(move || io_loop::work_port(shared, session)),
        );
        if let Err(e) = started {
            close_locked(state);
            return Err(e);
        }
        Ok(())
    }

    fn stop_locked(&self, state: &mut PortState, permanently: bool) {
        let target = match (&state.handle, &state.port, state.baud_rate) {
            (Some(_), Some(port), Some(baud_rate)) => Some((port.clone(), baud_rate)),
            _ => None,
        };
        let was_connected = state.connected;
        close_locked(state);

        if permanently {
            return;
        }
        if let Some((port, baud_rate)) = target {
            match self.open_locked(state, &port, baud_rate) {
                Ok(()) => {
                    state.connected = was_connected;
                    info!("reopened {} with baud {}", port, baud_rate);
                }
                Err(e) => {
                    error!("could not reopen {} with baud {}: {}", port, baud_rate, e);
                    self.set_negotiation(NegotiationState::Failed);
                }
            }
        }
    }

    /// Fault recovery for the loop of `session`, unless a newer open replaced it
    fn recover(&self, session: u64) {
        let mut state = lock(&self.shared.state);
        if state.session != session {
            trace!("recover: session {} was replaced", session);
            return;
        }
        self.stop_locked(&mut state, false);
    }

    fn owns_port(&self, session: u64) -> bool {
        lock(&self.shared.state).owned_by(session)
    }
}

fn close_locked(state: &mut PortState) {
    let port = state.port.take();
    state.handle = None;
    state.baud_rate = None;
    state.connected = false;
    if state.is_open {
        info!("port closed {}", port.as_deref().unwrap_or("<unknown>"));
    }
    state.is_open = false;
}
