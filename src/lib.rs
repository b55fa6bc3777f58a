//! Crate for finding a serial device on an unknown port at an unknown baud rate and keeping a
//! connection to it alive
//!
//! # Usage
//! ```no_run
//! use serial_link::{ConnectionConfig, SerialConnection};
//! use std::collections::HashSet;
//!
//! fn main() -> Result<(), serial_link::Error> {
//!     let connection = SerialConnection::new(ConnectionConfig::default());
//!     connection.set_interpreter(|buffer: Vec<u8>, _: &SerialConnection| {
//!         println!("received {:02X?}", buffer);
//!         Vec::new()
//!     });
//!     if let Some(port) = connection.find_port(&HashSet::new(), 3)? {
//!         println!("device on {} at {:?} baud", port, connection.baud_rate());
//!         connection.write_to_port(b"hello\r\n".to_vec());
//!     }
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]

pub mod device;

mod config;
pub use config::{ConnectionConfig, DEFAULT_RETRIES, POSSIBLE_BAUD_RATES};

mod connection;
pub use connection::{ConnectionState, NegotiationState, ReadOutcome, SerialConnection};

mod enumerate;
pub use enumerate::{available_ports, PortEnumerator};

mod error;
pub use error::{DeviceError, Error, Result};

mod interpreter;
pub use interpreter::{ConnectionCheck, Interpreter};

mod queue;
pub use queue::{ReadBuffer, SendItem, SendQueue, Sendable};

mod runner;
pub use runner::{Task, TaskRunner, ThreadRunner};

mod serial_device;
pub use serial_device::{QueryRegistry, SerialDevice};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock `mutex`, carrying on with the data if a panicking thread poisoned it
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
