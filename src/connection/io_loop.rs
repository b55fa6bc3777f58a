//! The loop moving bytes between an open port, the send queue and the interpreter

use std::sync::Weak;
use std::thread;

use log::{error, trace};

use super::{ReadOutcome, SerialConnection, Shared};
use crate::{lock, Error, Result};

/// Serve the port opened as `session` until it closes, faults or is replaced
///
/// Each pass writes everything queued, then reads everything available, then sleeps for the
/// configured loop interval. On the way out, the port is handed to fault recovery.
pub(super) fn work_port(shared: Weak<Shared>, session: u64) {
    loop {
        let Some(connection) = SerialConnection::upgrade(&shared) else {
            trace!("work_port: connection dropped (session {})", session);
            return;
        };
        if !connection.owns_port(session) {
            break;
        }

        match connection.pump(session) {
            Ok(()) => {}
            Err(Error::NotOpen) => break,
            Err(e) => {
                error!("work_port: {}", e);
                break;
            }
        }

        let interval = connection.shared.config.loop_interval;
        drop(connection);
        thread::sleep(interval);
    }

    trace!("work_port stopped (session {})", session);
    if let Some(connection) = SerialConnection::upgrade(&shared) {
        connection.recover(session);
    }
}

impl SerialConnection {
    fn pump(&self, session: u64) -> Result<()> {
        self.flush_send_queue(session)?;
        self.drain_input(session)
    }

    /// Write every queued item, oldest first
    ///
    /// An item leaves the queue only once written, so one that fails stays at the front. The
    /// queue stays locked from the ownership check to the removal; a loop taking over the port
    /// cannot write anything until this one has let go.
    fn flush_send_queue(&self, session: u64) -> Result<()> {
        loop {
            let written = {
                let mut queue = lock(&self.shared.send_queue);
                let Some(item) = queue.front() else {
                    return Ok(());
                };
                if let Err(e) = self.write_raw(session, item.data()) {
                    if !matches!(e, Error::NotOpen) {
                        error!("cannot write {:?}", item.data());
                    }
                    return Err(e);
                }
                queue.pop()
            };
            // outside the lock, the callback may queue more
            if let Some(item) = written {
                item.sent(self);
            }
        }
    }

    fn drain_input(&self, session: u64) -> Result<()> {
        loop {
            match self.read_unit(session)? {
                ReadOutcome::Byte(b) => {
                    lock(&self.shared.read_buffer).push(b);
                    self.validate_buffer();
                    if !self.owns_port(session) {
                        return Ok(());
                    }
                }
                ReadOutcome::NoData | ReadOutcome::NotOpen => return Ok(()),
            }
        }
    }

    fn write_raw(&self, session: u64, data: &[u8]) -> Result<()> {
        let mut state = lock(&self.shared.state);
        if !state.owned_by(session) {
            return Err(Error::NotOpen);
        }
        let handle = state.handle.as_mut().ok_or(Error::NotOpen)?;
        trace!("write_raw: {:?}", data);
        Ok(handle.write_all(data)?)
    }

    fn read_unit(&self, session: u64) -> Result<ReadOutcome> {
        let mut state = lock(&self.shared.state);
        if !state.owned_by(session) {
            return Ok(ReadOutcome::NotOpen);
        }
        let Some(handle) = state.handle.as_mut() else {
            return Ok(ReadOutcome::NotOpen);
        };

        let mut byte = [0u8; 1];
        Ok(match handle.read(&mut byte)? {
            0 => ReadOutcome::NoData,
            _ => ReadOutcome::Byte(byte[0]),
        })
    }

    /// Let the interpreter consume what it can from the read buffer
    fn validate_buffer(&self) {
        let mut interpreter = lock(&self.shared.interpreter);
        let Some(interpreter) = interpreter.as_mut() else {
            return;
        };
        let buffer = lock(&self.shared.read_buffer).take();
        let remainder = interpreter.decode_data(buffer, self);
        lock(&self.shared.read_buffer).replace(remainder);
    }
}
