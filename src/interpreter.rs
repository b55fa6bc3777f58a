use crate::SerialConnection;

/// Decodes the bytes read from a port
///
/// The connection calls [decode_data](Self::decode_data) after every byte it reads, with
/// everything read so far that has not been consumed yet. The interpreter delivers whatever it
/// decodes through its own channels (it may also queue replies on `connection`) and returns the
/// bytes it could not use yet, which become the new read buffer.
pub trait Interpreter: Send {
    fn decode_data(&mut self, buffer: Vec<u8>, connection: &SerialConnection) -> Vec<u8>;
}

impl<F> Interpreter for F
where
    F: FnMut(Vec<u8>, &SerialConnection) -> Vec<u8> + Send,
{
    fn decode_data(&mut self, buffer: Vec<u8>, connection: &SerialConnection) -> Vec<u8> {
        self(buffer, connection)
    }
}

/// Decides whether the device on a freshly opened port is the right one
///
/// Checks run right after the port is opened at a candidate baud rate, in the order they were
/// added, while the port I/O loop is already running; a check typically queues a request and
/// waits for its [Interpreter] to see the answer. All of them must return `true` for the port and
/// baud rate to be accepted.
pub trait ConnectionCheck: Send {
    fn check(&mut self) -> bool;
}

impl<F> ConnectionCheck for F
where
    F: FnMut() -> bool + Send,
{
    fn check(&mut self) -> bool {
        self()
    }
}
