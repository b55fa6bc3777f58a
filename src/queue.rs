//! Outbound queue and inbound buffer of a connection

use std::collections::VecDeque;
use std::fmt;

use crate::SerialConnection;

/// Something that can be written to the port
pub trait Sendable: Send {
    /// Bytes to put on the wire
    fn data(&self) -> &[u8];

    /// Called once the data has been written
    fn sent(&self, _connection: &SerialConnection) {}
}

impl Sendable for Vec<u8> {
    fn data(&self) -> &[u8] {
        self
    }
}

type SentCallback = Box<dyn Fn(&SerialConnection) + Send>;

/// A payload with an optional acknowledgement callback
pub struct SendItem {
    data: Vec<u8>,
    on_sent: Option<SentCallback>,
}

impl SendItem {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            on_sent: None,
        }
    }

    pub fn on_sent(mut self, callback: impl Fn(&SerialConnection) + Send + 'static) -> Self {
        self.on_sent = Some(Box::new(callback));
        self
    }
}

impl Sendable for SendItem {
    fn data(&self) -> &[u8] {
        &self.data
    }

    fn sent(&self, connection: &SerialConnection) {
        if let Some(callback) = &self.on_sent {
            callback(connection);
        }
    }
}

impl fmt::Debug for SendItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendItem")
            .field("data", &self.data)
            .field("on_sent", &self.on_sent.is_some())
            .finish()
    }
}

/// Pending writes, oldest first
#[derive(Default)]
pub struct SendQueue {
    items: VecDeque<Box<dyn Sendable>>,
}

impl SendQueue {
    pub fn push(&mut self, item: Box<dyn Sendable>) {
        self.items.push_back(item);
    }

    pub fn pop(&mut self) -> Option<Box<dyn Sendable>> {
        self.items.pop_front()
    }

    /// The next item to write, left in place until it has been written
    pub fn front(&self) -> Option<&dyn Sendable> {
        self.items.front().map(|item| &**item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Bytes read from the port that the interpreter has not consumed yet
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReadBuffer {
    bytes: Vec<u8>,
}

impl ReadBuffer {
    pub fn push(&mut self, byte: u8) {
        self.bytes.push(byte);
    }

    /// Move the contents out, leaving the buffer empty
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }

    /// Replace the contents with what the interpreter left over
    pub fn replace(&mut self, remainder: Vec<u8>) {
        self.bytes = remainder;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_is_fifo_and_front_does_not_remove() {
        let mut queue = SendQueue::default();
        queue.push(Box::new(b"a".to_vec()));
        queue.push(Box::new(b"b".to_vec()));
        queue.push(Box::new(SendItem::new(*b"c")));
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.front().map(|item| item.data().to_vec()), Some(b"a".to_vec()));
        assert_eq!(queue.len(), 3);

        let order: Vec<Vec<u8>> = std::iter::from_fn(|| queue.pop())
            .map(|item| item.data().to_vec())
            .collect();
        assert_eq!(order, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]);
        assert!(queue.is_empty());
    }

    #[test]
    fn read_buffer_take_and_replace() {
        let mut buffer = ReadBuffer::default();
        buffer.push(1);
        buffer.push(2);
        buffer.push(3);
        let bytes = buffer.take();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert!(buffer.is_empty());

        buffer.replace(bytes[2..].to_vec());
        assert_eq!(buffer.as_slice(), &[3]);
        assert_eq!(buffer.len(), 1);
    }
}
