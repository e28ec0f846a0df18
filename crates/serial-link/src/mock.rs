use crate::{LinkConfig, PortInfo, Result, SerialLink, TransportError};
use std::collections::VecDeque;
use std::time::Duration;

/// One scripted answer, consumed by the next `read_exact` that needs bytes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MockReply {
    /// Bytes arrive on the wire. Extra bytes stay buffered as stale input.
    Bytes(Vec<u8>),
    /// These bytes arrive, then the deadline passes.
    Timeout(Vec<u8>),
    /// These bytes arrive, then the stream ends.
    Closed(Vec<u8>),
    /// The underlying device fails.
    Io(String),
}

/// An in-process scripted link. Replies are served in order and every write
/// is recorded so tests can assert on the exact wire bytes.
#[derive(Debug, Default)]
pub struct MockLink {
    name: String,
    replies: VecDeque<MockReply>,
    pending: VecDeque<u8>,
    writes: Vec<Vec<u8>>,
    reads: usize,
    flushes: usize,
    closed: bool,
}

impl MockLink {
    pub fn new() -> Self {
        Self {
            name: "mock0".to_string(),
            ..Self::default()
        }
    }

    pub fn with_replies(replies: impl IntoIterator<Item = MockReply>) -> Self {
        let mut link = Self::new();
        link.replies.extend(replies);
        link
    }

    pub fn push_reply(&mut self, reply: MockReply) {
        self.replies.push_back(reply);
    }

    /// Shorthand for queueing a well-formed reply.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.replies.push_back(MockReply::Bytes(bytes.to_vec()));
    }

    /// Every buffer passed to `write_all`, in order.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// All written bytes concatenated.
    pub fn written_bytes(&self) -> Vec<u8> {
        self.writes.iter().flatten().copied().collect()
    }

    pub fn read_calls(&self) -> usize {
        self.reads
    }

    pub fn flush_calls(&self) -> usize {
        self.flushes
    }

    pub fn remaining_replies(&self) -> usize {
        self.replies.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            return Err(TransportError::Io(format!("{} is closed", self.name)));
        }
        Ok(())
    }
}

impl SerialLink for MockLink {
    fn open(path: &str, _config: &LinkConfig) -> Result<Self> {
        Ok(Self {
            name: path.to_string(),
            ..Self::default()
        })
    }

    fn list() -> Result<Vec<PortInfo>> {
        Ok(vec![PortInfo {
            name: "mock0".to_string(),
            driver: "mock".to_string(),
        }])
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.writes.push(bytes.to_vec());
        Ok(())
    }

    fn read_exact(&mut self, n: usize, _timeout: Duration) -> Result<Vec<u8>> {
        self.ensure_open()?;
        self.reads += 1;
        while self.pending.len() < n {
            match self.replies.pop_front() {
                Some(MockReply::Bytes(b)) => self.pending.extend(b),
                Some(MockReply::Timeout(b)) => {
                    self.pending.extend(b);
                    let received = self.pending.drain(..).collect();
                    return Err(TransportError::Timeout { received });
                }
                Some(MockReply::Closed(b)) => {
                    self.pending.extend(b);
                    let received = self.pending.drain(..).collect();
                    return Err(TransportError::Closed { received });
                }
                Some(MockReply::Io(msg)) => return Err(TransportError::Io(msg)),
                None => {
                    // Script exhausted: behave like a silent device.
                    let received = self.pending.drain(..).collect();
                    return Err(TransportError::Timeout { received });
                }
            }
        }
        Ok(self.pending.drain(..n).collect())
    }

    fn clear_input(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.flushes += 1;
        self.pending.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
