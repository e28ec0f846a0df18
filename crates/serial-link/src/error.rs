use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("serial port not found: {0}")]
    PortNotFound(String),
    #[error("operation not supported on this backend: {0}")]
    Unsupported(&'static str),
    #[error("I/O error: {0}")]
    Io(String),
    /// The read deadline passed; `received` holds whatever arrived before it.
    #[error("timeout after {} byte(s)", .received.len())]
    Timeout { received: Vec<u8> },
    /// The stream ended before the requested byte count was available.
    #[error("stream closed after {} byte(s)", .received.len())]
    Closed { received: Vec<u8> },
}

impl TransportError {
    /// Bytes that did arrive before a timeout or close, if any.
    pub fn partial(&self) -> &[u8] {
        match self {
            TransportError::Timeout { received } | TransportError::Closed { received } => {
                received
            }
            _ => &[],
        }
    }
}
