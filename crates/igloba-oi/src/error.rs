use serial_link::TransportError;
use thiserror::Error;

pub type Result<T, E = ProtocolError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid argument for {command}: {arg}={value} outside {min}..={max}")]
    InvalidArgument {
        command: &'static str,
        arg: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },
    #[error("{command} takes {expected} argument(s), got {got}")]
    ArgumentCount {
        command: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("unknown opcode: {0}")]
    UnknownOpcode(u8),
    #[error("unknown sensor packet id: {0}")]
    UnknownPacketId(u8),
    #[error("packet {packet_id}: timed out after {received} of {expected} byte(s)")]
    PacketTimeout {
        packet_id: u8,
        expected: usize,
        received: usize,
    },
    #[error("packet {packet_id}: expected {expected} byte(s), got {received}")]
    MalformedPacket {
        packet_id: u8,
        expected: usize,
        received: usize,
    },
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),
    #[error("transport: {0}")]
    Transport(#[from] TransportError),
}

impl ProtocolError {
    /// True when the session can no longer be used and the caller must reconnect.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::Transport(_))
    }

    /// Map a failed response read for `packet_id` onto the call-scoped taxonomy.
    pub(crate) fn from_read(packet_id: u8, expected: usize, err: TransportError) -> Self {
        match err {
            TransportError::Timeout { received } => ProtocolError::PacketTimeout {
                packet_id,
                expected,
                received: received.len(),
            },
            TransportError::Closed { received } => ProtocolError::MalformedPacket {
                packet_id,
                expected,
                received: received.len(),
            },
            other => ProtocolError::Transport(other),
        }
    }
}
