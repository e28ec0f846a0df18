use crate::{LinkConfig, PortInfo, Result, TransportError};
use std::time::Duration;

/// A minimal blocking, half-duplex byte link.
pub trait SerialLink {
    /// Open a link by device path (e.g., "/dev/ttyUSB1").
    fn open(path: &str, config: &LinkConfig) -> Result<Self>
    where
        Self: Sized;

    /// Attempt to list ports available to this backend.
    fn list() -> Result<Vec<PortInfo>>;

    /// Write the whole buffer or fail; no partial-write retry beyond the OS.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read exactly `n` bytes, blocking at most `timeout` in total.
    fn read_exact(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>>;

    /// Discard any bytes already buffered on the input side.
    fn clear_input(&mut self) -> Result<()> {
        Err(TransportError::Unsupported("input flush not supported"))
    }

    /// Release the underlying device. Further calls fail with `Io`.
    fn close(&mut self) -> Result<()>;
}
