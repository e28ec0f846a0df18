//! serial-link: blocking byte-stream transport for Open Interface robots
//!
//! This crate provides the one capability the protocol layer needs from its
//! environment: an exclusively owned, half-duplex serial connection that can
//! write a whole command and read an exact number of response bytes within a
//! bounded timeout. The default build enables a scripted `mock` backend so
//! binaries and tests work on any host without hardware attached.

mod types;
pub use types::{DataBits, LinkConfig, Parity, PortInfo, StopBits, DEFAULT_BAUD_RATE};

mod error;
pub use error::{Result, TransportError};

mod traits;
pub use traits::SerialLink;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockLink, MockReply};

#[cfg(feature = "serial")]
mod port;

#[cfg(feature = "serial")]
pub use port::SerialPortLink;
