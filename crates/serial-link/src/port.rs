use crate::{DataBits, LinkConfig, Parity, PortInfo, Result, SerialLink, StopBits, TransportError};
use serialport::{ClearBuffer, SerialPort, SerialPortType};
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A UART connection backed by the `serialport` crate.
pub struct SerialPortLink {
    path: String,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialPortLink {
    pub fn path(&self) -> &str {
        &self.path
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port
            .as_mut()
            .ok_or_else(|| TransportError::Io(format!("{} is closed", self.path)))
    }
}

fn map_open_error(path: &str, e: serialport::Error) -> TransportError {
    match e.kind() {
        serialport::ErrorKind::NoDevice => TransportError::PortNotFound(path.to_string()),
        _ => TransportError::Io(e.to_string()),
    }
}

impl SerialLink for SerialPortLink {
    fn open(path: &str, config: &LinkConfig) -> Result<Self> {
        let data_bits = match config.data_bits {
            DataBits::Seven => serialport::DataBits::Seven,
            DataBits::Eight => serialport::DataBits::Eight,
        };
        let parity = match config.parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        };
        let stop_bits = match config.stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        };
        let port = serialport::new(path, config.baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| map_open_error(path, e))?;
        info!(path, %config, "serial link open");
        Ok(Self {
            path: path.to_string(),
            port: Some(port),
        })
    }

    fn list() -> Result<Vec<PortInfo>> {
        let mut out = Vec::new();
        for p in serialport::available_ports().map_err(|e| TransportError::Io(e.to_string()))? {
            let driver = match p.port_type {
                SerialPortType::UsbPort(_) => "usb-serial",
                _ => "serial",
            };
            out.push(PortInfo {
                name: p.port_name,
                driver: driver.to_string(),
            });
        }
        Ok(out)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port()?;
        port.write_all(bytes)
            .and_then(|_| port.flush())
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn read_exact(&mut self, n: usize, timeout: Duration) -> Result<Vec<u8>> {
        let port = self.port()?;
        let deadline = Instant::now() + timeout;
        let mut acc: Vec<u8> = Vec::with_capacity(n);
        let mut buf = [0u8; 64];
        while acc.len() < n {
            let now = Instant::now();
            if now >= deadline {
                return Err(TransportError::Timeout { received: acc });
            }
            port.set_timeout(deadline - now)
                .map_err(|e| TransportError::Io(e.to_string()))?;
            let want = (n - acc.len()).min(buf.len());
            match port.read(&mut buf[..want]) {
                Ok(0) => return Err(TransportError::Closed { received: acc }),
                Ok(k) => acc.extend_from_slice(&buf[..k]),
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    return Err(TransportError::Timeout { received: acc })
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::Io(e.to_string())),
            }
        }
        debug!(bytes = acc.len(), "read complete");
        Ok(acc)
    }

    fn clear_input(&mut self) -> Result<()> {
        self.port()?
            .clear(ClearBuffer::Input)
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            info!(path = %self.path, "serial link closed");
        }
        Ok(())
    }
}
