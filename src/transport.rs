//! Transport sessions over serial links.
//!
//! The protocol is strictly request/response and half-duplex: every write
//! must be followed by exactly the matching-length read before anything else
//! touches the session. The session itself is not safe for concurrent use;
//! exclusion is provided by [`DeviceLink`], whose mutex guard spans one whole
//! exchange (including both write/read pairs of a temperature fetch).

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard};
use tokio_serial::SerialPortBuilderExt;

use crate::error::{GatewayError, Result};

/// A byte-oriented, timeout-bounded request/response channel.
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read exactly `len` bytes, bounded by the read timeout.
    async fn recv(&mut self, len: usize) -> Result<Vec<u8>>;

    /// One command write plus its single-byte response.
    async fn exchange(&mut self, cmd: &[u8]) -> Result<u8> {
        self.send(cmd).await?;
        let reply = self.recv(1).await?;
        Ok(reply[0])
    }
}

/// Opens a fresh transport for one device. Abstracted so tests can inject
/// scripted transports in place of real serial ports.
#[async_trait]
pub trait PortOpener: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Transport>>;
}

/// Transport over an async serial stream.
pub struct SerialTransport {
    stream: tokio_serial::SerialStream,
    read_timeout: Duration,
}

#[async_trait]
impl Transport for SerialTransport {
    async fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }

    async fn recv(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        match tokio::time::timeout(self.read_timeout, self.stream.read_exact(&mut buf)).await {
            Ok(read) => {
                read?;
                Ok(buf)
            }
            Err(_) => Err(GatewayError::Timeout(self.read_timeout)),
        }
    }
}

/// [`PortOpener`] for real serial ports.
pub struct SerialOpener {
    path: String,
    baud: u32,
    read_timeout: Duration,
}

impl SerialOpener {
    pub fn new(path: &str, baud: u32, read_timeout: Duration) -> Self {
        Self {
            path: path.to_string(),
            baud,
            read_timeout,
        }
    }
}

#[async_trait]
impl PortOpener for SerialOpener {
    async fn open(&self) -> Result<Box<dyn Transport>> {
        let stream = tokio_serial::new(&self.path, self.baud)
            .open_native_async()
            .map_err(|source| GatewayError::Connection {
                path: self.path.clone(),
                source,
            })?;
        Ok(Box::new(SerialTransport {
            stream,
            read_timeout: self.read_timeout,
        }))
    }
}

/// Shared handle to one device's transport session.
///
/// The session mutex is the device-scoped exclusive exchange region: both
/// the polling supervisor and external switch-set requests acquire it and
/// hold it for the full duration of one exchange.
pub struct DeviceLink {
    device_id: String,
    opener: Box<dyn PortOpener>,
    session: Mutex<Option<Box<dyn Transport>>>,
}

impl DeviceLink {
    pub fn new(device_id: &str, opener: Box<dyn PortOpener>) -> Self {
        Self {
            device_id: device_id.to_string(),
            opener,
            session: Mutex::new(None),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Open the underlying port, replacing any previous session.
    pub async fn open(&self) -> Result<()> {
        let transport = self.opener.open().await?;
        *self.session.lock().await = Some(transport);
        Ok(())
    }

    /// Close the session. Idempotent.
    pub async fn close(&self) {
        self.session.lock().await.take();
    }

    /// Acquire the exclusive exchange scope. The returned session must be
    /// held across the whole exchange.
    pub async fn session(&self) -> Session<'_> {
        Session(self.session.lock().await)
    }
}

/// Guard over one exclusive exchange on a device's transport.
pub struct Session<'a>(MutexGuard<'a, Option<Box<dyn Transport>>>);

impl Session<'_> {
    pub fn transport(&mut self) -> Result<&mut (dyn Transport + 'static)> {
        self.0.as_deref_mut().ok_or(GatewayError::NotConnected)
    }
}
