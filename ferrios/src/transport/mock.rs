//! Scripted transports for driving sessions in tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_test::io::{Builder, Mock};

use super::{Connector, Transport, TransportConfig};
use crate::error::{Result, TransportError};

#[async_trait]
impl Transport for Mock {
    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.write_all(data).await.map_err(TransportError::Io)?;
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; 4096];
        let n = AsyncReadExt::read(self, &mut buf)
            .await
            .map_err(TransportError::Io)?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf))
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Transport whose reads never complete. Used to exercise expect timeouts.
pub(crate) struct SilentTransport;

#[async_trait]
impl Transport for SilentTransport {
    async fn write(&mut self, _data: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn read(&mut self) -> Result<Option<Vec<u8>>> {
        std::future::pending().await
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Connector handing out one scripted mock per connect call.
pub(crate) struct ScriptedConnector {
    scripts: Mutex<VecDeque<Mock>>,
    connects: AtomicUsize,
}

impl ScriptedConnector {
    pub(crate) fn new(scripts: Vec<Builder>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().map(|mut b| b.build()).collect()),
            connects: AtomicUsize::new(0),
        }
    }

    /// Number of successful connects so far.
    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, _config: &TransportConfig) -> Result<Box<dyn Transport>> {
        let next = self.scripts.lock().unwrap().pop_front();
        match next {
            Some(mock) => {
                self.connects.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(mock))
            }
            None => Err(TransportError::ConnectionFailed {
                host: "mock".into(),
                port: 0,
                source: std::io::ErrorKind::ConnectionRefused.into(),
            }
            .into()),
        }
    }
}

/// Connector that always yields a [`SilentTransport`].
pub(crate) struct SilentConnector;

#[async_trait]
impl Connector for SilentConnector {
    async fn connect(&self, _config: &TransportConfig) -> Result<Box<dyn Transport>> {
        Ok(Box::new(SilentTransport))
    }
}

/// Script builder that starts with a device already at the privileged prompt.
///
/// Login expects `[Continue, Username, Password, Hostname]`, sees the
/// hostname, sends an empty line and then finds the privileged prompt.
pub(crate) fn privileged_login(hostname: &str) -> Builder {
    let prompt = format!("\r\n{}#", hostname);
    let mut builder = Builder::new();
    builder
        .read(prompt.as_bytes())
        .write(b"\n")
        .read(prompt.as_bytes());
    builder
}
