//! Character-stream transports.
//!
//! A [`Transport`] is a bidirectional byte stream to the device's CLI. The
//! [`Connector`] maps a [`Protocol`] to a concrete transport: SSH via russh,
//! telnet via a plain TCP stream with option negotiation refused.

pub mod config;
#[cfg(test)]
pub(crate) mod mock;
mod ssh;
mod telnet;

pub use config::{HostKeyVerification, Protocol, TransportConfig};
pub use ssh::SshTransport;
pub use telnet::{TelnetCodec, TelnetTransport};

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};

use crate::error::{Result, TransportError};

/// Delay before the single telnet retry after a refused connection.
const TELNET_RETRY_DELAY: Duration = Duration::from_secs(2);

/// A connected character stream.
#[async_trait]
pub trait Transport: Send {
    /// Write raw bytes to the device.
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Read the next chunk of output. `None` means end-of-stream.
    async fn read(&mut self) -> Result<Option<Vec<u8>>>;

    /// Close the stream.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for transports.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a transport to the configured target.
    async fn connect(&self, config: &TransportConfig) -> Result<Box<dyn Transport>>;
}

/// Connector dispatching on [`Protocol`] to the built-in transports.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultConnector;

#[async_trait]
impl Connector for DefaultConnector {
    async fn connect(&self, config: &TransportConfig) -> Result<Box<dyn Transport>> {
        info!(
            "Connecting to {} with username '{}' over {}",
            config.socket_addr(),
            config.username,
            config.protocol
        );

        match config.protocol {
            Protocol::Ssh => Ok(Box::new(SshTransport::connect(config.clone()).await?)),
            Protocol::Telnet => match TelnetTransport::connect(config).await {
                Err(crate::Error::Transport(TransportError::ConnectionFailed { source, .. }))
                    if source.kind() == std::io::ErrorKind::ConnectionRefused =>
                {
                    debug!("Retrying telnet connect to {}", config.socket_addr());
                    tokio::time::sleep(TELNET_RETRY_DELAY).await;
                    Ok(Box::new(TelnetTransport::connect(config).await?))
                }
                result => Ok(Box::new(result?)),
            },
        }
    }
}
