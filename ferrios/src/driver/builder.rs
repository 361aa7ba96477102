//! Builder for creating sessions.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use super::credentials::Credentials;
use super::session::Session;
use crate::channel::PromptSet;
use crate::error::{Result, SessionError};
use crate::transport::{Connector, DefaultConnector, HostKeyVerification, Protocol, TransportConfig};

/// Default time allowed for the device to hang up after `exit`.
const DEFAULT_EXIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builder for constructing sessions.
///
/// # Example
///
/// ```rust,no_run
/// use ferrios::{Protocol, SessionBuilder};
///
/// # async fn example() -> Result<(), ferrios::Error> {
/// let mut session = SessionBuilder::new("192.168.1.1")
///     .hostname("router")
///     .protocol(Protocol::Ssh)
///     .username("admin")
///     .password("secret")
///     .enable_password("enable-secret")
///     .build()?;
/// session.open().await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionBuilder {
    host: String,
    hostname: Option<String>,
    port: Option<u16>,
    protocol: Protocol,
    username: String,
    password: SecretString,
    enable_password: SecretString,
    timeout: Duration,
    exit_timeout: Duration,
    terminal_length_zero: bool,
    terminal_width: u32,
    terminal_height: u32,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    connector: Option<Arc<dyn Connector>>,
}

impl SessionBuilder {
    /// Create a new session builder for the specified address.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            hostname: None,
            port: None,
            protocol: Protocol::default(),
            username: String::new(),
            password: SecretString::from(""),
            enable_password: SecretString::from(""),
            timeout: Duration::from_secs(300),
            exit_timeout: DEFAULT_EXIT_TIMEOUT,
            terminal_length_zero: true,
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::default(),
            known_hosts_path: None,
            connector: None,
        }
    }

    /// Set the device hostname that appears in its prompts (required).
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Set the port (default: the protocol's well-known port).
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the protocol (default: telnet).
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Set the login username.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Set the login password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = SecretString::from(password.into());
        self
    }

    /// Set the enable password.
    pub fn enable_password(mut self, password: impl Into<String>) -> Self {
        self.enable_password = SecretString::from(password.into());
        self
    }

    /// Set username, password and enable password at once.
    pub fn credentials(mut self, credentials: &Credentials) -> Self {
        self.username = credentials.username.clone();
        self.password = credentials.password.clone();
        self.enable_password = credentials.enable_password.clone();
        self
    }

    /// Set the default timeout for connecting and for each expect.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set how long to wait for the device to hang up after `exit`.
    pub fn exit_timeout(mut self, timeout: Duration) -> Self {
        self.exit_timeout = timeout;
        self
    }

    /// Whether to send `terminal length 0` after login (default: true).
    pub fn terminal_length_zero(mut self, enabled: bool) -> Self {
        self.terminal_length_zero = enabled;
        self
    }

    /// Set terminal dimensions requested for the SSH PTY.
    pub fn terminal_size(mut self, width: u32, height: u32) -> Self {
        self.terminal_width = width;
        self.terminal_height = height;
        self
    }

    /// Set host key verification mode (SSH only).
    pub fn host_key_verification(mut self, mode: HostKeyVerification) -> Self {
        self.host_key_verification = mode;
        self
    }

    /// Use a custom known_hosts file (SSH only).
    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    /// Use a custom transport factory instead of [`DefaultConnector`].
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Build the session.
    ///
    /// This creates the session but does not connect. Call `open()` or
    /// `scoped()` on the returned session.
    pub fn build(self) -> Result<Session> {
        let hostname = self
            .hostname
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| SessionError::InvalidConfig {
                message: "Hostname is required".to_string(),
            })?;

        if self.host.trim().is_empty() {
            return Err(SessionError::InvalidConfig {
                message: "Address is required".to_string(),
            }
            .into());
        }

        let prompts = PromptSet::new(&hostname)?;

        let transport = TransportConfig {
            host: self.host,
            port: self.port,
            protocol: self.protocol,
            username: self.username,
            password: self.password,
            timeout: self.timeout,
            terminal_width: self.terminal_width,
            terminal_height: self.terminal_height,
            host_key_verification: self.host_key_verification,
            known_hosts_path: self.known_hosts_path,
        };

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(DefaultConnector));

        Ok(Session::new(
            transport,
            connector,
            prompts,
            self.enable_password,
            self.timeout,
            self.exit_timeout,
            self.terminal_length_zero,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_required() {
        let err = SessionBuilder::new("10.0.0.1").build().err().expect("build should fail");
        assert!(matches!(
            err,
            crate::Error::Session(SessionError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_build_defaults() {
        let session = SessionBuilder::new("10.0.0.1")
            .hostname("router")
            .username("admin")
            .build()
            .unwrap();

        assert_eq!(session.hostname(), "router");
        assert_eq!(session.protocol(), Protocol::Telnet);
        assert_eq!(session.timeout(), Duration::from_secs(300));
        assert!(!session.is_open());
    }
}
