//! Transport connection configuration.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::TransportError;

/// Character-stream protocol used to reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Telnet over TCP (port 23).
    #[default]
    Telnet,

    /// SSH (port 22).
    Ssh,
}

impl Protocol {
    /// Well-known port for this protocol.
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Telnet => 23,
            Protocol::Ssh => 22,
        }
    }

    /// Lowercase protocol name.
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Telnet => "telnet",
            Protocol::Ssh => "ssh",
        }
    }
}

impl FromStr for Protocol {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "telnet" => Ok(Protocol::Telnet),
            "ssh" => Ok(Protocol::Ssh),
            _ => Err(TransportError::UnsupportedProtocol { name: s.to_string() }),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host key verification mode, analogous to OpenSSH's `StrictHostKeyChecking`.
#[derive(Debug, Clone, Default)]
pub enum HostKeyVerification {
    /// Reject unknown and changed keys.
    Strict,

    /// Accept and auto-learn unknown keys, but reject changed keys.
    #[default]
    AcceptNew,

    /// Accept all keys without checking. Lab devices get re-imaged often,
    /// which changes their keys.
    Disabled,
}

/// Connection configuration handed to a [`Connector`](super::Connector).
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Target host (hostname or IP address).
    pub host: String,

    /// TCP port; `None` uses the protocol's well-known port.
    pub port: Option<u16>,

    /// Protocol to speak.
    pub protocol: Protocol,

    /// Username, used for SSH authentication.
    pub username: String,

    /// Password, used for SSH password authentication.
    pub password: SecretString,

    /// Connection timeout.
    pub timeout: Duration,

    /// Terminal width for the SSH PTY.
    pub terminal_width: u32,

    /// Terminal height for the SSH PTY.
    pub terminal_height: u32,

    /// Host key verification mode (SSH only).
    pub host_key_verification: HostKeyVerification,

    /// Path to known_hosts file (SSH only).
    pub known_hosts_path: Option<PathBuf>,
}

impl TransportConfig {
    /// Effective port.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.protocol.default_port())
    }

    /// Get the socket address for connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_from_str() {
        assert_eq!("telnet".parse::<Protocol>().unwrap(), Protocol::Telnet);
        assert_eq!("SSH".parse::<Protocol>().unwrap(), Protocol::Ssh);

        let err = "dummy".parse::<Protocol>().unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedProtocol { name } if name == "dummy"));
    }

    #[test]
    fn test_socket_addr_uses_protocol_port() {
        let mut config = TransportConfig {
            host: "10.0.0.1".into(),
            port: None,
            protocol: Protocol::Ssh,
            username: "admin".into(),
            password: SecretString::from("secret"),
            timeout: Duration::from_secs(5),
            terminal_width: 511,
            terminal_height: 24,
            host_key_verification: HostKeyVerification::Disabled,
            known_hosts_path: None,
        };
        assert_eq!(config.socket_addr(), "10.0.0.1:22");

        config.protocol = Protocol::Telnet;
        assert_eq!(config.socket_addr(), "10.0.0.1:23");

        config.port = Some(2001);
        assert_eq!(config.socket_addr(), "10.0.0.1:2001");
    }
}
