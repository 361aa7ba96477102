//! Controller settings.

use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::driver::Credentials;
use crate::platform::FilesystemClass;
use crate::transport::Protocol;

/// Timeouts, (de)serialized as whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Connect and per-expect timeout for ordinary commands.
    #[serde(with = "seconds")]
    pub default: Duration,

    /// Long-running helper scripts (memory injection and the like).
    #[serde(with = "seconds")]
    pub memory: Duration,

    /// Time for the device to come back after `reload`.
    #[serde(with = "seconds")]
    pub reboot: Duration,

    /// Per-expect timeout while copying and verifying firmware.
    #[serde(with = "seconds")]
    pub firmware: Duration,

    /// Pause after the device hangs up on `reload`, before polling.
    #[serde(with = "seconds")]
    pub reboot_settle: Duration,

    /// Interval between reachability probes.
    #[serde(with = "seconds")]
    pub poll_interval: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            default: Duration::from_secs(300),
            memory: Duration::from_secs(1200),
            reboot: Duration::from_secs(600),
            firmware: Duration::from_secs(600),
            reboot_settle: Duration::from_secs(10),
            poll_interval: Duration::from_secs(5),
        }
    }
}

mod seconds {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Everything the [`Controller`](super::Controller) needs to reach and
/// configure one device.
#[derive(Debug, Clone, Deserialize)]
pub struct ControllerSettings {
    /// Hostname shown in the device prompt.
    pub hostname: String,

    /// Management address.
    pub address: String,

    /// Port override (default: the protocol's well-known port).
    #[serde(default)]
    pub port: Option<u16>,

    /// Protocol used when an operation does not ask for one.
    #[serde(default)]
    pub protocol: Protocol,

    /// Protocol forced for every connection, e.g. while ACLs restrict
    /// which transports may log in.
    #[serde(default)]
    pub config_protocol: Option<Protocol>,

    /// Account under test. Used for command execution and assertions.
    #[serde(default)]
    pub test_credentials: Credentials,

    /// Administrative account. Used for configuration, reboot and firmware.
    #[serde(default)]
    pub config_credentials: Credentials,

    #[serde(default)]
    pub timeouts: Timeouts,

    #[serde(default)]
    pub filesystem_class: Option<FilesystemClass>,

    /// Syslog server written by the reset plan.
    #[serde(default)]
    pub syslog_server: Option<String>,

    /// TACACS+ server written by the reset plan.
    #[serde(default)]
    pub tacacs_server: Option<String>,

    #[serde(default = "default_tacacs_key")]
    pub tacacs_key: SecretString,

    /// Commands applied by the ACL plans.
    #[serde(default)]
    pub remote_commands: Vec<String>,

    /// Whether sessions send `terminal length 0` after login.
    #[serde(default = "default_true")]
    pub terminal_length_zero: bool,
}

fn default_tacacs_key() -> SecretString {
    SecretString::from("password")
}

fn default_true() -> bool {
    true
}

impl ControllerSettings {
    /// Settings with defaults for everything but the device identity.
    pub fn new(hostname: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            address: address.into(),
            port: None,
            protocol: Protocol::default(),
            config_protocol: None,
            test_credentials: Credentials::default(),
            config_credentials: Credentials::default(),
            timeouts: Timeouts::default(),
            filesystem_class: None,
            syslog_server: None,
            tacacs_server: None,
            tacacs_key: default_tacacs_key(),
            remote_commands: Vec::new(),
            terminal_length_zero: true,
        }
    }

    /// Protocol for a connection: the configuration override, else the
    /// requested protocol, else the default.
    pub fn resolve_protocol(&self, requested: Option<Protocol>) -> Protocol {
        self.config_protocol.or(requested).unwrap_or(self.protocol)
    }

    /// Management port for `protocol`.
    pub fn port_for(&self, protocol: Protocol) -> u16 {
        self.port.unwrap_or(protocol.default_port())
    }
}
