//! Error types for ferrios.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Main error type for ferrios operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level errors (TCP, SSH, protocol selection)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Channel operation errors (pattern matching, timeouts)
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    /// Session-level errors (login, escalation, authorization)
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Device configuration and verification errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// External helper script errors
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),
}

impl Error {
    /// Whether this error is an expect timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::Channel(ChannelError::PatternTimeout { .. })
                | Error::Transport(TransportError::Timeout(_))
        )
    }

    /// Whether this error is a rejected username/password.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Error::Session(SessionError::AuthenticationFailed { .. }))
    }

    /// Whether this error is a rejected enable password or AAA authorization.
    pub fn is_authorization_failure(&self) -> bool {
        matches!(self, Error::Session(SessionError::AuthorizationFailed { .. }))
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Error::Channel(ChannelError::InvalidPattern(e))
    }
}

/// Transport layer errors (TCP connect, SSH, protocol selection).
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to host
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// Protocol name is not one of the supported transports
    #[error("Unsupported protocol '{name}'")]
    UnsupportedProtocol { name: String },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Host key not present in known_hosts (strict mode)
    #[error("Unknown host key for {host}:{port}")]
    HostKeyUnknown { host: String, port: u16 },

    /// Host key differs from the known_hosts entry
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Operation timed out
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Channel layer errors (pattern matching over the character stream).
#[derive(Error, Debug)]
pub enum ChannelError {
    /// None of the expected patterns appeared in time
    #[error("Pattern {patterns} not found within {timeout:?} (last output: {tail:?})")]
    PatternTimeout {
        patterns: String,
        timeout: Duration,
        tail: String,
    },

    /// The peer closed the stream while a pattern was expected
    #[error("Channel closed while waiting for {patterns}")]
    Closed { patterns: String },

    /// Invalid regex pattern
    #[error("Invalid regex pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Session layer errors (login state machine, escalation, recovery).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Session not connected
    #[error("Session not connected - call open() first")]
    NotConnected,

    /// Session already connected
    #[error("Session already connected")]
    AlreadyConnected,

    /// The device rejected the login credentials
    #[error("Authentication failed for user '{user}': {message}")]
    AuthenticationFailed { user: String, message: String },

    /// The device rejected the enable password or a command's AAA authorization
    #[error("Authorization failed on {hostname}: {reason}")]
    AuthorizationFailed { hostname: String, reason: String },

    /// Invalid configuration in the session builder
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

/// Device configuration, verification and assertion errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A directive is absent from the running configuration after the change
    #[error("Configure Error: failed to configure '{directive}'")]
    VerificationFailed { directive: String },

    /// Filesystem class is unset or not one the firmware logic knows
    #[error("Unknown filesystem class '{name}'")]
    UnknownFilesystemClass { name: String },

    /// Configuration option name could not be parsed
    #[error("Unknown configuration option '{name}': {reason}")]
    UnknownOption { name: String, reason: String },

    /// Command output failed its descriptor assertions
    #[error("[-][{command}] failed\n{diagnostic}")]
    AssertionFailed { command: String, diagnostic: String },

    /// The device printed something the workflow cannot proceed from
    #[error("Unexpected device output: {message}")]
    UnexpectedOutput { message: String },

    /// A controller setting required by the operation is missing
    #[error("Missing setting '{name}'")]
    MissingSetting { name: String },
}

/// External helper script errors.
#[derive(Error, Debug)]
pub enum ScriptError {
    /// The script could not be started
    #[error("Failed to run script '{path}': {source}")]
    Spawn {
        path: String,
        #[source]
        source: io::Error,
    },

    /// The script exited with a non-zero status
    #[error("Script '{path}' exited with an error code {code:?}")]
    NonZeroExit { path: String, code: Option<i32> },

    /// The script did not finish in time
    #[error("Script '{path}' did not finish within {timeout:?}")]
    Timeout { path: String, timeout: Duration },
}

/// Result type alias using ferrios's Error.
pub type Result<T> = std::result::Result<T, Error>;
