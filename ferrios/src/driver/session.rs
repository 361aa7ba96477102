//! Session: one logged-in CLI connection to a device.
//!
//! Login handles the usual IOS line configurations: username and password,
//! password only, or no login at all, each followed by an optional
//! `enable`. SSH host-key questions (`(yes/no)?`) are answered `yes`.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, trace, warn};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

use crate::channel::{Captured, ExpectChannel, PromptKind, PromptSet};
use crate::error::{Result, SessionError};
use crate::platform::ios;
use crate::transport::{Connector, Protocol, TransportConfig};

/// How long a repeated `Password:` after the enable secret may take to turn
/// into the privileged prompt.
const ENABLE_PROMPT_GRACE: Duration = Duration::from_secs(1);

/// Login state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport.
    Disconnected,
    /// Waiting for the connector.
    Connecting,
    /// Probing for credential prompts.
    AwaitingCredential,
    /// Credentials sent, acquiring the privileged prompt.
    Escalating,
    /// At the privileged prompt.
    Ready,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::AwaitingCredential => "awaiting credential",
            SessionState::Escalating => "escalating",
            SessionState::Ready => "ready",
        };
        f.write_str(name)
    }
}

/// Result of [`Session::expect`]: which kind matched and the captured text.
#[derive(Debug, Clone)]
pub struct PromptMatch {
    /// The kind that matched.
    pub kind: PromptKind,

    /// Text before and of the match.
    pub captured: Captured,
}

/// A CLI session to one device.
///
/// Owns its transport exclusively. Every operation takes `&mut self`, so two
/// interactions can never interleave on the same session.
pub struct Session {
    transport: TransportConfig,
    connector: Arc<dyn Connector>,
    prompts: PromptSet,
    enable_password: SecretString,
    timeout: Duration,
    exit_timeout: Duration,
    terminal_length_zero: bool,
    channel: Option<ExpectChannel>,
    state: SessionState,
    last: Captured,
}

impl Session {
    pub(crate) fn new(
        transport: TransportConfig,
        connector: Arc<dyn Connector>,
        prompts: PromptSet,
        enable_password: SecretString,
        timeout: Duration,
        exit_timeout: Duration,
        terminal_length_zero: bool,
    ) -> Self {
        Self {
            transport,
            connector,
            prompts,
            enable_password,
            timeout,
            exit_timeout,
            terminal_length_zero,
            channel: None,
            state: SessionState::Disconnected,
            last: Captured::default(),
        }
    }

    /// Connect and log in, then run `f`, then disconnect.
    ///
    /// Disconnect runs on every path, including a failed login. A failure to
    /// disconnect is logged and never replaces the result of `f`.
    ///
    /// ```rust,no_run
    /// # use ferrios::{CommandRunner, SessionBuilder};
    /// # async fn example() -> Result<(), ferrios::Error> {
    /// let mut session = SessionBuilder::new("10.0.0.1").hostname("router").build()?;
    /// let version = session
    ///     .scoped(async |s| CommandRunner::new().run(s, "show version").await)
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn scoped<T, F>(&mut self, f: F) -> Result<T>
    where
        F: AsyncFnOnce(&mut Session) -> Result<T>,
    {
        let result = match self.open().await {
            Ok(()) => f(&mut *self).await,
            Err(e) => Err(e),
        };

        if let Err(e) = self.close().await {
            warn!("Error while disconnecting from {}: {}", self.hostname(), e);
        }

        result
    }

    /// Connect and log in.
    pub async fn open(&mut self) -> Result<()> {
        if self.channel.is_some() {
            return Err(SessionError::AlreadyConnected.into());
        }

        self.state = SessionState::Connecting;
        let transport = match self.connector.connect(&self.transport).await {
            Ok(transport) => transport,
            Err(e) => {
                self.state = SessionState::Disconnected;
                return Err(e);
            }
        };
        self.channel = Some(ExpectChannel::new(transport));

        self.login().await
    }

    async fn login(&mut self) -> Result<()> {
        self.state = SessionState::AwaitingCredential;

        let mut kind = self
            .expect(&[
                PromptKind::Continue,
                PromptKind::Username,
                PromptKind::Password,
                PromptKind::Hostname,
            ])
            .await?
            .kind;

        if kind == PromptKind::Continue {
            self.sendline("yes").await?;
            kind = self
                .expect(&[PromptKind::Username, PromptKind::Password, PromptKind::Hostname])
                .await?
                .kind;
        }

        if kind == PromptKind::Hostname {
            // No login configured; resynchronize on a fresh prompt.
            self.sendline("").await?;
        } else {
            if kind == PromptKind::Username {
                let username = self.transport.username.clone();
                self.sendline(&username).await?;
                self.expect(&[PromptKind::Password]).await?;
            }
            let password = self.transport.password.clone();
            self.sendline_secret(&password).await?;
        }

        self.state = SessionState::Escalating;
        let m = self
            .expect(&[
                PromptKind::LoginFailed,
                PromptKind::Privileged,
                PromptKind::Unprivileged,
            ])
            .await?;

        match m.kind {
            PromptKind::LoginFailed => {
                return Err(SessionError::AuthenticationFailed {
                    user: self.transport.username.clone(),
                    message: m.captured.after.trim().to_string(),
                }
                .into());
            }
            PromptKind::Unprivileged => self.enable().await?,
            _ => {}
        }

        self.state = SessionState::Ready;

        if self.terminal_length_zero {
            self.sendline(ios::TERMINAL_LENGTH_ZERO).await?;
            self.expect(&[PromptKind::Privileged]).await?;
        }

        info!("Logged in to {} ({})", self.hostname(), self.transport.socket_addr());
        Ok(())
    }

    async fn enable(&mut self) -> Result<()> {
        self.sendline("enable").await?;
        self.expect(&[PromptKind::Password]).await?;

        let enable_password = self.enable_password.clone();
        self.sendline_secret(&enable_password).await?;

        let m = self
            .expect(&[
                PromptKind::Privileged,
                PromptKind::EnableRejected,
                PromptKind::Password,
                PromptKind::Unprivileged,
            ])
            .await?;

        let accepted = match m.kind {
            PromptKind::Privileged => true,
            // Some lines repeat the password prompt before showing `#`.
            PromptKind::Password => {
                let grace = ENABLE_PROMPT_GRACE.min(self.timeout);
                match self.expect_timeout(&[PromptKind::Privileged], grace).await {
                    Ok(_) => true,
                    Err(e) if e.is_timeout() => false,
                    Err(e) => return Err(e),
                }
            }
            _ => false,
        };

        if !accepted {
            return Err(SessionError::AuthorizationFailed {
                hostname: self.hostname().to_string(),
                reason: format!("enable failed at {:?}", m.captured.after.trim()),
            }
            .into());
        }

        debug!("[{}] enable accepted", self.hostname());
        Ok(())
    }

    /// Send `exit`, wait for the device to hang up, and release the transport.
    ///
    /// A device that does not hang up within the exit timeout is closed
    /// anyway. Calling this on a closed session is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut channel) = self.channel.take() else {
            self.state = SessionState::Disconnected;
            return Ok(());
        };
        self.state = SessionState::Disconnected;

        debug!("Disconnecting from {}", self.prompts.hostname());
        if !channel.is_eof() {
            match channel.sendline("exit").await {
                Ok(()) => {
                    if let Err(e) = channel.expect_eof(self.exit_timeout).await {
                        warn!(
                            "{} did not hang up after exit ({}), closing",
                            self.prompts.hostname(),
                            e
                        );
                    }
                }
                Err(e) => debug!("Could not send exit: {}", e),
            }
        }

        channel.close().await
    }

    /// Tear down the connection and log in again.
    pub async fn reconnect(&mut self) -> Result<()> {
        debug!("Attempting to log in again to {}", self.hostname());
        if let Err(e) = self.close().await {
            warn!("Error while disconnecting from {}: {}", self.hostname(), e);
        }
        self.open().await?;
        debug!("Logged in again to {}", self.hostname());
        Ok(())
    }

    fn channel(&mut self) -> Result<&mut ExpectChannel> {
        self.channel
            .as_mut()
            .ok_or_else(|| SessionError::NotConnected.into())
    }

    /// Send text without a newline.
    pub async fn send(&mut self, text: &str) -> Result<()> {
        debug!("[{}] send: {:?}", self.prompts.hostname(), text);
        self.channel()?.send(text).await
    }

    /// Send a line.
    pub async fn sendline(&mut self, text: &str) -> Result<()> {
        debug!("[{}] sendline: {}", self.prompts.hostname(), text);
        self.channel()?.sendline(text).await
    }

    async fn sendline_secret(&mut self, secret: &SecretString) -> Result<()> {
        debug!("[{}] sendline: <hidden>", self.prompts.hostname());
        self.channel()?.sendline(secret.expose_secret()).await
    }

    /// Wait for one of `kinds` with the default timeout.
    pub async fn expect(&mut self, kinds: &[PromptKind]) -> Result<PromptMatch> {
        self.expect_timeout(kinds, self.timeout).await
    }

    /// Wait for one of `kinds`.
    pub async fn expect_timeout(
        &mut self,
        kinds: &[PromptKind],
        timeout: Duration,
    ) -> Result<PromptMatch> {
        let patterns = self.prompts.select(kinds);
        let channel = self
            .channel
            .as_mut()
            .ok_or(SessionError::NotConnected)?;
        let captured = channel.expect(&patterns, timeout).await?;
        let kind = kinds[captured.index];

        trace!(
            "[{}] expect {:?} -> {:?}",
            self.prompts.hostname(),
            kinds,
            kind
        );
        self.last = captured.clone();
        Ok(PromptMatch { kind, captured })
    }

    /// Wait for ad-hoc patterns (device dialogs outside the [`PromptSet`]).
    pub async fn expect_patterns(
        &mut self,
        patterns: &[&Regex],
        timeout: Duration,
    ) -> Result<Captured> {
        let captured = self.channel()?.expect(patterns, timeout).await?;
        trace!(
            "[{}] expect {} pattern(s) -> #{}",
            self.prompts.hostname(),
            patterns.len(),
            captured.index
        );
        self.last = captured.clone();
        Ok(captured)
    }

    /// Wait for the shell prompt (`router#` or `router(...)#`).
    pub async fn expect_prompt(&mut self) -> Result<Captured> {
        Ok(self.expect(&[PromptKind::Shell]).await?.captured)
    }

    /// Send a line and wait for the shell prompt.
    pub async fn sendline_and_expect_prompt(&mut self, text: &str) -> Result<Captured> {
        self.sendline(text).await?;
        self.expect_prompt().await
    }

    /// Wait for the device to close the stream.
    pub async fn expect_eof(&mut self, timeout: Duration) -> Result<String> {
        self.channel()?.expect_eof(timeout).await
    }

    /// Text before the last match.
    pub fn before(&self) -> &str {
        &self.last.before
    }

    /// Text of the last match.
    pub fn after(&self) -> &str {
        &self.last.after
    }

    /// Device hostname.
    pub fn hostname(&self) -> &str {
        self.prompts.hostname()
    }

    /// Compiled prompt patterns for this device.
    pub fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    /// Protocol used to connect.
    pub fn protocol(&self) -> Protocol {
        self.transport.protocol
    }

    /// Default expect timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Change the default expect timeout.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Current login state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a transport is attached.
    pub fn is_open(&self) -> bool {
        self.channel.is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::driver::SessionBuilder;
    use crate::transport::mock::{ScriptedConnector, SilentConnector, privileged_login};
    use tokio_test::io::Builder;

    pub(crate) fn session_with(connector: Arc<dyn Connector>) -> Session {
        SessionBuilder::new("10.0.0.1")
            .hostname("router")
            .username("admin")
            .password("secret")
            .enable_password("enablepw")
            .timeout(Duration::from_secs(2))
            .exit_timeout(Duration::from_millis(200))
            .terminal_length_zero(false)
            .connector(connector)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_login_username_password_enable() {
        let mut device = Builder::new();
        device
            .read(b"\r\nUser Access Verification\r\n\r\nUsername: ")
            .write(b"admin\n")
            .read(b"admin\r\nPassword: ")
            .write(b"secret\n")
            .read(b"\r\nrouter>")
            .write(b"enable\n")
            .read(b"enable\r\nPassword: ")
            .write(b"enablepw\n")
            .read(b"\r\nrouter#")
            .write(b"exit\n");
        let connector = Arc::new(ScriptedConnector::new(vec![device]));
        let mut session = session_with(connector.clone());

        session.open().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.after(), "router#");

        session.close().await.unwrap();
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_open());
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let mut device = Builder::new();
        device
            .read(b"Username: ")
            .write(b"admin\n")
            .read(b"Password: ")
            .write(b"secret\n")
            .read(b"\r\n% Authentication failed\r\n\r\nUsername: ")
            .write(b"exit\n");
        let mut session = session_with(Arc::new(ScriptedConnector::new(vec![device])));

        let err = session.scoped(async |_| Ok(())).await.unwrap_err();
        assert!(err.is_authentication_failure());
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_enable_rejected() {
        let mut device = Builder::new();
        device
            .read(b"Password: ")
            .write(b"secret\n")
            .read(b"\r\nrouter>")
            .write(b"enable\n")
            .read(b"Password: ")
            .write(b"enablepw\n")
            .read(b"\r\n% Access denied\r\n\r\nrouter>")
            .write(b"exit\n");
        let mut session = session_with(Arc::new(ScriptedConnector::new(vec![device])));

        let err = session.open().await.unwrap_err();
        assert!(err.is_authorization_failure());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_enable_password_prompt_then_privileged() {
        let mut device = Builder::new();
        device
            .read(b"Password: ")
            .write(b"secret\n")
            .read(b"\r\nrouter>")
            .write(b"enable\n")
            .read(b"Password: ")
            .write(b"enablepw\n")
            .read(b"\r\nPassword: \r\nrouter#")
            .write(b"exit\n");
        let mut session = session_with(Arc::new(ScriptedConnector::new(vec![device])));

        session.open().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        assert_eq!(session.after(), "router#");
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_enable_password_prompt_repeated() {
        let mut device = Builder::new();
        device
            .read(b"Password: ")
            .write(b"secret\n")
            .read(b"\r\nrouter>")
            .write(b"enable\n")
            .read(b"Password: ")
            .write(b"enablepw\n")
            .read(b"\r\nPassword: ")
            .write(b"exit\n");
        let mut session = session_with(Arc::new(ScriptedConnector::new(vec![device])));

        let err = session.open().await.unwrap_err();
        assert!(err.is_authorization_failure());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_enable_rejected_message() {
        let mut device = Builder::new();
        device
            .read(b"Password: ")
            .write(b"secret\n")
            .read(b"\r\nrouter>")
            .write(b"enable\n")
            .read(b"Password: ")
            .write(b"enablepw\n")
            .read(b"\r\n% Enable rejected\r\n")
            .write(b"exit\n");
        let mut session = session_with(Arc::new(ScriptedConnector::new(vec![device])));

        let err = session.open().await.unwrap_err();
        assert!(err.is_authorization_failure());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_login_ssh_continue_prompt_and_no_login() {
        let mut device = Builder::new();
        device
            .read(b"Are you sure you want to continue connecting (yes/no)? ")
            .write(b"yes\n")
            .read(b"\r\nrouter#")
            .write(b"\n")
            .read(b"\r\nrouter#")
            .write(b"exit\n");
        let mut session = session_with(Arc::new(ScriptedConnector::new(vec![device])));

        session.open().await.unwrap();
        assert_eq!(session.state(), SessionState::Ready);
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_terminal_length_zero_sent() {
        let mut device = privileged_login("router");
        device
            .write(b"terminal length 0\n")
            .read(b"terminal length 0\r\nrouter#")
            .write(b"exit\n");
        let connector: Arc<dyn Connector> = Arc::new(ScriptedConnector::new(vec![device]));
        let mut session = SessionBuilder::new("10.0.0.1")
            .hostname("router")
            .timeout(Duration::from_secs(2))
            .connector(connector)
            .build()
            .unwrap();

        session.open().await.unwrap();
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_scoped_closes_after_body_error() {
        let mut device = privileged_login("router");
        device.write(b"exit\n");
        let mut session = session_with(Arc::new(ScriptedConnector::new(vec![device])));

        let err = session
            .scoped(async |_| -> Result<()> {
                Err(SessionError::InvalidConfig {
                    message: "body failed".into(),
                }
                .into())
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("body failed"));
        assert!(!session.is_open());
    }

    #[tokio::test]
    async fn test_login_timeout() {
        let mut session = session_with(Arc::new(SilentConnector));
        session.set_timeout(Duration::from_millis(50));

        let err = session.scoped(async |_| Ok(())).await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let mut session = session_with(Arc::new(SilentConnector));
        let err = session.sendline("show clock").await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Session(SessionError::NotConnected)
        ));
    }
}
