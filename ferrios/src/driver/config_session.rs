//! Configuration changes with recovery from transient authorization failures.
//!
//! With TACACS+ command authorization a configuration command can be
//! rejected while the AAA server is briefly unreachable or the new AAA
//! settings are half-applied. The applier recovers once per command: it
//! logs in again, replays the submode stack and resends the command.
//!
//! # Example
//!
//! ```rust,no_run
//! use ferrios::{ConfigSession, SessionBuilder};
//!
//! # async fn example() -> Result<(), ferrios::Error> {
//! let mut session = SessionBuilder::new("10.0.0.1").hostname("router").build()?;
//! session.open().await?;
//!
//! let mut config = ConfigSession::enter(&mut session).await?;
//! config.send("line vty 0 4").await?;
//! config.send("login local").await?;
//! config.send("exit").await?;
//! config.verify(&["login local"]).await?;
//! config.exit().await?;
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

use log::{debug, warn};

use super::mode::{ModeTracker, ModeTransition};
use super::session::Session;
use super::verify::ConfigVerifier;
use crate::channel::{Captured, PromptKind};
use crate::error::{Result, SessionError};

const APPLY_KINDS: [PromptKind; 3] = [
    PromptKind::AaaConfirm,
    PromptKind::AuthorizationFailed,
    PromptKind::Prompt,
];

/// Sends configuration commands while tracking the submode stack.
#[derive(Debug, Clone, Default)]
pub struct ConfigChangeApplier {
    tracker: ModeTracker,
}

impl ConfigChangeApplier {
    /// Applier starting at the top-level prompt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Submode state built so far.
    pub fn tracker(&self) -> &ModeTracker {
        &self.tracker
    }

    /// Send one command and wait for the prompt.
    ///
    /// `no aaa new-model` confirmations are answered `y`. On
    /// `Authorization failed` the session reconnects, the submode stack is
    /// replayed and the command is resent; a second authorization failure
    /// for the same command is returned as
    /// [`SessionError::AuthorizationFailed`].
    pub async fn apply(&mut self, session: &mut Session, command: &str) -> Result<Captured> {
        session.sendline(command).await?;
        let mut m = session.expect(&APPLY_KINDS).await?;
        let mut reconnected = false;

        while m.kind != PromptKind::Prompt {
            match m.kind {
                PromptKind::AuthorizationFailed if reconnected => {
                    return Err(SessionError::AuthorizationFailed {
                        hostname: session.hostname().to_string(),
                        reason: format!("'{}' rejected again after logging in again", command),
                    }
                    .into());
                }
                PromptKind::AuthorizationFailed => {
                    warn!(
                        "[{}] authorization failed for '{}'; logging in again and replaying {} command(s)",
                        session.hostname(),
                        command,
                        self.tracker.depth()
                    );
                    session.reconnect().await?;
                    self.tracker.replay(session).await?;
                    reconnected = true;
                    session.sendline(command).await?;
                }
                _ => session.sendline("y").await?,
            }
            m = session.expect(&APPLY_KINDS).await?;
        }

        let form = session.prompts().classify(&m.captured.after);
        let transition = self.tracker.observe(command, &form);
        if transition == ModeTransition::Unchanged {
            debug!("[{}] '{}' at {:?}", session.hostname(), command, form);
        }

        Ok(m.captured)
    }

    /// Apply commands in order, stopping at the first error.
    pub async fn apply_all<S: AsRef<str>>(
        &mut self,
        session: &mut Session,
        commands: &[S],
    ) -> Result<()> {
        for command in commands {
            self.apply(session, command.as_ref()).await?;
        }
        Ok(())
    }
}

/// RAII guard for a `configure terminal` session.
///
/// Holds `&mut Session` so nothing else can use the session while the
/// device is in configuration mode. `exit()` consumes the guard.
pub struct ConfigSession<'a> {
    session: &'a mut Session,
    applier: ConfigChangeApplier,
    verifier: ConfigVerifier,
    consumed: bool,
}

impl<'a> ConfigSession<'a> {
    /// Enter configuration mode.
    pub async fn enter(session: &'a mut Session) -> Result<Self> {
        let mut applier = ConfigChangeApplier::new();
        applier.apply(session, "configure terminal").await?;

        Ok(Self {
            session,
            applier,
            verifier: ConfigVerifier::new(),
            consumed: false,
        })
    }

    /// Apply one configuration command.
    pub async fn send(&mut self, command: &str) -> Result<Captured> {
        self.applier.apply(self.session, command).await
    }

    /// Apply several configuration commands.
    pub async fn send_all<S: AsRef<str>>(&mut self, commands: &[S]) -> Result<()> {
        self.applier.apply_all(self.session, commands).await
    }

    /// Check that every directive is in the running configuration.
    pub async fn verify<S: AsRef<str>>(&mut self, directives: &[S]) -> Result<()> {
        self.verifier.verify(self.session, directives, true).await
    }

    /// Submode state.
    pub fn tracker(&self) -> &ModeTracker {
        self.applier.tracker()
    }

    /// The underlying session, for dialogs outside the applier.
    pub fn session(&mut self) -> &mut Session {
        &mut *self.session
    }

    /// Leave configuration mode with `exit` from the global level.
    pub async fn exit(mut self) -> Result<()> {
        self.consumed = true;
        self.applier.apply(self.session, "exit").await?;
        Ok(())
    }

    /// Release the guard without leaving configuration mode.
    pub fn detach(mut self) {
        self.consumed = true;
    }
}

impl Drop for ConfigSession<'_> {
    fn drop(&mut self) {
        if !self.consumed {
            warn!("ConfigSession dropped without exit() or detach()");
        }
    }
}
