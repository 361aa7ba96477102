//! Configuration submode tracking.
//!
//! IOS shows the submode only in the prompt, so the tracker remembers the
//! commands that led into the current submode. After a reconnect the
//! session starts at the top level again and [`ModeTracker::replay`]
//! re-enters the same depth.

use log::debug;

use super::session::Session;
use crate::channel::PromptForm;
use crate::error::Result;

/// Effect of one command on the submode stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeTransition {
    /// First entry into configuration mode.
    Entered,
    /// Entered a deeper submode.
    Nested,
    /// `exit` returned to the parent submode.
    Exited,
    /// The top-level prompt reappeared; the stack was cleared.
    Reset,
    /// Nothing changed.
    Unchanged,
}

/// Ordered stack of commands used to reach the current submode.
///
/// Empty exactly when the session is at the top-level prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModeTracker {
    commands: Vec<String>,
    last_mode: Option<String>,
}

impl ModeTracker {
    /// Create an empty tracker (top level).
    pub fn new() -> Self {
        Self::default()
    }

    /// Update the stack after `command` produced a prompt of shape `form`.
    pub fn observe(&mut self, command: &str, form: &PromptForm) -> ModeTransition {
        let transition = match form {
            PromptForm::Submode(mode) => match self.last_mode.as_deref() {
                None => {
                    self.commands.push(command.to_string());
                    ModeTransition::Entered
                }
                Some(last) if last != mode => {
                    if command.trim() == "exit" {
                        self.commands.pop();
                        ModeTransition::Exited
                    } else {
                        self.commands.push(command.to_string());
                        ModeTransition::Nested
                    }
                }
                Some(_) => ModeTransition::Unchanged,
            },
            PromptForm::Privileged if !self.is_top_level() => {
                self.commands.clear();
                self.last_mode = None;
                ModeTransition::Reset
            }
            _ => ModeTransition::Unchanged,
        };

        if let PromptForm::Submode(mode) = form {
            self.last_mode = Some(mode.clone());
        }

        if transition != ModeTransition::Unchanged {
            debug!("Mode {:?} after '{}': {:?}", transition, command, self.commands);
        }
        transition
    }

    /// Commands that entered the current submode, outermost first.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Current submode depth.
    pub fn depth(&self) -> usize {
        self.commands.len()
    }

    /// Whether the session is at the top-level prompt.
    pub fn is_top_level(&self) -> bool {
        self.commands.is_empty() && self.last_mode.is_none()
    }

    /// Submode text of the last submode prompt, e.g. `config-line`.
    pub fn current_mode(&self) -> Option<&str> {
        self.last_mode.as_deref()
    }

    /// Forget all state.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.last_mode = None;
    }

    /// Re-issue every stored command on `session`, waiting for the shell
    /// prompt after each.
    pub async fn replay(&self, session: &mut Session) -> Result<()> {
        for command in &self.commands {
            debug!("[{}] replaying '{}'", session.hostname(), command);
            session.sendline_and_expect_prompt(command).await?;
        }
        Ok(())
    }
}
