//! Drive one command to the next shell prompt.

use std::time::{Duration, Instant};

use log::{debug, warn};

use super::response::Response;
use super::session::Session;
use crate::channel::PromptKind;
use crate::error::Result;
use crate::platform::ios;

/// Maximum number of expects per command before giving up on the prompt.
pub const MAX_PROMPT_RESOLUTIONS: usize = 10;

/// Runs commands, declining any confirmation dialogs they raise.
///
/// `[yes/no]` is answered with the line `n`; `[confirm]` with a bare `n`
/// since IOS acts on the keystroke. When the shell prompt has not returned
/// after [`MAX_PROMPT_RESOLUTIONS`] expects, the output gathered so far is
/// returned with [`Response::complete`] unset.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    max_resolutions: usize,
    timeout: Option<Duration>,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandRunner {
    /// Runner with the default bound and the session's default timeout.
    pub fn new() -> Self {
        Self {
            max_resolutions: MAX_PROMPT_RESOLUTIONS,
            timeout: None,
        }
    }

    /// Use `timeout` per expect instead of the session default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Override the expect bound.
    pub fn with_max_resolutions(mut self, max: usize) -> Self {
        self.max_resolutions = max;
        self
    }

    /// Send `command` and collect its output up to the next shell prompt.
    pub async fn run(&self, session: &mut Session, command: &str) -> Result<Response> {
        self.execute(session, command, false).await
    }

    /// Send `command` without waiting for a prompt (e.g. `reload` or
    /// commands that hand the line to another program).
    pub async fn run_without_prompt(
        &self,
        session: &mut Session,
        command: &str,
    ) -> Result<Response> {
        self.execute(session, command, true).await
    }

    async fn execute(
        &self,
        session: &mut Session,
        command: &str,
        no_shell_prompt: bool,
    ) -> Result<Response> {
        let start = Instant::now();
        let timeout = self.timeout.unwrap_or(session.timeout());

        if session.hostname().len() + 1 + command.len() > ios::LINE_WIDTH {
            debug!("'{}' is longer than the terminal line; echo may wrap", command);
        }

        session.sendline(command).await?;

        let mut raw = String::new();
        let mut prompt = String::new();
        let mut prompts_answered = 0;
        let mut complete = no_shell_prompt;

        if !no_shell_prompt {
            for _ in 0..self.max_resolutions {
                let m = session
                    .expect_timeout(
                        &[PromptKind::YesNo, PromptKind::Confirm, PromptKind::Shell],
                        timeout,
                    )
                    .await?;
                raw.push_str(&m.captured.before);

                match m.kind {
                    PromptKind::YesNo => {
                        session.sendline("n").await?;
                        prompts_answered += 1;
                    }
                    PromptKind::Confirm => {
                        session.send("n").await?;
                        prompts_answered += 1;
                    }
                    _ => {
                        prompt = m.captured.after.trim().to_string();
                        complete = true;
                        break;
                    }
                }
            }

            if !complete {
                warn!(
                    "[{}] '{}' still prompting after {} answers; returning partial output",
                    session.hostname(),
                    command,
                    self.max_resolutions
                );
            }
        }

        let result = strip_echo(&raw, command).to_string();
        let failure_message = ios::detect_failure(&result).map(str::to_string);

        Ok(Response {
            command: command.to_string(),
            result,
            raw_result: raw,
            prompt,
            elapsed: start.elapsed(),
            complete,
            prompts_answered,
            failure_message,
        })
    }
}

/// Remove the echoed command line from the start of `output`.
pub fn strip_echo<'a>(output: &'a str, command: &str) -> &'a str {
    match output.strip_prefix(command) {
        Some(rest) => rest.trim_start_matches(['\r', '\n']),
        None => output,
    }
}
