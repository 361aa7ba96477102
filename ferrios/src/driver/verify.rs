//! Running-configuration verification.

use std::sync::LazyLock;
use std::time::Duration;

use log::{debug, trace};
use regex::Regex;

use super::session::Session;
use crate::channel::PromptKind;
use crate::error::{ConfigError, Result};
use crate::platform::ios;

static VTY_PASSWORD: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)line vty.+password").ok());

static TACACS_ACCOUNTING: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"aaa accounting (.+?) start-stop group tacacs\+").ok());

/// How a directive is checked against the running configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveRule {
    /// Plain substring containment.
    Literal(String),

    /// `no ...`: removal cannot be confirmed by containment, so skipped.
    Negated,

    /// `password password` on a vty line, shown as `line vty ... password 7 <hash>`.
    VtyPasswordOnly,

    /// `aaa accounting <class> start-stop group tacacs+`. Newer images render
    /// it over several lines with `action-type`.
    TacacsAccounting {
        /// Accounting class and list, e.g. `exec default`.
        class: String,
    },
}

impl DirectiveRule {
    /// Pick the rule for `directive`.
    pub fn parse(directive: &str) -> Self {
        let lower = directive.trim().to_lowercase();

        if lower.starts_with("no ") {
            return DirectiveRule::Negated;
        }
        if lower == "password password" {
            return DirectiveRule::VtyPasswordOnly;
        }
        if lower.contains("aaa accounting") {
            let class = TACACS_ACCOUNTING
                .as_ref()
                .and_then(|re| re.captures(&lower))
                .map(|caps| caps[1].to_string());
            if let Some(class) = class {
                return DirectiveRule::TacacsAccounting { class };
            }
        }

        DirectiveRule::Literal(directive.to_string())
    }

    /// Whether `config` satisfies this rule.
    pub fn check(&self, config: &str) -> bool {
        match self {
            DirectiveRule::Literal(text) => config.contains(text.as_str()),
            DirectiveRule::Negated => true,
            DirectiveRule::VtyPasswordOnly => VTY_PASSWORD
                .as_ref()
                .is_some_and(|re| re.is_match(config)),
            DirectiveRule::TacacsAccounting { class } => {
                let pattern = format!(
                    r"aaa accounting {}[\t\r\n ]*(action-type )?start-stop[\t\r\n ]*group tacacs\+",
                    regex::escape(class)
                );
                Regex::new(&pattern).is_ok_and(|re| re.is_match(config))
            }
        }
    }
}

/// Pages through `show run` and checks directives against it.
#[derive(Debug, Clone, Default)]
pub struct ConfigVerifier {
    timeout: Option<Duration>,
}

impl ConfigVerifier {
    /// Verifier using the session's default timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `timeout` per page instead of the session default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Read the full running configuration, acknowledging each pager stop.
    pub async fn running_config(
        &self,
        session: &mut Session,
        in_config_mode: bool,
    ) -> Result<String> {
        let timeout = self.timeout.unwrap_or(session.timeout());
        let command = if in_config_mode {
            ios::DO_SHOW_RUNNING_CONFIG
        } else {
            ios::SHOW_RUNNING_CONFIG
        };

        session.sendline(command).await?;

        let mut config = String::new();
        let mut pages = 1;
        loop {
            let m = session
                .expect_timeout(&[PromptKind::Pager, PromptKind::Shell], timeout)
                .await?;
            config.push_str(&m.captured.before);

            if m.kind != PromptKind::Pager {
                break;
            }
            pages += 1;
            session.sendline("").await?;
        }

        debug!(
            "[{}] read {} chars of running config in {} page(s)",
            session.hostname(),
            config.len(),
            pages
        );
        trace!("running config: {:?}", config);
        Ok(config)
    }

    /// Fail with [`ConfigError::VerificationFailed`] naming the first directive
    /// missing from `config`.
    pub fn check<S: AsRef<str>>(config: &str, directives: &[S]) -> Result<()> {
        for directive in directives {
            let directive = directive.as_ref();
            if !DirectiveRule::parse(directive).check(config) {
                debug!("'{}' not found in running config", directive);
                return Err(ConfigError::VerificationFailed {
                    directive: directive.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Read the running configuration and check every directive.
    pub async fn verify<S: AsRef<str>>(
        &self,
        session: &mut Session,
        directives: &[S],
        in_config_mode: bool,
    ) -> Result<()> {
        let config = self.running_config(session, in_config_mode).await?;
        Self::check(&config, directives)
    }
}
