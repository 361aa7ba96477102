//! Prompt and interaction patterns for an IOS device.
//!
//! Everything the engine reacts to is compiled once per hostname into a
//! [`PromptSet`] keyed by [`PromptKind`].

use indexmap::IndexMap;
use regex::Regex;

use crate::error::{ChannelError, Result};

/// Symbolic name of a recognized pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    /// `router>`
    Unprivileged,
    /// `router#`
    Privileged,
    /// `router(config-line)#`
    Submode,
    /// Privileged prompt at any depth: `router#` or `router(...)#`.
    Shell,
    /// Any prompt, privileged or not.
    Prompt,
    /// The bare hostname.
    Hostname,
    /// `--More--`
    Pager,
    /// `[confirm]`
    Confirm,
    /// `[yes/no]`
    YesNo,
    /// SSH-style `(yes/no)?` continuation.
    Continue,
    /// `Username:`
    Username,
    /// `Password:`
    Password,
    /// `% Authentication failed` / `% Login invalid`
    LoginFailed,
    /// `Enable rejected`
    EnableRejected,
    /// `Authorization failed`, any case.
    AuthorizationFailed,
    /// Confirmation IOS asks for before leaving AAA new-model.
    AaaConfirm,
}

impl PromptKind {
    const ALL: [PromptKind; 16] = [
        PromptKind::Unprivileged,
        PromptKind::Privileged,
        PromptKind::Submode,
        PromptKind::Shell,
        PromptKind::Prompt,
        PromptKind::Hostname,
        PromptKind::Pager,
        PromptKind::Confirm,
        PromptKind::YesNo,
        PromptKind::Continue,
        PromptKind::Username,
        PromptKind::Password,
        PromptKind::LoginFailed,
        PromptKind::EnableRejected,
        PromptKind::AuthorizationFailed,
        PromptKind::AaaConfirm,
    ];

    fn pattern(self, host: &str) -> String {
        match self {
            PromptKind::Unprivileged => format!("{host}>"),
            PromptKind::Privileged => format!("{host}#"),
            PromptKind::Submode => format!(r"{host}\([^)]*\)#"),
            PromptKind::Shell => format!(r"{host}[^\s]*#"),
            PromptKind::Prompt => format!(r"{host}[^\s]*[#>]"),
            PromptKind::Hostname => host.to_string(),
            PromptKind::Pager => "--More--".into(),
            PromptKind::Confirm => r"\[confirm\]".into(),
            PromptKind::YesNo => r"\[[yY]es/[nN]o\]".into(),
            PromptKind::Continue => r"\(yes/no(/\[fingerprint\])?\)\?".into(),
            PromptKind::Username => "Username:".into(),
            PromptKind::Password => "Password:".into(),
            PromptKind::LoginFailed => "% Authentication failed|% Login invalid".into(),
            PromptKind::EnableRejected => "Enable rejected".into(),
            PromptKind::AuthorizationFailed => "(?i)authorization failed".into(),
            PromptKind::AaaConfirm => "back to no aaa new-model is not supported".into(),
        }
    }
}

/// Shape of a prompt the device printed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptForm {
    /// `router>`
    Unprivileged,
    /// `router#`
    Privileged,
    /// `router(<mode>)#`, carrying `<mode>`.
    Submode(String),
    /// Anything else (pager, confirmations, partial text).
    Other,
}

/// Compiled pattern table for one hostname.
#[derive(Debug, Clone)]
pub struct PromptSet {
    hostname: String,
    patterns: IndexMap<PromptKind, Regex>,
    submode_form: Regex,
    privileged_form: Regex,
    unprivileged_form: Regex,
}

impl PromptSet {
    /// Compile every pattern for `hostname`.
    pub fn new(hostname: &str) -> Result<Self> {
        let host = regex::escape(hostname);

        let mut patterns = IndexMap::with_capacity(PromptKind::ALL.len());
        for kind in PromptKind::ALL {
            let regex = Regex::new(&kind.pattern(&host)).map_err(ChannelError::InvalidPattern)?;
            patterns.insert(kind, regex);
        }

        let anchored = |pattern: String| -> Result<Regex> {
            Ok(Regex::new(&pattern).map_err(ChannelError::InvalidPattern)?)
        };

        Ok(Self {
            hostname: hostname.to_string(),
            patterns,
            submode_form: anchored(format!(r"^{host}\(([^)]*)\)#$"))?,
            privileged_form: anchored(format!("^{host}#$"))?,
            unprivileged_form: anchored(format!("^{host}>$"))?,
        })
    }

    /// Hostname the set was built for.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Compiled regex for `kind`.
    pub fn get(&self, kind: PromptKind) -> &Regex {
        &self.patterns[&kind]
    }

    /// Compiled regexes for `kinds`, in order.
    pub fn select(&self, kinds: &[PromptKind]) -> Vec<&Regex> {
        kinds.iter().map(|kind| self.get(*kind)).collect()
    }

    /// Classify matched prompt text.
    pub fn classify(&self, text: &str) -> PromptForm {
        let text = text.trim();
        if let Some(caps) = self.submode_form.captures(text) {
            return PromptForm::Submode(caps[1].to_string());
        }
        if self.privileged_form.is_match(text) {
            return PromptForm::Privileged;
        }
        if self.unprivileged_form.is_match(text) {
            return PromptForm::Unprivileged;
        }
        PromptForm::Other
    }
}
