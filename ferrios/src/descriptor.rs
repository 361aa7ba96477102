//! Declarative assertions over command output.
//!
//! A [`CommandDescriptor`] pairs a command with the [`AssertionSet`] its
//! output must satisfy. Evaluation produces a diagnostic with one line per
//! failed assertion; an empty diagnostic means the output passed.
//!
//! # Example
//!
//! ```rust
//! use ferrios::descriptor::{CommandDescriptor, Criteria};
//!
//! let mut descriptor = CommandDescriptor::new("show clock");
//! descriptor.add_criteria(Criteria::new().contain("UTC").not_contain("%"));
//!
//! assert!(descriptor.evaluate("*10:00:00.000 UTC Mon Mar 1 1993").is_empty());
//! assert_eq!(
//!     descriptor.evaluate("% Invalid input detected"),
//!     "\t-> Output does not contain[UTC]\n\t-> Output contains[%]\n"
//! );
//! ```

use std::fmt::Write;

use indexmap::IndexSet;
use log::{debug, trace};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Whether the output is required to be empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emptiness {
    /// No requirement.
    #[default]
    Unconstrained,
    /// Output must be empty after trimming whitespace.
    MustBeEmpty,
    /// Output must have non-whitespace text.
    MustNotBeEmpty,
}

/// Assertions accumulated for one command.
///
/// Append-only. Sets keep insertion order so diagnostics are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssertionSet {
    /// Substrings that must all appear.
    pub contains: IndexSet<String>,
    /// Substrings that must not appear.
    pub not_contains: IndexSet<String>,
    /// Literal prefixes, after optional leading whitespace.
    pub begins_with: Vec<String>,
    /// Literal suffixes, before optional trailing whitespace.
    pub ends_with: Vec<String>,
    /// Patterns that must match at the start of the output.
    pub regex: Vec<String>,
    /// Emptiness requirement.
    pub emptiness: Emptiness,
}

impl AssertionSet {
    /// Whether no assertion has been added.
    pub fn is_unconstrained(&self) -> bool {
        self == &AssertionSet::default()
    }
}

/// One batch of assertions to add to a descriptor.
///
/// Absent fields add nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Criteria {
    /// Substring the output must contain.
    pub should_contain: Option<String>,
    /// Substring the output must not contain.
    pub should_not_contain: Option<String>,
    /// Literal prefix.
    pub should_begin_with: Option<String>,
    /// Literal suffix.
    pub should_end_with: Option<String>,
    /// Pattern matched at the start of the output.
    pub should_match_regex: Option<String>,
    /// `true` for must-be-empty, `false` for must-not-be-empty.
    pub should_be_empty: Option<bool>,
}

impl Criteria {
    /// No criteria.
    pub fn new() -> Self {
        Self::default()
    }

    /// Require `text` in the output.
    pub fn contain(mut self, text: impl Into<String>) -> Self {
        self.should_contain = Some(text.into());
        self
    }

    /// Forbid `text` in the output.
    pub fn not_contain(mut self, text: impl Into<String>) -> Self {
        self.should_not_contain = Some(text.into());
        self
    }

    /// Require the output to start with `text`.
    pub fn begin_with(mut self, text: impl Into<String>) -> Self {
        self.should_begin_with = Some(text.into());
        self
    }

    /// Require the output to end with `text`.
    pub fn end_with(mut self, text: impl Into<String>) -> Self {
        self.should_end_with = Some(text.into());
        self
    }

    /// Require `pattern` to match at the start of the output.
    pub fn match_regex(mut self, pattern: impl Into<String>) -> Self {
        self.should_match_regex = Some(pattern.into());
        self
    }

    /// Require the output to be empty, or non-empty.
    pub fn be_empty(mut self, empty: bool) -> Self {
        self.should_be_empty = Some(empty);
        self
    }
}

/// A command and the assertions its output must satisfy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandDescriptor {
    /// Command line sent to the device.
    pub command: String,
    /// Assertions on its output.
    #[serde(default)]
    pub assertions: AssertionSet,
}

impl CommandDescriptor {
    /// Descriptor with no assertions.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            assertions: AssertionSet::default(),
        }
    }

    /// Add a required substring.
    pub fn should_contain(&mut self, text: impl Into<String>) {
        self.assertions.contains.insert(text.into());
    }

    /// Add a forbidden substring.
    pub fn should_not_contain(&mut self, text: impl Into<String>) {
        self.assertions.not_contains.insert(text.into());
    }

    /// Add a required prefix.
    pub fn should_begin_with(&mut self, text: impl Into<String>) {
        self.assertions.begins_with.push(text.into());
    }

    /// Add a required suffix.
    pub fn should_end_with(&mut self, text: impl Into<String>) {
        self.assertions.ends_with.push(text.into());
    }

    /// Add a pattern anchored at the start of the output.
    pub fn should_match_regex(&mut self, pattern: impl Into<String>) {
        self.assertions.regex.push(pattern.into());
    }

    /// Require empty output.
    pub fn should_be_empty(&mut self) {
        self.assertions.emptiness = Emptiness::MustBeEmpty;
    }

    /// Require non-empty output.
    pub fn should_not_be_empty(&mut self) {
        self.assertions.emptiness = Emptiness::MustNotBeEmpty;
    }

    /// Add every criterion present in `criteria`.
    pub fn add_criteria(&mut self, criteria: Criteria) {
        if let Some(text) = criteria.should_contain {
            debug!("Add to contain [{}]", text);
            self.should_contain(text);
        }
        if let Some(text) = criteria.should_not_contain {
            debug!("Add to not contain [{}]", text);
            self.should_not_contain(text);
        }
        if let Some(text) = criteria.should_begin_with {
            self.should_begin_with(text);
        }
        if let Some(text) = criteria.should_end_with {
            self.should_end_with(text);
        }
        if let Some(pattern) = criteria.should_match_regex {
            self.should_match_regex(pattern);
        }
        match criteria.should_be_empty {
            Some(true) => self.should_be_empty(),
            Some(false) => self.should_not_be_empty(),
            None => {}
        }
    }

    /// Check `output` against every assertion.
    ///
    /// Returns one `\t-> ...\n` line per failure, or an empty string.
    pub fn evaluate(&self, output: &str) -> String {
        let a = &self.assertions;
        let mut diagnostic = String::new();

        // Writing to a String cannot fail.
        if output.trim().is_empty() {
            if a.emptiness == Emptiness::MustNotBeEmpty {
                diagnostic.push_str("\t-> Output is empty\n");
            }
            for text in &a.contains {
                let _ = writeln!(diagnostic, "\t-> Output should contain[{}]", text);
            }
            for text in &a.begins_with {
                let _ = writeln!(diagnostic, "\t-> Output should begin with[{}]", text);
            }
            for text in &a.ends_with {
                let _ = writeln!(diagnostic, "\t-> Output should end with[{}]", text);
            }
            for pattern in &a.regex {
                let _ = writeln!(diagnostic, "\t-> Output should match regex[{}]", pattern);
            }
            return diagnostic;
        }

        if a.emptiness == Emptiness::MustBeEmpty {
            let _ = writeln!(
                diagnostic,
                "\t-> Output is not empty [{}]",
                output.trim().escape_debug()
            );
        }
        for text in &a.contains {
            if !output.contains(text.as_str()) {
                let _ = writeln!(diagnostic, "\t-> Output does not contain[{}]", text);
            }
        }
        for text in &a.not_contains {
            if output.contains(text.as_str()) {
                let _ = writeln!(diagnostic, "\t-> Output contains[{}]", text);
            }
        }
        for text in &a.begins_with {
            let pattern = format!(r"^\s*{}", regex::escape(text));
            if !is_match(&pattern, output) {
                let _ = writeln!(diagnostic, "\t-> Output does not begin with [{}]", text);
            }
        }
        for text in &a.ends_with {
            let pattern = format!(r"{}\s*$", regex::escape(text));
            if !is_match(&pattern, output) {
                let _ = writeln!(diagnostic, "\t-> Output does not end with [{}]", text);
            }
        }
        for pattern in &a.regex {
            trace!("regex [{}] against {:?}", pattern, output);
            match Regex::new(&format!("^(?:{})", pattern)) {
                Ok(re) if re.is_match(output) => {}
                Ok(_) => {
                    let _ = writeln!(diagnostic, "\t-> Output does not match regex [{}]", pattern);
                }
                Err(e) => {
                    let _ = writeln!(
                        diagnostic,
                        "\t-> Output does not match regex [{}] (invalid pattern: {})",
                        pattern,
                        e.to_string().replace('\n', " ")
                    );
                }
            }
        }

        diagnostic
    }
}

fn is_match(pattern: &str, output: &str) -> bool {
    Regex::new(pattern).is_ok_and(|re| re.is_match(output))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_must_be_empty() {
        let mut descriptor = CommandDescriptor::new("show logging | i FAIL");
        descriptor.should_be_empty();

        assert_eq!(descriptor.evaluate(""), "");
        assert_eq!(descriptor.evaluate(" \r\n\t"), "");

        let diagnostic = descriptor.evaluate("%SYS-5-CONFIG_I FAIL");
        assert_eq!(diagnostic.lines().count(), 1);
        assert!(diagnostic.starts_with("\t-> Output is not empty ["));
    }

    #[test]
    fn test_must_be_empty_multiline_output() {
        let mut descriptor = CommandDescriptor::new("show logging | i FAIL");
        descriptor.should_be_empty();

        let diagnostic = descriptor.evaluate("%SYS-5 FAIL one\r\n%SYS-5 FAIL two\r\n");
        assert_eq!(diagnostic.lines().count(), 1);
        assert_eq!(
            diagnostic,
            "\t-> Output is not empty [%SYS-5 FAIL one\\r\\n%SYS-5 FAIL two]\n"
        );
    }

    #[test]
    fn test_evaluation_is_repeatable() {
        let mut descriptor = CommandDescriptor::new("copy tftp: flash:");
        descriptor.should_contain("OK");

        let first = descriptor.evaluate("Verifying checksum... failed");
        let second = descriptor.evaluate("Verifying checksum... failed");
        assert_eq!(first, "\t-> Output does not contain[OK]\n");
        assert_eq!(first, second);
    }

    #[test]
    fn test_accumulation_matches_single_call() {
        let mut accumulated = CommandDescriptor::new("show users");
        accumulated.add_criteria(Criteria::new().contain("X"));
        accumulated.add_criteria(Criteria::new().not_contain("Y"));

        let mut single = CommandDescriptor::new("show users");
        single.add_criteria(Criteria::new().contain("X").not_contain("Y"));

        assert_eq!(accumulated, single);
        assert_eq!(accumulated.evaluate("X Y"), single.evaluate("X Y"));
    }

    #[test]
    fn test_contains_is_a_set() {
        let mut descriptor = CommandDescriptor::new("show clock");
        descriptor.should_contain("UTC");
        descriptor.should_contain("UTC");
        assert_eq!(descriptor.assertions.contains.len(), 1);
        assert_eq!(descriptor.evaluate("10:00"), "\t-> Output does not contain[UTC]\n");
    }

    #[test]
    fn test_empty_output_reports_positive_assertions() {
        let mut descriptor = CommandDescriptor::new("show run | i username");
        descriptor.add_criteria(
            Criteria::new()
                .contain("username")
                .not_contain("secret")
                .begin_with("username")
                .end_with("password")
                .match_regex("username \\S+")
                .be_empty(false),
        );

        assert_eq!(
            descriptor.evaluate("\r\n"),
            "\t-> Output is empty\n\
             \t-> Output should contain[username]\n\
             \t-> Output should begin with[username]\n\
             \t-> Output should end with[password]\n\
             \t-> Output should match regex[username \\S+]\n"
        );
    }

    #[test]
    fn test_begin_and_end_tolerate_whitespace() {
        let mut descriptor = CommandDescriptor::new("show run | i ^username");
        descriptor.should_begin_with("username test");
        descriptor.should_end_with("password 7 0822455D0A16");

        assert_eq!(
            descriptor.evaluate("\r\n username test privilege 15 password 7 0822455D0A16\r\n"),
            ""
        );
        assert_eq!(
            descriptor.evaluate("no username test"),
            "\t-> Output does not begin with [username test]\n\
             \t-> Output does not end with [password 7 0822455D0A16]\n"
        );
    }

    #[test]
    fn test_begin_with_is_literal() {
        let mut descriptor = CommandDescriptor::new("show ip access-lists");
        descriptor.should_begin_with("10 permit ip any any (5 matches)");
        assert_eq!(descriptor.evaluate("10 permit ip any any (5 matches)\r\n"), "");
    }

    #[test]
    fn test_regex_anchored_at_start() {
        let mut descriptor = CommandDescriptor::new("show version");
        descriptor.should_match_regex(r"Cisco IOS Software, \S+");

        assert_eq!(descriptor.evaluate("Cisco IOS Software, C2960 Software"), "");
        assert_eq!(
            descriptor.evaluate("ROM: Cisco IOS Software, C2960 Software"),
            "\t-> Output does not match regex [Cisco IOS Software, \\S+]\n"
        );
    }

    #[test]
    fn test_invalid_regex_fails() {
        let mut descriptor = CommandDescriptor::new("show version");
        descriptor.should_match_regex("Cisco (IOS");

        let diagnostic = descriptor.evaluate("Cisco IOS");
        assert_eq!(diagnostic.lines().count(), 1);
        assert!(diagnostic.starts_with("\t-> Output does not match regex [Cisco (IOS] (invalid pattern:"));
    }

    #[test]
    fn test_deserialize_descriptor() {
        let descriptor: CommandDescriptor = serde_json::from_str(
            r#"{
                "command": "show users",
                "assertions": {
                    "contains": ["admin"],
                    "emptiness": "must_not_be_empty"
                }
            }"#,
        )
        .unwrap();

        assert_eq!(descriptor.command, "show users");
        assert!(descriptor.assertions.contains.contains("admin"));
        assert_eq!(descriptor.assertions.emptiness, Emptiness::MustNotBeEmpty);
        assert!(descriptor.assertions.not_contains.is_empty());
    }

    #[test]
    fn test_deserialize_criteria() {
        let criteria: Criteria =
            serde_json::from_str(r#"{"should_contain": "OK", "should_be_empty": false}"#).unwrap();
        assert_eq!(criteria, Criteria::new().contain("OK").be_empty(false));
    }
}
