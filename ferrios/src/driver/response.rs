//! Response type for command execution results.

use std::time::Duration;

/// Response from a command execution.
#[derive(Debug, Clone, Default)]
pub struct Response {
    /// The command that was executed.
    pub command: String,

    /// The command output with the echoed command line removed.
    pub result: String,

    /// All text received before the final prompt.
    pub raw_result: String,

    /// The prompt that was matched at the end (empty if none was awaited).
    pub prompt: String,

    /// Time taken to execute the command.
    pub elapsed: Duration,

    /// False when the confirmation bound was hit before the prompt returned.
    pub complete: bool,

    /// Number of `[yes/no]`/`[confirm]` dialogs answered.
    pub prompts_answered: usize,

    /// IOS failure marker found in the output, if any.
    pub failure_message: Option<String>,
}

impl Response {
    /// Check if the response indicates success.
    pub fn is_success(&self) -> bool {
        self.complete && self.failure_message.is_none()
    }

    /// Get the result lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.result.lines()
    }

    /// Check if the result contains a substring.
    pub fn contains(&self, pattern: &str) -> bool {
        self.result.contains(pattern)
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_requires_complete_and_no_failure() {
        let mut response = Response {
            command: "show clock".into(),
            result: "*10:00:00.000 UTC Mon Mar 1 1993\r\n".into(),
            complete: true,
            ..Default::default()
        };
        assert!(response.is_success());
        assert!(response.contains("UTC"));
        assert_eq!(response.lines().count(), 1);
        assert_eq!(response.to_string(), response.result);

        response.failure_message = Some("% Invalid input detected".into());
        assert!(!response.is_success());

        response.failure_message = None;
        response.complete = false;
        assert!(!response.is_success());
    }
}
