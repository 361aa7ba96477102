//! Send/expect primitives over a [`Transport`].

use std::time::Duration;

use log::trace;
use regex::Regex;
use tokio::time::Instant;

use super::buffer::{Captured, PatternBuffer};
use crate::error::{ChannelError, Result};
use crate::transport::Transport;

/// Characters of pending output kept in timeout errors.
const ERROR_TAIL_CHARS: usize = 200;

/// Interactive channel: writes text and waits for patterns in the reply.
pub struct ExpectChannel {
    transport: Box<dyn Transport>,
    buffer: PatternBuffer,
    eof: bool,
}

impl ExpectChannel {
    /// Wrap a connected transport.
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            buffer: PatternBuffer::new(),
            eof: false,
        }
    }

    /// Send text as-is.
    pub async fn send(&mut self, text: &str) -> Result<()> {
        trace!("send: {:?}", text);
        self.transport.write(text.as_bytes()).await
    }

    /// Send text followed by a newline.
    pub async fn sendline(&mut self, text: &str) -> Result<()> {
        self.send(&format!("{}\n", text)).await
    }

    /// Wait until one of `patterns` appears in the output.
    ///
    /// Returns the text before the earliest match, the match itself and the
    /// index of the pattern. Fails with [`ChannelError::PatternTimeout`] when
    /// nothing matches within `timeout`, or [`ChannelError::Closed`] when the
    /// stream ends first.
    pub async fn expect(&mut self, patterns: &[&Regex], timeout: Duration) -> Result<Captured> {
        let deadline = Instant::now() + timeout;

        loop {
            if let Some(captured) = self.buffer.take_match(patterns) {
                trace!(
                    "matched {:?} after {} chars",
                    captured.after,
                    captured.before.len()
                );
                return Ok(captured);
            }

            if self.eof {
                return Err(ChannelError::Closed {
                    patterns: describe(patterns),
                }
                .into());
            }

            match tokio::time::timeout_at(deadline, self.transport.read()).await {
                Ok(Ok(Some(chunk))) => self.buffer.extend(&chunk),
                Ok(Ok(None)) => self.eof = true,
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(ChannelError::PatternTimeout {
                        patterns: describe(patterns),
                        timeout,
                        tail: self.buffer.tail(ERROR_TAIL_CHARS),
                    }
                    .into());
                }
            }
        }
    }

    /// Wait for the peer to close the stream, returning whatever it printed.
    pub async fn expect_eof(&mut self, timeout: Duration) -> Result<String> {
        let deadline = Instant::now() + timeout;

        while !self.eof {
            match tokio::time::timeout_at(deadline, self.transport.read()).await {
                Ok(Ok(Some(chunk))) => self.buffer.extend(&chunk),
                Ok(Ok(None)) => self.eof = true,
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(ChannelError::PatternTimeout {
                        patterns: "<end of stream>".into(),
                        timeout,
                        tail: self.buffer.tail(ERROR_TAIL_CHARS),
                    }
                    .into());
                }
            }
        }

        Ok(self.buffer.take())
    }

    /// Whether the peer has closed the stream.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Output received but not yet consumed by a match.
    pub fn pending(&self) -> &str {
        self.buffer.as_str()
    }

    /// Close the underlying transport.
    pub async fn close(&mut self) -> Result<()> {
        self.transport.close().await
    }
}

fn describe(patterns: &[&Regex]) -> String {
    patterns
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(" | ")
}
