//! Channel layer: pattern matching over the device's character stream.
//!
//! Output is cleaned of terminal escapes as it arrives and matched against
//! a hostname-specific [`PromptSet`].

mod buffer;
mod expect;
pub mod patterns;

pub use buffer::{Captured, PatternBuffer};
pub use expect::ExpectChannel;
pub use patterns::{PromptForm, PromptKind, PromptSet};
