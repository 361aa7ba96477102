//! Session-level automation of an IOS CLI.
//!
//! The driver layer logs in, runs commands to completion, applies
//! configuration changes with recovery, and checks the running
//! configuration afterwards.

mod builder;
pub mod config_session;
mod credentials;
pub mod mode;
pub(crate) mod response;
mod runner;
pub(crate) mod session;
pub mod verify;

pub use builder::SessionBuilder;
pub use config_session::{ConfigChangeApplier, ConfigSession};
pub use credentials::Credentials;
pub use mode::{ModeTracker, ModeTransition};
pub use response::Response;
pub use runner::{CommandRunner, MAX_PROMPT_RESOLUTIONS, strip_echo};
pub use session::{PromptMatch, Session, SessionState};
pub use verify::{ConfigVerifier, DirectiveRule};
