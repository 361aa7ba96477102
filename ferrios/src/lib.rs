//! # Ferrios
//!
//! Async CLI automation engine for Cisco IOS devices.
//!
//! Ferrios logs in over telnet or SSH, tracks the CLI mode from the prompts
//! it sees, runs commands to completion and applies configuration changes,
//! recovering when the device drops the session mid-change.
//!
//! ## Features
//!
//! - Telnet (tokio) and SSH (russh) transports behind one session
//! - Login state machine covering username, password and enable prompts
//! - Mode tracking with replay after a reconnect
//! - Declarative assertions over command output
//! - Device operations: reboot, firmware and config replacement, hardening plans
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ferrios::{CommandRunner, Protocol, SessionBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ferrios::Error> {
//!     let mut session = SessionBuilder::new("192.168.1.1")
//!         .hostname("router")
//!         .protocol(Protocol::Ssh)
//!         .username("admin")
//!         .password("secret")
//!         .enable_password("enable")
//!         .build()?;
//!
//!     let response = session
//!         .scoped(async |s| CommandRunner::new().run(s, "show version").await)
//!         .await?;
//!     println!("{}", response.result);
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod controller;
pub mod descriptor;
pub mod driver;
pub mod error;
pub mod platform;
pub mod transport;

pub use controller::{Controller, ControllerSettings};
pub use descriptor::{CommandDescriptor, Criteria};
pub use driver::{
    CommandRunner, ConfigChangeApplier, ConfigSession, Credentials, Response, Session,
    SessionBuilder,
};
pub use error::{Error, Result};
pub use platform::FilesystemClass;
pub use transport::Protocol;
