//! Cisco IOS platform specifics.

mod filesystem;
pub mod ios;

pub use filesystem::FilesystemClass;
