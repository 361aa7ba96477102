//! IOS flash filesystem classes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Flash filesystem class of the device.
///
/// Class B (linear flash on older platforms) needs `squeeze` after a delete
/// and checks the image while copying. Class C supports `verify /md5` and
/// `rename`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilesystemClass {
    /// Class B flash.
    B,
    /// Class C flash.
    C,
}

impl FilesystemClass {
    /// Whether `write memory` is safe on this class.
    ///
    /// Some class B images refuse further configuration after `write memory`.
    pub fn supports_write_memory(self) -> bool {
        self != FilesystemClass::B
    }
}

impl FromStr for FilesystemClass {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "B" | "b" => Ok(FilesystemClass::B),
            "C" | "c" => Ok(FilesystemClass::C),
            _ => Err(ConfigError::UnknownFilesystemClass { name: s.to_string() }),
        }
    }
}

impl fmt::Display for FilesystemClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilesystemClass::B => f.write_str("B"),
            FilesystemClass::C => f.write_str("C"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!("B".parse::<FilesystemClass>().unwrap(), FilesystemClass::B);
        assert_eq!("c".parse::<FilesystemClass>().unwrap(), FilesystemClass::C);
        assert!(matches!(
            "A".parse::<FilesystemClass>(),
            Err(ConfigError::UnknownFilesystemClass { .. })
        ));
    }

    #[test]
    fn test_write_memory() {
        assert!(!FilesystemClass::B.supports_write_memory());
        assert!(FilesystemClass::C.supports_write_memory());
    }

    #[test]
    fn test_deserialize() {
        let class: FilesystemClass = serde_json::from_str("\"C\"").unwrap();
        assert_eq!(class, FilesystemClass::C);
    }
}
