//! Login credentials.

use secrecy::SecretString;
use serde::Deserialize;

/// Login and enable credentials for one account on the device.
#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    /// Username sent at the `Username:` prompt.
    pub username: String,

    /// Password sent at the first `Password:` prompt.
    pub password: SecretString,

    /// Password sent after `enable`.
    pub enable_password: SecretString,
}

impl Credentials {
    /// Create credentials from plain strings.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        enable_password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            enable_password: SecretString::from(enable_password.into()),
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new("", "", "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_debug_hides_passwords() {
        let creds = Credentials::new("admin", "hunter2", "enablepw");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("enablepw"));
    }

    #[test]
    fn test_deserialize() {
        let creds: Credentials = serde_json::from_str(
            r#"{"username": "tester", "password": "pw", "enable_password": "en"}"#,
        )
        .unwrap();
        assert_eq!(creds.username, "tester");
        assert_eq!(creds.password.expose_secret(), "pw");
        assert_eq!(creds.enable_password.expose_secret(), "en");
    }
}
