//! Login-policy configuration plans.
//!
//! Each plan enters `configure terminal`, applies its blocks through a
//! [`ConfigChangeApplier`], checks each block against the running
//! configuration and finally leaves configuration mode and logs in again,
//! since the new policy may change how the device authenticates.

use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};

use crate::driver::{ConfigChangeApplier, ConfigVerifier, Session};
use crate::error::{ConfigError, Result};
use crate::platform::{FilesystemClass, ios};

/// Where login credentials are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthSource {
    /// Local user database.
    Local,
    /// TACACS+ with local fallback.
    Remote,
}

/// How vty lines ask for credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginType {
    /// Username and password (`login local`).
    UsernamePassword,
    /// Line password only.
    PasswordOnly,
    /// No login.
    NoLogin,
}

/// Named configuration plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigOption {
    /// Logging, archive, TACACS+ AAA and vty defaults.
    Reset,
    /// Apply the remote (ACL) command list.
    Acl,
    /// Apply the ACL reset command list.
    AclReset,
    /// Login policy for the test user.
    LoginAuth {
        auth: AuthSource,
        login: LoginType,
        admin: bool,
    },
}

impl FromStr for ConfigOption {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let unknown = |reason: &str| ConfigError::UnknownOption {
            name: s.to_string(),
            reason: reason.to_string(),
        };

        match s {
            "CONF_RESET" => return Ok(ConfigOption::Reset),
            "CONF_ACL" => return Ok(ConfigOption::Acl),
            "CONF_ACL_RESET" => return Ok(ConfigOption::AclReset),
            _ => {}
        }

        let rest = s
            .strip_prefix("CONF_")
            .ok_or_else(|| unknown("expected a CONF_ prefix"))?;
        let parts: Vec<&str> = rest.split('_').collect();
        let [auth, login, privilege] = parts.as_slice() else {
            return Err(unknown("expected CONF_<auth>_<login>_<privilege>"));
        };

        let auth = match *auth {
            "LOCAL" => AuthSource::Local,
            "REMOTE" => AuthSource::Remote,
            _ => return Err(unknown("unknown authentication type")),
        };
        let login = match *login {
            "UIDPASS" => LoginType::UsernamePassword,
            "PASS" => LoginType::PasswordOnly,
            "NOUIDPASS" => LoginType::NoLogin,
            _ => return Err(unknown("unknown login type")),
        };
        let admin = match *privilege {
            "ADMIN" => true,
            "USR" => false,
            _ => return Err(unknown("unknown privilege type")),
        };

        Ok(ConfigOption::LoginAuth { auth, login, admin })
    }
}

impl fmt::Display for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOption::Reset => f.write_str("CONF_RESET"),
            ConfigOption::Acl => f.write_str("CONF_ACL"),
            ConfigOption::AclReset => f.write_str("CONF_ACL_RESET"),
            ConfigOption::LoginAuth { auth, login, admin } => {
                let auth = match auth {
                    AuthSource::Local => "LOCAL",
                    AuthSource::Remote => "REMOTE",
                };
                let login = match login {
                    LoginType::UsernamePassword => "UIDPASS",
                    LoginType::PasswordOnly => "PASS",
                    LoginType::NoLogin => "NOUIDPASS",
                };
                let privilege = if *admin { "ADMIN" } else { "USR" };
                write!(f, "CONF_{}_{}_{}", auth, login, privilege)
            }
        }
    }
}

/// TACACS+ AAA commands for remote authentication.
pub const REMOTE_AUTH_COMMANDS: [&str; 10] = [
    "aaa new-model",
    "aaa authentication login default group tacacs+ local-case",
    "aaa authentication enable default group tacacs+ enable",
    "aaa authorization config-commands",
    "aaa authorization exec default group tacacs+ if-authenticated",
    "aaa authorization commands 1 default group tacacs+ if-authenticated",
    "aaa authorization commands 15 default group tacacs+ if-authenticated",
    "aaa accounting exec default start-stop group tacacs+",
    "aaa accounting commands 1 default start-stop group tacacs+",
    "aaa accounting commands 15 default start-stop group tacacs+",
];

/// Commands of the reset plan, in order.
pub fn reset_commands(
    username: &str,
    syslog_server: &str,
    tacacs_server: &str,
    tacacs_key: &str,
) -> Vec<String> {
    let mut commands: Vec<String> = [
        "logging message-counter syslog",
        "logging trap debugging",
        "logging buffered debugging",
        "logging console debugging",
        "logging monitor debugging",
        "logging origin-id hostname",
    ]
    .iter()
    .map(|c| c.to_string())
    .collect();

    commands.push(format!("logging {}", syslog_server));
    commands.extend(
        [
            "service password-encryption",
            "login on-failure log",
            "login on-success log",
            "archive",
            "log config",
            "logging enable",
            "logging size 500",
            "notify syslog contenttype plaintext",
            "hidekeys",
            "exit",
            "exit",
        ]
        .iter()
        .map(|c| c.to_string()),
    );
    commands.extend(REMOTE_AUTH_COMMANDS.iter().map(|c| c.to_string()));
    commands.push(format!("tacacs-server host {}", tacacs_server));
    commands.push("tacacs-server directed-request".to_string());
    commands.push(format!("tacacs-server key {}", tacacs_key));
    commands.push(format!("no username {}", username));
    commands.push(format!("username {} password 0 password", username));
    commands.extend(
        [
            "line vty 0 4",
            "exec-timeout 2 0",
            "logging synchronous",
            "no password",
            "no privilege level 15",
            "transport input telnet",
            "exit",
            "line vty 5 15",
            "exec-timeout 2 0",
            "logging synchronous",
            "no privilege level 15",
            "transport input ssh",
        ]
        .iter()
        .map(|c| c.to_string()),
    );
    commands
}

/// Reset-plan commands whose effect shows verbatim in `show run`.
///
/// `exit` leaves no trace and secrets are stored encrypted.
pub fn verifiable(commands: &[String]) -> Vec<&str> {
    commands
        .iter()
        .map(String::as_str)
        .filter(|c| *c != ios::EXIT && !c.contains("password 0") && !c.contains("-server key"))
        .collect()
}

/// Vty login commands for `login`.
pub fn login_type_commands(login: LoginType) -> [&'static str; 2] {
    match login {
        LoginType::UsernamePassword => ["login local", "no password"],
        LoginType::PasswordOnly => ["password password", "login"],
        LoginType::NoLogin => ["no login ", "no password"],
    }
}

/// Runs configuration plans on a logged-in session.
pub struct Configurator<'a> {
    session: &'a mut Session,
    applier: ConfigChangeApplier,
    verifier: ConfigVerifier,
    filesystem: Option<FilesystemClass>,
}

impl<'a> Configurator<'a> {
    pub fn new(session: &'a mut Session, filesystem: Option<FilesystemClass>) -> Self {
        Self {
            session,
            applier: ConfigChangeApplier::new(),
            verifier: ConfigVerifier::new(),
            filesystem,
        }
    }

    async fn apply(&mut self, command: &str) -> Result<()> {
        self.applier.apply(self.session, command).await?;
        Ok(())
    }

    async fn apply_all<S: AsRef<str>>(&mut self, commands: &[S]) -> Result<()> {
        self.applier.apply_all(self.session, commands).await
    }

    async fn verify<S: AsRef<str>>(&mut self, directives: &[S]) -> Result<()> {
        self.verifier.verify(self.session, directives, true).await
    }

    /// Apply a block, leave its submode and check it.
    async fn apply_block(&mut self, commands: &[&str]) -> Result<()> {
        self.apply_all(commands).await?;
        self.apply(ios::EXIT).await?;
        self.verify(commands).await
    }

    /// Leave configuration mode and log in again.
    async fn end_config(&mut self) -> Result<()> {
        self.apply(ios::EXIT).await?;
        self.session.reconnect().await
    }

    /// Save the configuration, unless the filesystem class cannot take it.
    pub async fn commit(&mut self) -> Result<()> {
        match self.filesystem {
            Some(class) if !class.supports_write_memory() => {
                debug!("Skipping write memory on filesystem class {}", class);
                Ok(())
            }
            _ => self.apply(ios::WRITE_MEMORY).await,
        }
    }

    async fn vty_privilege(&mut self, first: u8, last: u8, admin: bool) -> Result<()> {
        let line = format!("line vty {} {}", first, last);
        let privilege = if admin {
            "privilege level 15"
        } else {
            "no privilege level 15"
        };

        self.apply(&line).await?;
        self.apply(privilege).await?;
        self.apply(ios::EXIT).await?;
        self.verify(&[privilege]).await
    }

    async fn login_privilege(&mut self, username: &str, admin: bool) -> Result<()> {
        let level = if admin { 15 } else { 0 };
        self.apply(&format!("no username {}", username)).await?;
        self.apply(&format!("username {} privilege {} password 0 password", username, level))
            .await?;

        self.vty_privilege(0, 4, admin).await?;
        self.vty_privilege(5, 15, admin).await
    }

    async fn login_type(&mut self, login: LoginType) -> Result<()> {
        let commands = login_type_commands(login);

        self.apply("line vty 0 4").await?;
        self.apply_all(&commands).await?;
        self.apply(ios::EXIT).await?;
        self.verify(&commands).await
    }

    async fn telnet(&mut self) -> Result<()> {
        info!("Configuring for Telnet connection");
        self.apply_block(&["line vty 0 4", "transport input telnet"]).await
    }

    async fn ssh(&mut self) -> Result<()> {
        info!("Configuring for SSH connection");

        let host = regex::escape(self.session.hostname());
        let config_prompt = Regex::new(&format!(r"{}\(config\)#", host))?;
        let domain = Regex::new(r"ip domain name \S+")?;
        let modulus = Regex::new("How many bits in the modulus")?;
        let replace = Regex::new("Do you really want to replace them")?;
        let timeout = self.session.timeout();

        self.session.sendline("ip domain-name testnet").await?;
        self.session.expect_patterns(&[&config_prompt], timeout).await?;

        self.session
            .sendline("do show run | include ip domain name")
            .await?;
        let found = self
            .session
            .expect_patterns(&[&config_prompt, &domain], timeout)
            .await?;
        if found.index == 0 {
            return Err(ConfigError::UnexpectedOutput {
                message: "domain name not set; cannot configure SSH".to_string(),
            }
            .into());
        }
        self.session.expect_patterns(&[&config_prompt], timeout).await?;

        self.session.sendline("crypto key generate rsa").await?;
        let keygen = self
            .session
            .expect_patterns(&[&config_prompt, &modulus, &replace], timeout)
            .await?;

        match keygen.index {
            0 => {
                info!("Firmware has no crypto module; skipping SSH");
                return Ok(());
            }
            1 => self.apply("2048").await?,
            _ => self.apply("no").await?,
        }

        self.apply("ip ssh version 2").await?;
        self.apply("ip ssh dh min size 4096").await?;
        self.apply_block(&["line vty 5 15", "transport input ssh"]).await
    }

    async fn local_auth(&mut self) -> Result<()> {
        self.apply("no aaa new-model").await?;
        self.apply_block(&["line vty 0 4", "login local"]).await?;
        self.apply_block(&["line vty 5 15", "login local"]).await
    }

    async fn remote_auth(&mut self) -> Result<()> {
        self.apply_all(&REMOTE_AUTH_COMMANDS).await?;
        self.verify(&REMOTE_AUTH_COMMANDS).await
    }

    /// Configure the login policy for `username`.
    pub async fn login_auth(
        &mut self,
        auth: AuthSource,
        login: LoginType,
        admin: bool,
        username: &str,
    ) -> Result<()> {
        self.apply(ios::CONFIGURE_TERMINAL).await?;

        self.login_privilege(username, admin).await?;
        self.telnet().await?;
        self.ssh().await?;

        match auth {
            AuthSource::Local => {
                self.local_auth().await?;
                self.login_type(login).await?;
            }
            AuthSource::Remote => self.remote_auth().await?,
        }

        self.end_config().await
    }

    /// Restore logging, archive, TACACS+ AAA and vty defaults.
    pub async fn reset(
        &mut self,
        username: &str,
        syslog_server: &str,
        tacacs_server: &str,
        tacacs_key: &SecretString,
    ) -> Result<()> {
        let commands = reset_commands(
            username,
            syslog_server,
            tacacs_server,
            tacacs_key.expose_secret(),
        );

        self.apply(ios::CONFIGURE_TERMINAL).await?;
        self.apply_all(&commands).await?;
        self.apply(ios::EXIT).await?;
        self.verify(&verifiable(&commands)).await?;

        self.end_config().await
    }

    /// Apply `commands` in configuration mode without verification.
    pub async fn acl(&mut self, commands: &[String]) -> Result<()> {
        debug!("Configuring {} ACL command(s)", commands.len());
        self.apply(ios::CONFIGURE_TERMINAL).await?;
        self.apply_all(commands).await?;
        self.apply(ios::EXIT).await
    }

    /// `configure replace <path>`, confirming the replacement.
    pub async fn replace_running(&mut self, path: &str) -> Result<()> {
        let proceed = Regex::new(r"sure you want to proceed. ?")?;
        let timeout = self.session.timeout();

        self.session
            .sendline(&format!("configure replace {}", path))
            .await?;
        self.session.expect_patterns(&[&proceed], timeout).await?;
        self.apply("yes").await
    }

    /// `copy <path> startup`, accepting the default destination.
    pub async fn replace_startup(&mut self, path: &str) -> Result<()> {
        let destination = Regex::new("Destination filename")?;
        let timeout = self.session.timeout();

        self.session
            .sendline(&format!("copy {} startup", path))
            .await?;
        self.session.expect_patterns(&[&destination], timeout).await?;
        self.apply(" ").await
    }

    /// Show the running configuration once more, for the log.
    pub async fn show_running(&mut self) -> Result<()> {
        let captured = self
            .session
            .sendline_and_expect_prompt(ios::SHOW_RUNNING_CONFIG)
            .await?;
        debug!("running config after change: {:?}", captured.before);
        Ok(())
    }

    /// Whether the session is back at the top-level prompt.
    pub fn is_top_level(&self) -> bool {
        self.applier.tracker().is_top_level()
    }
}
