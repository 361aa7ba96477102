//! Device-level operations.
//!
//! Every operation opens its own scoped session with the account it needs,
//! does its work and disconnects, even when the work fails.
//!
//! # Example
//!
//! ```rust,no_run
//! use ferrios::controller::{Controller, ControllerSettings};
//! use ferrios::descriptor::Criteria;
//! use ferrios::driver::Credentials;
//!
//! # async fn example() -> Result<(), ferrios::Error> {
//! let mut settings = ControllerSettings::new("router", "10.0.0.1");
//! settings.test_credentials = Credentials::new("tester", "password", "enable");
//! let controller = Controller::new(settings);
//!
//! let mut descriptor = controller.create_test_cmd("show privilege");
//! controller.add_test_cmd_criteria(&mut descriptor, Criteria::new().contain("15"));
//! controller.run_test_cmd(&descriptor, None).await?;
//! # Ok(())
//! # }
//! ```

mod configure;
mod firmware;
mod script;
mod settings;

pub use configure::{AuthSource, ConfigOption, Configurator, LoginType};
pub use firmware::FirmwareChecksum;
pub use settings::{ControllerSettings, Timeouts};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use regex::Regex;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::descriptor::{CommandDescriptor, Criteria};
use crate::driver::{CommandRunner, ConfigVerifier, Credentials, Response, Session, SessionBuilder};
use crate::error::{ConfigError, Result, TransportError};
use crate::transport::{Connector, DefaultConnector, Protocol};

/// Pause between fire-and-forget commands.
const NO_PROMPT_PAUSE: Duration = Duration::from_secs(1);

/// Which account a session logs in with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Account {
    Test,
    Config,
}

/// Operations on one device.
pub struct Controller {
    settings: ControllerSettings,
    connector: Arc<dyn Connector>,
}

impl Controller {
    pub fn new(settings: ControllerSettings) -> Self {
        Self {
            settings,
            connector: Arc::new(DefaultConnector),
        }
    }

    /// Use a custom transport factory.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }

    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ControllerSettings {
        &mut self.settings
    }

    fn session(&self, account: Account, protocol: Option<Protocol>) -> Result<Session> {
        let credentials: &Credentials = match account {
            Account::Test => &self.settings.test_credentials,
            Account::Config => &self.settings.config_credentials,
        };

        let mut builder = SessionBuilder::new(self.settings.address.clone())
            .hostname(self.settings.hostname.clone())
            .protocol(self.settings.resolve_protocol(protocol))
            .credentials(credentials)
            .timeout(self.settings.timeouts.default)
            .terminal_length_zero(self.settings.terminal_length_zero)
            .connector(self.connector.clone());
        if let Some(port) = self.settings.port {
            builder = builder.port(port);
        }
        builder.build()
    }

    /// Run one command with the test account.
    pub async fn run_command(&self, command: &str, protocol: Option<Protocol>) -> Result<Response> {
        let mut session = self.session(Account::Test, protocol)?;
        session
            .scoped(async |s| CommandRunner::new().run(s, command).await)
            .await
    }

    /// Run commands in order on one session.
    ///
    /// With `no_shell_prompt` each command is sent without waiting for its
    /// prompt; the prompt is awaited once after the last command.
    pub async fn run_commands<S: AsRef<str>>(
        &self,
        commands: &[S],
        protocol: Option<Protocol>,
        no_shell_prompt: bool,
    ) -> Result<Vec<Response>> {
        let mut session = self.session(Account::Test, protocol)?;
        session
            .scoped(async |s| {
                let runner = CommandRunner::new();
                let mut responses = Vec::with_capacity(commands.len());

                for command in commands {
                    let command = command.as_ref();
                    let response = if no_shell_prompt {
                        let response = runner.run_without_prompt(s, command).await?;
                        tokio::time::sleep(NO_PROMPT_PAUSE).await;
                        response
                    } else {
                        runner.run(s, command).await?
                    };
                    debug!("cmd_out: {}", response.result);
                    responses.push(response);
                }

                if no_shell_prompt {
                    let captured = s.expect_prompt().await?;
                    info!("{}", captured.before);
                }
                Ok(responses)
            })
            .await
    }

    /// Descriptor for `command` with no assertions.
    pub fn create_test_cmd(&self, command: &str) -> CommandDescriptor {
        CommandDescriptor::new(command)
    }

    /// Add `criteria` to `descriptor`.
    pub fn add_test_cmd_criteria(&self, descriptor: &mut CommandDescriptor, criteria: Criteria) {
        descriptor.add_criteria(criteria);
    }

    /// Run the descriptor's command and check its output.
    pub async fn run_test_cmd(
        &self,
        descriptor: &CommandDescriptor,
        protocol: Option<Protocol>,
    ) -> Result<()> {
        let response = self.run_command(&descriptor.command, protocol).await?;
        let diagnostic = descriptor.evaluate(&response.result);

        if diagnostic.is_empty() {
            info!("[+][{}] succeed", descriptor.command);
            return Ok(());
        }

        info!("[-][{}] failed\n{}", descriptor.command, diagnostic);
        debug!("output of '{}': {:?}", descriptor.command, response.result);
        Err(ConfigError::AssertionFailed {
            command: descriptor.command.clone(),
            diagnostic,
        }
        .into())
    }

    /// Delete a file, confirming the file name and the deletion.
    pub async fn delete_file(&self, path: &str, protocol: Option<Protocol>) -> Result<()> {
        let filename = Regex::new(r"Delete filename \[\S*\]\?")?;
        let confirm = Regex::new(r"Delete \S*? \[confirm\]")?;

        let mut session = self.session(Account::Test, protocol)?;
        session
            .scoped(async |s| {
                let timeout = s.timeout();
                s.sendline(&format!("delete {}", path)).await?;
                s.expect_patterns(&[&filename], timeout).await?;
                s.sendline("").await?;
                s.expect_patterns(&[&confirm], timeout).await?;
                s.sendline("").await?;
                s.expect_prompt().await?;
                Ok(())
            })
            .await
    }

    /// Contents of a file on the device.
    pub async fn view_file(&self, path: &str, protocol: Option<Protocol>) -> Result<Response> {
        self.run_command(&format!("more {}", path), protocol).await
    }

    /// Reload the device and wait until its management port answers again.
    pub async fn reboot(&self, protocol: Option<Protocol>) -> Result<()> {
        let proceed = Regex::new(r"Proceed with reload\?")?;
        let modified = Regex::new("System configuration has been modified")?;
        let protocol = self.settings.resolve_protocol(protocol);

        let mut session = self.session(Account::Config, Some(protocol))?;
        session
            .scoped(async |s| {
                let timeout = s.timeout();
                s.sendline("reload").await?;
                let captured = s.expect_patterns(&[&proceed, &modified], timeout).await?;
                if captured.index == 1 {
                    s.sendline("n").await?;
                    s.expect_patterns(&[&proceed], timeout).await?;
                }
                s.sendline("y").await?;
                s.expect_eof(timeout).await?;
                Ok(())
            })
            .await?;

        let timeouts = &self.settings.timeouts;
        info!("{} is reloading", self.settings.hostname);
        tokio::time::sleep(timeouts.reboot_settle).await;

        let address = format!("{}:{}", self.settings.address, self.settings.port_for(protocol));
        wait_until_reachable(&address, timeouts.reboot, timeouts.poll_interval).await
    }

    /// Replace the running image with `source` (a URL the device can copy from).
    pub async fn replace_firmware(
        &self,
        source: &str,
        checksum: &dyn FirmwareChecksum,
        protocol: Option<Protocol>,
    ) -> Result<()> {
        info!("Replacing firmware");
        let class = self
            .settings
            .filesystem_class
            .ok_or_else(|| ConfigError::UnknownFilesystemClass {
                name: "unset".to_string(),
            })?;
        let file_name = source.rsplit('/').next().unwrap_or(source);
        let destination = format!("flash:{}", file_name);
        let timeout = self.settings.timeouts.firmware;

        let mut session = self.session(Account::Config, protocol)?;
        session
            .scoped(async |s| {
                let image = firmware::running_image(s).await?;
                firmware::delete_image(s, class, &image, timeout).await?;
                firmware::copy_and_verify(s, class, source, &destination, timeout, checksum).await
            })
            .await
    }

    /// `configure replace <path>`.
    pub async fn replace_running_config(
        &self,
        path: &str,
        protocol: Option<Protocol>,
    ) -> Result<()> {
        let class = self.settings.filesystem_class;
        let mut session = self.session(Account::Config, protocol)?;
        session
            .scoped(async |s| Configurator::new(s, class).replace_running(path).await)
            .await
    }

    /// `copy <path> startup`.
    pub async fn replace_startup_config(
        &self,
        path: &str,
        protocol: Option<Protocol>,
    ) -> Result<()> {
        let class = self.settings.filesystem_class;
        let mut session = self.session(Account::Config, protocol)?;
        session
            .scoped(async |s| Configurator::new(s, class).replace_startup(path).await)
            .await
    }

    /// Apply a configuration plan and save it.
    pub async fn configure(&self, option: ConfigOption) -> Result<()> {
        let username = self.settings.test_credentials.username.trim();
        if username.is_empty() {
            return Err(ConfigError::MissingSetting {
                name: "test_credentials.username".to_string(),
            }
            .into());
        }
        info!("Applying {}", option);

        let settings = &self.settings;
        let mut session = self.session(Account::Config, None)?;
        session
            .scoped(async |s| {
                let mut configurator = Configurator::new(s, settings.filesystem_class);

                match option {
                    ConfigOption::Reset => {
                        let syslog = required(&settings.syslog_server, "syslog_server")?;
                        let tacacs = required(&settings.tacacs_server, "tacacs_server")?;
                        configurator
                            .reset(username, syslog, tacacs, &settings.tacacs_key)
                            .await?;
                    }
                    ConfigOption::Acl | ConfigOption::AclReset => {
                        configurator.acl(&settings.remote_commands).await?;
                    }
                    ConfigOption::LoginAuth { auth, login, admin } => {
                        configurator.login_auth(auth, login, admin, username).await?;
                    }
                }

                configurator.show_running().await?;
                configurator.commit().await
            })
            .await
    }

    /// Check that every directive is in the running configuration.
    pub async fn verify_config<S: AsRef<str>>(
        &self,
        directives: &[S],
        protocol: Option<Protocol>,
    ) -> Result<()> {
        let mut session = self.session(Account::Config, protocol)?;
        session
            .scoped(async |s| ConfigVerifier::new().verify(s, directives, false).await)
            .await
    }

    /// Run a helper script on this host.
    pub async fn run_script(&self, path: impl AsRef<Path>, args: &[String]) -> Result<()> {
        script::run_script(path.as_ref(), args, self.settings.timeouts.memory).await
    }
}

fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str> {
    value.as_deref().ok_or_else(|| {
        ConfigError::MissingSetting {
            name: name.to_string(),
        }
        .into()
    })
}

/// Poll `address` with TCP connects until one succeeds or `timeout` passes.
pub async fn wait_until_reachable(
    address: &str,
    timeout: Duration,
    interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let interval = interval.max(Duration::from_millis(10));

    loop {
        match tokio::time::timeout(interval, TcpStream::connect(address)).await {
            Ok(Ok(_)) => {
                info!("{} is reachable", address);
                return Ok(());
            }
            Ok(Err(e)) => debug!("{} not reachable yet: {}", address, e),
            Err(_) => debug!("{} not reachable yet: connect timed out", address),
        }

        if Instant::now() + interval > deadline {
            return Err(TransportError::Timeout(timeout).into());
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{ScriptedConnector, privileged_login};
    use tokio::net::TcpListener;
    use tokio_test::io::Builder;

    fn controller(scripts: Vec<Builder>) -> (Controller, Arc<ScriptedConnector>) {
        let mut settings = ControllerSettings::new("router", "127.0.0.1");
        settings.test_credentials = Credentials::new("tester", "password", "enablepw");
        settings.config_credentials = Credentials::new("admin", "secret", "enablepw");
        settings.timeouts.default = Duration::from_secs(2);
        settings.terminal_length_zero = false;

        let connector = Arc::new(ScriptedConnector::new(scripts));
        let controller = Controller::new(settings).with_connector(connector.clone());
        (controller, connector)
    }

    #[tokio::test]
    async fn test_run_test_cmd_passes() {
        let mut device = privileged_login("router");
        device
            .write(b"show privilege\n")
            .read(b"show privilege\r\nCurrent privilege level is 15\r\nrouter#")
            .write(b"exit\n");
        let (controller, _) = controller(vec![device]);

        let mut descriptor = controller.create_test_cmd("show privilege");
        controller.add_test_cmd_criteria(&mut descriptor, Criteria::new().begin_with("Current privilege level is 15"));
        controller.run_test_cmd(&descriptor, None).await.unwrap();
    }

    #[tokio::test]
    async fn test_run_test_cmd_reports_diagnostic() {
        let mut device = privileged_login("router");
        device
            .write(b"show privilege\n")
            .read(b"show privilege\r\nCurrent privilege level is 1\r\nrouter#")
            .write(b"exit\n");
        let (controller, _) = controller(vec![device]);

        let mut descriptor = controller.create_test_cmd("show privilege");
        descriptor.should_contain("level is 15");

        let err = controller.run_test_cmd(&descriptor, None).await.unwrap_err();
        match err {
            crate::Error::Config(ConfigError::AssertionFailed { command, diagnostic }) => {
                assert_eq!(command, "show privilege");
                assert_eq!(diagnostic, "\t-> Output does not contain[level is 15]\n");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_run_commands_without_prompt() {
        let mut device = privileged_login("router");
        device
            .write(b"ping 10.0.0.5 repeat 2\n")
            .write(b"ping 10.0.0.6 repeat 2\n")
            .read(b"ping 10.0.0.5 repeat 2\r\n!!\r\nrouter#ping 10.0.0.6 repeat 2\r\n!!\r\nrouter#")
            .write(b"exit\n");
        let (controller, _) = controller(vec![device]);

        let responses = controller
            .run_commands(&["ping 10.0.0.5 repeat 2", "ping 10.0.0.6 repeat 2"], None, true)
            .await
            .unwrap();
        assert_eq!(responses.len(), 2);
        assert!(responses.iter().all(|r| r.prompt.is_empty()));
    }

    #[tokio::test]
    async fn test_delete_file_dialog() {
        let mut device = privileged_login("router");
        device
            .write(b"delete flash:old.cfg\n")
            .read(b"delete flash:old.cfg\r\nDelete filename [old.cfg]?")
            .write(b"\n")
            .read(b"\r\nDelete flash:/old.cfg? [confirm]")
            .write(b"\n")
            .read(b"\r\nrouter#")
            .write(b"exit\n");
        let (controller, connector) = controller(vec![device]);

        controller.delete_file("flash:old.cfg", None).await.unwrap();
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_configure_requires_test_user() {
        let (mut controller, connector) = controller(vec![]);
        controller.settings_mut().test_credentials = Credentials::default();

        let err = controller.configure(ConfigOption::Acl).await.unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Config(ConfigError::MissingSetting { .. })
        ));
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn test_configure_acl_and_commit() {
        let mut device = privileged_login("router");
        device
            .write(b"configure terminal\n")
            .read(b"configure terminal\r\nrouter(config)#")
            .write(b"access-list 10 permit any\n")
            .read(b"access-list 10 permit any\r\nrouter(config)#")
            .write(b"exit\n")
            .read(b"exit\r\nrouter#")
            .write(b"show run\n")
            .read(b"show run\r\naccess-list 10 permit any\r\nend\r\n\r\nrouter#")
            .write(b"write memory\n")
            .read(b"write memory\r\nBuilding configuration...\r\n[OK]\r\nrouter#")
            .write(b"exit\n");
        let (mut controller, _) = controller(vec![device]);
        controller.settings_mut().remote_commands = vec!["access-list 10 permit any".to_string()];

        controller.configure(ConfigOption::Acl).await.unwrap();
    }

    #[tokio::test]
    async fn test_replace_firmware_needs_class() {
        let (controller, connector) = controller(vec![]);
        let err = controller
            .replace_firmware(
                "ftp://10.0.0.9/new.bin",
                &firmware::tests::FixedChecksum("00"),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Config(ConfigError::UnknownFilesystemClass { .. })
        ));
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn test_reboot_waits_for_device() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let mut device = privileged_login("router");
        device
            .write(b"reload\n")
            .read(b"reload\r\nSystem configuration has been modified. Save? [yes/no]: ")
            .write(b"n\n")
            .read(b"n\r\nProceed with reload? [confirm]")
            .write(b"y\n");
        let (mut controller, _) = controller(vec![device]);
        let settings = controller.settings_mut();
        settings.port = Some(port);
        settings.timeouts.reboot_settle = Duration::ZERO;
        settings.timeouts.reboot = Duration::from_secs(5);
        settings.timeouts.poll_interval = Duration::from_millis(100);

        controller.reboot(None).await.unwrap();
    }

    #[tokio::test]
    async fn test_unreachable_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = wait_until_reachable(&address, Duration::from_millis(200), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
