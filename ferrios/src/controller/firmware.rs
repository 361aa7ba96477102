//! Firmware image replacement.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use regex::Regex;

use crate::channel::PromptKind;
use crate::driver::Session;
use crate::error::{ConfigError, Result};
use crate::platform::FilesystemClass;

/// Source of the expected checksum for a firmware image.
///
/// Implemented by whatever serves the images (typically an FTP server).
#[async_trait]
pub trait FirmwareChecksum: Send + Sync {
    /// Hex MD5 digest of the image at `source`.
    async fn md5(&self, source: &str) -> Result<String>;
}

/// Path of the image the device booted from.
pub async fn running_image(session: &mut Session) -> Result<String> {
    let captured = session
        .sendline_and_expect_prompt("show version | i System image file is")
        .await?;

    let re = Regex::new(r#"System image file is "(.+?)""#)?;
    re.captures(&captured.before)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| {
            ConfigError::UnexpectedOutput {
                message: "running image not found in show version".to_string(),
            }
            .into()
        })
}

/// Delete `path`; class B flash is squeezed afterwards.
pub async fn delete_image(
    session: &mut Session,
    class: FilesystemClass,
    path: &str,
    timeout: Duration,
) -> Result<()> {
    debug!("Deleting {} (filesystem class {})", path, class);
    session.sendline(&format!("delete /force {}", path)).await?;
    session.expect(&[PromptKind::Privileged]).await?;

    if class == FilesystemClass::B {
        debug!("Squeezing flash:");
        let confirm = Regex::new(r"Squeeze operation may take a while. Continue\? \[confirm\]")?;
        session.sendline("squeeze flash").await?;
        session.expect_patterns(&[&confirm], session.timeout()).await?;
        session.sendline("").await?;
        session
            .expect_timeout(&[PromptKind::Privileged], timeout)
            .await?;
    }
    Ok(())
}

/// `destination` with `-tmp` inserted before its extension.
pub fn temporary_name(destination: &str) -> String {
    let name_start = destination.rfind('/').map_or(0, |i| i + 1);
    match destination[name_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = name_start + dot;
            format!("{}-tmp{}", &destination[..dot], &destination[dot..])
        }
        _ => format!("{}-tmp", destination),
    }
}

enum CopyDialog {
    EraseWarning,
    EraseBefore,
    Overwrite,
    Address,
    Destination,
    Invalid,
    Done,
}

const COPY_DIALOG: [(&str, CopyDialog); 6] = [
    ("Erasing the flash", CopyDialog::EraseWarning),
    (r"Erase flash: before copying\? \[confirm\]", CopyDialog::EraseBefore),
    (r"Do you want to over write\? \[confirm\]", CopyDialog::Overwrite),
    ("Address or name of ", CopyDialog::Address),
    ("Destination filename", CopyDialog::Destination),
    ("Invalid input detected", CopyDialog::Invalid),
];

/// Copy `source` to `destination` answering the copy dialog, and return
/// everything printed before the prompt came back.
pub async fn copy(
    session: &mut Session,
    source: &str,
    destination: &str,
    timeout: Duration,
) -> Result<String> {
    let mut patterns = COPY_DIALOG
        .iter()
        .map(|(p, _)| Regex::new(p))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    patterns.push(session.prompts().get(PromptKind::Shell).clone());
    let refs: Vec<&Regex> = patterns.iter().collect();

    session
        .sendline(&format!("copy {} {}", source, destination))
        .await?;

    let mut output = String::new();
    loop {
        let captured = session.expect_patterns(&refs, timeout).await?;
        output.push_str(&captured.before);

        let step = COPY_DIALOG
            .get(captured.index)
            .map_or(&CopyDialog::Done, |(_, step)| step);
        match step {
            CopyDialog::EraseBefore => session.sendline("N").await?,
            CopyDialog::EraseWarning
            | CopyDialog::Overwrite
            | CopyDialog::Address
            | CopyDialog::Destination => session.sendline("").await?,
            CopyDialog::Invalid => {
                return Err(ConfigError::UnexpectedOutput {
                    message: format!("copy {} {}: Invalid input detected", source, destination),
                }
                .into());
            }
            CopyDialog::Done => return Ok(output),
        }
    }
}

/// MD5 the device computes for `path`.
pub async fn device_md5(session: &mut Session, path: &str, timeout: Duration) -> Result<String> {
    session.sendline(&format!("verify /md5 {}", path)).await?;
    let captured = session.expect_timeout(&[PromptKind::Shell], timeout).await?.captured;

    let re = Regex::new(r"verify /md5 \(\S*\) = (\S+)")?;
    re.captures(&captured.before)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| {
            ConfigError::UnexpectedOutput {
                message: format!("no MD5 digest for {}", path),
            }
            .into()
        })
}

/// Copy `source` into `destination` and check the result.
///
/// Class B checks the image during the copy and reports ` OK `. Class C
/// copies to a temporary name, compares `verify /md5` with `checksum` and
/// renames on success.
pub async fn copy_and_verify(
    session: &mut Session,
    class: FilesystemClass,
    source: &str,
    destination: &str,
    timeout: Duration,
    checksum: &dyn FirmwareChecksum,
) -> Result<()> {
    match class {
        FilesystemClass::B => {
            let output = copy(session, source, destination, timeout).await?;
            if !output.contains(" OK ") {
                return Err(ConfigError::UnexpectedOutput {
                    message: format!("checksum OK not found after copying {}", source),
                }
                .into());
            }
        }
        FilesystemClass::C => {
            let temporary = temporary_name(destination);
            copy(session, source, &temporary, timeout).await?;

            let actual = device_md5(session, &temporary, timeout).await?;
            let expected = checksum.md5(source).await?;
            debug!("MD5 of {}: {} (expected {})", temporary, actual, expected);
            if !actual.eq_ignore_ascii_case(&expected) {
                return Err(ConfigError::UnexpectedOutput {
                    message: format!(
                        "MD5 of {} is {}, expected {}",
                        temporary,
                        actual.to_lowercase(),
                        expected.to_lowercase()
                    ),
                }
                .into());
            }

            let rename = Regex::new("Destination filename")?;
            let shell = session.prompts().get(PromptKind::Shell).clone();
            session
                .sendline(&format!("rename {} {}", temporary, destination))
                .await?;
            let captured = session
                .expect_patterns(&[&rename, &shell], session.timeout())
                .await?;
            if captured.index == 0 {
                session.sendline("").await?;
                session.expect_prompt().await?;
            }
        }
    }

    info!("Firmware {} installed as {}", source, destination);
    Ok(())
}
