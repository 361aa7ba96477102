//! External helper scripts.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::error::{Result, ScriptError};

/// Run `sh <basename> args...` from the script's directory, logging its
/// output line by line.
pub async fn run_script(path: &Path, args: &[String], timeout: Duration) -> Result<()> {
    let display = path.display().to_string();
    let spawn_error = |source| ScriptError::Spawn {
        path: display.clone(),
        source,
    };

    let absolute = std::path::absolute(path).map_err(spawn_error)?;
    let dir = absolute.parent().unwrap_or(Path::new("/"));
    let name = absolute.file_name().unwrap_or(absolute.as_os_str());
    debug!("script_dir: {}", dir.display());

    info!("sh {} {}", name.to_string_lossy(), args.join(" "));
    let mut child = Command::new("sh")
        .arg(name)
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(spawn_error)?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let run = async {
        tokio::join!(log_lines(stdout, false), log_lines(stderr, true));
        child.wait().await
    };

    let status = match tokio::time::timeout(timeout, run).await {
        Ok(status) => status.map_err(spawn_error)?,
        Err(_) => {
            return Err(ScriptError::Timeout {
                path: display,
                timeout,
            }
            .into());
        }
    };

    if !status.success() {
        return Err(ScriptError::NonZeroExit {
            path: display,
            code: status.code(),
        }
        .into());
    }
    Ok(())
}

async fn log_lines<R: AsyncRead + Unpin>(stream: Option<R>, is_stderr: bool) {
    let Some(stream) = stream else {
        return;
    };
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            warn!("{}", line);
        } else {
            info!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn script(name: &str, body: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("ferrios-script-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_runs_in_script_directory() {
        let path = script("marker.sh", "test -f marker.sh && echo \"args: $1 $2\"\n");
        run_script(&path, &["a".into(), "b".into()], Duration::from_secs(10))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let path = script("fail.sh", "echo failing >&2\nexit 3\n");
        let err = run_script(&path, &[], Duration::from_secs(10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Script(ScriptError::NonZeroExit { code: Some(3), .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let path = script("slow.sh", "sleep 5\n");
        let err = run_script(&path, &[], Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Script(ScriptError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let err = run_script(Path::new("/nonexistent-ferrios-dir/run.sh"), &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Script(ScriptError::Spawn { .. })
        ));
    }
}
