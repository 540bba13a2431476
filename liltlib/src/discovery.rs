//! Locating lilt and its helper tools on the executable search path.

use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};
use thiserror::Error;
use tokio::{process, time::timeout};
use tracing::debug;

const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("{0} not found in PATH")]
    NotFound(String),
}

/// What is known about one helper binary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryInfo {
    pub name: String,
    pub path: Option<PathBuf>,
    pub version: Option<String>,
    pub available: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryCheck {
    pub valid: bool,
    pub version: Option<String>,
}

fn executable_name(name: &str) -> String {
    if cfg!(windows) && !name.ends_with(".exe") {
        format!("{}.exe", name)
    } else {
        name.to_string()
    }
}

/// Resolve `name` against the process's `PATH`.
pub fn find_in_path(name: &str) -> Result<PathBuf, DiscoveryError> {
    let name = executable_name(name);
    which::which(&name).map_err(|_| DiscoveryError::NotFound(name))
}

/// Resolve `name` against an explicit search path.
pub fn find_in(name: &str, paths: impl AsRef<OsStr>) -> Result<PathBuf, DiscoveryError> {
    let name = executable_name(name);
    let cwd = std::env::current_dir().unwrap_or_default();
    which::which_in(&name, Some(paths), cwd).map_err(|_| DiscoveryError::NotFound(name))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Check that `path` is runnable and ask it for `--version`.
///
/// A binary that exists but cannot report a version is still valid.
pub async fn check_binary(path: &Path) -> BinaryCheck {
    if !is_executable(path) {
        return BinaryCheck {
            valid: false,
            version: None,
        };
    }
    BinaryCheck {
        valid: true,
        version: probe_version(path).await,
    }
}

async fn probe_version(path: &Path) -> Option<String> {
    let mut command = process::Command::new(path);
    command
        .arg("--version")
        .stdin(Stdio::null())
        .kill_on_drop(true);
    let output = match timeout(VERSION_PROBE_TIMEOUT, command.output()).await {
        Ok(Ok(output)) if output.status.success() => output,
        Ok(Ok(output)) => {
            debug!(path = %path.display(), status = %output.status, "version probe failed");
            return None;
        }
        Ok(Err(err)) => {
            debug!(path = %path.display(), error = %err, "version probe failed");
            return None;
        }
        Err(_) => {
            debug!(path = %path.display(), "version probe timed out");
            return None;
        }
    };
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

/// Find `name` on `PATH` and probe it.
pub async fn identify(name: &str) -> BinaryInfo {
    match find_in_path(name) {
        Ok(path) => {
            let check = check_binary(&path).await;
            BinaryInfo {
                name: name.to_string(),
                version: check.version,
                available: check.valid,
                path: Some(path),
            }
        }
        Err(err) => {
            debug!(error = %err, "binary not identified");
            BinaryInfo {
                name: name.to_string(),
                path: None,
                version: None,
                available: false,
            }
        }
    }
}
