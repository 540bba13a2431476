use std::{io, process::Stdio};
use tokio::process;
use tracing::debug;

#[cfg(target_os = "windows")]
fn opener(url: &str) -> process::Command {
    let mut command = process::Command::new("rundll32");
    command.arg("url.dll,FileProtocolHandler").arg(url);
    command
}

#[cfg(target_os = "macos")]
fn opener(url: &str) -> process::Command {
    let mut command = process::Command::new("open");
    command.arg(url);
    command
}

#[cfg(not(any(target_os = "windows", target_os = "macos")))]
fn opener(url: &str) -> process::Command {
    let mut command = process::Command::new("xdg-open");
    command.arg(url);
    command
}

/// Open `url` with the platform's default handler. Only spawn errors are reported.
///
/// Must be called from within a tokio runtime, which reaps the opener process.
pub fn open_url(url: &str) -> io::Result<()> {
    let child = opener(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    debug!(url, pid = ?child.id(), "opened url");
    Ok(())
}
