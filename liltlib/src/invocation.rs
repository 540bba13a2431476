use crate::config::JobConfig;
use crate::error::{Error, Result};
use crate::types::{Args, Program};
use std::{
    env,
    ffi::OsString,
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::process;

const SEARCH_PATH_VAR: &str = "PATH";

/// A validated, fully-resolved lilt command line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: Program,
    pub args: Args,
    /// Replacement for the child's `PATH`. `None` means inherit the parent's.
    pub search_path: Option<OsString>,
}

impl Invocation {
    /// Validate `config` and turn it into a command line.
    pub fn from_config(config: &JobConfig) -> Result<Self> {
        validate(config)?;
        let search_path = if config.use_docker {
            None
        } else {
            augmented_search_path(config, env::var_os(SEARCH_PATH_VAR))?
        };
        Ok(Self {
            program: config.lilt_binary.clone(),
            args: build_args(config),
            search_path,
        })
    }

    /// Build the tokio command with both output streams piped.
    pub fn command(&self) -> process::Command {
        let mut command = process::Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(search_path) = &self.search_path {
            command.env(SEARCH_PATH_VAR, search_path);
        }
        command
    }
}

fn validate(config: &JobConfig) -> Result<()> {
    if config.lilt_binary.is_empty() {
        return Err(Error::InvalidConfig("lilt binary path"));
    }
    if config.source_dir.is_empty() {
        return Err(Error::InvalidConfig("source directory"));
    }
    if config.target_dir.is_empty() {
        return Err(Error::InvalidConfig("target directory"));
    }
    Ok(())
}

/// Source first, then flags. Optional flags are only ever added, never passed empty.
fn build_args(config: &JobConfig) -> Args {
    let mut args: Args = vec![config.source_dir.clone().into()];
    args.push("--target-dir".into());
    args.push(config.target_dir.clone().into());

    if config.use_docker {
        args.push("--use-docker".into());
    }
    if let Some(format) = config.output_format_override() {
        args.push("--enforce-output-format".into());
        args.push(format.into());
    }
    if config.no_preserve_metadata {
        args.push("--no-preserve-metadata".into());
    }
    if config.copy_images {
        args.push("--copy-images".into());
    }
    args
}

/// Prepend each auxiliary tool's directory to `inherited`.
///
/// Returns `None` when there is nothing to prepend, so the child just inherits.
fn augmented_search_path(
    config: &JobConfig,
    inherited: Option<OsString>,
) -> Result<Option<OsString>> {
    let tool_dirs: Vec<PathBuf> = config
        .auxiliary_tools()
        .filter_map(|tool| Path::new(tool).parent())
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .collect();
    if tool_dirs.is_empty() {
        return Ok(None);
    }

    let fallback = inherited
        .as_deref()
        .map(|paths| env::split_paths(paths).collect::<Vec<_>>())
        .unwrap_or_default();
    let joined = env::join_paths(tool_dirs.into_iter().chain(fallback))
        .map_err(Error::InvalidSearchPath)?;
    Ok(Some(joined))
}
