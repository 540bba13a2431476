use std::{io, result};
use thiserror;

/// Errors returned synchronously by the supervisor's control operations.
///
/// `ProcessFailure` and `WaitFailure` never come back from `start` or `stop`; the
/// completion watcher renders them into the job's terminal outcome instead.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0} is required")]
    InvalidConfig(&'static str),
    #[error("invalid auxiliary tool directory: {0}")]
    InvalidSearchPath(#[source] std::env::JoinPathsError),
    #[error("transcoding is already in progress")]
    AlreadyRunning,
    #[error("no transcoding process is running")]
    NotRunning,
    #[error("failed to start transcoding: {0}")]
    LaunchFailure(#[source] io::Error),
    #[error("failed to stop transcoding: {0}")]
    TerminationFailure(String),
    #[error("{0}")]
    ProcessFailure(std::process::ExitStatus),
    #[error("failed to wait for transcoding process: {0}")]
    WaitFailure(#[source] io::Error),
}

pub type Result<T> = result::Result<T, Error>;
