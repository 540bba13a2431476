mod relay;
mod watcher;

use crate::config::JobConfig;
use crate::error::{Error, Result};
use crate::events::{EventSink, Stream};
use crate::invocation::Invocation;
use crate::types::{JobId, Pid};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info};
use watcher::Watcher;

/// Point-in-time view of the supervisor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Idle,
    Running { job_id: JobId, pid: Option<Pid> },
}

/// The supervisor's reference to a live job. The OS child itself is owned by the
/// job's watcher task; termination is requested through `kill_tx`.
#[derive(Debug)]
struct ChildHandle {
    job_id: JobId,
    pid: Option<Pid>,
    kill_tx: mpsc::UnboundedSender<()>,
}

/// `handle.is_some() == running` holds whenever the lock is released.
#[derive(Debug, Default)]
struct SupervisorState {
    running: bool,
    handle: Option<ChildHandle>,
}

impl SupervisorState {
    fn clear(&mut self) {
        self.running = false;
        self.handle = None;
    }

    /// Clear the state after `job_id`'s process exited.
    ///
    /// No-op when a `stop` already cleared it, or when a newer job owns it.
    fn reconcile(&mut self, job_id: JobId) -> bool {
        match &self.handle {
            Some(handle) if handle.job_id == job_id => {
                self.clear();
                true
            }
            Some(_) => false,
            None => {
                self.running = false;
                false
            }
        }
    }

    /// Hand a job back to the supervisor after its kill request could not be carried out.
    ///
    /// Only an idle supervisor takes it back; a job started since wins.
    fn restore(&mut self, handle: ChildHandle) -> bool {
        if self.handle.is_some() {
            return false;
        }
        self.running = true;
        self.handle = Some(handle);
        true
    }
}

type SharedState = Arc<Mutex<SupervisorState>>;

fn lock(state: &Mutex<SupervisorState>) -> MutexGuard<'_, SupervisorState> {
    // the guarded pair is only ever assigned together, so a poisoned lock is still consistent
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Runs at most one lilt process at a time.
///
/// Cloning yields another handle to the same supervisor.
#[derive(Clone)]
pub struct Supervisor {
    state: SharedState,
    sink: Arc<dyn EventSink>,
}

impl Supervisor {
    pub fn new(sink: impl EventSink) -> Self {
        Self::with_sink(Arc::new(sink))
    }

    pub fn with_sink(sink: Arc<dyn EventSink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SupervisorState::default())),
            sink,
        }
    }

    /// Launch a job and return immediately.
    ///
    /// Output and the terminal outcome arrive later through the event sink. Must be
    /// called from within a tokio runtime.
    pub fn start(&self, config: &JobConfig) -> Result<JobId> {
        let mut state = lock(&self.state);
        if state.running {
            return Err(Error::AlreadyRunning);
        }

        let invocation = Invocation::from_config(config)?;
        let mut child = invocation.command().spawn().map_err(Error::LaunchFailure)?;

        let job_id = JobId::new_v4();
        let pid = child.id();
        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        state.running = true;
        state.handle = Some(ChildHandle {
            job_id,
            pid,
            kill_tx,
        });

        let mut relays = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            relays.push(relay::spawn(job_id, Stream::Stdout, stdout, self.sink.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            relays.push(relay::spawn(job_id, Stream::Stderr, stderr, self.sink.clone()));
        }
        Watcher {
            job_id,
            pid,
            child,
            kill_rx,
            relays,
            state: Arc::clone(&self.state),
            sink: self.sink.clone(),
        }
        .spawn();

        info!(%job_id, ?pid, program = %invocation.program, "launched transcoding process");
        Ok(job_id)
    }

    /// Forcefully terminate the running job.
    ///
    /// Does not wait for the process to exit; the job's terminal outcome is still
    /// published once it does. Should the kill itself fail, the watcher hands the
    /// job back so that `is_running` reports it again and `stop` can be retried.
    pub fn stop(&self) -> Result<()> {
        let mut state = lock(&self.state);
        let handle = match (state.running, &state.handle) {
            (true, Some(handle)) => handle,
            _ => return Err(Error::NotRunning),
        };
        handle
            .kill_tx
            .send(())
            .map_err(|_| Error::TerminationFailure("process has already exited".into()))?;

        let job_id = handle.job_id;
        state.clear();
        info!(%job_id, "requested termination of transcoding process");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).running
    }

    pub fn status(&self) -> JobStatus {
        let state = lock(&self.state);
        match (state.running, &state.handle) {
            (true, Some(handle)) => JobStatus::Running {
                job_id: handle.job_id,
                pid: handle.pid,
            },
            _ => JobStatus::Idle,
        }
    }

    /// Stop whatever is running. Having nothing to stop is not an error here.
    pub fn shutdown(&self) -> Result<()> {
        match self.stop() {
            Err(Error::NotRunning) => {
                debug!("shutdown with no transcoding process running");
                Ok(())
            }
            other => other,
        }
    }
}
