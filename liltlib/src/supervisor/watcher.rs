use super::{lock, ChildHandle, SharedState};
use crate::error::Error;
use crate::events::{Event, EventSink, TerminalOutcome};
use crate::types::{JobId, Pid};
use futures::future::join_all;
use std::{io, process::ExitStatus, sync::Arc, time::Duration};
use tokio::{
    process::Child,
    select,
    sync::mpsc,
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, info, warn};

/// How long output still in flight may hold back the terminal outcome after exit.
const RELAY_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Owns a job's child process and reports how it ended.
pub(super) struct Watcher {
    pub(super) job_id: JobId,
    pub(super) pid: Option<Pid>,
    pub(super) child: Child,
    pub(super) kill_rx: mpsc::UnboundedReceiver<()>,
    pub(super) relays: Vec<JoinHandle<()>>,
    pub(super) state: SharedState,
    pub(super) sink: Arc<dyn EventSink>,
}

impl Watcher {
    pub(super) fn spawn(self) {
        tokio::spawn(self.run());
    }

    async fn run(mut self) {
        let exit = self.wait_for_exit().await;
        let job_id = self.job_id;

        if timeout(RELAY_DRAIN_GRACE, join_all(self.relays))
            .await
            .is_err()
        {
            debug!(%job_id, "output still open after exit, not waiting for it");
        }

        if lock(&self.state).reconcile(job_id) {
            debug!(%job_id, "cleared supervisor state");
        }

        let outcome = outcome(exit);
        info!(%job_id, outcome = outcome.message(), "transcoding process finished");
        self.sink.publish(Event::Terminal { job_id, outcome });
    }

    async fn wait_for_exit(&mut self) -> io::Result<ExitStatus> {
        let mut kill_pending = true;
        let exit = loop {
            select! {
                request = self.kill_rx.recv(), if kill_pending => {
                    kill_pending = false;
                    if request.is_some() {
                        if let Err(err) = self.child.start_kill() {
                            warn!(job_id = %self.job_id, error = %err, "failed to kill transcoding process");
                            kill_pending = self.reclaim();
                        }
                    }
                }
                exit = self.child.wait() => break exit,
            }
        };
        // from here on a stop request can no longer be delivered
        self.kill_rx.close();
        exit
    }

    /// Give the job back to the supervisor with a fresh kill channel.
    ///
    /// Returns whether further kill requests can arrive.
    fn reclaim(&mut self) -> bool {
        let (kill_tx, kill_rx) = mpsc::unbounded_channel();
        let handle = ChildHandle {
            job_id: self.job_id,
            pid: self.pid,
            kill_tx,
        };
        if !lock(&self.state).restore(handle) {
            debug!(job_id = %self.job_id, "newer job running, not reclaiming");
            return false;
        }
        self.kill_rx = kill_rx;
        true
    }
}

fn outcome(exit: io::Result<ExitStatus>) -> TerminalOutcome {
    match exit {
        Ok(status) if status.success() => TerminalOutcome::Completed,
        Ok(status) => TerminalOutcome::Failed(Error::ProcessFailure(status).to_string()),
        Err(err) => TerminalOutcome::Failed(Error::WaitFailure(err).to_string()),
    }
}
