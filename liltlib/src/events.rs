use crate::types::{JobId, OutputBlob};
use serde::Serialize;
use std::{fmt, sync::Arc};
use tokio::sync::mpsc;

pub const OUTPUT_TOPIC: &str = "transcoding-output";
pub const COMPLETE_TOPIC: &str = "transcoding-complete";
pub const ERROR_TOPIC: &str = "transcoding-error";

pub const COMPLETED_MESSAGE: &str = "Transcoding completed successfully!";

/// Which of the child's output streams a chunk was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => f.write_str("stdout"),
            Stream::Stderr => f.write_str("stderr"),
        }
    }
}

/// One read's worth of output from a single stream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutputChunk {
    #[serde(rename = "type")]
    pub stream: Stream,
    pub data: String,
    #[serde(skip)]
    pub raw: OutputBlob,
}

/// How a job ended. Exactly one is published per job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TerminalOutcome {
    Completed,
    Failed(String),
}

impl TerminalOutcome {
    pub fn message(&self) -> &str {
        match self {
            TerminalOutcome::Completed => COMPLETED_MESSAGE,
            TerminalOutcome::Failed(message) => message,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Output { job_id: JobId, chunk: OutputChunk },
    Terminal { job_id: JobId, outcome: TerminalOutcome },
}

impl Event {
    pub fn job_id(&self) -> JobId {
        match self {
            Event::Output { job_id, .. } | Event::Terminal { job_id, .. } => *job_id,
        }
    }

    /// The notification topic a presentation layer listens on for this event.
    pub fn topic(&self) -> &'static str {
        match self {
            Event::Output { .. } => OUTPUT_TOPIC,
            Event::Terminal {
                outcome: TerminalOutcome::Completed,
                ..
            } => COMPLETE_TOPIC,
            Event::Terminal {
                outcome: TerminalOutcome::Failed(_),
                ..
            } => ERROR_TOPIC,
        }
    }
}

/// One-way notification channel the supervisor publishes job events to.
///
/// `publish` must not block: it is called from the relay and watcher tasks.
pub trait EventSink: Send + Sync + 'static {
    fn publish(&self, event: Event);
}

impl<S: EventSink + ?Sized> EventSink for Arc<S> {
    fn publish(&self, event: Event) {
        (**self).publish(event)
    }
}

/// Forwards events into an unbounded channel. Events are dropped once the receiver is gone.
impl EventSink for mpsc::UnboundedSender<Event> {
    fn publish(&self, event: Event) {
        let _ = self.send(event);
    }
}
