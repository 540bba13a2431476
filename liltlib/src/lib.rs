pub mod browser;
pub mod config;
pub mod discovery;
pub mod error;
pub mod events;
mod invocation;
pub mod settings;
mod supervisor;
pub mod types;

pub use config::JobConfig;
pub use events::{Event, EventSink, OutputChunk, Stream, TerminalOutcome};
pub use supervisor::{JobStatus, Supervisor};
