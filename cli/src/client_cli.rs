use crate::arg_parser::RunArgs;
use liltlib::{
    browser,
    discovery::{self, BinaryInfo},
    error::Error as JobError,
    settings::{ConfigData, SettingsStore},
    Event, JobConfig, Stream, Supervisor, TerminalOutcome,
};
use std::{
    error,
    io::{self, Write},
};
use tokio::{select, signal, sync::mpsc};
use tracing::{info, warn};

pub struct ClientCli {
    supervisor: Supervisor,
    events: mpsc::UnboundedReceiver<Event>,
    settings: SettingsStore,
}

impl ClientCli {
    pub fn new(settings: SettingsStore) -> Self {
        let (events_tx, events) = mpsc::unbounded_channel();
        Self {
            supervisor: Supervisor::new(events_tx),
            events,
            settings,
        }
    }

    /// Run one job to completion, echoing its output. Returns whether it succeeded.
    pub async fn run_job(&mut self, args: RunArgs) -> Result<bool, Box<dyn error::Error>> {
        let mut data = self.settings.load()?;
        apply_args(&mut data.last_config, args);
        self.settings.save(&data)?;

        let job_id = self.supervisor.start(&data.last_config)?;
        info!(%job_id, "transcoding started");

        loop {
            select! {
                maybe_event = self.events.recv() => {
                    match maybe_event {
                        Some(Event::Output { chunk, .. }) => print_chunk(chunk.stream, &chunk.data)?,
                        Some(Event::Terminal { job_id: finished, outcome }) if finished == job_id => {
                            return Ok(report(&outcome));
                        }
                        Some(Event::Terminal { .. }) => {}
                        None => return Ok(false),
                    }
                }
                _ = signal::ctrl_c() => {
                    eprintln!("Stopping transcoding...");
                    already_finished(self.supervisor.stop())?;
                }
            }
        }
    }

    pub async fn find_binary(&self, name: &str) -> Result<(), Box<dyn error::Error>> {
        let BinaryInfo {
            name,
            path,
            version,
            available,
        } = discovery::identify(name).await;
        match path {
            Some(path) if available => {
                println!("{}: {}", name, path.display());
                if let Some(version) = version {
                    println!("version: {}", version);
                }
                Ok(())
            }
            Some(path) => Err(format!("{} at {} is not executable", name, path.display()).into()),
            None => Err(discovery::DiscoveryError::NotFound(name).into()),
        }
    }

    pub fn show_config(&self) -> Result<(), Box<dyn error::Error>> {
        let data = self.settings.load()?;
        println!("# {}", self.settings.path().display());
        print_record(&data)
    }

    pub fn reset_config(&self) -> Result<(), Box<dyn error::Error>> {
        let data = ConfigData::default();
        self.settings.save(&data)?;
        println!("Reset {}", self.settings.path().display());
        Ok(())
    }

    pub fn open_url(&self, url: &str) -> Result<(), Box<dyn error::Error>> {
        browser::open_url(url)?;
        Ok(())
    }

    /// Stop any job still running before the process exits.
    pub fn shutdown(&self) {
        if let Err(err) = self.supervisor.shutdown() {
            warn!(error = %err, "failed to stop transcoding on exit");
        }
    }
}

fn print_record(data: &ConfigData) -> Result<(), Box<dyn error::Error>> {
    println!("{}", serde_json::to_string_pretty(data)?);
    Ok(())
}

/// Overlay command line flags on the last used configuration.
fn apply_args(config: &mut JobConfig, args: RunArgs) {
    let RunArgs {
        source,
        target_dir,
        lilt,
        sox,
        sox_ng,
        ffmpeg,
        ffprobe,
        docker,
        no_docker,
        format,
        preserve_metadata,
        no_preserve_metadata,
        copy_images,
        no_copy_images,
    } = args;

    let overrides = [
        (&mut config.source_dir, source),
        (&mut config.target_dir, target_dir),
        (&mut config.lilt_binary, lilt),
        (&mut config.sox_binary, sox),
        (&mut config.sox_ng_binary, sox_ng),
        (&mut config.ffmpeg_binary, ffmpeg),
        (&mut config.ffprobe_binary, ffprobe),
    ];
    for (field, value) in overrides {
        if let Some(value) = value {
            *field = value;
        }
    }

    config.use_docker = toggle(config.use_docker, docker, no_docker);
    config.copy_images = toggle(config.copy_images, copy_images, no_copy_images);
    config.no_preserve_metadata = toggle(
        config.no_preserve_metadata,
        no_preserve_metadata,
        preserve_metadata,
    );
    if let Some(format) = format {
        config.output_format = format.as_str().to_string();
    }

    if config.lilt_binary.is_empty() {
        if let Ok(path) = discovery::find_in_path("lilt") {
            info!(path = %path.display(), "using lilt found on PATH");
            config.lilt_binary = path.to_string_lossy().into_owned();
        }
    }
}

/// A stop that lost the race against the process exiting is not an error; its
/// outcome is still on the way.
fn already_finished(stopped: Result<(), JobError>) -> Result<(), JobError> {
    match stopped {
        Err(err @ JobError::NotRunning) => {
            warn!(error = %err, "nothing to stop");
            Ok(())
        }
        Err(err @ JobError::TerminationFailure(_)) => {
            warn!(error = %err, "process exited before it could be stopped");
            Ok(())
        }
        other => other,
    }
}

fn toggle(current: bool, on: bool, off: bool) -> bool {
    match (on, off) {
        (true, _) => true,
        (_, true) => false,
        _ => current,
    }
}

fn print_chunk(stream: Stream, data: &str) -> io::Result<()> {
    match stream {
        Stream::Stdout => {
            let mut stdout = io::stdout();
            stdout.write_all(data.as_bytes())?;
            stdout.flush()
        }
        Stream::Stderr => {
            let mut stderr = io::stderr();
            stderr.write_all(data.as_bytes())?;
            stderr.flush()
        }
    }
}

fn report(outcome: &TerminalOutcome) -> bool {
    match outcome {
        TerminalOutcome::Completed => {
            println!("{}", outcome.message());
            true
        }
        TerminalOutcome::Failed(message) => {
            eprintln!("Transcoding failed: {}", message);
            false
        }
    }
}
