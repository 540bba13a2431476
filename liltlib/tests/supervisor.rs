#![cfg(unix)]

use liltlib::error::Error;
use liltlib::types::JobId;
use liltlib::{Event, JobConfig, JobStatus, Stream, Supervisor, TerminalOutcome};
use std::{fs, time::Duration};
use tokio::{sync::mpsc, time::timeout};

const EVENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Jobs run `/bin/sh <script> --target-dir <dir> ...`, so the script sees lilt's flags as `$@`.
struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    fn job(&self, script: &str) -> JobConfig {
        let path = self.dir.path().join("lilt.sh");
        fs::write(&path, script).expect("write script");
        JobConfig {
            lilt_binary: "/bin/sh".into(),
            source_dir: path.to_string_lossy().into_owned(),
            target_dir: self.dir.path().join("out").to_string_lossy().into_owned(),
            ..Default::default()
        }
    }
}

fn supervisor() -> (Supervisor, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Supervisor::new(tx), rx)
}

#[derive(Debug, Default)]
struct JobEvents {
    stdout: String,
    stderr: String,
    job_id: Option<JobId>,
    outcome: Option<TerminalOutcome>,
}

/// Collect events until the terminal outcome arrives.
async fn until_outcome(events: &mut mpsc::UnboundedReceiver<Event>) -> JobEvents {
    let mut collected = JobEvents::default();
    loop {
        let event = timeout(EVENT_TIMEOUT, events.recv())
            .await
            .expect("timed out waiting for job events")
            .expect("event channel closed");
        match event {
            Event::Output { chunk, .. } => match chunk.stream {
                Stream::Stdout => collected.stdout.push_str(&chunk.data),
                Stream::Stderr => collected.stderr.push_str(&chunk.data),
            },
            Event::Terminal { job_id, outcome } => {
                collected.job_id = Some(job_id);
                collected.outcome = Some(outcome);
                return collected;
            }
        }
    }
}

/// Nothing but (late) output may follow a terminal outcome.
async fn assert_no_further_outcome(events: &mut mpsc::UnboundedReceiver<Event>) {
    while let Ok(Some(event)) = timeout(Duration::from_millis(500), events.recv()).await {
        assert!(
            matches!(event, Event::Output { .. }),
            "unexpected second terminal outcome: {:?}",
            event
        );
    }
}

#[tokio::test]
async fn successful_job_streams_output_then_completes() {
    let fixture = Fixture::new();
    let (supervisor, mut events) = supervisor();
    let config = JobConfig {
        output_format: "flac".into(),
        copy_images: true,
        ..fixture.job("echo done")
    };

    let job_id = supervisor.start(&config).expect("start");
    match supervisor.status() {
        JobStatus::Running { job_id: running, pid } => {
            assert_eq!(running, job_id);
            assert!(pid.is_some());
        }
        JobStatus::Idle => {
            // the script may already have been reaped, but then the outcome is on its way
        }
    }

    let job = until_outcome(&mut events).await;
    assert_eq!(job.stdout, "done\n");
    assert_eq!(job.stderr, "");
    assert_eq!(job.outcome, Some(TerminalOutcome::Completed));
    assert!(!supervisor.is_running());
    assert_eq!(supervisor.status(), JobStatus::Idle);
    assert_no_further_outcome(&mut events).await;
}

#[tokio::test]
async fn non_zero_exit_is_reported_as_failure() {
    let fixture = Fixture::new();
    let (supervisor, mut events) = supervisor();
    supervisor
        .start(&fixture.job("echo 'no flac here' >&2\nexit 3"))
        .expect("start");

    let job = until_outcome(&mut events).await;
    assert_eq!(job.stderr, "no flac here\n");
    assert_eq!(
        job.outcome,
        Some(TerminalOutcome::Failed("exit status: 3".into()))
    );
    assert!(!supervisor.is_running());
}

#[tokio::test]
async fn flags_reach_the_process() {
    let fixture = Fixture::new();
    let (supervisor, mut events) = supervisor();
    let config = JobConfig {
        use_docker: true,
        output_format: "mp3".into(),
        no_preserve_metadata: true,
        copy_images: true,
        ..fixture.job("for arg in \"$@\"; do printf '%s\\n' \"$arg\"; done")
    };
    supervisor.start(&config).expect("start");

    let job = until_outcome(&mut events).await;
    let expected = format!(
        "--target-dir\n{}\n--use-docker\n--enforce-output-format\nmp3\n--no-preserve-metadata\n--copy-images\n",
        config.target_dir
    );
    assert_eq!(job.stdout, expected);
    assert_eq!(job.outcome, Some(TerminalOutcome::Completed));
}

#[tokio::test]
async fn helper_tool_dirs_lead_the_search_path() {
    let fixture = Fixture::new();
    let (supervisor, mut events) = supervisor();
    let config = JobConfig {
        sox_binary: "/opt/sox/bin/sox".into(),
        ffmpeg_binary: "/opt/ffmpeg/bin/ffmpeg".into(),
        ..fixture.job("echo \"$PATH\"")
    };
    supervisor.start(&config).expect("start");

    let job = until_outcome(&mut events).await;
    assert!(
        job.stdout.starts_with("/opt/sox/bin:/opt/ffmpeg/bin:"),
        "unexpected PATH {:?}",
        job.stdout
    );
    if let Some(parent_path) = std::env::var_os("PATH") {
        assert!(job
            .stdout
            .trim_end()
            .ends_with(&*parent_path.to_string_lossy()));
    }
}

#[tokio::test]
async fn docker_mode_leaves_search_path_alone() {
    let fixture = Fixture::new();
    let (supervisor, mut events) = supervisor();
    let config = JobConfig {
        use_docker: true,
        sox_binary: "/opt/sox/bin/sox".into(),
        ..fixture.job("echo \"$PATH\"")
    };
    supervisor.start(&config).expect("start");

    let job = until_outcome(&mut events).await;
    assert!(!job.stdout.contains("/opt/sox/bin"));
}

#[tokio::test]
async fn second_start_is_rejected_while_running() {
    let fixture = Fixture::new();
    let (supervisor, mut events) = supervisor();
    let config = fixture.job("exec sleep 30");

    supervisor.start(&config).expect("first start");
    assert!(matches!(
        supervisor.start(&config),
        Err(Error::AlreadyRunning)
    ));
    assert!(supervisor.is_running());

    supervisor.stop().expect("stop");
    let job = until_outcome(&mut events).await;
    assert!(matches!(job.outcome, Some(TerminalOutcome::Failed(_))));
    assert_no_further_outcome(&mut events).await;
}

#[tokio::test]
async fn stop_clears_state_immediately_and_watcher_still_reports() {
    let fixture = Fixture::new();
    let (supervisor, mut events) = supervisor();
    supervisor
        .start(&fixture.job("echo started\nexec sleep 30"))
        .expect("start");
    assert!(supervisor.is_running());

    supervisor.stop().expect("stop");
    assert!(!supervisor.is_running());
    assert_eq!(supervisor.status(), JobStatus::Idle);
    assert!(matches!(supervisor.stop(), Err(Error::NotRunning)));

    let job = until_outcome(&mut events).await;
    match job.outcome {
        Some(TerminalOutcome::Failed(message)) => {
            assert!(message.starts_with("signal: 9"), "{}", message)
        }
        other => panic!("expected a killed job, got {:?}", other),
    }
    assert_no_further_outcome(&mut events).await;
}

#[tokio::test]
async fn restart_after_completion_and_after_stop() {
    let fixture = Fixture::new();
    let (supervisor, mut events) = supervisor();

    supervisor.start(&fixture.job("exit 0")).expect("first job");
    let first = until_outcome(&mut events).await;
    assert_eq!(first.outcome, Some(TerminalOutcome::Completed));

    let long = fixture.job("exec sleep 30");
    let stopped = supervisor.start(&long).expect("second job");
    supervisor.stop().expect("stop second job");

    // started before the stopped job's watcher has necessarily reconciled
    let third = supervisor.start(&long).expect("third job");
    assert_ne!(stopped, third);

    let stopped_job = until_outcome(&mut events).await;
    assert_eq!(stopped_job.job_id, Some(stopped));
    // the late watcher must not have clobbered the newer job
    match supervisor.status() {
        JobStatus::Running { job_id, .. } => assert_eq!(job_id, third),
        JobStatus::Idle => panic!("expected third job to still be running"),
    }

    supervisor.shutdown().expect("shutdown");
    assert!(!supervisor.is_running());
    let last = until_outcome(&mut events).await;
    assert_eq!(last.job_id, Some(third));
    assert!(matches!(last.outcome, Some(TerminalOutcome::Failed(_))));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn backgrounded_grandchild_holds_outcome_back_only_briefly() {
    use std::{path::Path, time::Instant};

    let fixture = Fixture::new();
    let (supervisor, mut events) = supervisor();
    let started = Instant::now();
    supervisor
        .start(&fixture.job("sleep 3 &\necho done\nexit 0"))
        .expect("start");
    let pid = match supervisor.status() {
        JobStatus::Running { pid: Some(pid), .. } => pid,
        other => panic!("expected a running job with a pid, got {:?}", other),
    };

    match timeout(EVENT_TIMEOUT, events.recv()).await {
        Ok(Some(Event::Output { chunk, .. })) => assert_eq!(chunk.data, "done\n"),
        other => panic!("expected the script's output first, got {:?}", other),
    }

    // once the shell is reaped its pipes are still held open by `sleep`
    let proc_entry = format!("/proc/{}", pid);
    while Path::new(&proc_entry).exists() {
        assert!(started.elapsed() < Duration::from_secs(2), "shell did not exit");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(supervisor.is_running());
    assert!(matches!(
        supervisor.stop(),
        Err(Error::TerminationFailure(_))
    ));
    assert!(supervisor.is_running());

    let job = until_outcome(&mut events).await;
    assert_eq!(job.outcome, Some(TerminalOutcome::Completed));
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "outcome waited for the grandchild: {:?}",
        started.elapsed()
    );
    assert!(!supervisor.is_running());
    assert_eq!(supervisor.status(), JobStatus::Idle);
}

#[tokio::test]
async fn large_output_keeps_stream_order() {
    let fixture = Fixture::new();
    let (supervisor, mut events) = supervisor();
    supervisor
        .start(&fixture.job(
            "i=1\nwhile [ $i -le 3000 ]; do echo \"out $i\"; echo \"err $i\" >&2; i=$((i+1)); done",
        ))
        .expect("start");

    let job = until_outcome(&mut events).await;
    let expected = |prefix: &str| -> String {
        (1..=3000).map(|i| format!("{} {}\n", prefix, i)).collect()
    };
    assert_eq!(job.stdout, expected("out"));
    assert_eq!(job.stderr, expected("err"));
    assert_eq!(job.outcome, Some(TerminalOutcome::Completed));
}

#[tokio::test]
async fn missing_binary_is_a_launch_failure() {
    let (supervisor, mut events) = supervisor();
    let config = JobConfig {
        lilt_binary: "/nonexistent/bin/lilt".into(),
        source_dir: "/in".into(),
        target_dir: "/out".into(),
        ..Default::default()
    };
    let err = supervisor.start(&config).expect_err("spawn should fail");
    assert!(matches!(err, Error::LaunchFailure(_)));
    assert!(err.to_string().starts_with("failed to start transcoding: "));
    assert!(!supervisor.is_running());
    drop(supervisor);
    assert!(events.recv().await.is_none());
}

#[tokio::test]
async fn invalid_configs_launch_nothing() {
    let (supervisor, mut events) = supervisor();
    let valid = JobConfig {
        lilt_binary: "/usr/bin/lilt".into(),
        source_dir: "/in".into(),
        target_dir: "/out".into(),
        ..Default::default()
    };
    let cases = [
        (
            JobConfig {
                lilt_binary: String::new(),
                ..valid.clone()
            },
            "lilt binary path is required",
        ),
        (
            JobConfig {
                source_dir: String::new(),
                ..valid.clone()
            },
            "source directory is required",
        ),
        (
            JobConfig {
                target_dir: String::new(),
                ..valid.clone()
            },
            "target directory is required",
        ),
    ];
    for (config, message) in cases {
        let err = supervisor.start(&config).expect_err("invalid config");
        assert!(matches!(err, Error::InvalidConfig(_)));
        assert_eq!(err.to_string(), message);
        assert!(!supervisor.is_running());
    }
    drop(supervisor);
    assert!(events.recv().await.is_none());
}
