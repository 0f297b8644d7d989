// tests/segmenter_process.rs
//
// Runs the real process runner against small shell scripts standing in for
// the segmenter.

#![cfg(unix)]

mod common;
use crate::common::builders::{job_spec, services, ConfigBuilder};
use crate::common::fakes::ScriptedHttp;
use crate::common::{init_tracing, with_timeout};

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::{mpsc, oneshot};

use livehls::exec::process_runner::run_segmenter;
use livehls::exec::{FfmpegBackend, ProcessEvent, SegmenterCommand, TERMINATION_SIGNAL};
use livehls::fs::RealFileSystem;
use livehls::supervisor::{spawn_job, JobEvent};
use livehls::types::{ErrorKind, JobNotification};

fn script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-segmenter.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn command(program: &Path, dir: &Path) -> SegmenterCommand {
    SegmenterCommand {
        program: program.to_string_lossy().into_owned(),
        source_url: "http://origin.test/live.m3u8".to_string(),
        user_agent: "livehls-test".to_string(),
        segment_duration: 2,
        max_segment_window: 6,
        output_dir: dir.join("job-1"),
        manifest_path: dir.join("job-1").join("master.m3u8"),
    }
}

async fn collect(mut rx: mpsc::Receiver<JobEvent>) -> Vec<ProcessEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        if let JobEvent::Process(event) = event {
            events.push(event);
        }
    }
    events
}

#[test]
fn args_describe_hls_stream_copy() {
    let cmd = command(Path::new("ffmpeg"), Path::new("/srv/live"));

    let args = cmd.args();

    let pair = |flag: &str| {
        let i = args.iter().position(|a| a == flag).unwrap();
        args[i + 1].clone()
    };
    assert_eq!(pair("-i"), "http://origin.test/live.m3u8");
    assert_eq!(pair("-user_agent"), "livehls-test");
    assert_eq!(pair("-c:v"), "copy");
    assert_eq!(pair("-c:a"), "copy");
    assert_eq!(pair("-f"), "hls");
    assert_eq!(pair("-hls_time"), "2");
    assert_eq!(pair("-hls_list_size"), "6");
    assert_eq!(pair("-hls_segment_filename"), "/srv/live/job-1/segment_%05d.ts");
    assert_eq!(pair("-progress"), "pipe:1");
    assert_eq!(args.last().unwrap(), "/srv/live/job-1/master.m3u8");
}

#[tokio::test]
async fn progress_blocks_then_clean_exit() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let program = script(
        dir.path(),
        "echo frame=1\necho progress=continue\necho frame=2\necho progress=continue\necho progress=end",
    );
    let (tx, rx) = mpsc::channel(16);
    let (_cancel_tx, cancel_rx) = oneshot::channel();

    with_timeout(run_segmenter(
        "job-1".to_string(),
        command(&program, dir.path()),
        tx,
        cancel_rx,
    ))
    .await;
    let events = collect(rx).await;

    assert_eq!(events.len(), 4, "events: {events:?}");
    assert!(events[..3]
        .iter()
        .all(|e| matches!(e, ProcessEvent::Progress { .. })));
    assert_eq!(events[3], ProcessEvent::End);
}

#[tokio::test]
async fn failing_exit_carries_stderr_tail() {
    let dir = TempDir::new().unwrap();
    let program = script(dir.path(), "echo 'Connection refused' >&2\nexit 1");
    let (tx, rx) = mpsc::channel(16);
    let (_cancel_tx, cancel_rx) = oneshot::channel();

    with_timeout(run_segmenter(
        "job-1".to_string(),
        command(&program, dir.path()),
        tx,
        cancel_rx,
    ))
    .await;

    match collect(rx).await.as_slice() {
        [ProcessEvent::Error { detail, signal }] => {
            assert_eq!(*signal, None);
            assert!(detail.contains("code 1"), "detail: {detail}");
            assert!(detail.contains("Connection refused"), "detail: {detail}");
        }
        other => panic!("expected a single error, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_program_is_a_spawn_error() {
    let dir = TempDir::new().unwrap();
    let (tx, rx) = mpsc::channel(16);
    let (_cancel_tx, cancel_rx) = oneshot::channel();

    with_timeout(run_segmenter(
        "job-1".to_string(),
        command(&dir.path().join("no-such-segmenter"), dir.path()),
        tx,
        cancel_rx,
    ))
    .await;

    match collect(rx).await.as_slice() {
        [ProcessEvent::Error { detail, signal }] => {
            assert_eq!(*signal, None);
            assert!(detail.contains("spawning segmenter"), "detail: {detail}");
        }
        other => panic!("expected a single error, got {other:?}"),
    }
}

#[tokio::test]
async fn cancel_kills_with_termination_signal() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    // `exec` so the kill reaches the process holding the pipes.
    let program = script(dir.path(), "echo progress=continue\nexec sleep 30");
    let (tx, mut rx) = mpsc::channel(16);
    let (cancel_tx, cancel_rx) = oneshot::channel();

    let runner = tokio::spawn(run_segmenter(
        "job-1".to_string(),
        command(&program, dir.path()),
        tx,
        cancel_rx,
    ));

    let first = with_timeout(rx.recv()).await;
    assert!(matches!(
        first,
        Some(JobEvent::Process(ProcessEvent::Progress { .. }))
    ));
    cancel_tx.send(()).unwrap();
    with_timeout(runner).await.unwrap();

    match collect(rx).await.as_slice() {
        [ProcessEvent::Error { signal, .. }] => assert_eq!(*signal, Some(TERMINATION_SIGNAL)),
        other => panic!("expected a kill, got {other:?}"),
    }
}

#[tokio::test]
async fn outside_kill_of_running_segmenter_fails_the_job() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let program = script(
        dir.path(),
        "echo progress=continue\necho progress=continue\nkill -9 $$",
    );
    let config = ConfigBuilder::new(dir.path())
        .program(program.to_string_lossy())
        .build_arc();
    let mut handle = spawn_job(
        job_spec("job-1"),
        config,
        services(Arc::new(RealFileSystem), Arc::new(ScriptedHttp::new())),
        FfmpegBackend::new("job-1"),
    );
    let mut notifications = handle.take_notifications().unwrap();

    handle.start().await.unwrap();
    let terminal = tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            match notifications.recv().await {
                Some(n) if n.is_terminal() => break Some(n),
                Some(_) => continue,
                None => break None,
            }
        }
    })
    .await
    .expect("job never reached a terminal notification");

    match terminal {
        Some(JobNotification::Error { kind, detail }) => {
            assert_eq!(kind, ErrorKind::ProcessError);
            assert!(detail.contains("signal 9"), "detail: {detail}");
        }
        other => panic!("expected a ProcessError, got {other:?}"),
    }
}
