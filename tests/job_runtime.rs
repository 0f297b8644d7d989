// tests/job_runtime.rs
//
// End-to-end runs of a job's runtime against an in-memory filesystem, a
// scripted HTTP backend and a fake segmenter, on a paused clock.

mod common;
use crate::common::builders::{
    job_spec, job_spec_with_callback, manifest_path, services, status_url, ConfigBuilder,
    CALLBACK, SOURCE,
};
use crate::common::fakes::{FakeProcess, ScriptedHttp};
use crate::common::{init_tracing, wait_until};

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use livehls::config::Config;
use livehls::fs::mock::MockFileSystem;
use livehls::fs::FileSystem;
use livehls::manifest::{CannedManifests, Visibility};
use livehls::supervisor::{spawn_job, JobHandle, JobSpec};
use livehls::types::{ErrorKind, JobNotification, JobStatus};

const BASE: &str = "/srv/live";
const LIVE_MANIFEST: &str = "#EXTM3U\n#EXT-X-VERSION:3\n#EXTINF:1.0,\nsegment_00000.ts\n";

struct Harness {
    fs: MockFileSystem,
    http: ScriptedHttp,
    process: FakeProcess,
    handle: JobHandle,
    notifications: mpsc::UnboundedReceiver<JobNotification>,
}

impl Harness {
    fn new(spec: JobSpec, config: Config, http: ScriptedHttp) -> Self {
        Self::with_fs(spec, config, http, MockFileSystem::new())
    }

    fn with_fs(spec: JobSpec, config: Config, http: ScriptedHttp, fs: MockFileSystem) -> Self {
        init_tracing();
        let process = FakeProcess::new();
        let mut handle = spawn_job(
            spec,
            Arc::new(config),
            services(Arc::new(fs.clone()), Arc::new(http.clone())),
            process.clone(),
        );
        let notifications = handle
            .take_notifications()
            .expect("notifications already taken");
        Self {
            fs,
            http,
            process,
            handle,
            notifications,
        }
    }

    fn manifest(&self) -> PathBuf {
        manifest_path(Path::new(BASE), "job-1")
    }

    /// Start the job and wait for the segmenter launch, then simulate the
    /// first manifest write and progress block.
    async fn start_running(&self) {
        self.handle.start().await.unwrap();
        wait_until("segmenter launched", || self.process.launch_count() == 1).await;
        self.fs.add_file(self.manifest(), LIVE_MANIFEST);
        self.process.progress().await;
    }
}

fn drain(rx: &mut mpsc::UnboundedReceiver<JobNotification>) -> Vec<JobNotification> {
    let mut out = Vec::new();
    while let Ok(n) = rx.try_recv() {
        out.push(n);
    }
    out
}

fn config() -> ConfigBuilder {
    ConfigBuilder::new(BASE)
}

#[tokio::test(start_paused = true)]
async fn clean_end_finalizes_manifest_and_checks_status() {
    let h = Harness::new(job_spec("job-1"), config().build(), ScriptedHttp::new());

    h.start_running().await;
    h.handle.mark_as_finished().await.unwrap();
    h.process.end().await;

    let Harness {
        fs,
        http,
        handle,
        mut notifications,
        ..
    } = h;
    let report = handle.wait().await.unwrap();

    assert_eq!(report.status, JobStatus::Finished);
    assert_eq!(drain(&mut notifications), vec![JobNotification::End]);
    assert_eq!(http.get_count(SOURCE), 1);
    assert_eq!(http.get_count(&status_url("job-1")), 1);

    let manifest = fs.contents(manifest_path(Path::new(BASE), "job-1")).unwrap();
    let manifest = String::from_utf8(manifest).unwrap();
    assert!(manifest.starts_with(LIVE_MANIFEST));
    assert!(manifest.ends_with("#EXT-X-ENDLIST\n"));
}

#[tokio::test(start_paused = true)]
async fn removed_broadcast_privatizes_manifest() {
    let http = ScriptedHttp::new().respond(&status_url("job-1"), 404, 1);
    let h = Harness::new(job_spec("job-1"), config().build(), http);

    h.start_running().await;
    h.process.end().await;

    let manifest = h.manifest();
    let backup = manifest.with_file_name("master.bck.m3u8");
    let fs = h.fs.clone();
    let report = h.handle.wait().await.unwrap();

    assert_eq!(report.status, JobStatus::Finished);
    let current = String::from_utf8(fs.contents(&manifest).unwrap()).unwrap();
    assert_eq!(
        current,
        CannedManifests::builtin().for_visibility(Visibility::Private)
    );
    let saved = String::from_utf8(fs.contents(&backup).unwrap()).unwrap();
    assert_eq!(saved, format!("{LIVE_MANIFEST}#EXT-X-ENDLIST\n"));
}

#[tokio::test(start_paused = true)]
async fn status_check_waits_twice_the_live_delay() {
    let h = Harness::new(job_spec("job-1"), config().build(), ScriptedHttp::new());
    let started = tokio::time::Instant::now();

    h.start_running().await;
    let live_delay = started.elapsed() * 2;
    h.process.end().await;

    let http = h.http.clone();
    let ended = tokio::time::Instant::now();
    wait_until("status checked", || http.get_count(&status_url("job-1")) == 1).await;

    assert!(ended.elapsed() >= live_delay * 2);
    let report = h.handle.wait().await.unwrap();
    assert!(report.live_delay >= Duration::from_secs(6));
}

#[tokio::test(start_paused = true)]
async fn unreachable_source_gives_up_after_cap() {
    let http = ScriptedHttp::new().respond(SOURCE, 503, 1);
    let h = Harness::new(
        job_spec("job-1"),
        config().max_init_attempts(3).build(),
        http,
    );

    h.handle.start().await.unwrap();

    let Harness {
        http,
        process,
        handle,
        mut notifications,
        ..
    } = h;
    let report = handle.wait().await.unwrap();

    assert_eq!(report.status, JobStatus::Errored);
    assert_eq!(report.init_error_count, 3);
    match drain(&mut notifications).as_slice() {
        [JobNotification::Error { kind, .. }] => assert_eq!(*kind, ErrorKind::InitializationError),
        other => panic!("expected one InitializationError, got {other:?}"),
    }
    assert_eq!(http.get_count(SOURCE), 3);
    assert_eq!(process.launch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_during_retry_wait_cancels_pending_probe() {
    let http = ScriptedHttp::new().respond(SOURCE, 500, 1);
    let h = Harness::new(
        job_spec("job-1"),
        config().init_interval("30s").build(),
        http,
    );

    h.handle.start().await.unwrap();
    wait_until("first probe", || h.http.get_count(SOURCE) == 1).await;
    h.handle.stop().await.unwrap();

    let Harness {
        http,
        process,
        handle,
        mut notifications,
        ..
    } = h;
    let report = handle.wait().await.unwrap();
    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(report.status, JobStatus::Stopped);
    assert_eq!(drain(&mut notifications), vec![JobNotification::End]);
    assert_eq!(http.get_count(SOURCE), 1);
    assert_eq!(process.launch_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn stop_while_running_terminates_segmenter() {
    let h = Harness::new(job_spec("job-1"), config().build(), ScriptedHttp::new());

    h.start_running().await;
    h.handle.stop().await.unwrap();

    let Harness {
        fs,
        process,
        handle,
        mut notifications,
        ..
    } = h;
    let report = handle.wait().await.unwrap();

    assert_eq!(report.status, JobStatus::Stopped);
    assert_eq!(process.terminations(), 1);
    assert!(!process.is_running());
    assert_eq!(drain(&mut notifications), vec![JobNotification::End]);

    let manifest = fs.contents(manifest_path(Path::new(BASE), "job-1")).unwrap();
    assert!(String::from_utf8(manifest).unwrap().ends_with("#EXT-X-ENDLIST\n"));
}

#[tokio::test(start_paused = true)]
async fn callback_is_posted_once() {
    let h = Harness::new(
        job_spec_with_callback("job-1"),
        config().build(),
        ScriptedHttp::new(),
    );

    h.start_running().await;
    for _ in 0..4 {
        h.process.progress().await;
    }
    wait_until("callback posted", || h.http.posts(CALLBACK).len() == 1).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    let posts = h.http.posts(CALLBACK);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["id"], "job-1");
    assert_eq!(posts[0]["upcloseStreamUrl"], "http://cdn.test/job-1/master.m3u8");
    assert!(posts[0]["liveDelay"].as_u64().unwrap() >= 6);

    h.handle.stop().await.unwrap();
    let report = h.handle.wait().await.unwrap();
    assert_eq!(report.status, JobStatus::Stopped);
}

#[tokio::test(start_paused = true)]
async fn rejected_callback_warns_without_failing() {
    let http = ScriptedHttp::new().respond(CALLBACK, 500, 1);
    let mut h = Harness::new(job_spec_with_callback("job-1"), config().build(), http);

    h.start_running().await;

    let warning = h.notifications.recv().await.unwrap();
    match warning {
        JobNotification::Warning { kind, detail } => {
            assert_eq!(kind, ErrorKind::CallbackError);
            assert!(detail.contains("500"));
        }
        other => panic!("expected a warning, got {other:?}"),
    }

    h.process.end().await;
    let Harness {
        handle,
        mut notifications,
        ..
    } = h;
    let report = handle.wait().await.unwrap();
    assert_eq!(report.status, JobStatus::Finished);
    assert_eq!(drain(&mut notifications), vec![JobNotification::End]);
}

#[tokio::test(start_paused = true)]
async fn unwritable_output_directory_is_a_directory_error() {
    let fs = MockFileSystem::new();
    fs.fail_under(Path::new(BASE).join("job-1"));
    let h = Harness::with_fs(job_spec("job-1"), config().build(), ScriptedHttp::new(), fs);

    h.handle.start().await.unwrap();

    let Harness {
        process,
        handle,
        mut notifications,
        ..
    } = h;
    let report = handle.wait().await.unwrap();

    assert_eq!(report.status, JobStatus::Errored);
    assert_eq!(process.launch_count(), 0);
    match drain(&mut notifications).as_slice() {
        [JobNotification::Error { kind, .. }] => assert_eq!(*kind, ErrorKind::DirectoryError),
        other => panic!("expected one DirectoryError, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn stale_output_is_cleared_before_launch() {
    let fs = MockFileSystem::new();
    let stale = Path::new(BASE).join("job-1").join("segment_00042.ts");
    fs.add_file(&stale, "old");
    let h = Harness::with_fs(job_spec("job-1"), config().build(), ScriptedHttp::new(), fs);

    h.handle.start().await.unwrap();
    wait_until("segmenter launched", || h.process.launch_count() == 1).await;

    assert!(h.fs.contents(&stale).is_none());
    assert!(h.fs.is_dir(&Path::new(BASE).join("job-1")));

    h.handle.stop().await.unwrap();
    h.handle.wait().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn segmenter_failing_before_output_is_relaunched() {
    let h = Harness::new(
        job_spec("job-1"),
        config().process_interval("2s").build(),
        ScriptedHttp::new(),
    );

    h.handle.start().await.unwrap();
    wait_until("first launch", || h.process.launch_count() == 1).await;
    h.process.fail("segmenter exited with code 1", None).await;
    wait_until("second launch", || h.process.launch_count() == 2).await;

    assert_eq!(h.http.get_count(SOURCE), 2);

    h.handle.stop().await.unwrap();
    let Harness {
        handle,
        mut notifications,
        ..
    } = h;
    let report = handle.wait().await.unwrap();
    assert_eq!(report.process_error_count, 1);
    assert_eq!(drain(&mut notifications), vec![JobNotification::End]);
}

#[tokio::test(start_paused = true)]
async fn crash_while_running_is_a_process_error() {
    let h = Harness::new(job_spec("job-1"), config().build(), ScriptedHttp::new());

    h.start_running().await;
    h.process.fail("segmenter exited with code 1", None).await;

    let manifest = h.manifest();
    let Harness {
        fs,
        handle,
        mut notifications,
        ..
    } = h;
    let report = handle.wait().await.unwrap();

    assert_eq!(report.status, JobStatus::Errored);
    match drain(&mut notifications).as_slice() {
        [JobNotification::Error { kind, .. }] => assert_eq!(*kind, ErrorKind::ProcessError),
        other => panic!("expected one ProcessError, got {other:?}"),
    }
    let text = String::from_utf8(fs.contents(manifest).unwrap()).unwrap();
    assert!(text.ends_with("#EXT-X-ENDLIST\n"));
}

#[tokio::test(start_paused = true)]
async fn slow_failing_callback_still_warns_after_end() {
    let http = ScriptedHttp::new()
        .respond(CALLBACK, 500, 1)
        .delay(CALLBACK, Duration::from_secs(5));
    let h = Harness::new(job_spec_with_callback("job-1"), config().build(), http);

    h.start_running().await;
    h.process.end().await;

    let Harness {
        handle,
        mut notifications,
        ..
    } = h;
    let report = handle.wait().await.unwrap();
    let sent = drain(&mut notifications);

    assert_eq!(report.status, JobStatus::Finished);
    assert_eq!(sent.iter().filter(|n| n.is_terminal()).count(), 1);
    assert!(sent.contains(&JobNotification::End));
    let warnings: Vec<_> = sent
        .iter()
        .filter_map(|n| match n {
            JobNotification::Warning { kind, .. } => Some(*kind),
            _ => None,
        })
        .collect();
    assert_eq!(warnings, vec![ErrorKind::CallbackError]);
}

#[tokio::test(start_paused = true)]
async fn start_after_stop_is_a_no_op() {
    let h = Harness::new(job_spec("job-1"), config().build(), ScriptedHttp::new());

    h.handle.stop_handle().stop().await.unwrap();
    // Let the runtime settle and drop its channel first.
    wait_until("runtime exited", || h.notifications.len() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(h.handle.is_stopped());
    h.handle.start().await.unwrap();

    let Harness {
        http,
        process,
        handle,
        mut notifications,
        ..
    } = h;
    let report = handle.wait().await.unwrap();

    assert_eq!(report.status, JobStatus::Stopped);
    assert_eq!(drain(&mut notifications), vec![JobNotification::End]);
    assert_eq!(http.get_count(SOURCE), 0);
    assert_eq!(process.launch_count(), 0);
}
