// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod http;
pub mod logging;
pub mod manifest;
pub mod status_sync;
pub mod supervisor;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, Config};
use crate::errors::Result;
use crate::exec::FfmpegBackend;
use crate::fs::{FileSystem, RealFileSystem};
use crate::http::ReqwestHttp;
use crate::manifest::CannedManifests;
use crate::supervisor::{cleanup_output, spawn_job, Job, JobServices, JobSpec};
use crate::types::{ErrorKind, JobNotification};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the shared substitute manifests
/// - HTTP client, filesystem and segmenter backend
/// - the job runtime
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = Arc::new(load_and_validate(&config_path)?);

    let spec = JobSpec {
        id: args.id.clone(),
        source_url: args.source.clone(),
        callback_url: args.callback.clone(),
    };

    if args.dry_run {
        print_dry_run(&cfg, &spec);
        return Ok(());
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let canned = Arc::new(CannedManifests::load(fs.as_ref(), &cfg.output.base_path)?);
    let http = Arc::new(ReqwestHttp::new(
        &cfg.segmenter.user_agent,
        cfg.retry.http_timeout,
    )?);

    let services = JobServices {
        fs: Arc::clone(&fs),
        http,
        canned,
    };

    let mut handle = spawn_job(spec, cfg, services, FfmpegBackend::new(args.id.clone()));
    let mut notifications = handle
        .take_notifications()
        .ok_or_else(|| anyhow!("notification receiver already taken"))?;

    // Ctrl-C → stop the job; the runtime winds down on its own.
    {
        let stopper = handle.stop_handle();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl+C received; stopping job");
            let _ = stopper.stop().await;
        });
    }

    // The runtime already logs every notification; only remember the failure.
    let failure_watch = tokio::spawn(async move {
        let mut failure: Option<(ErrorKind, String)> = None;
        while let Some(notification) = notifications.recv().await {
            debug!(?notification, "job notification");
            if let JobNotification::Error { kind, detail } = notification {
                failure = Some((kind, detail));
            }
        }
        failure
    });

    handle.start().await?;
    let report = handle.wait().await?;
    info!(
        job = %report.id,
        status = %report.status,
        init_errors = report.init_error_count,
        process_errors = report.process_error_count,
        "job complete"
    );

    if args.cleanup {
        cleanup_output(fs.as_ref(), &report)?;
    }

    let failure = failure_watch
        .await
        .context("notification watcher panicked")?;
    match failure {
        Some((kind, detail)) => Err(anyhow!("job '{}' failed: {kind}: {detail}", report.id).into()),
        None => Ok(()),
    }
}

/// Dry-run output: print the resolved job and the segmenter command line.
fn print_dry_run(cfg: &Arc<Config>, spec: &JobSpec) {
    let job = Job::new(spec.clone(), Arc::clone(cfg));

    println!("livehls dry-run");
    println!("  job.id = {}", job.id);
    println!("  job.source = {}", job.source_url);
    if let Some(ref callback) = job.callback_url {
        println!("  job.callback = {callback}");
    }
    println!("  job.output = {}", job.output_folder.display());
    println!("  job.manifest = {}", job.manifest_path.display());
    println!("  job.stream_url = {}", job.stream_url());
    println!("  job.status_url = {}", job.status_url());
    println!();

    let retry = &cfg.retry;
    println!("retry:");
    println!(
        "  init: {} attempts every {:?}",
        retry.max_init_attempts, retry.init_interval
    );
    println!(
        "  process: {} attempts every {:?}",
        retry.max_process_attempts, retry.process_interval
    );
    println!("  status poll default delay: {:?}", retry.status_poll_default_delay);
    println!();

    println!("segmenter:");
    println!("  {}", job.segmenter_command());

    debug!("dry-run complete (no execution)");
}
