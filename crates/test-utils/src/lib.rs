//! Shared helpers for livehls integration tests.
//!
//! - [`builders`]: valid configs and job specs with short waits.
//! - [`fakes`]: scripted HTTP and a fake segmenter process.

pub mod builders;
pub mod fakes;

use std::future::Future;
use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Output is only shown for failing tests (or with `--nocapture`); pick
/// levels with e.g. `RUST_LOG=livehls=debug`.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("livehls=info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Bound a real-clock test step (actual child processes) to five seconds.
///
/// Paused-clock scenarios use [`wait_until`] instead: there, time only moves
/// when every task is idle, so wall-clock bounds say nothing.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("test step exceeded 5s of real time")
}

/// Poll `cond` every 10ms of (usually paused) tokio time until it holds,
/// failing after 120s of tokio time.
pub async fn wait_until(what: &str, mut cond: impl FnMut() -> bool) {
    let polled = tokio::time::timeout(Duration::from_secs(120), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(polled.is_ok(), "timed out waiting until {what}");
}
