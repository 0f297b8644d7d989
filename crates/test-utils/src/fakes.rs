#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::mpsc;
use tokio::time::Instant;

use livehls::errors::Result;
use livehls::exec::{ProcessBackend, ProcessEvent, SegmenterCommand, TERMINATION_SIGNAL};
use livehls::http::{HttpBackend, HttpFuture};
use livehls::supervisor::JobEvent;

/// Scripted HTTP backend.
///
/// Each URL gets a queue of responses; the last one repeats once the queue is
/// down to it. Unscripted URLs answer 200. Every call is recorded.
#[derive(Clone, Default)]
pub struct ScriptedHttp {
    inner: Arc<Mutex<HttpState>>,
}

#[derive(Default)]
struct HttpState {
    scripts: HashMap<String, VecDeque<std::result::Result<u16, String>>>,
    delays: HashMap<String, Duration>,
    gets: Vec<String>,
    posts: Vec<(String, serde_json::Value)>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `status` `times` times before the next scripted
    /// response.
    pub fn respond(self, url: &str, status: u16, times: usize) -> Self {
        {
            let mut state = self.inner.lock().unwrap();
            let queue = state.scripts.entry(url.to_string()).or_default();
            queue.extend(std::iter::repeat_n(Ok(status), times));
        }
        self
    }

    /// Fail requests to `url` at the transport level.
    pub fn fail(self, url: &str, reason: &str, times: usize) -> Self {
        {
            let mut state = self.inner.lock().unwrap();
            let queue = state.scripts.entry(url.to_string()).or_default();
            queue.extend(std::iter::repeat_n(Err(reason.to_string()), times));
        }
        self
    }

    /// Hold every response for `url` back by `delay`.
    pub fn delay(self, url: &str, delay: Duration) -> Self {
        self.inner
            .lock()
            .unwrap()
            .delays
            .insert(url.to_string(), delay);
        self
    }

    pub fn get_count(&self, url: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .gets
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }

    pub fn posts(&self, url: &str) -> Vec<serde_json::Value> {
        self.inner
            .lock()
            .unwrap()
            .posts
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, body)| body.clone())
            .collect()
    }

    fn delay_for(&self, url: &str) -> Duration {
        self.inner
            .lock()
            .unwrap()
            .delays
            .get(url)
            .copied()
            .unwrap_or_default()
    }

    fn next_response(&self, url: &str) -> Result<u16> {
        let mut state = self.inner.lock().unwrap();
        let response = match state.scripts.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or(Ok(200)),
            Some(queue) => queue.front().cloned().unwrap_or(Ok(200)),
            None => Ok(200),
        };
        response.map_err(|reason| anyhow!(reason).into())
    }
}

impl HttpBackend for ScriptedHttp {
    fn get(&self, url: &str) -> HttpFuture<'_> {
        self.inner.lock().unwrap().gets.push(url.to_string());
        let response = self.next_response(url);
        let delay = self.delay_for(url);
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            response
        })
    }

    fn post_json(&self, url: &str, body: serde_json::Value) -> HttpFuture<'_> {
        self.inner
            .lock()
            .unwrap()
            .posts
            .push((url.to_string(), body));
        let response = self.next_response(url);
        let delay = self.delay_for(url);
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            response
        })
    }
}

/// Process backend that never spawns anything.
///
/// It records launches and terminations; the test drives the "process" by
/// injecting events. By default a termination request is answered with an
/// exit by [`TERMINATION_SIGNAL`], like the real segmenter.
#[derive(Clone)]
pub struct FakeProcess {
    inner: Arc<Mutex<ProcessState>>,
}

struct ProcessState {
    launches: Vec<SegmenterCommand>,
    terminations: usize,
    exit_on_terminate: bool,
    events: Option<mpsc::Sender<JobEvent>>,
}

impl Default for FakeProcess {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProcess {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ProcessState {
                launches: Vec::new(),
                terminations: 0,
                exit_on_terminate: true,
                events: None,
            })),
        }
    }

    /// Keep the fake "running" after a termination request.
    pub fn ignore_terminate(self) -> Self {
        self.inner.lock().unwrap().exit_on_terminate = false;
        self
    }

    pub fn launches(&self) -> Vec<SegmenterCommand> {
        self.inner.lock().unwrap().launches.clone()
    }

    pub fn launch_count(&self) -> usize {
        self.inner.lock().unwrap().launches.len()
    }

    pub fn terminations(&self) -> usize {
        self.inner.lock().unwrap().terminations
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().unwrap().events.is_some()
    }

    pub async fn progress(&self) {
        self.emit(ProcessEvent::Progress { at: Instant::now() }).await;
    }

    pub async fn fail(&self, detail: &str, signal: Option<i32>) {
        self.emit(ProcessEvent::Error {
            detail: detail.to_string(),
            signal,
        })
        .await;
    }

    pub async fn end(&self) {
        self.emit(ProcessEvent::End).await;
    }

    /// Deliver an event from the current process. `Error` and `End` also
    /// mark it as exited.
    pub async fn emit(&self, event: ProcessEvent) {
        let tx = {
            let mut state = self.inner.lock().unwrap();
            if matches!(event, ProcessEvent::Progress { .. }) {
                state.events.clone()
            } else {
                state.events.take()
            }
        };
        let tx = tx.expect("no fake process is running");
        tx.send(JobEvent::Process(event))
            .await
            .expect("job runtime is gone");
    }
}

impl ProcessBackend for FakeProcess {
    fn launch(&mut self, command: SegmenterCommand, events: mpsc::Sender<JobEvent>) -> Result<()> {
        let mut state = self.inner.lock().unwrap();
        state.launches.push(command);
        state.events = Some(events);
        Ok(())
    }

    fn terminate(&mut self) {
        let tx = {
            let mut state = self.inner.lock().unwrap();
            state.terminations += 1;
            if state.exit_on_terminate {
                state.events.take()
            } else {
                None
            }
        };

        if let Some(tx) = tx {
            tokio::spawn(async move {
                let _ = tx
                    .send(JobEvent::Process(ProcessEvent::Error {
                        detail: "killed".to_string(),
                        signal: Some(TERMINATION_SIGNAL),
                    }))
                    .await;
            });
        }
    }
}
