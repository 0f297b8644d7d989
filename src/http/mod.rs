// src/http/mod.rs

//! HTTP seam for the three outbound calls a job makes: the source
//! reachability probe, the one-time start notification, and the control-plane
//! status poll.
//!
//! The job only needs the response status, so [`HttpBackend`] reports the
//! status code and leaves body handling out. Tests swap in a scripted
//! backend; production uses [`ReqwestHttp`].

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::debug;

use crate::errors::Result;

/// Boxed future returned by [`HttpBackend`] calls.
pub type HttpFuture<'a> = Pin<Box<dyn Future<Output = Result<u16>> + Send + 'a>>;

pub trait HttpBackend: Send + Sync {
    /// Issue a GET and resolve to the response status code.
    fn get(&self, url: &str) -> HttpFuture<'_>;

    /// POST `body` as JSON and resolve to the response status code.
    fn post_json(&self, url: &str, body: serde_json::Value) -> HttpFuture<'_>;
}

/// Production backend on top of a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

impl HttpBackend for ReqwestHttp {
    fn get(&self, url: &str) -> HttpFuture<'_> {
        let request = self.client.get(url);
        let url = url.to_string();

        Box::pin(async move {
            let response = request.send().await?;
            let status = response.status().as_u16();
            debug!(%url, status, "GET completed");
            Ok(status)
        })
    }

    fn post_json(&self, url: &str, body: serde_json::Value) -> HttpFuture<'_> {
        let request = self.client.post(url).json(&body);
        let url = url.to_string();

        Box::pin(async move {
            let response = request.send().await?;
            let status = response.status().as_u16();
            debug!(%url, status, "POST completed");
            Ok(status)
        })
    }
}
