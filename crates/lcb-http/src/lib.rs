//! reqwest adapter for the title fetcher.
//!
//! Implements `lcb-core`'s `HttpTransport` port. Redirects are never followed
//! here; the core fetcher owns the redirect budget.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::LOCATION, redirect, Url};

use lcb_core::{
    errors::Error,
    fetch::{HttpResponse, HttpTransport},
    Result,
};

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .redirect(redirect::Policy::none())
            // Abandoned bodies must not be parked in the pool.
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| Error::Transport(format!("http client build failed: {e}")))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<Box<dyn HttpResponse>> {
        let base = Url::parse(url).map_err(|e| Error::Transport(format!("bad url {url}: {e}")))?;

        let mut req = self.http.get(base.clone());
        for (name, value) in headers {
            req = req.header(*name, value.as_str());
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::Transport(format!("request to {url} failed: {e}")))?;

        let status = resp.status().as_u16();
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|loc| resolve_location(&base, loc));

        tracing::debug!(url, status, "response headers received");
        Ok(Box::new(ReqwestResponse {
            status,
            location,
            inner: resp,
        }))
    }
}

/// Resolve a `Location` header value against the URL that produced it.
pub fn resolve_location(base: &Url, location: &str) -> Option<String> {
    let location = location.trim();
    if location.is_empty() {
        return None;
    }
    base.join(location).ok().map(|u| u.to_string())
}

struct ReqwestResponse {
    status: u16,
    location: Option<String>,
    inner: reqwest::Response,
}

#[async_trait]
impl HttpResponse for ReqwestResponse {
    fn status(&self) -> u16 {
        self.status
    }

    fn location(&self) -> Option<String> {
        self.location.clone()
    }

    async fn chunk(&mut self) -> Result<Option<Vec<u8>>> {
        self.inner
            .chunk()
            .await
            .map(|c| c.map(|bytes| bytes.to_vec()))
            .map_err(|e| Error::Transport(format!("body read failed: {e}")))
    }
}
