//! Page title fetching.
//!
//! A fetch is a small state machine: request, follow at most `max_redirects`
//! redirects, then stream the body until a `<title>` span shows up or
//! `byte_cap` bytes went by. Every failure degrades to "no title"; nothing is
//! retried.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::bytes::Regex;

use crate::{formatting::normalize_title, Result};

pub const DEFAULT_MAX_REDIRECTS: u32 = 4;
pub const DEFAULT_BYTE_CAP: usize = 2046;

/// Hexagonal port for plain HTTP GETs.
///
/// Implementations must NOT follow redirects themselves; the fetcher owns the
/// redirect budget.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issue a body-less GET with the given extra headers.
    async fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<Box<dyn HttpResponse>>;
}

/// An in-flight response. Dropping it closes the underlying connection.
#[async_trait]
pub trait HttpResponse: Send {
    fn status(&self) -> u16;

    /// `Location` header, already resolved against the request URL.
    fn location(&self) -> Option<String>;

    /// Next body chunk; `None` once the body is complete.
    async fn chunk(&mut self) -> Result<Option<Vec<u8>>>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchLimits {
    pub max_redirects: u32,
    pub byte_cap: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            max_redirects: DEFAULT_MAX_REDIRECTS,
            byte_cap: DEFAULT_BYTE_CAP,
        }
    }
}

/// How a fetch ended. Only `Found` carries a title.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Found(String),
    /// A `<title>` span was present but held nothing printable.
    EmptyTitle,
    /// More than `byte_cap` bytes arrived before any title.
    Exhausted { bytes: usize },
    /// The body ended before any title.
    EndOfBody { bytes: usize },
    TooManyRedirects { redirects: u32 },
    MissingLocation { status: u16 },
    UnexpectedStatus(u16),
}

impl FetchOutcome {
    pub fn into_title(self) -> Option<String> {
        match self {
            FetchOutcome::Found(title) => Some(title),
            _ => None,
        }
    }
}

/// Per-invocation state. Never shared between fetches.
#[derive(Debug)]
struct FetchSession {
    target: String,
    redirects: u32,
    received: usize,
    buffer: Vec<u8>,
}

impl FetchSession {
    fn new(url: &str) -> Self {
        Self {
            target: url.to_string(),
            redirects: 0,
            received: 0,
            buffer: Vec::new(),
        }
    }

    async fn stream(
        &mut self,
        mut response: Box<dyn HttpResponse>,
        byte_cap: usize,
    ) -> Result<FetchOutcome> {
        while let Some(chunk) = response.chunk().await? {
            self.received += chunk.len();
            self.buffer.extend_from_slice(&chunk);

            // A title anywhere in what already arrived wins over the cap.
            if let Some(raw) = find_title(&self.buffer) {
                return Ok(match normalize_title(&raw) {
                    Some(title) => FetchOutcome::Found(title),
                    None => FetchOutcome::EmptyTitle,
                });
            }

            if self.received > byte_cap {
                return Ok(FetchOutcome::Exhausted {
                    bytes: self.received,
                });
            }
        }

        Ok(FetchOutcome::EndOfBody {
            bytes: self.received,
        })
    }
}

static TITLE_RE: OnceLock<Regex> = OnceLock::new();

/// Inner text of the first complete `<title>…</title>` span, if any.
fn find_title(buf: &[u8]) -> Option<String> {
    let re = TITLE_RE.get_or_init(|| {
        Regex::new(r"(?i-u)<title(?:\s[^>]*)?>([^<]*)</title\s*>").expect("valid regex")
    });
    re.captures(buf)
        .and_then(|c| c.get(1))
        .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
}

/// Fetches page titles through an injected [`HttpTransport`].
#[derive(Clone)]
pub struct TitleFetcher {
    transport: Arc<dyn HttpTransport>,
    limits: FetchLimits,
}

impl TitleFetcher {
    pub fn new(transport: Arc<dyn HttpTransport>, limits: FetchLimits) -> Self {
        Self { transport, limits }
    }

    pub fn limits(&self) -> FetchLimits {
        self.limits
    }

    /// Fetch the title of `url`, or nothing.
    ///
    /// Never fails: transport errors, bad statuses, redirect loops and the byte
    /// cap all come back as `None` (logged at debug level).
    pub async fn fetch_title(&self, url: &str) -> Option<String> {
        match self.fetch(url).await {
            Ok(FetchOutcome::Found(title)) => Some(title),
            Ok(outcome) => {
                tracing::debug!(url, ?outcome, "no title");
                None
            }
            Err(e) => {
                tracing::debug!(url, error = %e, "title fetch aborted");
                None
            }
        }
    }

    /// Run the fetch state machine and report how it ended.
    ///
    /// `Err` means a transport failure (connect, reset, timeout, malformed response).
    pub async fn fetch(&self, url: &str) -> Result<FetchOutcome> {
        let mut session = FetchSession::new(url);
        let headers = [("Accept-Ranges", format!("0..{}", self.limits.byte_cap))];

        loop {
            tracing::debug!(url = %session.target, redirects = session.redirects, "fetching");
            let response = self.transport.get(&session.target, &headers).await?;
            let status = response.status();

            if (300..400).contains(&status) {
                session.redirects += 1;
                if session.redirects > self.limits.max_redirects {
                    return Ok(FetchOutcome::TooManyRedirects {
                        redirects: session.redirects,
                    });
                }
                let Some(next) = response.location() else {
                    return Ok(FetchOutcome::MissingLocation { status });
                };
                // Close this hop before opening the next one.
                drop(response);
                session.target = next;
                continue;
            }

            if !(200..300).contains(&status) {
                return Ok(FetchOutcome::UnexpectedStatus(status));
            }

            return session.stream(response, self.limits.byte_cap).await;
        }
    }
}
