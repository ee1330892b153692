//! Hand-written fakes for the core ports.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;

use crate::{
    domain::ChannelId,
    errors::Error,
    fetch::{HttpResponse, HttpTransport},
    messaging::{port::MessagingPort, types::MessagingCapabilities},
    Result,
};

#[derive(Clone, Debug)]
pub struct ScriptedResponse {
    status: u16,
    location: Option<String>,
    chunks: Vec<Vec<u8>>,
}

impl ScriptedResponse {
    pub fn status(status: u16) -> Self {
        Self {
            status,
            location: None,
            chunks: Vec::new(),
        }
    }

    pub fn ok<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            status: 200,
            location: None,
            chunks: chunks
                .into_iter()
                .map(|c| c.as_ref().as_bytes().to_vec())
                .collect(),
        }
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }
}

#[derive(Debug, Default)]
struct TransportLog {
    requested: Vec<String>,
    headers: HashMap<String, Vec<(String, String)>>,
    chunks_read: usize,
    open: usize,
    max_open: usize,
}

/// Transport that replays canned responses per URL. Unknown URLs fail like a
/// refused connection.
#[derive(Default)]
pub struct ScriptedTransport {
    routes: HashMap<String, ScriptedResponse>,
    log: Arc<Mutex<TransportLog>>,
}

impl ScriptedTransport {
    pub fn route(mut self, url: &str, response: ScriptedResponse) -> Self {
        self.routes.insert(url.to_string(), response);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.log.lock().unwrap().requested.clone()
    }

    pub fn headers_for(&self, url: &str) -> Vec<(String, String)> {
        self.log
            .lock()
            .unwrap()
            .headers
            .get(url)
            .cloned()
            .unwrap_or_default()
    }

    pub fn chunks_read(&self) -> usize {
        self.log.lock().unwrap().chunks_read
    }

    pub fn max_open_connections(&self) -> usize {
        self.log.lock().unwrap().max_open
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &str, headers: &[(&str, String)]) -> Result<Box<dyn HttpResponse>> {
        let mut log = self.log.lock().unwrap();
        log.requested.push(url.to_string());
        log.headers.insert(
            url.to_string(),
            headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        );

        let Some(resp) = self.routes.get(url) else {
            return Err(Error::Transport(format!("connection refused: {url}")));
        };

        log.open += 1;
        log.max_open = log.max_open.max(log.open);

        Ok(Box::new(ScriptedBody {
            status: resp.status,
            location: resp.location.clone(),
            chunks: resp.chunks.iter().cloned().collect(),
            log: self.log.clone(),
        }))
    }
}

struct ScriptedBody {
    status: u16,
    location: Option<String>,
    chunks: VecDeque<Vec<u8>>,
    log: Arc<Mutex<TransportLog>>,
}

#[async_trait]
impl HttpResponse for ScriptedBody {
    fn status(&self) -> u16 {
        self.status
    }

    fn location(&self) -> Option<String> {
        self.location.clone()
    }

    async fn chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let next = self.chunks.pop_front();
        if next.is_some() {
            self.log.lock().unwrap().chunks_read += 1;
        }
        Ok(next)
    }
}

impl Drop for ScriptedBody {
    fn drop(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.open -= 1;
        }
    }
}

/// Messenger that records every notification.
#[derive(Default)]
pub struct RecordingMessenger {
    lines: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingMessenger {
    pub fn failing() -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn lines(&self) -> Vec<(String, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.lines().into_iter().map(|(_, text)| text).collect()
    }
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities::default()
    }

    async fn notify(&self, channel: &ChannelId, text: &str) -> Result<()> {
        if self.fail {
            return Err(Error::External("network down".to_string()));
        }
        self.lines
            .lock()
            .unwrap()
            .push((channel.0.clone(), text.to_string()));
        Ok(())
    }
}
