//! Console adapter.
//!
//! Implements the `lcb-core` MessagingPort over any async writer (stdout in
//! production) and feeds chat lines read from stdin into the enrichment pipeline.

use async_trait::async_trait;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt},
    sync::Mutex,
};

pub mod router;

use lcb_core::{
    domain::ChannelId,
    messaging::{port::MessagingPort, types::MessagingCapabilities},
    Result,
};

/// Prints notifications as `[channel] text` lines.
pub struct ConsoleMessenger<W> {
    out: Mutex<W>,
    max_message_len: usize,
}

impl<W> ConsoleMessenger<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(out: W, max_message_len: usize) -> Self {
        Self {
            out: Mutex::new(out),
            max_message_len,
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }
}

#[async_trait]
impl<W> MessagingPort for ConsoleMessenger<W>
where
    W: AsyncWrite + Unpin + Send,
{
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            max_message_len: self.max_message_len,
        }
    }

    async fn notify(&self, channel: &ChannelId, text: &str) -> Result<()> {
        let line = format!("[{channel}] {text}\n");
        let mut out = self.out.lock().await;
        out.write_all(line.as_bytes()).await?;
        out.flush().await?;
        Ok(())
    }
}
