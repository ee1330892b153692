use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

use crate::{
    domain::ChannelId,
    messaging::{port::MessagingPort, types::MessagingCapabilities},
    Result,
};

/// MessagingPort decorator that keeps at least `spacing` between two lines
/// sent to the same channel (chat servers kick flooding clients).
///
/// Channels are paced independently. Slots are claimed in call order, so
/// lines for one channel keep their relative order.
pub struct ThrottledMessenger {
    inner: Arc<dyn MessagingPort>,
    spacing: Duration,
    next_free: Mutex<HashMap<String, Instant>>,
}

impl ThrottledMessenger {
    pub fn new(inner: Arc<dyn MessagingPort>, spacing: Duration) -> Self {
        Self {
            inner,
            spacing,
            next_free: Mutex::new(HashMap::new()),
        }
    }

    /// Claim the next send slot for `channel`; returns when that slot opens.
    async fn claim_slot(&self, channel: &str) -> Instant {
        let now = Instant::now();
        let mut slots = self.next_free.lock().await;
        let slot = slots
            .get(channel)
            .copied()
            .filter(|free| *free > now)
            .unwrap_or(now);
        slots.insert(channel.to_string(), slot + self.spacing);
        slot
    }
}

#[async_trait::async_trait]
impl MessagingPort for ThrottledMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        self.inner.capabilities()
    }

    async fn notify(&self, channel: &ChannelId, text: &str) -> Result<()> {
        let slot = self.claim_slot(&channel.0).await;
        sleep_until(slot).await;
        self.inner.notify(channel, text).await
    }
}
