//! Link enrichment: detect → dedup → notify → fetch title → notify.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::{
    detect::detect,
    domain::ChannelId,
    fetch::TitleFetcher,
    formatting::truncate_chars,
    messaging::{port::MessagingPort, types::IncomingMessage},
    registry::{LinkRecord, LinkRegistry, NewLink, Sighting},
    Result,
};

/// Line announcing a link nobody posted before.
pub fn saving_line(record: &LinkRecord) -> String {
    format!("Saving link: {}", record.url)
}

/// Line announcing a repost, with the running count and the first poster.
pub fn seen_line(record: &LinkRecord) -> String {
    format!(
        "Seen: {} {} times, posted by: {}",
        record.url, record.count, record.first_nick
    )
}

pub fn title_line(title: &str) -> String {
    format!("Title: {title}")
}

/// Orchestrates the enrichment pipeline over injected ports.
#[derive(Clone)]
pub struct LinkEnricher {
    registry: Arc<dyn LinkRegistry>,
    fetcher: TitleFetcher,
    messenger: Arc<dyn MessagingPort>,
}

impl LinkEnricher {
    pub fn new(
        registry: Arc<dyn LinkRegistry>,
        fetcher: TitleFetcher,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        Self {
            registry,
            fetcher,
            messenger,
        }
    }

    /// Handle one chat line.
    ///
    /// Waits only for the registry round-trip and the new/seen notification;
    /// the title fetch runs on its own task whose handle is returned (callers
    /// are free to drop it). `Ok(None)` means the line carried no URL.
    ///
    /// The only error surfaced is a registry failure.
    pub async fn on_message(
        &self,
        msg: &IncomingMessage,
    ) -> Result<Option<JoinHandle<Option<String>>>> {
        let Some(url) = detect(&msg.text) else {
            return Ok(None);
        };

        let sighting = self
            .registry
            .record_sighting(NewLink {
                url,
                nick: msg.nick.clone(),
                channel: msg.channel.clone(),
                server: msg.server.clone(),
            })
            .await?;

        let line = match &sighting {
            Sighting::New(record) => {
                tracing::info!(url = %record.url, nick = %msg.nick, "new link");
                saving_line(record)
            }
            Sighting::Seen(record) => {
                tracing::info!(url = %record.url, count = record.count, "link seen again");
                seen_line(record)
            }
        };
        send(self.messenger.as_ref(), &msg.channel, &line).await;

        let task = TitleTask {
            registry: self.registry.clone(),
            fetcher: self.fetcher.clone(),
            messenger: self.messenger.clone(),
            channel: msg.channel.clone(),
            record: sighting.into_record(),
        };
        Ok(Some(tokio::spawn(task.run())))
    }
}

/// Background half of the pipeline for one sighting.
struct TitleTask {
    registry: Arc<dyn LinkRegistry>,
    fetcher: TitleFetcher,
    messenger: Arc<dyn MessagingPort>,
    channel: ChannelId,
    record: LinkRecord,
}

impl TitleTask {
    async fn run(self) -> Option<String> {
        let title = self.fetcher.fetch_title(&self.record.url).await?;

        if let Err(e) = self.registry.set_title(&self.record, &title).await {
            tracing::warn!(url = %self.record.url, error = %e, "failed to store title");
        }
        send(self.messenger.as_ref(), &self.channel, &title_line(&title)).await;
        Some(title)
    }
}

/// Deliver one line, cut to the messenger's limit. Delivery failures are logged only.
async fn send(messenger: &dyn MessagingPort, channel: &ChannelId, line: &str) {
    let max = messenger.capabilities().max_message_len;
    let line = truncate_chars(line, max);
    if let Err(e) = messenger.notify(channel, &line).await {
        tracing::warn!(channel = %channel, error = %e, "notification failed");
    }
}
