use async_trait::async_trait;

use crate::{
    domain::ChannelId,
    messaging::types::MessagingCapabilities,
    Result,
};

/// Outbound side of a chat network.
///
/// The core never speaks a wire protocol; it hands finished lines of text to
/// this port and the adapter delivers them to the channel.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn notify(&self, channel: &ChannelId, text: &str) -> Result<()>;
}
