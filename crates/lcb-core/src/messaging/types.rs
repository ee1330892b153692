use crate::domain::{ChannelId, ServerId};

/// One chat line received by an adapter.
#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub text: String,
    pub nick: String,
    pub channel: ChannelId,
    pub server: ServerId,
}

impl IncomingMessage {
    pub fn new(
        text: impl Into<String>,
        nick: impl Into<String>,
        channel: ChannelId,
        server: ServerId,
    ) -> Self {
        Self {
            text: text.into(),
            nick: nick.into(),
            channel,
            server,
        }
    }
}

/// Capabilities / limits of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    /// Longest line the network delivers intact.
    pub max_message_len: usize,
}

impl Default for MessagingCapabilities {
    fn default() -> Self {
        // Fits a PRIVMSG inside the 512 byte IRC line with prefix overhead.
        Self {
            max_message_len: 400,
        }
    }
}
