//! [`Outbound`] over the Discord REST API.
//!
//! The first chunk is posted as a reply to the user's message; every later
//! chunk references the bot's first message so the thread reads in order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serenity::builder::CreateMessage;
use serenity::http::Http;
use serenity::model::id::{ChannelId, MessageId};

use relay_channels::{ChannelError, MessageRef, Outbound, TypingGuard};

/// Discord rejects empty message bodies.
const EMPTY_PLACEHOLDER: &str = "(no response)";
/// Discord clears the typing indicator after ~10s, so it is refreshed sooner.
const TYPING_REFRESH: Duration = Duration::from_secs(8);

pub struct DiscordReply {
    http: Arc<Http>,
    channel_id: ChannelId,
    reply_to: MessageId,
}

impl DiscordReply {
    pub fn new(http: Arc<Http>, channel_id: ChannelId, reply_to: MessageId) -> Self {
        Self {
            http,
            channel_id,
            reply_to,
        }
    }

    async fn post(&self, text: &str, reference: MessageId) -> Result<MessageId, ChannelError> {
        let msg = CreateMessage::new()
            .content(non_empty(text))
            .reference_message((self.channel_id, reference));
        self.channel_id
            .send_message(&self.http, msg)
            .await
            .map(|sent| sent.id)
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl Outbound for DiscordReply {
    async fn send(&self, text: &str) -> Result<MessageRef, ChannelError> {
        let id = self.post(text, self.reply_to).await?;
        Ok(MessageRef::from(id.get()))
    }

    async fn send_followup(&self, first: &MessageRef, text: &str) -> Result<(), ChannelError> {
        let first = parse_message_id(first)?;
        self.post(text, first).await.map(|_| ())
    }

    fn typing(&self) -> TypingGuard {
        TypingGuard::new(TypingLoop::start(Arc::clone(&self.http), self.channel_id))
    }
}

/// Background task re-sending the typing indicator until dropped.
struct TypingLoop(tokio::task::JoinHandle<()>);

impl TypingLoop {
    fn start(http: Arc<Http>, channel_id: ChannelId) -> Self {
        let handle = tokio::spawn(async move {
            loop {
                let _ = channel_id.broadcast_typing(&http).await;
                tokio::time::sleep(TYPING_REFRESH).await;
            }
        });
        TypingLoop(handle)
    }
}

impl Drop for TypingLoop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn non_empty(text: &str) -> &str {
    if text.trim().is_empty() {
        EMPTY_PLACEHOLDER
    } else {
        text
    }
}

fn parse_message_id(r: &MessageRef) -> Result<MessageId, ChannelError> {
    match r.as_str().parse::<u64>() {
        Ok(id) if id != 0 => Ok(MessageId::new(id)),
        _ => Err(ChannelError::SendFailed(format!(
            "invalid message reference '{}'",
            r.as_str()
        ))),
    }
}
