use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Platform-native handle of a message that was sent, used to thread follow-ups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef(pub String);

impl MessageRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for MessageRef {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Keeps a typing indicator alive until dropped.
#[must_use = "the indicator stops as soon as the guard is dropped"]
#[derive(Default)]
pub struct TypingGuard(Option<Box<dyn Send>>);

impl TypingGuard {
    /// Wrap a platform handle whose `Drop` stops the indicator.
    pub fn new(handle: impl Send + 'static) -> Self {
        Self(Some(Box::new(handle)))
    }
}

/// Where the reply to one inbound message goes.
///
/// An `Outbound` is bound to a single conversation target (the channel and the
/// message being answered), so the pipeline never deals in platform ids.
/// Implementations must be `Send + Sync` so a turn can run on any Tokio worker.
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Deliver `text` as a reply to the inbound message.
    ///
    /// The returned reference is what follow-ups thread under.
    async fn send(&self, text: &str) -> Result<MessageRef, ChannelError>;

    /// Deliver `text` as a follow-up referencing `first`.
    async fn send_followup(&self, first: &MessageRef, text: &str) -> Result<(), ChannelError>;

    /// Show that a reply is being prepared until the guard is dropped.
    /// Best effort; the default shows nothing.
    fn typing(&self) -> TypingGuard {
        TypingGuard::default()
    }
}
