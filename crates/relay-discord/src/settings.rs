//! Runtime-mutable bot settings changed by administrators through slash commands.
//!
//! - Channel allow-list: either every channel, or exactly one channel id.
//! - User model selection: when off, only administrators may pick a model.

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::RwLock;

use relay_core::config::DiscordConfig;

pub struct RelaySettings {
    channel: RwLock<Option<u64>>,
    user_model_selection: AtomicBool,
}

impl RelaySettings {
    pub fn new(channel: Option<u64>, user_model_selection: bool) -> Self {
        Self {
            channel: RwLock::new(channel),
            user_model_selection: AtomicBool::new(user_model_selection),
        }
    }

    pub fn from_config(config: &DiscordConfig) -> Self {
        Self::new(config.channel_id, config.allow_user_model_selection)
    }

    /// The channel the bot is restricted to, or `None` for all channels.
    pub async fn allowed_channel(&self) -> Option<u64> {
        *self.channel.read().await
    }

    pub async fn set_channel(&self, channel: Option<u64>) {
        *self.channel.write().await = channel;
    }

    /// Returns `true` when messages in `channel_id` should be answered.
    pub async fn accepts_channel(&self, channel_id: u64) -> bool {
        match *self.channel.read().await {
            Some(allowed) => allowed == channel_id,
            None => true,
        }
    }

    pub fn user_model_selection(&self) -> bool {
        self.user_model_selection.load(Ordering::SeqCst)
    }

    /// Flip user model selection. Returns the new value.
    pub fn toggle_user_model_selection(&self) -> bool {
        !self.user_model_selection.fetch_xor(true, Ordering::SeqCst)
    }

    /// Whether a user may pick their own model.
    pub fn may_set_model(&self, is_admin: bool) -> bool {
        is_admin || self.user_model_selection()
    }
}

/// Parse the `/set_channel` argument: `"all"` (any case) or a numeric channel id.
pub fn parse_channel_arg(arg: &str) -> Result<Option<u64>, String> {
    let arg = arg.trim();
    if arg.eq_ignore_ascii_case("all") {
        return Ok(None);
    }
    arg.parse::<u64>()
        .map(Some)
        .map_err(|_| format!("'{arg}' is not a channel id"))
}
