use std::sync::{Arc, OnceLock};

use serenity::async_trait;
use serenity::model::application::Interaction;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::id::UserId;
use serenity::prelude::{Context, EventHandler};
use tracing::{debug, info};

use relay_agent::TurnOutcome;
use relay_core::{InboundMessage, UserKey};

use crate::context::DiscordContext;
use crate::send::DiscordReply;

/// Serenity event handler wired to the turn pipeline.
pub struct DiscordHandler {
    pub app: Arc<DiscordContext>,
    pub slash_commands: bool,
    pub bot_id: OnceLock<UserId>,
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        self.bot_id.set(ready.user.id).ok();
        info!(name = %ready.user.name, id = %ready.user.id, "Discord bot connected");

        if self.slash_commands {
            crate::commands::register_commands(&ctx).await;
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let Some(text) = inbound_text(msg.author.id, self.bot_id.get().copied(), &msg.content)
        else {
            return;
        };
        if !self.app.settings().accepts_channel(msg.channel_id.get()).await {
            return;
        }
        let text = text.to_string();

        let inbound = InboundMessage {
            user: UserKey::from(msg.author.id.get()),
            channel: msg.channel_id.to_string(),
            text,
        };
        let reply = DiscordReply::new(Arc::clone(&ctx.http), msg.channel_id, msg.id);
        let app = Arc::clone(&self.app);

        // One task per message: a slow completion for one user never blocks
        // the gateway. Turns for the same user still serialize in the store.
        tokio::spawn(async move {
            match app.pipeline().handle(&inbound, &reply).await {
                TurnOutcome::Dispatched { messages } => {
                    debug!(user = %inbound.user, messages, "turn dispatched")
                }
                other => debug!(user = %inbound.user, outcome = ?other, "turn ended early"),
            }
        });
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if !self.slash_commands {
            return;
        }
        if let Interaction::Command(command) = interaction {
            crate::commands::handle_interaction(&self.app, &ctx, &command).await;
        }
    }
}

/// The text to relay for a message, or `None` when it should be ignored.
///
/// Only the bot's own messages are skipped; other bots are answered like any
/// user. Content is forwarded as written. Messages with no text at all
/// (attachment-only, embeds) are skipped since they would store an empty turn.
fn inbound_text(author: UserId, bot_id: Option<UserId>, content: &str) -> Option<&str> {
    match bot_id {
        Some(bot) if bot != author => {}
        // Own message, or not ready yet and unable to tell.
        _ => return None,
    }
    if content.trim().is_empty() {
        return None;
    }
    Some(content)
}
