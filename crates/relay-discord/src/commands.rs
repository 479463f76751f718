//! Discord slash commands: `/set_channel`, `/list_models`, `/set_model`,
//! `/set_default_model`, `/toggle_user_model_selection`, `/clear_context`.
//!
//! Registration happens in `ready()` when `slash_commands` is enabled.
//! Each command is a thin serenity wrapper over a plain `*_reply` function
//! that does the work and returns the text to show.

use std::sync::Arc;

use serenity::builder::{
    CreateCommand, CreateCommandOption, CreateInteractionResponse,
    CreateInteractionResponseMessage, EditInteractionResponse,
};
use serenity::model::application::{Command, CommandInteraction, CommandOptionType};
use serenity::prelude::Context;
use tracing::{info, warn};

use relay_agent::{CompletionBackend, ModelListResult};
use relay_context::ContextStore;
use relay_core::UserKey;

use crate::context::DiscordContext;
use crate::models::{model_pages, select_page};
use crate::settings::{parse_channel_arg, RelaySettings};

const MODELS_UNAVAILABLE: &str = "Failed to retrieve the list of models.";

/// Register global slash commands. Call from `ready()`.
pub async fn register_commands(ctx: &Context) {
    let commands = vec![
        CreateCommand::new("set_channel")
            .description("Set the channel ID for the bot to respond to")
            .add_option(
                CreateCommandOption::new(
                    CommandOptionType::String,
                    "channel",
                    "A channel ID, or 'all'",
                )
                .required(true),
            ),
        CreateCommand::new("list_models")
            .description("Retrieve the list of available models")
            .add_option(
                CreateCommandOption::new(CommandOptionType::Integer, "page", "Page number")
                    .min_int_value(1)
                    .required(false),
            ),
        CreateCommand::new("set_model")
            .description("Set the model to use")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "model_id", "Model ID")
                    .required(true),
            ),
        CreateCommand::new("set_default_model")
            .description("Set the default model for all users (admin only)")
            .add_option(
                CreateCommandOption::new(CommandOptionType::String, "model_id", "Model ID")
                    .required(true),
            ),
        CreateCommand::new("toggle_user_model_selection")
            .description("Toggle user model selection (admin only)"),
        CreateCommand::new("clear_context").description("Clear the conversation context"),
    ];

    match Command::set_global_commands(&ctx.http, commands).await {
        Ok(cmds) => info!(count = cmds.len(), "registered global slash commands"),
        Err(e) => warn!(error = %e, "failed to register global slash commands"),
    }
}

/// Dispatch a slash command interaction to the appropriate handler.
pub async fn handle_interaction(app: &Arc<DiscordContext>, ctx: &Context, command: &CommandInteraction) {
    let user = UserKey::from(command.user.id.get());
    let admin = is_admin(command);

    if command.data.name == "list_models" {
        if let Err(e) = handle_list_models(app, ctx, command).await {
            warn!(command = "list_models", error = %e, "slash command error");
        }
        return;
    }

    let reply = match command.data.name.as_str() {
        "set_channel" => {
            set_channel_reply(app.settings(), admin, string_option(command, "channel")).await
        }
        "set_model" => set_model_reply(
            app.store(),
            app.settings(),
            &user,
            admin,
            string_option(command, "model_id"),
        ),
        "set_default_model" => {
            set_default_model_reply(app.store(), admin, string_option(command, "model_id")).await
        }
        "toggle_user_model_selection" => toggle_selection_reply(app.settings(), admin),
        "clear_context" => clear_context_reply(app.store(), &user),
        _ => "Unknown command.".to_string(),
    };

    if let Err(e) = respond(ctx, command, &reply).await {
        warn!(command = %command.data.name, error = %e, "slash command error");
    }
}

/// `/list_models [page]` defers first since the catalogue fetch can be slow.
async fn handle_list_models(
    app: &Arc<DiscordContext>,
    ctx: &Context,
    command: &CommandInteraction,
) -> Result<(), serenity::Error> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
        )
        .await?;

    let page = command
        .data
        .options
        .iter()
        .find(|o| o.name == "page")
        .and_then(|o| o.value.as_i64());
    let text = list_models_reply(app.backend(), page).await;

    command
        .edit_response(&ctx.http, EditInteractionResponse::new().content(text))
        .await?;
    Ok(())
}

pub async fn set_channel_reply(settings: &RelaySettings, admin: bool, arg: &str) -> String {
    if !admin {
        return "You don't have permission to set the channel.".to_string();
    }
    match parse_channel_arg(arg) {
        Ok(None) => {
            settings.set_channel(None).await;
            info!("responding in all channels");
            "Bot will now respond to messages in all channels.".to_string()
        }
        Ok(Some(id)) => {
            settings.set_channel(Some(id)).await;
            info!(channel = id, "responding in one channel only");
            format!("Bot will now respond to messages in channel ID: {id}")
        }
        Err(_) => "Invalid channel ID. Please provide a valid channel ID or 'all'.".to_string(),
    }
}

pub async fn list_models_reply(backend: &dyn CompletionBackend, page: Option<i64>) -> String {
    match backend.list_models().await {
        ModelListResult::Success { models } => {
            let pages = model_pages(&models);
            select_page(&pages, page).to_string()
        }
        ModelListResult::Failure(f) => {
            warn!(code = f.code, message = %f.message, "model listing failed");
            MODELS_UNAVAILABLE.to_string()
        }
    }
}

pub fn set_model_reply(
    store: &ContextStore,
    settings: &RelaySettings,
    user: &UserKey,
    admin: bool,
    model_id: &str,
) -> String {
    if !settings.may_set_model(admin) {
        return "You don't have permission to set the model.".to_string();
    }
    let model_id = model_id.trim();
    if model_id.is_empty() {
        return "Please provide a model ID.".to_string();
    }
    store.set_model(user, model_id);
    format!("Model set to: {model_id}")
}

pub async fn set_default_model_reply(store: &ContextStore, admin: bool, model_id: &str) -> String {
    if !admin {
        return "You don't have permission to set the default model.".to_string();
    }
    let model_id = model_id.trim();
    if model_id.is_empty() {
        return "Please provide a model ID.".to_string();
    }
    let previous = store.set_default_model(model_id.to_string()).await;
    info!(%previous, new = %model_id, "default model switched");
    format!("Default model set to: {model_id}")
}

pub fn toggle_selection_reply(settings: &RelaySettings, admin: bool) -> String {
    if !admin {
        return "You don't have permission to toggle user model selection.".to_string();
    }
    let status = if settings.toggle_user_model_selection() {
        "enabled"
    } else {
        "disabled"
    };
    format!("User model selection {status}.")
}

pub fn clear_context_reply(store: &ContextStore, user: &UserKey) -> String {
    store.clear(user);
    "Conversation context cleared.".to_string()
}

fn is_admin(command: &CommandInteraction) -> bool {
    command
        .member
        .as_ref()
        .and_then(|m| m.permissions)
        .is_some_and(|p| p.administrator())
}

fn string_option<'a>(command: &'a CommandInteraction, name: &str) -> &'a str {
    command
        .data
        .options
        .iter()
        .find(|o| o.name == name)
        .and_then(|o| o.value.as_str())
        .unwrap_or("")
}

async fn respond(
    ctx: &Context,
    command: &CommandInteraction,
    content: &str,
) -> Result<(), serenity::Error> {
    command
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new().content(content),
            ),
        )
        .await
}
