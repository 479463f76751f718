use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use tracing::{info, warn};

use relay_agent::{OpenRouterClient, Pipeline};
use relay_channels::DispatchSequencer;
use relay_context::{ContextStore, SlidingWindow};
use relay_core::config::RelayConfig;
use relay_discord::{DiscordAdapter, DiscordContext, RelaySettings};

/// Chat relay between Discord and an OpenRouter-compatible completion service.
#[derive(Debug, Parser)]
#[command(name = "relay-gateway", version)]
struct Args {
    /// Path to relay.toml. Falls back to RELAY_CONFIG, then ~/.relay/relay.toml.
    #[arg(long)]
    config: Option<String>,

    /// Load and validate the configuration, then exit.
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "relay_gateway=info,relay_agent=info,relay_discord=info".into()
            }),
        )
        .init();

    let args = Args::parse();

    // config: --config > RELAY_CONFIG env > ~/.relay/relay.toml
    let config_path = args.config.or_else(|| std::env::var("RELAY_CONFIG").ok());
    let config = RelayConfig::load(config_path.as_deref()).context("loading configuration")?;
    config.validate().context("validating configuration")?;

    if args.check_config {
        info!("configuration OK");
        return Ok(());
    }

    let store = Arc::new(build_store(&config));
    let backend = Arc::new(OpenRouterClient::from_config(&config.completion));
    info!(
        base_url = %config.completion.base_url,
        model = %config.completion.default_model,
        "completion backend ready"
    );

    let pipeline = Arc::new(Pipeline::new(
        store,
        backend,
        DispatchSequencer::from_config(&config.delivery),
        config.delivery.chunk_max,
    ));

    let Some(discord_cfg) = config.channels.discord.as_ref() else {
        warn!("no [channels.discord] section configured, nothing to relay");
        return Ok(());
    };

    let app = Arc::new(DiscordContext::new(
        pipeline,
        RelaySettings::from_config(discord_cfg),
    ));
    let adapter = DiscordAdapter::new(discord_cfg, app)?;
    info!("Discord bot starting");

    tokio::select! {
        _ = adapter.run() => {}
        _ = tokio::signal::ctrl_c() => info!("shutdown signal received"),
    }
    Ok(())
}

fn build_store(config: &RelayConfig) -> ContextStore {
    let default_model = config.completion.default_model.clone();
    match config.context.max_turn_pairs {
        Some(pairs) => {
            info!(pairs, "history bounded to a sliding window");
            ContextStore::with_bound(default_model, SlidingWindow::new(pairs))
        }
        None => ContextStore::new(default_model),
    }
}
