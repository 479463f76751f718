use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-lite-preview-02-05:free";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_COMPLETION_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MODELS_TIMEOUT_SECS: u64 = 30;
/// Discord allows 2000 characters per message; chunks target 1900 to leave headroom.
pub const DEFAULT_CHUNK_MAX: usize = 1900;
pub const DEFAULT_HARD_LIMIT: usize = 2000;
pub const DEFAULT_CHUNK_DELAY_MS: u64 = 1000;
pub const DEFAULT_BURST_DELAY_MS: u64 = 500;

/// Top-level config (relay.toml + RELAY_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub channels: ChannelsConfig,
}

/// Remote completion service (OpenRouter-compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used when a user has no override. Mutable at runtime via `/set_default_model`.
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
    /// Model listing carries no generation cost, so it gets a shorter budget.
    #[serde(default = "default_models_timeout")]
    pub models_timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            default_model: default_model(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout_secs: DEFAULT_COMPLETION_TIMEOUT_SECS,
            models_timeout_secs: DEFAULT_MODELS_TIMEOUT_SECS,
        }
    }
}

/// Outbound chunking and pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Target size of each chunk produced by the splitter.
    #[serde(default = "default_chunk_max")]
    pub chunk_max: usize,
    /// Platform per-message limit; anything larger is hard-split at send time.
    #[serde(default = "default_hard_limit")]
    pub hard_limit: usize,
    /// Pause between consecutive chunks.
    #[serde(default = "default_chunk_delay")]
    pub chunk_delay_ms: u64,
    /// Pause between pieces of a hard-split burst.
    #[serde(default = "default_burst_delay")]
    pub burst_delay_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            chunk_max: DEFAULT_CHUNK_MAX,
            hard_limit: DEFAULT_HARD_LIMIT,
            chunk_delay_ms: DEFAULT_CHUNK_DELAY_MS,
            burst_delay_ms: DEFAULT_BURST_DELAY_MS,
        }
    }
}

/// Conversation history retention.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Keep only the most recent N user/assistant pairs per user.
    /// Unset means unbounded.
    #[serde(default)]
    pub max_turn_pairs: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChannelsConfig {
    pub discord: Option<DiscordConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub bot_token: String,
    /// Only respond in this channel. Unset means every channel the bot can read.
    #[serde(default)]
    pub channel_id: Option<u64>,
    /// When true, non-administrators may pick their own model with `/set_model`.
    #[serde(default)]
    pub allow_user_model_selection: bool,
    /// Register slash commands on ready.
    #[serde(default = "bool_true")]
    pub slash_commands: bool,
}

fn bool_true() -> bool {
    true
}
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}
fn default_completion_timeout() -> u64 {
    DEFAULT_COMPLETION_TIMEOUT_SECS
}
fn default_models_timeout() -> u64 {
    DEFAULT_MODELS_TIMEOUT_SECS
}
fn default_chunk_max() -> usize {
    DEFAULT_CHUNK_MAX
}
fn default_hard_limit() -> usize {
    DEFAULT_HARD_LIMIT
}
fn default_chunk_delay() -> u64 {
    DEFAULT_CHUNK_DELAY_MS
}
fn default_burst_delay() -> u64 {
    DEFAULT_BURST_DELAY_MS
}

impl RelayConfig {
    /// Load config from a TOML file with RELAY_* env var overrides.
    ///
    /// Nested keys are separated by a double underscore, e.g.
    /// `RELAY_COMPLETION__API_KEY` or `RELAY_CHANNELS__DISCORD__BOT_TOKEN`.
    /// A missing file is not an error; env vars alone are enough.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: RelayConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("RELAY_").split("__"))
            .extract()
            .map_err(|e| crate::error::RelayError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Reject configs that cannot possibly work.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.completion.api_key.trim().is_empty() {
            return Err(crate::error::RelayError::Config(
                "completion.api_key is not set".to_string(),
            ));
        }
        if self.delivery.chunk_max == 0 || self.delivery.chunk_max > self.delivery.hard_limit {
            return Err(crate::error::RelayError::Config(format!(
                "delivery.chunk_max must be between 1 and hard_limit ({})",
                self.delivery.hard_limit
            )));
        }
        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.relay/relay.toml", home)
}
