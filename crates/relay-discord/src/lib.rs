pub mod adapter;
pub mod commands;
pub mod context;
pub mod error;
pub mod handler;
pub mod models;
pub mod send;
pub mod settings;

pub use adapter::DiscordAdapter;
pub use context::DiscordContext;
pub use error::DiscordError;
pub use settings::RelaySettings;
