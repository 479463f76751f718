pub mod config;
pub mod error;
pub mod types;

pub use error::RelayError;
pub use types::{InboundMessage, Role, Turn, UserKey};
