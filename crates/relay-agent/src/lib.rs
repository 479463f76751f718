pub mod openrouter;
pub mod pipeline;
pub mod provider;

pub use openrouter::OpenRouterClient;
pub use pipeline::{Pipeline, TurnOutcome};
pub use provider::{CompletionBackend, CompletionResult, Failure, ModelInfo, ModelListResult};
