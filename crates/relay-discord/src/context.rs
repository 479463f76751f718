//! Shared state handed to every Discord event: the turn pipeline plus the
//! admin-controlled settings.

use std::sync::Arc;

use relay_agent::{CompletionBackend, Pipeline};
use relay_context::ContextStore;

use crate::settings::RelaySettings;

pub struct DiscordContext {
    pipeline: Arc<Pipeline>,
    settings: RelaySettings,
}

impl DiscordContext {
    pub fn new(pipeline: Arc<Pipeline>, settings: RelaySettings) -> Self {
        Self { pipeline, settings }
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn store(&self) -> &ContextStore {
        self.pipeline.store()
    }

    pub fn backend(&self) -> &dyn CompletionBackend {
        self.pipeline.backend()
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }
}
