use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use relay_channels::{split, DispatchSequencer, Outbound};
use relay_context::ContextStore;
use relay_core::InboundMessage;

use crate::provider::{CompletionBackend, CompletionResult, Failure};

/// Shown when a reply was produced but could not be delivered.
pub const GENERIC_FAILURE: &str =
    "An error occurred while processing your request. Please try again later.";

/// Where a turn is in its lifecycle. Logged at debug level as it advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Received,
    HistoryLoaded,
    ModelResolved,
    Completing,
    Committed,
    Failed,
    Dispatched,
}

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The reply was committed to history and every chunk was sent.
    Dispatched { messages: usize },
    /// The completion call failed; one error message was shown, history untouched.
    Failed { code: u16, message: String },
    /// The reply was committed but sending it failed part-way.
    DeliveryFailed { reason: String },
}

/// Orchestrates one turn: history → model → completion → commit → split → dispatch.
pub struct Pipeline {
    store: Arc<ContextStore>,
    backend: Arc<dyn CompletionBackend>,
    sequencer: DispatchSequencer,
    chunk_max: usize,
}

impl Pipeline {
    pub fn new(
        store: Arc<ContextStore>,
        backend: Arc<dyn CompletionBackend>,
        sequencer: DispatchSequencer,
        chunk_max: usize,
    ) -> Self {
        Self {
            store,
            backend,
            sequencer,
            chunk_max,
        }
    }

    pub fn store(&self) -> &ContextStore {
        &self.store
    }

    pub fn backend(&self) -> &dyn CompletionBackend {
        &*self.backend
    }

    /// Run one turn for `msg`, replying through `out`.
    ///
    /// Never panics on service or delivery failure: every path ends in exactly
    /// one [`TurnOutcome`] and at most one error message to the user.
    #[instrument(skip_all, fields(user = %msg.user, channel = %msg.channel))]
    pub async fn handle(&self, msg: &InboundMessage, out: &dyn Outbound) -> TurnOutcome {
        let key = &msg.user;
        enter(TurnState::Received);

        let result = {
            // Held until the pair is committed so a second message from the
            // same user sees this turn in its history.
            let _turn = self.store.lock_turn(key).await;

            let history = self.store.history(key);
            enter(TurnState::HistoryLoaded);

            let model = self.store.model(key).await;
            enter(TurnState::ModelResolved);

            enter(TurnState::Completing);
            debug!(model = %model, turns = history.len(), backend = self.backend.name(), "requesting completion");

            let result = {
                let _typing = out.typing();
                self.backend.complete(&history, &msg.text, &model).await
            };
            if let CompletionResult::Success { reply } = &result {
                self.store.append(key, &msg.text, reply);
                enter(TurnState::Committed);
            }
            result
        };

        match result {
            CompletionResult::Success { reply } => self.dispatch(&reply, out).await,
            CompletionResult::Failure(failure) => {
                enter(TurnState::Failed);
                self.report_failure(failure, out).await
            }
        }
    }

    async fn dispatch(&self, reply: &str, out: &dyn Outbound) -> TurnOutcome {
        let chunks = split(reply, self.chunk_max);

        match self.sequencer.deliver(&chunks, out).await {
            Ok(messages) => {
                enter(TurnState::Dispatched);
                info!(chunks = chunks.len(), messages, "reply delivered");
                TurnOutcome::Dispatched { messages }
            }
            Err(e) => {
                warn!(error = %e, "reply delivery failed");
                if let Err(e) = out.send(GENERIC_FAILURE).await {
                    warn!(error = %e, "could not report delivery failure");
                }
                TurnOutcome::DeliveryFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn report_failure(&self, failure: Failure, out: &dyn Outbound) -> TurnOutcome {
        warn!(code = failure.code, message = %failure.message, "completion failed, history left unchanged");
        if let Err(e) = out.send(&failure.user_message()).await {
            warn!(error = %e, "could not deliver error message");
        }
        TurnOutcome::Failed {
            code: failure.code,
            message: failure.message,
        }
    }
}

fn enter(state: TurnState) {
    debug!(state = ?state, "turn state");
}
