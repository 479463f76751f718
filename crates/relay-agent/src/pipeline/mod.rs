//! Channel-agnostic conversational turn processing.
//!
//! Channel adapters build an [`InboundMessage`](relay_core::InboundMessage)
//! and an [`Outbound`](relay_channels::Outbound) for the reply, then hand both
//! to [`Pipeline::handle`]. Everything between (history, model resolution,
//! the completion call, chunking, paced delivery) happens here, once.

pub mod process;

pub use process::{Pipeline, TurnOutcome, TurnState, GENERIC_FAILURE};
