pub mod bound;
pub mod store;

pub use bound::{HistoryBound, SlidingWindow, Unbounded};
pub use store::{ContextStore, TurnGuard};
