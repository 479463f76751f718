pub mod channel;
pub mod dispatch;
pub mod error;
pub mod split;

pub use channel::{MessageRef, Outbound, TypingGuard};
pub use dispatch::DispatchSequencer;
pub use error::ChannelError;
pub use split::{hard_split, split};
