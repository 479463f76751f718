//! Retention policies applied to a user's history after every append.
//!
//! History is unbounded unless a bound is installed. The store calls
//! [`HistoryBound::trim`] while it still holds the write lock for the key,
//! so a bound always sees and leaves whole user/assistant pairs.

use relay_core::Turn;

pub trait HistoryBound: Send + Sync {
    /// Drop turns from the front of `turns` until the policy is satisfied.
    ///
    /// Implementations must remove an even number of turns so pairs stay intact.
    fn trim(&self, turns: &mut Vec<Turn>);
}

/// Keep everything. Matches the historical behaviour of the bot.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl HistoryBound for Unbounded {
    fn trim(&self, _turns: &mut Vec<Turn>) {}
}

/// Keep only the most recent `max_pairs` user/assistant pairs.
#[derive(Debug, Clone, Copy)]
pub struct SlidingWindow {
    pub max_pairs: usize,
}

impl SlidingWindow {
    pub fn new(max_pairs: usize) -> Self {
        Self { max_pairs }
    }
}

impl HistoryBound for SlidingWindow {
    fn trim(&self, turns: &mut Vec<Turn>) {
        let keep = self.max_pairs.saturating_mul(2);
        if turns.len() > keep {
            let excess = turns.len() - keep;
            // round up to a whole pair
            let excess = excess + excess % 2;
            turns.drain(..excess.min(turns.len()));
        }
    }
}
