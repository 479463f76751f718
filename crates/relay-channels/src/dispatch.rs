//! Ordered, throttled delivery of reply chunks.
//!
//! The first chunk is sent as a reply to the inbound message; every later
//! chunk is a follow-up referencing that first message. Sends are strictly
//! sequential: each one is awaited before the next is issued.

use std::time::Duration;

use tracing::debug;

use relay_core::config::DeliveryConfig;

use crate::channel::{MessageRef, Outbound};
use crate::error::ChannelError;
use crate::split::{char_len, hard_split};

#[derive(Debug, Clone)]
pub struct DispatchSequencer {
    /// Pause before every chunk after the first.
    chunk_delay: Duration,
    /// Platform per-message limit checked at send time.
    hard_limit: usize,
    /// Piece size used when a chunk has to be hard-split.
    burst_size: usize,
    /// Pause between pieces of a hard-split chunk.
    burst_delay: Duration,
}

impl DispatchSequencer {
    pub fn new(
        chunk_delay: Duration,
        hard_limit: usize,
        burst_size: usize,
        burst_delay: Duration,
    ) -> Self {
        Self {
            chunk_delay,
            hard_limit: hard_limit.max(1),
            burst_size: burst_size.clamp(1, hard_limit.max(1)),
            burst_delay,
        }
    }

    pub fn from_config(config: &DeliveryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.chunk_delay_ms),
            config.hard_limit,
            config.chunk_max,
            Duration::from_millis(config.burst_delay_ms),
        )
    }

    /// Send `chunks` in order through `out`. Returns the number of messages sent.
    ///
    /// Stops at the first failed send; nothing after it is attempted.
    pub async fn deliver(
        &self,
        chunks: &[String],
        out: &dyn Outbound,
    ) -> Result<usize, ChannelError> {
        let mut first: Option<MessageRef> = None;
        let mut sent = 0;

        for (i, chunk) in chunks.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.chunk_delay).await;
            }

            let pieces = if char_len(chunk) > self.hard_limit {
                let pieces = hard_split(chunk, self.burst_size);
                debug!(
                    chunk = i,
                    pieces = pieces.len(),
                    "chunk over platform limit, sending as burst"
                );
                pieces
            } else {
                vec![chunk.clone()]
            };

            for (j, piece) in pieces.iter().enumerate() {
                if j > 0 {
                    tokio::time::sleep(self.burst_delay).await;
                }
                match &first {
                    None => first = Some(out.send(piece).await?),
                    Some(reference) => out.send_followup(reference, piece).await?,
                }
                sent += 1;
            }
        }

        debug!(chunks = chunks.len(), sent, "dispatch complete");
        Ok(sent)
    }
}

impl Default for DispatchSequencer {
    fn default() -> Self {
        Self::from_config(&DeliveryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Reply(String),
        Followup { to: String, text: String },
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Sent>>,
        fail_on: Option<usize>,
    }

    impl Recorder {
        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn check_failure(&self) -> Result<(), ChannelError> {
            let count = self.sent.lock().unwrap().len();
            if self.fail_on == Some(count) {
                return Err(ChannelError::SendFailed("boom".to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Outbound for Recorder {
        async fn send(&self, text: &str) -> Result<MessageRef, ChannelError> {
            self.check_failure()?;
            self.sent.lock().unwrap().push(Sent::Reply(text.to_string()));
            Ok(MessageRef::from(77))
        }

        async fn send_followup(&self, first: &MessageRef, text: &str) -> Result<(), ChannelError> {
            self.check_failure()?;
            self.sent.lock().unwrap().push(Sent::Followup {
                to: first.as_str().to_string(),
                text: text.to_string(),
            });
            Ok(())
        }
    }

    fn chunks(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn first_chunk_replies_and_rest_thread_under_it() {
        let out = Recorder::default();
        let sequencer = DispatchSequencer::default();

        let start = Instant::now();
        let sent = sequencer
            .deliver(&chunks(&["one", "two", "three"]), &out)
            .await
            .unwrap();

        assert_eq!(sent, 3);
        assert_eq!(
            out.sent(),
            vec![
                Sent::Reply("one".into()),
                Sent::Followup { to: "77".into(), text: "two".into() },
                Sent::Followup { to: "77".into(), text: "three".into() },
            ]
        );
        // One pause before each follow-up.
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_chunk_is_sent_as_tighter_burst() {
        let out = Recorder::default();
        let sequencer = DispatchSequencer::new(
            Duration::from_millis(1000),
            10,
            4,
            Duration::from_millis(500),
        );

        let start = Instant::now();
        let sent = sequencer
            .deliver(&chunks(&["head", "abcdefghijkl"]), &out)
            .await
            .unwrap();

        assert_eq!(sent, 4);
        let texts: Vec<String> = out
            .sent()
            .into_iter()
            .map(|s| match s {
                Sent::Reply(t) => t,
                Sent::Followup { text, .. } => text,
            })
            .collect();
        assert_eq!(texts, vec!["head", "abcd", "efgh", "ijkl"]);
        assert_eq!(start.elapsed(), Duration::from_millis(1000 + 500 + 500));
    }

    #[tokio::test(start_paused = true)]
    async fn no_chunks_sends_nothing() {
        let out = Recorder::default();
        let sent = DispatchSequencer::default().deliver(&[], &out).await.unwrap();
        assert_eq!(sent, 0);
        assert!(out.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_stops_delivery() {
        let out = Recorder {
            fail_on: Some(1),
            ..Default::default()
        };
        let result = DispatchSequencer::default()
            .deliver(&chunks(&["one", "two", "three"]), &out)
            .await;

        assert!(matches!(result, Err(ChannelError::SendFailed(_))));
        assert_eq!(out.sent(), vec![Sent::Reply("one".into())]);
    }
}
