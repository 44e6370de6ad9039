//! The seam between a session and whatever produces responses.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::session::SessionContext;
use crate::stream::Outgoing;

/// Produces the response to a prompt by streaming messages through the
/// context's stream.
///
/// `respond` may be dropped at any await point when the user interrupts it.
#[async_trait]
pub trait Engine: Send + Sync {
    async fn respond(&self, ctx: &SessionContext, prompt: &str) -> Result<()>;

    /// Forgets the conversation so far.
    async fn clear(&self);
}

/// Streams each prompt back word by word.
#[derive(Debug, Default)]
pub struct EchoEngine {
    history: Mutex<Vec<String>>,
}

impl EchoEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prompts answered since the last clear.
    pub fn history(&self) -> Vec<String> {
        self.history.lock().clone()
    }
}

#[async_trait]
impl Engine for EchoEngine {
    async fn respond(&self, ctx: &SessionContext, prompt: &str) -> Result<()> {
        let delay = Duration::from_millis(ctx.config().stream_delay_ms);
        let words: Vec<&str> = prompt.split_whitespace().collect();
        debug!(words = words.len(), "Echoing prompt");

        for (index, word) in words.iter().enumerate() {
            let chunk = Outgoing::new(*word);
            let chunk = if index + 1 < words.len() {
                chunk.end(" ")
            } else {
                chunk
            };
            ctx.stream.send_message(chunk);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        self.history.lock().push(prompt.to_string());
        Ok(())
    }

    async fn clear(&self) {
        self.history.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::interrupt::run_until_interrupt;
    use crate::stream::{MessageSource, channels};
    use crate::test_utils::{TestHarness, next_output};
    use serde_json::Value;

    #[tokio::test]
    async fn test_echo_streams_words_with_separators() {
        let harness = TestHarness::new().start().unwrap();
        let mut output = harness.ctx.stream.listen(channels::DEFAULT);
        let engine = EchoEngine::new();

        engine.respond(&harness.ctx, "one  two three").await.unwrap();

        let mut chunks = Vec::new();
        for _ in 0..3 {
            chunks.push(next_output(&mut output).await.unwrap());
        }
        let texts: Vec<&str> = chunks.iter().filter_map(|m| m.text()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert_eq!(chunks[0].extra.get("end"), Some(&Value::from(" ")));
        assert_eq!(chunks[2].extra.get("end"), None);
        assert_eq!(engine.history(), vec!["one  two three"]);

        engine.clear().await;
        assert!(engine.history().is_empty());
    }

    #[tokio::test]
    async fn test_echo_can_be_interrupted_mid_stream() {
        let harness = TestHarness::new().start().unwrap();
        harness.ctx.config.write().stream_delay_ms = 1_000;
        let engine = EchoEngine::new();

        let interrupter = {
            let stream = harness.ctx.stream.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                stream.interrupt(MessageSource::Client);
            })
        };

        let result = run_until_interrupt(
            &harness.ctx.stream,
            engine.respond(&harness.ctx, "a b c"),
        )
        .await;
        interrupter.await.unwrap();

        assert!(matches!(result, Err(Error::Interrupted)));
        assert!(engine.history().is_empty());
    }
}
