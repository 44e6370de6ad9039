//! Test helpers shared by unit tests and the integration tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::bus::{BusError, Subscription};
use crate::commands::CommandRegistry;
use crate::config::SessionConfig;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::session::SessionContext;
use crate::stream::{MessageSource, Outgoing, SessionStream, StreamMessage};

/// How long helpers wait for a message before giving up.
pub const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);

/// A session context over a fresh stream, with no front end attached.
pub struct TestHarness {
    pub ctx: SessionContext,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    /// Built-in commands, an [`RecordingEngine`] and no streaming delay.
    pub fn new() -> Self {
        Self::with_registry(CommandRegistry::with_builtins())
    }

    pub fn with_registry(registry: CommandRegistry) -> Self {
        let config = SessionConfig {
            stream_delay_ms: 0,
            ..SessionConfig::default()
        };
        Self {
            ctx: SessionContext::new(
                SessionStream::new(),
                Arc::new(registry),
                config,
                Arc::new(RecordingEngine::new()),
            ),
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn Engine>) -> Self {
        self.ctx.engine = engine;
        self
    }

    pub fn with_config(self, config: SessionConfig) -> Self {
        *self.ctx.config.write() = config;
        self
    }

    /// Connects the stream. Needs a tokio runtime.
    pub fn start(self) -> std::result::Result<Self, BusError> {
        self.ctx.stream.start()?;
        Ok(self)
    }
}

/// Next message on `subscription`, or `None` on timeout or close.
pub async fn next_output(subscription: &mut Subscription<StreamMessage>) -> Option<StreamMessage> {
    match tokio::time::timeout(RECEIVE_TIMEOUT, subscription.get()).await {
        Ok(Ok(event)) => Some(event.payload().clone()),
        _ => None,
    }
}

/// Plays the front end for one input request: waits for it on `requests` and
/// replies with `answer`. Returns the request that was answered.
pub async fn answer_next_input(
    stream: &SessionStream,
    requests: &mut Subscription<StreamMessage>,
    answer: &str,
) -> Option<StreamMessage> {
    let request = next_output(requests).await?;
    stream.reply_to(
        &request,
        Outgoing::new(answer).source(MessageSource::Client),
    );
    Some(request)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behavior {
    Reply,
    Fail(&'static str),
    Stall,
}

/// Engine that records what it is asked and answers `heard: <prompt>`.
#[derive(Debug)]
pub struct RecordingEngine {
    behavior: Behavior,
    prompts: Mutex<Vec<String>>,
    clears: Mutex<usize>,
}

impl Default for RecordingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self {
            behavior: Behavior::Reply,
            prompts: Mutex::new(Vec::new()),
            clears: Mutex::new(0),
        }
    }

    /// Every response fails with [`Error::Engine`].
    pub fn failing(mut self, message: &'static str) -> Self {
        self.behavior = Behavior::Fail(message);
        self
    }

    /// Every response waits forever, until it is interrupted.
    pub fn stalling(mut self) -> Self {
        self.behavior = Behavior::Stall;
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    pub fn clears(&self) -> usize {
        *self.clears.lock()
    }
}

#[async_trait]
impl Engine for RecordingEngine {
    async fn respond(&self, ctx: &SessionContext, prompt: &str) -> Result<()> {
        self.prompts.lock().push(prompt.to_string());
        match self.behavior {
            Behavior::Reply => {
                ctx.stream.send(format!("heard: {prompt}"));
                Ok(())
            }
            Behavior::Fail(message) => Err(Error::Engine(message.to_string())),
            Behavior::Stall => {
                ctx.stream.send("thinking");
                std::future::pending().await
            }
        }
    }

    async fn clear(&self) {
        *self.clears.lock() += 1;
    }
}
