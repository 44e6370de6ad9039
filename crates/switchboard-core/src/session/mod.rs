//! A session: the loop that collects input, dispatches commands and hands
//! prompts to the engine, with everything it needs carried in a
//! [`SessionContext`].

pub mod input;

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::commands::CommandRegistry;
use crate::config::SessionConfig;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::interrupt::run_until_interrupt;
use crate::stream::{MessageStyle, Outgoing, SessionStream, channels};

/// Handle threaded through every command and input helper.
#[derive(Clone)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub stream: SessionStream,
    pub commands: Arc<CommandRegistry>,
    pub config: Arc<RwLock<SessionConfig>>,
    pub engine: Arc<dyn Engine>,
}

impl SessionContext {
    pub fn new(
        stream: SessionStream,
        commands: Arc<CommandRegistry>,
        config: SessionConfig,
        engine: Arc<dyn Engine>,
    ) -> Self {
        Self {
            session_id: Uuid::now_v7(),
            stream,
            commands,
            config: Arc::new(RwLock::new(config)),
            engine,
        }
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> SessionConfig {
        self.config.read().clone()
    }
}

pub struct Session {
    ctx: SessionContext,
}

impl Session {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Runs the session until an exit word is entered or the stream closes.
    ///
    /// The stream is started here and stopped before returning, after a
    /// message on the session exit channel has been flushed to listeners.
    #[tracing::instrument(skip(self), fields(session_id = %self.ctx.session_id))]
    pub async fn run(self) -> Result<()> {
        let ctx = self.ctx;
        ctx.stream.start()?;
        info!("Session started");

        let responder = spawn_completion_responder(ctx.clone());
        let outcome = run_loop(&ctx).await;

        responder.abort();
        if let Err(e) = responder.await {
            if !e.is_cancelled() {
                warn!("Completion responder failed: {e}");
            }
        }

        ctx.stream
            .send_message(Outgoing::new(Value::Null).channel(channels::SESSION_EXIT));
        ctx.stream.stop().await?;
        info!("Session ended");
        outcome
    }
}

async fn run_loop(ctx: &SessionContext) -> Result<()> {
    loop {
        let prompt = match input::collect_input_with_commands(ctx).await {
            Ok(prompt) => prompt,
            Err(Error::SessionExit | Error::SubscriptionClosed) => return Ok(()),
            Err(e) => return Err(e),
        };
        if prompt.trim().is_empty() {
            continue;
        }

        match run_until_interrupt(&ctx.stream, ctx.engine.respond(ctx, &prompt)).await {
            Ok(Ok(())) => {}
            Ok(Err(Error::SessionExit | Error::SubscriptionClosed)) => return Ok(()),
            Ok(Err(e)) => {
                warn!("Engine failed: {e}");
                ctx.stream.send_styled(e.to_string(), MessageStyle::Error);
            }
            Err(Error::Interrupted) => {
                debug!("Engine response interrupted");
                ctx.stream.send_styled("Interrupted", MessageStyle::Warning);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Answers every completion request with the matching [`Completion`] list on
/// the request's reply channel.
///
/// [`Completion`]: crate::tokenizer::Completion
fn spawn_completion_responder(ctx: SessionContext) -> JoinHandle<()> {
    let mut requests = ctx.stream.listen(channels::COMPLETION_REQUEST);
    tokio::spawn(async move {
        while let Ok(event) = requests.get().await {
            let request = event.payload();
            let line = request.text().unwrap_or_default();
            let completions = ctx
                .commands
                .completions(&ctx, line)
                .unwrap_or_else(|e| {
                    debug!("No completions for {line:?}: {e}");
                    Vec::new()
                });
            match serde_json::to_value(&completions) {
                Ok(data) => {
                    ctx.stream.reply_to(request, Outgoing::new(data));
                }
                Err(e) => warn!("Failed to encode completions: {e}"),
            }
        }
    })
}
