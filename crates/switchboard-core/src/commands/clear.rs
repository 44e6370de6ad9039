use async_trait::async_trait;

use super::{Command, CommandArgument};
use crate::error::Result;
use crate::session::SessionContext;
use crate::session::input::ask_yes_no;
use crate::stream::MessageStyle;

/// Wipes the engine's conversation, after confirmation unless
/// `confirm_clear` is off.
pub struct ClearCommand;

#[async_trait]
impl Command for ClearCommand {
    fn name(&self) -> &'static str {
        "clear"
    }

    fn arguments(&self) -> Vec<CommandArgument> {
        Vec::new()
    }

    fn help_message(&self) -> &'static str {
        "Clear the current conversation"
    }

    async fn apply(&self, ctx: &SessionContext, _args: &[String]) -> Result<()> {
        if ctx.config().confirm_clear {
            ctx.stream.send("Clear the conversation? (Y/n)");
            if !ask_yes_no(ctx, true).await? {
                ctx.stream.send_styled("Conversation kept", MessageStyle::Info);
                return Ok(());
            }
        }

        ctx.engine.clear().await;
        ctx.stream
            .send_styled("Conversation cleared", MessageStyle::Success);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::stream::channels;
    use crate::test_utils::{RecordingEngine, TestHarness, answer_next_input, next_output};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_clear_asks_before_clearing() {
        let engine = Arc::new(RecordingEngine::new());
        let harness = TestHarness::new()
            .with_engine(engine.clone())
            .start()
            .unwrap();
        let stream = harness.ctx.stream.clone();
        let mut requests = stream.listen(channels::INPUT_REQUEST);
        let mut output = stream.listen(channels::DEFAULT);

        let clear = {
            let ctx = harness.ctx.clone();
            tokio::spawn(async move { ClearCommand.apply(&ctx, &[]).await })
        };
        assert_eq!(
            next_output(&mut output).await.unwrap().text(),
            Some("Clear the conversation? (Y/n)")
        );
        answer_next_input(&stream, &mut requests, "y").await.unwrap();
        clear.await.unwrap().unwrap();

        let message = next_output(&mut output).await.unwrap();
        assert_eq!(message.text(), Some("Conversation cleared"));
        assert_eq!(message.style(), Some(MessageStyle::Success));
        assert_eq!(engine.clears(), 1);
    }

    #[tokio::test]
    async fn test_clear_declined_keeps_conversation() {
        let engine = Arc::new(RecordingEngine::new());
        let harness = TestHarness::new()
            .with_engine(engine.clone())
            .start()
            .unwrap();
        let stream = harness.ctx.stream.clone();
        let mut requests = stream.listen(channels::INPUT_REQUEST);

        let clear = {
            let ctx = harness.ctx.clone();
            tokio::spawn(async move { ClearCommand.apply(&ctx, &[]).await })
        };
        answer_next_input(&stream, &mut requests, "n").await.unwrap();
        clear.await.unwrap().unwrap();

        assert_eq!(engine.clears(), 0);
    }

    #[tokio::test]
    async fn test_clear_without_confirmation() {
        let engine = Arc::new(RecordingEngine::new());
        let config = SessionConfig {
            confirm_clear: false,
            ..SessionConfig::default()
        };
        let harness = TestHarness::new()
            .with_engine(engine.clone())
            .with_config(config)
            .start()
            .unwrap();
        let mut output = harness.ctx.stream.listen(channels::DEFAULT);

        ClearCommand.apply(&harness.ctx, &[]).await.unwrap();

        assert_eq!(
            next_output(&mut output).await.unwrap().text(),
            Some("Conversation cleared")
        );
        assert_eq!(engine.clears(), 1);
    }
}
