//! Helpers that ask the front end for a line of input over the stream.

use serde_json::Value;
use tracing::debug;

use crate::commands::COMMAND_SIGIL;
use crate::error::{Error, Result};
use crate::session::SessionContext;
use crate::stream::{MessageStyle, Outgoing, channels};
use crate::tokenizer;

/// Requests one line of input and waits for the reply.
///
/// `plain` tells the front end that commands are not accepted here, so it
/// should not offer completions. A reply matching one of the configured exit
/// words yields [`Error::SessionExit`].
pub async fn collect_user_input(ctx: &SessionContext, plain: bool) -> Result<String> {
    let request = ctx.stream.send_message(
        Outgoing::new(Value::Null)
            .channel(channels::INPUT_REQUEST)
            .extra("plain", plain),
    );
    let reply = ctx.stream.recv(&request.reply_channel()).await?;
    let line = reply.text().unwrap_or_default().to_string();

    if ctx.config().is_exit_word(&line) {
        debug!(input = %line, "Exit word received");
        return Err(Error::SessionExit);
    }
    Ok(line)
}

/// Asks until the answer is yes, no, or empty, which picks `default_yes`.
pub async fn ask_yes_no(ctx: &SessionContext, default_yes: bool) -> Result<bool> {
    loop {
        let answer = collect_user_input(ctx, true).await?;
        match answer.trim().to_lowercase().as_str() {
            "" => return Ok(default_yes),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => {
                ctx.stream
                    .send_styled("Please answer y or n", MessageStyle::Warning);
            }
        }
    }
}

/// Collects input, running every line that starts with the command sigil,
/// until a line that is not a command arrives. That line is returned.
pub async fn collect_input_with_commands(ctx: &SessionContext) -> Result<String> {
    loop {
        let line = collect_user_input(ctx, false).await?;
        let Some(command_line) = line.trim_start().strip_prefix(COMMAND_SIGIL) else {
            return Ok(line);
        };

        let tokens = match tokenizer::split(command_line) {
            Ok(tokens) => tokens,
            Err(e) => {
                debug!("{e}");
                ctx.stream
                    .send_styled("Invalid command syntax", MessageStyle::Error);
                continue;
            }
        };

        let (name, args) = tokens.split_first().map_or(("", &[][..]), |(name, args)| {
            (name.as_str(), args)
        });
        match ctx.commands.resolve(name).apply(ctx, args).await {
            Ok(()) => {}
            Err(e @ (Error::SessionExit | Error::SubscriptionClosed)) => return Err(e),
            Err(e) => {
                ctx.stream.send_styled(e.to_string(), MessageStyle::Error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{TestHarness, answer_next_input, next_output};

    #[tokio::test]
    async fn test_collect_user_input_returns_reply() {
        let harness = TestHarness::new().start().unwrap();
        let stream = harness.ctx.stream.clone();
        let mut requests = stream.listen(channels::INPUT_REQUEST);

        let collector = {
            let ctx = harness.ctx.clone();
            tokio::spawn(async move { collect_user_input(&ctx, true).await })
        };
        let request = answer_next_input(&stream, &mut requests, "some text")
            .await
            .unwrap();

        assert_eq!(request.extra.get("plain"), Some(&Value::Bool(true)));
        assert_eq!(collector.await.unwrap().unwrap(), "some text");
    }

    #[tokio::test]
    async fn test_exit_word_raises_session_exit() {
        let harness = TestHarness::new().start().unwrap();
        let stream = harness.ctx.stream.clone();
        let mut requests = stream.listen(channels::INPUT_REQUEST);

        let collector = {
            let ctx = harness.ctx.clone();
            tokio::spawn(async move { collect_user_input(&ctx, false).await })
        };
        answer_next_input(&stream, &mut requests, "q").await.unwrap();

        assert!(matches!(collector.await.unwrap(), Err(Error::SessionExit)));
    }

    #[tokio::test]
    async fn test_ask_yes_no_repeats_until_understood() {
        let harness = TestHarness::new().start().unwrap();
        let stream = harness.ctx.stream.clone();
        let mut requests = stream.listen(channels::INPUT_REQUEST);
        let mut output = stream.listen(channels::DEFAULT);

        let asker = {
            let ctx = harness.ctx.clone();
            tokio::spawn(async move { ask_yes_no(&ctx, true).await })
        };
        answer_next_input(&stream, &mut requests, "perhaps").await.unwrap();
        assert_eq!(
            next_output(&mut output).await.unwrap().text(),
            Some("Please answer y or n")
        );
        answer_next_input(&stream, &mut requests, "No").await.unwrap();

        assert!(!asker.await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_ask_yes_no_empty_answer_takes_default() {
        let harness = TestHarness::new().start().unwrap();
        let stream = harness.ctx.stream.clone();
        let mut requests = stream.listen(channels::INPUT_REQUEST);

        let asker = {
            let ctx = harness.ctx.clone();
            tokio::spawn(async move { ask_yes_no(&ctx, false).await })
        };
        answer_next_input(&stream, &mut requests, "").await.unwrap();

        assert!(!asker.await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_commands_run_until_plain_message() {
        let harness = TestHarness::new().start().unwrap();
        let stream = harness.ctx.stream.clone();
        let mut requests = stream.listen(channels::INPUT_REQUEST);
        let mut output = stream.listen(channels::DEFAULT);

        let collector = {
            let ctx = harness.ctx.clone();
            tokio::spawn(async move { collect_input_with_commands(&ctx).await })
        };

        answer_next_input(&stream, &mut requests, "/config stream_delay_ms 7")
            .await
            .unwrap();
        assert_eq!(
            next_output(&mut output).await.unwrap().text(),
            Some("stream_delay_ms set to 7")
        );

        answer_next_input(&stream, &mut requests, "/help \"unclosed")
            .await
            .unwrap();
        let message = next_output(&mut output).await.unwrap();
        assert_eq!(message.text(), Some("Invalid command syntax"));
        assert_eq!(message.style(), Some(MessageStyle::Error));

        answer_next_input(&stream, &mut requests, "/nope").await.unwrap();
        let message = next_output(&mut output).await.unwrap();
        assert!(message.text().unwrap().starts_with("nope is not a valid command"));

        answer_next_input(&stream, &mut requests, "tell me more")
            .await
            .unwrap();
        assert_eq!(collector.await.unwrap().unwrap(), "tell me more");
        assert_eq!(harness.ctx.config().stream_delay_ms, 7);
    }

    #[tokio::test]
    async fn test_exit_word_inside_command_loop_propagates() {
        let harness = TestHarness::new().start().unwrap();
        let stream = harness.ctx.stream.clone();
        let mut requests = stream.listen(channels::INPUT_REQUEST);

        let collector = {
            let ctx = harness.ctx.clone();
            tokio::spawn(async move { collect_input_with_commands(&ctx).await })
        };
        answer_next_input(&stream, &mut requests, "quit").await.unwrap();

        assert!(matches!(collector.await.unwrap(), Err(Error::SessionExit)));
    }
}
