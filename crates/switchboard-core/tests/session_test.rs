//! Drives a complete session over the bus the way a front end would.

use std::sync::Arc;
use std::time::Duration;

use switchboard_core::bus::Subscription;
use switchboard_core::commands::CommandRegistry;
use switchboard_core::config::SessionConfig;
use switchboard_core::engine::EchoEngine;
use switchboard_core::session::{Session, SessionContext};
use switchboard_core::stream::{
    MessageSource, MessageStyle, Outgoing, SessionStream, StreamMessage, channels,
};
use switchboard_core::test_utils::{RecordingEngine, TestHarness, answer_next_input, next_output};
use switchboard_core::tokenizer::Completion;

struct FrontEnd {
    stream: SessionStream,
    requests: Subscription<StreamMessage>,
    output: Subscription<StreamMessage>,
    exits: Subscription<StreamMessage>,
}

impl FrontEnd {
    fn attach(stream: &SessionStream) -> Self {
        Self {
            stream: stream.clone(),
            requests: stream.listen(channels::INPUT_REQUEST),
            output: stream.listen(channels::DEFAULT),
            exits: stream.listen(channels::SESSION_EXIT),
        }
    }

    async fn answer(&mut self, line: &str) -> StreamMessage {
        answer_next_input(&self.stream, &mut self.requests, line)
            .await
            .unwrap()
    }

    async fn output(&mut self) -> StreamMessage {
        next_output(&mut self.output).await.unwrap()
    }

    async fn complete(&self, line: &str) -> Vec<Completion> {
        let request = self.stream.send_message(
            Outgoing::new(line)
                .channel(channels::COMPLETION_REQUEST)
                .source(MessageSource::Client),
        );
        let reply = tokio::time::timeout(
            Duration::from_secs(2),
            self.stream.recv(&request.reply_channel()),
        )
        .await
        .unwrap()
        .unwrap();
        serde_json::from_value(reply.data).unwrap()
    }
}

#[tokio::test]
async fn test_echo_session_end_to_end() {
    let stream = SessionStream::new();
    let config = SessionConfig {
        stream_delay_ms: 0,
        ..SessionConfig::default()
    };
    let engine = Arc::new(EchoEngine::new());
    let ctx = SessionContext::new(
        stream.clone(),
        Arc::new(CommandRegistry::with_builtins()),
        config,
        engine.clone(),
    );
    let mut front = FrontEnd::attach(&stream);
    let session = tokio::spawn(Session::new(ctx).run());

    let request = front.answer("hello bus").await;
    assert_eq!(request.source, MessageSource::Server);
    assert_eq!(front.output().await.text(), Some("hello"));
    assert_eq!(front.output().await.text(), Some("bus"));

    let completions = front.complete("/config st").await;
    let displays: Vec<&str> = completions.iter().map(|c| c.display.as_str()).collect();
    assert_eq!(displays, vec!["stream_delay_ms"]);
    assert_eq!(completions[0].position, -2);

    front.answer("/clear").await;
    assert_eq!(
        front.output().await.text(),
        Some("Clear the conversation? (Y/n)")
    );
    front.answer("").await;
    assert_eq!(front.output().await.text(), Some("Conversation cleared"));
    assert!(engine.history().is_empty());

    front.answer("q").await;
    assert!(next_output(&mut front.exits).await.is_some());
    session.await.unwrap().unwrap();

    // Listeners are closed once the session stops the stream.
    assert!(front.requests.get().await.is_err());
}

#[tokio::test]
async fn test_interrupt_cancels_response_and_session_continues() {
    let engine = Arc::new(RecordingEngine::new().stalling());
    let harness = TestHarness::new().with_engine(engine.clone());
    let stream = harness.ctx.stream.clone();
    let mut front = FrontEnd::attach(&stream);
    let session = tokio::spawn(Session::new(harness.ctx).run());

    front.answer("take your time").await;
    assert_eq!(front.output().await.text(), Some("thinking"));

    stream.interrupt(MessageSource::Client);
    let message = front.output().await;
    assert_eq!(message.text(), Some("Interrupted"));
    assert_eq!(message.style(), Some(MessageStyle::Warning));

    // Prompting resumes after the interrupt.
    front.answer("/help clear").await;
    assert!(front.output().await.text().unwrap().starts_with("/clear"));

    front.answer("quit").await;
    session.await.unwrap().unwrap();
    assert_eq!(engine.prompts(), vec!["take your time"]);
}

#[tokio::test]
async fn test_unknown_command_does_not_reach_engine() {
    let engine = Arc::new(RecordingEngine::new());
    let harness = TestHarness::new().with_engine(engine.clone());
    let stream = harness.ctx.stream.clone();
    let mut front = FrontEnd::attach(&stream);
    let session = tokio::spawn(Session::new(harness.ctx).run());

    front.answer("/frobnicate now").await;
    let message = front.output().await;
    assert_eq!(message.style(), Some(MessageStyle::Error));
    assert_eq!(
        message.text(),
        Some("frobnicate is not a valid command. Use /help to see a list of all valid commands")
    );

    front.answer("q").await;
    session.await.unwrap().unwrap();
    assert!(engine.prompts().is_empty());
}
