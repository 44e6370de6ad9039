//! Request/response correlation over the broadcast bus.
//!
//! Every message gets a fresh id. A reply to a message is published on the
//! message's reply channel, `"<channel>:<id>"`, so a requester can wait for
//! exactly one answer without seeing anybody else's traffic. A reply that
//! arrives before the requester subscribes is held by the bus and replayed
//! when it does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::{Display, EnumString};
use tracing::debug;
use uuid::Uuid;

use crate::bus::{Bus, BusError, Subscription, SubscriptionClosed};

/// Well-known channel names.
pub mod channels {
    /// Conversation output from the engine to front ends.
    pub const DEFAULT: &str = "default";
    /// The engine asks a front end for a line of input.
    pub const INPUT_REQUEST: &str = "input_request";
    /// A front end asks the engine to abandon the running operation.
    pub const INTERRUPT: &str = "interrupt";
    /// A front end asks for completions of a partially typed command.
    pub const COMPLETION_REQUEST: &str = "completion_request";
    /// The engine announces that the session ended.
    pub const SESSION_EXIT: &str = "session_exit";
}

/// Correlation channel for a reply to message `id` sent on `base`.
pub fn reply_channel(base: &str, id: Uuid) -> String {
    format!("{base}:{id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageSource {
    Server,
    Client,
}

/// Severity tag attached to user-visible messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MessageStyle {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMessage {
    pub id: Uuid,
    pub channel: String,
    pub source: MessageSource,
    pub data: Value,
    #[serde(default)]
    pub extra: Map<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl StreamMessage {
    /// Channel on which the reply to this message is expected.
    pub fn reply_channel(&self) -> String {
        reply_channel(&self.channel, self.id)
    }

    /// The payload as text, `None` when it is not a JSON string.
    pub fn text(&self) -> Option<&str> {
        self.data.as_str()
    }

    pub fn style(&self) -> Option<MessageStyle> {
        self.extra
            .get("style")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
    }
}

/// Builder for an outbound message.
#[derive(Debug, Clone)]
pub struct Outgoing {
    data: Value,
    channel: String,
    source: MessageSource,
    extra: Map<String, Value>,
}

impl Outgoing {
    pub fn new(data: impl Into<Value>) -> Self {
        Self {
            data: data.into(),
            channel: channels::DEFAULT.to_string(),
            source: MessageSource::Server,
            extra: Map::new(),
        }
    }

    pub fn channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    pub fn source(mut self, source: MessageSource) -> Self {
        self.source = source;
        self
    }

    pub fn extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn style(self, style: MessageStyle) -> Self {
        self.extra("style", style.to_string())
    }

    /// Terminator a front end should print after the text instead of a newline.
    pub fn end(self, end: impl Into<String>) -> Self {
        self.extra("end", end.into())
    }

    fn stamp(self) -> StreamMessage {
        StreamMessage {
            id: Uuid::new_v4(),
            channel: self.channel,
            source: self.source,
            data: self.data,
            extra: self.extra,
            created_at: Utc::now(),
        }
    }
}

/// Session-facing view of the bus.
#[derive(Clone, Default)]
pub struct SessionStream {
    bus: Bus<StreamMessage>,
}

impl SessionStream {
    pub fn new() -> Self {
        Self { bus: Bus::new() }
    }

    pub fn start(&self) -> Result<(), BusError> {
        self.bus.connect()
    }

    /// Flushes queued messages, then disconnects, closing every listener.
    pub async fn stop(&self) -> Result<(), BusError> {
        self.bus.join().await;
        self.bus.disconnect().await
    }

    /// Sends `data` on the default channel.
    pub fn send(&self, data: impl Into<Value>) -> StreamMessage {
        self.send_message(Outgoing::new(data))
    }

    pub fn send_styled(&self, text: impl Into<String>, style: MessageStyle) -> StreamMessage {
        self.send_message(Outgoing::new(text.into()).style(style))
    }

    /// Stamps and publishes a message, returning it so the caller can wait on
    /// its reply channel.
    pub fn send_message(&self, outgoing: Outgoing) -> StreamMessage {
        let message = outgoing.stamp();
        debug!(
            id = %message.id,
            channel = %message.channel,
            source = %message.source,
            "Sending stream message"
        );
        self.bus.publish(message.channel.clone(), message.clone());
        message
    }

    /// Publishes the answer to `request` on its reply channel.
    pub fn reply_to(&self, request: &StreamMessage, outgoing: Outgoing) -> StreamMessage {
        self.send_message(outgoing.channel(request.reply_channel()))
    }

    /// Asks whoever runs the current operation to abandon it.
    pub fn interrupt(&self, source: MessageSource) -> StreamMessage {
        self.send_message(
            Outgoing::new(Value::Null)
                .channel(channels::INTERRUPT)
                .source(source),
        )
    }

    /// Waits for exactly one message on `channel`.
    ///
    /// The subscription lives only for this call. Intended for correlation
    /// channels, which see a single reply.
    pub async fn recv(&self, channel: &str) -> Result<StreamMessage, SubscriptionClosed> {
        let mut subscription = self.bus.subscribe(channel);
        let event = subscription.get().await?;
        Ok(event.payload().clone())
    }

    /// Long-lived listener on `channel`.
    pub fn listen(&self, channel: &str) -> Subscription<StreamMessage> {
        self.bus.subscribe(channel)
    }

    pub fn bus(&self) -> &Bus<StreamMessage> {
        &self.bus
    }
}
