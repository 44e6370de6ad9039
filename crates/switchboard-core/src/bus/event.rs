use std::sync::Arc;

/// A `(channel, payload)` pair, the unit of transport through the bus.
///
/// Events are immutable once built. Cloning one shares the payload, so every
/// mailbox an event is fanned out to sees the same value.
#[derive(Debug)]
pub struct Event<T> {
    channel: String,
    payload: Arc<T>,
}

impl<T> Event<T> {
    pub fn new(channel: impl Into<String>, payload: T) -> Self {
        Self {
            channel: channel.into(),
            payload: Arc::new(payload),
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn payload(&self) -> &T {
        &self.payload
    }
}

// Manual impl: deriving would require `T: Clone`.
impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self {
            channel: self.channel.clone(),
            payload: Arc::clone(&self.payload),
        }
    }
}
