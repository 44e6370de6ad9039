use std::sync::Arc;

use futures::Stream;
use thiserror::Error;
use tokio::sync::mpsc;

use super::BusInner;
use super::event::Event;

/// Returned by [`Subscription::get`] once the mailbox received the close
/// sentinel. This is the normal end of a subscription, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("subscription closed")]
pub struct SubscriptionClosed;

pub(crate) enum Delivery<T> {
    Event(Event<T>),
    Closed,
}

pub(crate) type Mailbox<T> = mpsc::UnboundedSender<Delivery<T>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SubscriberId(pub(crate) u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Scope {
    Channel(String),
    Universal,
}

/// A live listener on the bus.
///
/// The subscription is registered for exactly as long as this value exists:
/// dropping it, on any path, removes its mailbox and releases the channel in
/// the backend when it was the last listener.
pub struct Subscription<T> {
    id: SubscriberId,
    scope: Scope,
    rx: mpsc::UnboundedReceiver<Delivery<T>>,
    bus: Arc<BusInner<T>>,
    closed: bool,
}

impl<T> Subscription<T> {
    pub(crate) fn new(
        id: SubscriberId,
        scope: Scope,
        rx: mpsc::UnboundedReceiver<Delivery<T>>,
        bus: Arc<BusInner<T>>,
    ) -> Self {
        Self {
            id,
            scope,
            rx,
            bus,
            closed: false,
        }
    }

    /// Waits for the next event.
    pub async fn get(&mut self) -> Result<Event<T>, SubscriptionClosed> {
        if self.closed {
            return Err(SubscriptionClosed);
        }
        match self.rx.recv().await {
            Some(Delivery::Event(event)) => Ok(event),
            Some(Delivery::Closed) | None => {
                self.closed = true;
                Err(SubscriptionClosed)
            }
        }
    }

    /// Events as an async sequence that ends when the subscription is closed.
    ///
    /// The sequence borrows the subscription, so it can be dropped and taken
    /// again without losing queued events.
    pub fn stream(&mut self) -> impl Stream<Item = Event<T>> + '_ {
        async_stream::stream! {
            while let Ok(event) = self.get().await {
                yield event;
            }
        }
    }

    /// The channel this subscription listens on, `None` for a universal one.
    pub fn channel(&self) -> Option<&str> {
        match &self.scope {
            Scope::Channel(channel) => Some(channel),
            Scope::Universal => None,
        }
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.bus.release(self.id, &self.scope);
    }
}
