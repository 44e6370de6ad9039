//! In-process broadcast bus.
//!
//! Publishers never block. Events published to a channel nobody listens on
//! are held by the [`MemoryBackend`] and replayed to the next subscriber of
//! that channel, which is what lets a requester subscribe to its reply channel
//! after the reply was already sent.
//!
//! Mailboxes are unbounded: a subscriber that never drains its mailbox grows
//! it without limit. Fan-out favors isolation between consumers over memory
//! bounds; no overflow policy is applied.

mod backend;
mod event;
mod subscriber;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

pub use backend::MemoryBackend;
pub use event::Event;
pub use subscriber::{Subscription, SubscriptionClosed};

use subscriber::{Delivery, Mailbox, Scope, SubscriberId};

#[derive(Debug, Error)]
pub enum BusError {
    #[error("Channel is not subscribed: {channel}")]
    NotSubscribed { channel: String },

    #[error("Bus is already connected")]
    AlreadyConnected,

    #[error("No tokio runtime available to run the dispatcher")]
    NoRuntime,

    #[error("Dispatcher task failed: {0}")]
    DispatcherPanicked(String),
}

pub struct Bus<T> {
    inner: Arc<BusInner<T>>,
}

pub(crate) struct BusInner<T> {
    backend: MemoryBackend<T>,
    table: Mutex<SubscriptionTable<T>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

struct SubscriptionTable<T> {
    /// An entry exists only while at least one mailbox is registered.
    channels: HashMap<String, Vec<(SubscriberId, Mailbox<T>)>>,
    universal: Vec<(SubscriberId, Mailbox<T>)>,
    next_id: u64,
}

impl<T> SubscriptionTable<T> {
    fn allocate_id(&mut self) -> SubscriberId {
        let id = SubscriberId(self.next_id);
        self.next_id += 1;
        id
    }
}

impl<T> Clone for Bus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for Bus<T>
where
    T: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Bus<T>
where
    T: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                backend: MemoryBackend::new(),
                table: Mutex::new(SubscriptionTable {
                    channels: HashMap::new(),
                    universal: Vec::new(),
                    next_id: 0,
                }),
                dispatcher: Mutex::new(None),
            }),
        }
    }

    /// Starts the background dispatch task on the current tokio runtime.
    pub fn connect(&self) -> Result<(), BusError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| BusError::NoRuntime)?;

        let mut dispatcher = self.inner.dispatcher.lock();
        if dispatcher.is_some() {
            return Err(BusError::AlreadyConnected);
        }

        let inner = Arc::clone(&self.inner);
        *dispatcher = Some(runtime.spawn(dispatch_loop(inner)));
        debug!("Bus connected");
        Ok(())
    }

    /// Stops the dispatch task and closes every live mailbox.
    ///
    /// Events still queued for dispatch are dropped; call [`Self::join`] first
    /// to flush them.
    pub async fn disconnect(&self) -> Result<(), BusError> {
        let handle = self.inner.dispatcher.lock().take();

        let result = match handle {
            Some(handle) => {
                handle.abort();
                match handle.await {
                    Ok(()) => Ok(()),
                    Err(e) if e.is_cancelled() => Ok(()),
                    Err(e) => Err(BusError::DispatcherPanicked(e.to_string())),
                }
            }
            None => Ok(()),
        };

        self.inner.close_all();
        debug!("Bus disconnected");
        result
    }

    pub fn is_connected(&self) -> bool {
        self.inner.dispatcher.lock().is_some()
    }

    /// Subscribes to `channel` for the lifetime of the returned value.
    ///
    /// The first subscriber of a channel receives any events that were
    /// published to it while nobody was listening.
    pub fn subscribe(&self, channel: impl Into<String>) -> Subscription<T> {
        let channel = channel.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let id = {
            let mut table = self.inner.table.lock();
            let id = table.allocate_id();
            let mailboxes = table.channels.entry(channel.clone()).or_default();
            let first = mailboxes.is_empty();
            mailboxes.push((id, tx));
            if first {
                self.inner.backend.subscribe(&channel);
            }
            id
        };

        debug!(channel = %channel, subscriber = id.0, "Subscribed");
        Subscription::new(id, Scope::Channel(channel), rx, Arc::clone(&self.inner))
    }

    /// Subscribes to every channel for the lifetime of the returned value.
    ///
    /// While any universal subscription is live nothing is buffered, on any
    /// channel.
    pub fn universal_subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();

        let id = {
            let mut table = self.inner.table.lock();
            let id = table.allocate_id();
            let first = table.universal.is_empty();
            table.universal.push((id, tx));
            if first {
                self.inner.backend.universal_subscribe();
            }
            id
        };

        debug!(subscriber = id.0, "Subscribed to all channels");
        Subscription::new(id, Scope::Universal, rx, Arc::clone(&self.inner))
    }

    pub fn publish(&self, channel: impl Into<String>, payload: T) {
        self.inner.backend.publish(channel, payload);
    }

    pub async fn publish_async(&self, channel: impl Into<String>, payload: T) {
        self.inner.backend.publish_async(channel, payload).await;
    }

    /// Waits until everything queued so far has been fanned out.
    ///
    /// Only returns while the bus is connected.
    pub async fn join(&self) {
        self.inner.backend.join().await;
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner
            .table
            .lock()
            .channels
            .get(channel)
            .map_or(0, Vec::len)
    }

    pub fn has_channel(&self, channel: &str) -> bool {
        self.inner.table.lock().channels.contains_key(channel)
    }

    pub fn universal_count(&self) -> usize {
        self.inner.table.lock().universal.len()
    }

    pub fn backend(&self) -> &MemoryBackend<T> {
        &self.inner.backend
    }
}

async fn dispatch_loop<T>(inner: Arc<BusInner<T>>)
where
    T: Send + Sync + 'static,
{
    while let Some(event) = inner.backend.next_published().await {
        inner.fan_out(&event);
        inner.backend.task_done();
    }
}

impl<T> BusInner<T> {
    fn fan_out(&self, event: &Event<T>) {
        let table = self.table.lock();

        let channel_mailboxes = table
            .channels
            .get(event.channel())
            .into_iter()
            .flatten();

        for (_, mailbox) in channel_mailboxes.chain(table.universal.iter()) {
            // A failed send means the receiver is mid-drop and about to
            // unregister; there is nobody left to deliver to.
            let _ = mailbox.send(Delivery::Event(event.clone()));
        }
    }

    fn close_all(&self) {
        let table = self.table.lock();
        for (_, mailbox) in table.channels.values().flatten().chain(table.universal.iter()) {
            let _ = mailbox.send(Delivery::Closed);
        }
    }

    pub(crate) fn release(&self, id: SubscriberId, scope: &Scope) {
        let mut table = self.table.lock();

        match scope {
            Scope::Channel(channel) => {
                let Some(mailboxes) = table.channels.get_mut(channel) else {
                    return;
                };
                mailboxes.retain(|(existing, _)| *existing != id);

                if mailboxes.is_empty() {
                    table.channels.remove(channel);
                    if let Err(e) = self.backend.unsubscribe(channel) {
                        error!(channel = %channel, error = %e, "Subscription table out of sync with backend");
                    }
                }
                debug!(channel = %channel, subscriber = id.0, "Unsubscribed");
            }
            Scope::Universal => {
                let before = table.universal.len();
                table.universal.retain(|(existing, _)| *existing != id);

                if before != table.universal.len() && table.universal.is_empty() {
                    if let Err(e) = self.backend.universal_unsubscribe() {
                        error!(error = %e, "Subscription table out of sync with backend");
                    }
                }
                debug!(subscriber = id.0, "Unsubscribed from all channels");
            }
        }
    }
}
