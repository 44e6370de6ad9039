use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};
use tracing::{debug, trace};

use super::BusError;
use super::event::Event;

/// In-memory transport behind a [`super::Bus`].
///
/// Tracks which channels currently have a listener, buffers events published
/// to channels nobody listens on, and exposes one queue of dispatchable events
/// in global publish order.
///
/// Every state update happens under a synchronous lock that is never held
/// across an `.await`, so no update is ever observed half-applied.
pub struct MemoryBackend<T> {
    state: Mutex<BackendState<T>>,
    queue_tx: mpsc::UnboundedSender<Event<T>>,
    queue_rx: AsyncMutex<mpsc::UnboundedReceiver<Event<T>>>,
    idle: Notify,
}

struct BackendState<T> {
    subscribed: HashSet<String>,
    universal: bool,
    /// Buffered events tagged with their publish sequence so a universal
    /// subscription can replay all channels in global order.
    missed: HashMap<String, VecDeque<(u64, Event<T>)>>,
    next_seq: u64,
    /// Events enqueued for dispatch and not yet acknowledged by `task_done`.
    pending: usize,
}

impl<T> MemoryBackend<T> {
    pub fn new() -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(BackendState {
                subscribed: HashSet::new(),
                universal: false,
                missed: HashMap::new(),
                next_seq: 0,
                pending: 0,
            }),
            queue_tx,
            queue_rx: AsyncMutex::new(queue_rx),
            idle: Notify::new(),
        }
    }

    /// Marks `channel` as live and replays its missed events, oldest first.
    pub fn subscribe(&self, channel: &str) {
        let mut state = self.state.lock();
        state.subscribed.insert(channel.to_string());

        if let Some(missed) = state.missed.remove(channel) {
            debug!(channel, replayed = missed.len(), "Replaying missed events");
            for (_, event) in missed {
                self.enqueue(&mut state, event);
            }
        }
    }

    pub fn unsubscribe(&self, channel: &str) -> Result<(), BusError> {
        let mut state = self.state.lock();
        if !state.subscribed.remove(channel) {
            return Err(BusError::NotSubscribed {
                channel: channel.to_string(),
            });
        }
        Ok(())
    }

    /// Enables universal delivery and replays every channel's missed events in
    /// the order they were published.
    pub fn universal_subscribe(&self) {
        let mut state = self.state.lock();
        state.universal = true;

        let mut missed: Vec<(u64, Event<T>)> = state
            .missed
            .drain()
            .flat_map(|(_, events)| events)
            .collect();
        missed.sort_by_key(|(seq, _)| *seq);

        if !missed.is_empty() {
            debug!(replayed = missed.len(), "Replaying all missed events");
        }
        for (_, event) in missed {
            self.enqueue(&mut state, event);
        }
    }

    pub fn universal_unsubscribe(&self) -> Result<(), BusError> {
        let mut state = self.state.lock();
        if !state.universal {
            return Err(BusError::NotSubscribed {
                channel: "<universal>".to_string(),
            });
        }
        state.universal = false;
        Ok(())
    }

    /// Publishes without ever blocking. With no listener on `channel` the event
    /// is held until the next subscription to it.
    pub fn publish(&self, channel: impl Into<String>, payload: T) {
        let event = Event::new(channel, payload);
        let mut state = self.state.lock();

        if state.universal || state.subscribed.contains(event.channel()) {
            self.enqueue(&mut state, event);
        } else {
            let seq = state.next_seq;
            state.next_seq += 1;
            trace!(channel = event.channel(), seq, "Buffering event for absent listener");
            state
                .missed
                .entry(event.channel().to_string())
                .or_default()
                .push_back((seq, event));
        }
    }

    pub async fn publish_async(&self, channel: impl Into<String>, payload: T) {
        self.publish(channel, payload);
    }

    /// Next dispatchable event in global publish order.
    ///
    /// Returns `None` only if the queue was torn down, which cannot happen
    /// while the backend is alive.
    pub async fn next_published(&self) -> Option<Event<T>> {
        self.queue_rx.lock().await.recv().await
    }

    /// Acknowledges that one event returned by [`Self::next_published`] was
    /// fully dispatched.
    pub fn task_done(&self) {
        let mut state = self.state.lock();
        state.pending = state.pending.saturating_sub(1);
        if state.pending == 0 {
            self.idle.notify_waiters();
        }
    }

    /// Waits until every enqueued event has been acknowledged.
    pub async fn join(&self) {
        loop {
            let idle = self.idle.notified();
            tokio::pin!(idle);
            idle.as_mut().enable();

            if self.state.lock().pending == 0 {
                return;
            }
            idle.await;
        }
    }

    pub fn is_subscribed(&self, channel: &str) -> bool {
        self.state.lock().subscribed.contains(channel)
    }

    pub fn buffered_len(&self, channel: &str) -> usize {
        self.state
            .lock()
            .missed
            .get(channel)
            .map_or(0, VecDeque::len)
    }

    fn enqueue(&self, state: &mut BackendState<T>, event: Event<T>) {
        state.pending += 1;
        if self.queue_tx.send(event).is_err() {
            state.pending -= 1;
        }
    }
}

impl<T> Default for MemoryBackend<T> {
    fn default() -> Self {
        Self::new()
    }
}
