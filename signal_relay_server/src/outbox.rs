//! Per-connection outbound event queue
//!
//! Pushing never waits. When the queue is full the oldest event is dropped,
//! so a stalled client only loses its own backlog.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

/// What happened to a pushed event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queued after discarding the oldest pending event
    DroppedOldest,
    /// The connection is gone, the event was discarded
    Closed,
}

#[derive(Debug, Default)]
struct Queue {
    events: VecDeque<String>,
    closed: bool,
}

/// Bounded queue of serialized events waiting for one client
#[derive(Debug)]
pub struct Outbox {
    queue: Mutex<Queue>,
    notify: Notify,
    capacity: usize,
}

impl Outbox {
    /// Create an outbox holding at most `capacity` events (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(Queue::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a serialized event for the client
    pub fn push(&self, event: String) -> Delivery {
        let delivery = {
            let mut queue = self.lock();
            if queue.closed {
                return Delivery::Closed;
            }
            let delivery = if queue.events.len() >= self.capacity {
                queue.events.pop_front();
                Delivery::DroppedOldest
            } else {
                Delivery::Queued
            };
            queue.events.push_back(event);
            delivery
        };
        self.notify.notify_one();
        delivery
    }

    /// Wait for pending events and take all of them
    ///
    /// Returns `None` once the outbox is closed and nothing is left.
    pub async fn recv(&self) -> Option<Vec<String>> {
        loop {
            {
                let mut queue = self.lock();
                if !queue.events.is_empty() {
                    return Some(queue.events.drain(..).collect());
                }
                if queue.closed {
                    return None;
                }
            }
            self.notify.notified().await;
        }
    }

    /// Take whatever is pending without waiting
    pub fn drain(&self) -> Vec<String> {
        self.lock().events.drain(..).collect()
    }

    /// Stop accepting events. Already queued events can still be received.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    /// Whether the connection has stopped accepting events
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of events waiting to be sent
    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
