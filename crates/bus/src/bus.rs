// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event bus.
//!
//! Publishers never block on subscribers: each subscription owns a bounded
//! queue with drop-oldest overflow, and handlers run on the subscriber's
//! task, not the publisher's. Drops are counted, not silent.

use crate::session_log::{SessionLog, SessionLogError};
use crate::topic::TopicPattern;
use cf_core::BusEvent;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Default bound on a subscriber's queue before drop-oldest kicks in.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;

fn epoch_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Observability counters for the bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusMetrics {
    pub published: u64,
    /// Events discarded because a subscriber queue overflowed
    pub dropped: u64,
}

struct SubscriberShared {
    id: u64,
    pattern: TopicPattern,
    capacity: usize,
    queue: Mutex<VecDeque<BusEvent>>,
    notify: Notify,
    dropped: AtomicU64,
    closed: AtomicBool,
}

struct BusInner {
    subscribers: Mutex<Vec<Arc<SubscriberShared>>>,
    /// Monotonic sequence per publishing source
    sequences: Mutex<HashMap<String, u64>>,
    session_log: Option<Mutex<SessionLog>>,
    published: AtomicU64,
    dropped: AtomicU64,
    next_sub_id: AtomicU64,
}

/// Handle to the bus. Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

impl EventBus {
    /// In-memory bus without a session log (tests, embedded use).
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(Vec::new()),
                sequences: Mutex::new(HashMap::new()),
                session_log: None,
                published: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                next_sub_id: AtomicU64::new(1),
            }),
        }
    }

    /// Bus with a session log at `path`. The log is truncated: the event
    /// trail is scoped to this session by design.
    pub fn with_session_log(path: &Path) -> Result<Self, SessionLogError> {
        let log = SessionLog::open(path)?;
        Ok(Self {
            inner: Arc::new(BusInner {
                subscribers: Mutex::new(Vec::new()),
                sequences: Mutex::new(HashMap::new()),
                session_log: Some(Mutex::new(log)),
                published: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
                next_sub_id: AtomicU64::new(1),
            }),
        })
    }

    /// Publish an event. Assigns the per-source sequence and timestamp,
    /// appends to the session log, and fans out to matching subscribers.
    pub fn publish(&self, mut event: BusEvent) -> BusEvent {
        {
            let mut sequences = self.inner.sequences.lock();
            let seq = sequences.entry(event.source.clone()).or_insert(0);
            *seq += 1;
            event.sequence = *seq;
        }
        event.epoch_ms = epoch_ms_now();
        self.inner.published.fetch_add(1, Ordering::Relaxed);

        if let Some(log) = &self.inner.session_log {
            if let Err(e) = log.lock().append(&event) {
                warn!(error = %e, "session log append failed");
            }
        }

        debug!(event = %event.log_summary(), "publish");

        let subscribers = self.inner.subscribers.lock().clone();
        for sub in subscribers {
            if sub.closed.load(Ordering::Acquire) || !sub.pattern.matches(&event.topic) {
                continue;
            }
            {
                let mut queue = sub.queue.lock();
                if queue.len() >= sub.capacity {
                    queue.pop_front();
                    sub.dropped.fetch_add(1, Ordering::Relaxed);
                    self.inner.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        pattern = %sub.pattern,
                        topic = %event.topic,
                        "subscriber queue overflow, dropping oldest"
                    );
                }
                queue.push_back(event.clone());
            }
            sub.notify.notify_one();
        }

        event
    }

    /// Subscribe with the default queue capacity.
    pub fn subscribe(&self, pattern: TopicPattern) -> Subscription {
        self.subscribe_with_capacity(pattern, DEFAULT_SUBSCRIBER_CAPACITY)
    }

    pub fn subscribe_with_capacity(&self, pattern: TopicPattern, capacity: usize) -> Subscription {
        let shared = Arc::new(SubscriberShared {
            id: self.inner.next_sub_id.fetch_add(1, Ordering::Relaxed),
            pattern,
            capacity: capacity.max(1),
            queue: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        });
        self.inner.subscribers.lock().push(Arc::clone(&shared));
        Subscription {
            shared,
            bus: Arc::clone(&self.inner),
        }
    }

    /// Close all subscriptions. Pending queues drain; further `recv` calls
    /// return `None` once empty. Used at shutdown to quiesce handlers.
    pub fn close(&self) {
        let subscribers = self.inner.subscribers.lock().clone();
        for sub in subscribers {
            sub.closed.store(true, Ordering::Release);
            sub.notify.notify_waiters();
            sub.notify.notify_one();
        }
    }

    pub fn metrics(&self) -> BusMetrics {
        BusMetrics {
            published: self.inner.published.load(Ordering::Relaxed),
            dropped: self.inner.dropped.load(Ordering::Relaxed),
        }
    }

    /// Recent session-log events, newest last.
    pub fn recent_events(&self, limit: usize) -> Vec<BusEvent> {
        match &self.inner.session_log {
            Some(log) => log.lock().tail(limit).unwrap_or_default(),
            None => Vec::new(),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// One subscriber's end of the bus.
pub struct Subscription {
    shared: Arc<SubscriberShared>,
    bus: Arc<BusInner>,
}

impl Subscription {
    /// Wait for the next matching event. Returns `None` after the bus is
    /// closed and the queue has drained.
    pub async fn recv(&self) -> Option<BusEvent> {
        loop {
            if let Some(event) = self.shared.queue.lock().pop_front() {
                return Some(event);
            }
            if self.shared.closed.load(Ordering::Acquire) {
                return None;
            }
            self.shared.notify.notified().await;
        }
    }

    /// Non-blocking receive.
    pub fn try_recv(&self) -> Option<BusEvent> {
        self.shared.queue.lock().pop_front()
    }

    /// Events this subscriber lost to queue overflow.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(Ordering::Relaxed)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let id = self.shared.id;
        self.bus.subscribers.lock().retain(|s| s.id != id);
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
