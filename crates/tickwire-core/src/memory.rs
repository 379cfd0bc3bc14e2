//! In-memory transport for single-process use and tests.
//!
//! Implements the [`Transport`] traits over a plain in-process hub: no
//! sockets, no serialization, fully deterministic. `publish` invokes topic
//! callbacks synchronously on the calling thread, which makes the
//! delivery-ordering and fan-out properties of the adapter directly
//! assertable in tests. The hub also exposes fault-injection hooks
//! (`break_sessions`) to exercise the reconnect path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::FeedError;
use crate::session::{
    CloseReason, OnRawMessage, RawMessage, Session, SessionHandler, TopicSubscription, Transport,
};

/// In-process pub/sub hub. Cheap to clone; clones share the hub.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Hub>,
}

#[derive(Default)]
struct Hub {
    sessions: Mutex<Vec<Arc<MemorySession>>>,
    opens: AtomicUsize,
    fail_next_open: AtomicBool,
}

struct MemorySession {
    handler: Arc<dyn SessionHandler>,
    topics: Arc<Mutex<HashMap<String, OnRawMessage>>>,
    open: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a raw payload to every open session subscribed to `topic`.
    /// Callbacks run synchronously on the calling thread.
    pub fn publish(&self, topic: &str, raw: RawMessage) {
        let sessions = self.inner.sessions.lock().unwrap().clone();
        for session in sessions {
            if !session.open.load(Ordering::Acquire) {
                continue;
            }
            let callback = session.topics.lock().unwrap().get(topic).cloned();
            if let Some(cb) = callback {
                cb(raw.clone());
            }
        }
    }

    /// Break every open session with the given reason (fault injection).
    pub fn break_sessions(&self, reason: CloseReason) {
        let sessions = self.inner.sessions.lock().unwrap().clone();
        for session in sessions {
            if session.open.swap(false, Ordering::AcqRel) {
                session.handler.on_broken(&reason);
            }
        }
    }

    /// Make the next `open` call fail synchronously (fault injection).
    pub fn fail_next_open(&self) {
        self.inner.fail_next_open.store(true, Ordering::Release);
    }

    /// Total number of sessions ever opened through this hub.
    pub fn open_count(&self) -> usize {
        self.inner.opens.load(Ordering::Acquire)
    }

    /// Number of sessions currently open.
    pub fn live_sessions(&self) -> usize {
        self.inner
            .sessions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.open.load(Ordering::Acquire))
            .count()
    }
}

impl Transport for MemoryTransport {
    fn open(
        &self,
        _address: &str,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<Arc<dyn Session>, FeedError> {
        if self.inner.fail_next_open.swap(false, Ordering::AcqRel) {
            return Err(FeedError::Transport("injected open failure".to_string()));
        }

        let session = Arc::new(MemorySession {
            handler: handler.clone(),
            topics: Arc::new(Mutex::new(HashMap::new())),
            open: AtomicBool::new(true),
        });
        self.inner.sessions.lock().unwrap().push(session.clone());
        self.inner.opens.fetch_add(1, Ordering::AcqRel);

        // The hub is always reachable, so establishment is immediate.
        handler.on_established();
        Ok(session)
    }
}

impl Session for MemorySession {
    fn subscribe(
        &self,
        topic: &str,
        on_message: OnRawMessage,
    ) -> Result<Box<dyn TopicSubscription>, FeedError> {
        if !self.open.load(Ordering::Acquire) {
            return Err(FeedError::Subscribe(format!(
                "session closed, cannot subscribe to `{topic}`"
            )));
        }
        self.topics
            .lock()
            .unwrap()
            .insert(topic.to_string(), on_message);
        Ok(Box::new(MemoryTopicSubscription {
            topics: Arc::downgrade(&self.topics),
            topic: topic.to_string(),
        }))
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::AcqRel) {
            self.topics.lock().unwrap().clear();
            self.handler.on_broken(&CloseReason::Intentional);
        }
    }
}

struct MemoryTopicSubscription {
    topics: std::sync::Weak<Mutex<HashMap<String, OnRawMessage>>>,
    topic: String,
}

impl TopicSubscription for MemoryTopicSubscription {
    fn dispose(&mut self) {
        if let Some(topics) = self.topics.upgrade() {
            topics.lock().unwrap().remove(&self.topic);
        }
    }
}
