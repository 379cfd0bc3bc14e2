//! Transport abstraction for the upstream pub/sub service.
//!
//! The adapter core never talks to a socket directly. It sees three traits:
//!
//! - [`Transport`] — "open a session to an address", with a
//!   [`SessionHandler`] injected at open time for lifecycle notifications
//! - [`Session`] — "subscribe to a named topic and receive payloads",
//!   plus `close`
//! - [`TopicSubscription`] — disposer that stops delivery for one topic
//!
//! Lifecycle notifications and inbound payloads are delivered on the
//! transport's own tasks, outside the caller's control. Reconnection policy
//! deliberately does **not** live here — a broken session is reported via
//! [`SessionHandler::on_broken`] and recovery belongs to the caller.

use std::sync::Arc;

use crate::error::FeedError;

/// One raw inbound message: an ordered sequence of untyped scalar fields.
pub type RawMessage = Vec<serde_json::Value>;

/// Callback invoked for each raw message received on a subscribed topic.
pub type OnRawMessage = Arc<dyn Fn(RawMessage) + Send + Sync>;

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// Deliberate local close — terminal, the caller wanted this.
    Intentional,
    /// Anything else: network failure, protocol error, server-initiated
    /// close. The caller decides whether to re-establish.
    Abnormal(String),
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloseReason::Intentional => f.write_str("intentional disconnect"),
            CloseReason::Abnormal(detail) => write!(f, "abnormal ({detail})"),
        }
    }
}

/// Session lifecycle notifications, injected at session-open time.
///
/// Methods are invoked on the transport's delivery tasks; implementations
/// must be cheap and must not block.
pub trait SessionHandler: Send + Sync {
    /// The session is established and ready for topic subscriptions.
    fn on_established(&self);
    /// A session-level error occurred. The session may still be alive;
    /// a fatal error is followed by `on_broken`.
    fn on_error(&self, cause: &FeedError);
    /// The session ended for the given reason. No further notifications or
    /// messages follow for this session.
    fn on_broken(&self, reason: &CloseReason);
}

/// Disposer for a single topic subscription.
pub trait TopicSubscription: Send {
    /// Stop delivery for this topic. Idempotent.
    fn dispose(&mut self);
}

/// A live logical connection to the upstream pub/sub service.
pub trait Session: Send + Sync {
    /// Subscribe to a named topic. Each inbound payload on the topic is
    /// passed to `on_message`, sequentially, on the transport's delivery
    /// task.
    fn subscribe(
        &self,
        topic: &str,
        on_message: OnRawMessage,
    ) -> Result<Box<dyn TopicSubscription>, FeedError>;

    /// Close the session. The handler receives `on_broken(Intentional)`.
    /// Idempotent.
    fn close(&self);
}

/// Factory for sessions — the single seam between the adapter core and the
/// concrete wire protocol.
pub trait Transport: Send + Sync {
    /// Open a session to `address`, registering `handler` for lifecycle
    /// notifications. Establishment may complete asynchronously: a returned
    /// `Ok` only means the attempt is underway; readiness is signalled via
    /// `handler.on_established()`.
    fn open(
        &self,
        address: &str,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<Arc<dyn Session>, FeedError>;
}
