//! Connection lifecycle manager.
//!
//! [`TickerFeed`] owns the session state machine:
//!
//! ```text
//! Disconnected ──start()──► Connecting ──established──► Connected
//!      ▲                        ▲                          │
//!      │                        └──────broken(abnormal)────┘   (auto stop/start)
//!      └──────────── broken(intentional) / stop() ─────────┘   (no reconnect)
//! ```
//!
//! Session notifications arrive on the transport's tasks through a
//! three-method [`SessionHandler`] relay and are funneled into a supervisor
//! task that is the sole writer of the session/subscription handles — a
//! reconnect cycle completes its teardown before the replacement session is
//! stood up, so two live sessions can never coexist.
//!
//! Recovery policy: only a `Broken(Abnormal)` notification triggers a
//! reconnect, with exponential backoff between attempts (reset once a
//! session is established). An intentional close is terminal until the
//! caller starts the adapter again. Session errors are logged, never acted
//! on.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use tickwire_core::config::{ConnectionConfig, ReconnectConfig};
use tickwire_core::error::FeedError;
use tickwire_core::session::{
    CloseReason, OnRawMessage, Session, SessionHandler, TopicSubscription, Transport,
};
use tickwire_core::{CurrencyPair, FeedKind};

use crate::normalizer::{Normalized, TickNormalizer};
use crate::registry::{SubscriptionRegistry, TickSubscriber};

/// Lifecycle state of the adapter's session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Internal session notifications, funneled from the transport's tasks to
/// the supervisor.
enum SessionEvent {
    Established,
    Errored(String),
    Broken(CloseReason),
}

/// The [`SessionHandler`] injected at session-open time. Forwards each
/// notification into the supervisor's event queue without blocking the
/// transport's task.
struct LifecycleRelay {
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionHandler for LifecycleRelay {
    fn on_established(&self) {
        let _ = self.events.send(SessionEvent::Established);
    }

    fn on_error(&self, cause: &FeedError) {
        let _ = self.events.send(SessionEvent::Errored(cause.to_string()));
    }

    fn on_broken(&self, reason: &CloseReason) {
        let _ = self.events.send(SessionEvent::Broken(reason.clone()));
    }
}

/// Handles owned by the current session generation. Mutated only by the
/// supervisor and by `stop()`, never concurrently with a reconnect cycle.
#[derive(Default)]
struct SessionHandles {
    session: Mutex<Option<Arc<dyn Session>>>,
    topic_sub: Mutex<Option<Box<dyn TopicSubscription>>>,
}

/// One exchange-facing ticker feed adapter instance.
pub struct TickerFeed {
    source: String,
    address: String,
    topic: String,
    start_timeout: Duration,
    reconnect: ReconnectConfig,
    transport: Arc<dyn Transport>,
    normalizer: Arc<TickNormalizer>,
    registry: Arc<SubscriptionRegistry>,
    handles: Arc<SessionHandles>,
    state_tx: Arc<watch::Sender<SessionState>>,
    state_rx: watch::Receiver<SessionState>,
    shutdown_tx: Option<watch::Sender<bool>>,
    supervisor: Option<tokio::task::JoinHandle<()>>,
}

impl TickerFeed {
    /// Build an adapter from its connection config and a transport.
    ///
    /// Fails if the configured instrument universe contains malformed
    /// entries.
    pub fn new(config: &ConnectionConfig, transport: Arc<dyn Transport>) -> Result<Self, FeedError> {
        let instruments = config.parsed_instruments()?;
        let normalizer = Arc::new(TickNormalizer::new(config.exchange.clone(), instruments));
        let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);

        Ok(Self {
            source: config.exchange.clone(),
            address: config.address.clone(),
            topic: config.ticker_topic().to_string(),
            start_timeout: config.start_timeout(),
            reconnect: config.reconnect.clone().unwrap_or_default(),
            transport,
            normalizer,
            registry: Arc::new(SubscriptionRegistry::new()),
            handles: Arc::new(SessionHandles::default()),
            state_tx: Arc::new(state_tx),
            state_rx,
            shutdown_tx: None,
            supervisor: None,
        })
    }

    /// Which upstream source this adapter represents. Fixed at construction.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    /// Register interest in ticks for `(kind, pair)`. Idempotent; callable
    /// from any thread at any time, connected or not.
    pub fn subscribe(&self, kind: FeedKind, pair: CurrencyPair, subscriber: &Arc<dyn TickSubscriber>) {
        self.registry.subscribe(kind, pair, subscriber);
    }

    /// Remove a registration; silent no-op when absent.
    pub fn unsubscribe(&self, kind: FeedKind, pair: &CurrencyPair, subscriber: &Arc<dyn TickSubscriber>) {
        self.registry.unsubscribe(kind, pair, subscriber);
    }

    /// Open the session and begin ticker processing.
    ///
    /// Blocks the caller until the session is established or the configured
    /// bound elapses — a timeout is not an error, it only bounds the wait;
    /// establishment (and recovery) continues in the background either way.
    ///
    /// Calling `start` while the adapter is already running is a caller
    /// error.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        if self.supervisor.as_ref().is_some_and(|task| !task.is_finished()) {
            return Err(FeedError::AlreadyStarted.into());
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let relay = Arc::new(LifecycleRelay { events: events_tx });

        self.state_tx.send_replace(SessionState::Connecting);
        info!("[{}] connecting to {}", self.source, self.address);

        let session = match self.transport.open(&self.address, relay.clone()) {
            Ok(session) => session,
            Err(e) => {
                self.state_tx.send_replace(SessionState::Error);
                return Err(e.into());
            }
        };
        *self.handles.session.lock().unwrap() = Some(session);

        let supervisor = Supervisor {
            source: self.source.clone(),
            address: self.address.clone(),
            topic: self.topic.clone(),
            reconnect: self.reconnect.clone(),
            transport: self.transport.clone(),
            normalizer: self.normalizer.clone(),
            registry: self.registry.clone(),
            handles: self.handles.clone(),
            state: self.state_tx.clone(),
        };
        self.shutdown_tx = Some(shutdown_tx);
        self.supervisor = Some(tokio::spawn(supervisor.run(events_rx, relay, shutdown_rx)));

        // Bounded wait for establishment.
        let mut state_rx = self.state_rx.clone();
        let established = async {
            loop {
                if *state_rx.borrow_and_update() == SessionState::Connected {
                    break;
                }
                if state_rx.changed().await.is_err() {
                    break;
                }
            }
        };
        if tokio::time::timeout(self.start_timeout, established).await.is_err() {
            warn!(
                "[{}] session not established within {:?}, continuing in background",
                self.source, self.start_timeout
            );
        }
        Ok(())
    }

    /// Dispose the topic subscription, close the session, and join the
    /// supervisor. Safe to call even if the adapter never connected.
    pub async fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown_tx.take() {
            let _ = shutdown.send(true);
        }
        if let Some(mut sub) = self.handles.topic_sub.lock().unwrap().take() {
            sub.dispose();
        }
        let session = self.handles.session.lock().unwrap().take();
        if let Some(session) = session {
            session.close();
        }
        if let Some(task) = self.supervisor.take() {
            let _ = task.await;
        }
        // The supervisor may have stored a replacement session between the
        // teardown above and its exit (mid-reconnect shutdown). It is
        // quiescent now, so drain the handles once more.
        if let Some(mut sub) = self.handles.topic_sub.lock().unwrap().take() {
            sub.dispose();
        }
        let session = self.handles.session.lock().unwrap().take();
        if let Some(session) = session {
            session.close();
        }
        self.state_tx.send_replace(SessionState::Disconnected);
        info!("[{}] stopped", self.source);
    }
}

/// Drives the state machine from session events. Sole writer of the session
/// and topic-subscription handles while running.
struct Supervisor {
    source: String,
    address: String,
    topic: String,
    reconnect: ReconnectConfig,
    transport: Arc<dyn Transport>,
    normalizer: Arc<TickNormalizer>,
    registry: Arc<SubscriptionRegistry>,
    handles: Arc<SessionHandles>,
    state: Arc<watch::Sender<SessionState>>,
}

impl Supervisor {
    async fn run(
        self,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
        relay: Arc<LifecycleRelay>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut backoff = self.reconnect.initial_delay();

        loop {
            let event = tokio::select! {
                _ = shutdown.changed() => return,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => return,
                },
            };

            match event {
                SessionEvent::Established => {
                    backoff = self.reconnect.initial_delay();
                    match self.subscribe_ticker() {
                        Ok(sub) => {
                            *self.handles.topic_sub.lock().unwrap() = Some(sub);
                            self.state.send_replace(SessionState::Connected);
                            info!("[{}] session established, ticker subscribed", self.source);
                        }
                        Err(e) => {
                            error!("[{}] ticker subscription failed: {e}", self.source);
                            self.state.send_replace(SessionState::Error);
                        }
                    }
                }

                SessionEvent::Errored(cause) => {
                    // Logged only — recovery is driven by broken-session
                    // notifications, never by errors.
                    error!("[{}] session error: {cause}", self.source);
                }

                SessionEvent::Broken(CloseReason::Intentional) => {
                    info!("[{}] session closed cleanly, not reconnecting", self.source);
                    self.state.send_replace(SessionState::Disconnected);
                    return;
                }

                SessionEvent::Broken(CloseReason::Abnormal(detail)) => {
                    error!(
                        "[{}] session lost ({detail}), reconnecting in {backoff:?}",
                        self.source
                    );
                    self.state.send_replace(SessionState::Connecting);

                    // Full teardown before standing up the replacement.
                    if let Some(mut sub) = self.handles.topic_sub.lock().unwrap().take() {
                        sub.dispose();
                    }
                    let session = self.handles.session.lock().unwrap().take();
                    if let Some(session) = session {
                        session.close();
                    }

                    if wait_or_shutdown(backoff, &mut shutdown).await {
                        return;
                    }
                    backoff = (backoff * 2).min(self.reconnect.max_delay());

                    loop {
                        match self.transport.open(&self.address, relay.clone()) {
                            Ok(session) => {
                                *self.handles.session.lock().unwrap() = Some(session);
                                break;
                            }
                            Err(e) => {
                                error!(
                                    "[{}] reopen failed ({e}), retrying in {backoff:?}",
                                    self.source
                                );
                                if wait_or_shutdown(backoff, &mut shutdown).await {
                                    return;
                                }
                                backoff = (backoff * 2).min(self.reconnect.max_delay());
                            }
                        }
                    }
                }
            }
        }
    }

    /// Subscribe to the ticker topic on the current session, binding the
    /// normalize-then-fan-out path as the message callback.
    fn subscribe_ticker(&self) -> Result<Box<dyn TopicSubscription>, FeedError> {
        let session = self
            .handles
            .session
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| FeedError::Transport("no open session".to_string()))?;

        let normalizer = self.normalizer.clone();
        let registry = self.registry.clone();
        let source = self.source.clone();
        let on_message: OnRawMessage = Arc::new(move |raw| {
            match normalizer.normalize(&raw) {
                Ok(Normalized::Tick(tick)) => {
                    // Snapshot taken under the registry lock; deliver
                    // outside it, one subscriber at a time, in
                    // registration order.
                    for subscriber in registry.matching(&tick.pair, Some(FeedKind::Ticker)) {
                        subscriber.on_tick(&tick);
                    }
                }
                Ok(Normalized::Skip(_)) => {} // logged at debug level by the normalizer
                Err(e) => {
                    // Feed-format contract violation: drop this tick, keep
                    // the session.
                    error!("[{source}] dropping malformed ticker payload: {e}");
                }
            }
        });

        session.subscribe(&self.topic, on_message)
    }
}

/// Sleep for `delay`, returning early (with `true`) if shutdown fires.
async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown.changed() => true,
    }
}
