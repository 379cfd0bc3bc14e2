//! WebSocket implementation of the session transport.
//!
//! Each opened session runs as a tokio task that:
//! 1. Connects to the service endpoint (TLS).
//! 2. Reports `on_established` to the injected [`SessionHandler`].
//! 3. Reads frames and routes data frames to per-topic callbacks.
//! 4. Answers pings and sends periodic keep-alive pings of its own.
//!
//! Connection loss is reported as `on_broken(Abnormal)` and the task ends —
//! recovery policy belongs to the session's owner, not the transport.
//!
//! # Wire framing
//!
//! Topic control messages are JSON objects
//! (`{"command": "subscribe", "channel": "<topic>"}`), and inbound data
//! frames are `{"topic": "<topic>", "data": [ ...scalars... ]}`. The `data`
//! array is handed to the topic callback untouched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::error::FeedError;
use crate::session::{
    CloseReason, OnRawMessage, Session, SessionHandler, TopicSubscription, Transport,
};

const PING_INTERVAL: Duration = Duration::from_secs(30);
const OUTBOUND_QUEUE: usize = 64;

type TopicMap = Arc<Mutex<HashMap<String, OnRawMessage>>>;

/// WebSocket-backed [`Transport`].
///
/// `open` spawns the session task on the ambient tokio runtime, so it must
/// be called from within a runtime context.
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for WsTransport {
    fn open(
        &self,
        address: &str,
        handler: Arc<dyn SessionHandler>,
    ) -> Result<Arc<dyn Session>, FeedError> {
        let url = url::Url::parse(address)
            .map_err(|e| FeedError::Transport(format!("bad address `{address}`: {e}")))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(FeedError::Transport(format!(
                "unsupported scheme `{}` in `{address}`",
                url.scheme()
            )));
        }

        let (outbound_tx, outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let topics: TopicMap = Arc::new(Mutex::new(HashMap::new()));

        tokio::spawn(session_loop(
            address.to_string(),
            handler,
            topics.clone(),
            outbound_rx,
            shutdown_rx,
        ));

        Ok(Arc::new(WsSession {
            outbound_tx,
            shutdown_tx,
            topics,
        }))
    }
}

struct WsSession {
    outbound_tx: mpsc::Sender<String>,
    shutdown_tx: watch::Sender<bool>,
    topics: TopicMap,
}

impl Session for WsSession {
    fn subscribe(
        &self,
        topic: &str,
        on_message: OnRawMessage,
    ) -> Result<Box<dyn TopicSubscription>, FeedError> {
        self.topics
            .lock()
            .unwrap()
            .insert(topic.to_string(), on_message);

        let command = json!({"command": "subscribe", "channel": topic}).to_string();
        self.outbound_tx
            .try_send(command)
            .map_err(|e| FeedError::Subscribe(format!("cannot queue subscribe: {e}")))?;

        Ok(Box::new(WsTopicSubscription {
            topics: Arc::downgrade(&self.topics),
            outbound_tx: self.outbound_tx.clone(),
            topic: topic.to_string(),
        }))
    }

    fn close(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

struct WsTopicSubscription {
    topics: Weak<Mutex<HashMap<String, OnRawMessage>>>,
    outbound_tx: mpsc::Sender<String>,
    topic: String,
}

impl TopicSubscription for WsTopicSubscription {
    fn dispose(&mut self) {
        if let Some(topics) = self.topics.upgrade() {
            if topics.lock().unwrap().remove(&self.topic).is_some() {
                let command =
                    json!({"command": "unsubscribe", "channel": self.topic}).to_string();
                let _ = self.outbound_tx.try_send(command);
            }
        }
    }
}

/// Session task — connects, reads, pings, reports lifecycle, exits.
async fn session_loop(
    address: String,
    handler: Arc<dyn SessionHandler>,
    topics: TopicMap,
    mut outbound_rx: mpsc::Receiver<String>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    if *shutdown_rx.borrow() {
        handler.on_broken(&CloseReason::Intentional);
        return;
    }

    info!("connecting to {address}");
    let ws_stream = match tokio_tungstenite::connect_async(address.as_str()).await {
        Ok((stream, _response)) => stream,
        Err(e) => {
            let cause = FeedError::Transport(format!("connect to {address} failed: {e}"));
            handler.on_error(&cause);
            handler.on_broken(&CloseReason::Abnormal(e.to_string()));
            return;
        }
    };
    info!("connected to {address}");
    handler.on_established();

    let (mut ws_write, mut ws_read) = ws_stream.split();
    let mut ping_tick = tokio::time::interval(PING_INTERVAL);
    ping_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ping_tick.tick().await; // first tick fires immediately, skip it

    loop {
        tokio::select! {
            // Deliberate local close
            _ = shutdown_rx.changed() => {
                info!("session to {address} closed");
                let _ = ws_write.close().await;
                handler.on_broken(&CloseReason::Intentional);
                return;
            }

            // Incoming frame
            msg = ws_read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => dispatch_frame(&topics, &text),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let detail = frame
                            .map(|f| format!("{} {}", f.code, f.reason))
                            .unwrap_or_else(|| "close frame".to_string());
                        warn!("server closed session to {address}: {detail}");
                        handler.on_broken(&CloseReason::Abnormal(detail));
                        return;
                    }
                    Some(Err(e)) => {
                        handler.on_error(&FeedError::Transport(format!("read error: {e}")));
                        handler.on_broken(&CloseReason::Abnormal(e.to_string()));
                        return;
                    }
                    None => {
                        warn!("stream from {address} ended");
                        handler.on_broken(&CloseReason::Abnormal("stream ended".to_string()));
                        return;
                    }
                    _ => {} // Pong, Binary, Frame — ignore
                }
            }

            // Outbound control message (subscribe/unsubscribe)
            Some(msg) = outbound_rx.recv() => {
                if let Err(e) = ws_write.send(Message::Text(msg.into())).await {
                    handler.on_error(&FeedError::Transport(format!("send error: {e}")));
                    handler.on_broken(&CloseReason::Abnormal(e.to_string()));
                    return;
                }
            }

            // Keep-alive
            _ = ping_tick.tick() => {
                if let Err(e) = ws_write.send(Message::Ping(vec![].into())).await {
                    handler.on_error(&FeedError::Transport(format!("ping error: {e}")));
                    handler.on_broken(&CloseReason::Abnormal(e.to_string()));
                    return;
                }
            }
        }
    }
}

/// Route one text frame to its topic callback.
///
/// Non-data frames (acks, heartbeats, unknown topics) are ignored with a
/// debug log — the wire can carry them, the adapter does not care.
fn dispatch_frame(topics: &TopicMap, text: &str) {
    let Some((topic, data)) = parse_frame(text) else {
        debug!("ignoring non-data frame: {text}");
        return;
    };

    let callback = topics.lock().unwrap().get(&topic).cloned();
    match callback {
        Some(cb) => cb(data),
        None => debug!("no subscription for topic `{topic}`, dropping frame"),
    }
}

/// Parse a `{"topic": ..., "data": [...]}` frame into its parts.
fn parse_frame(text: &str) -> Option<(String, Vec<serde_json::Value>)> {
    let v: serde_json::Value = serde_json::from_str(text).ok()?;
    let topic = v.get("topic")?.as_str()?.to_string();
    let data = v.get("data")?.as_array()?.clone();
    Some((topic, data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_data_frame() {
        let (topic, data) =
            parse_frame(r#"{"topic": "ticker", "data": ["BTC_ETH", "0.05"]}"#).unwrap();
        assert_eq!(topic, "ticker");
        assert_eq!(data.len(), 2);
        assert_eq!(data[0], serde_json::json!("BTC_ETH"));
    }

    #[test]
    fn non_data_frames_are_none() {
        assert!(parse_frame(r#"{"ack": "subscribe"}"#).is_none());
        assert!(parse_frame(r#"{"topic": "ticker", "data": "not-an-array"}"#).is_none());
        assert!(parse_frame("not json").is_none());
    }

    #[test]
    fn bad_address_is_rejected_synchronously() {
        let transport = WsTransport::new();
        struct NopHandler;
        impl SessionHandler for NopHandler {
            fn on_established(&self) {}
            fn on_error(&self, _: &FeedError) {}
            fn on_broken(&self, _: &CloseReason) {}
        }

        // Both rejections happen before any task is spawned.
        assert!(transport.open("not a url", Arc::new(NopHandler)).is_err());
        assert!(transport.open("http://x.test", Arc::new(NopHandler)).is_err());
    }
}
