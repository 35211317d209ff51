//! CDP client - the core communication layer
//!
//! One WebSocket per browser connection; all target sessions are multiplexed
//! over it. Request/response matching via ID, events fanned out to
//! subscribers. No retries and no queueing - the caller decides what a
//! failure means.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use serde_json::Value;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use super::protocol::*;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

#[derive(Error, Debug)]
pub enum CDPError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CDP protocol error: {code} - {message}")]
    Protocol { code: i32, message: String },

    #[error("Request timed out: {method}")]
    Timeout { method: String },

    #[error("Connection closed")]
    Closed,
}

/// Result type for CDP operations.
pub type Result<T> = std::result::Result<T, CDPError>;

/// Event subscriber callback. Invoked synchronously on the reader task, so
/// it must not block or perform I/O - record state and return.
pub type EventCallback = Arc<dyn Fn(&CDPEvent) + Send + Sync>;

/// Handle to a registered event subscription, used to remove it again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    method: String,
    token: u64,
}

/// CDP client - manages a single WebSocket connection to the browser.
pub struct CDPClient {
    /// Monotonic request ID counter.
    next_id: AtomicU64,

    /// Monotonic subscription token counter.
    next_token: AtomicU64,

    /// Pending requests waiting for responses.
    pending: Arc<DashMap<RequestId, oneshot::Sender<CDPResponse>>>,

    /// Event subscribers, keyed by method name (e.g. "Page.loadEventFired").
    subscribers: Arc<DashMap<String, Vec<(u64, EventCallback)>>>,

    /// WebSocket write half.
    ws_sink: Mutex<WsSink>,

    /// Timeout applied when a call does not specify its own.
    default_timeout: Duration,
}

impl CDPClient {
    /// Connect to a DevTools WebSocket endpoint and start the reader task.
    pub async fn connect(ws_url: &str, default_timeout: Duration) -> Result<Arc<Self>> {
        let (ws_stream, _) = connect_async(ws_url).await?;
        let (sink, mut stream) = ws_stream.split();

        let client = Arc::new(Self {
            next_id: AtomicU64::new(1),
            next_token: AtomicU64::new(1),
            pending: Arc::new(DashMap::new()),
            subscribers: Arc::new(DashMap::new()),
            ws_sink: Mutex::new(sink),
            default_timeout,
        });
        tracing::info!(url = ws_url, "CDP connection established");

        let reader = Arc::clone(&client);
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Err(e) = reader.handle_message(&text) {
                            tracing::warn!(error = %e, "failed to handle CDP message");
                        }
                    }
                    Ok(Message::Close(_)) => {
                        tracing::info!("WebSocket closed by remote");
                        break;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "WebSocket read error");
                        break;
                    }
                    _ => {}
                }
            }

            // Dropping the senders wakes every in-flight call with Closed.
            reader.pending.clear();
        });

        Ok(client)
    }

    /// Send a CDP request and wait for its response with the default timeout.
    pub async fn send(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        session_id: Option<SessionId>,
    ) -> Result<Value> {
        let timeout = self.default_timeout;
        self.send_with_timeout(method, params, session_id, timeout)
            .await
    }

    /// Send a CDP request and wait for its response, bounded by `timeout`.
    pub async fn send_with_timeout(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
        session_id: Option<SessionId>,
        timeout: Duration,
    ) -> Result<Value> {
        let method = method.into();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request = CDPRequest {
            id,
            method: method.clone(),
            params,
            session_id,
        };

        // Register before sending so a fast response cannot race the table.
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id, tx);

        let json = serde_json::to_string(&request)?;
        tracing::trace!(id, method = %method, "sending CDP request");
        {
            let mut sink = self.ws_sink.lock().await;
            sink.send(Message::Text(json)).await?;
        }

        let response = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(CDPError::Closed),
            Err(_) => {
                self.pending.remove(&id);
                return Err(CDPError::Timeout { method });
            }
        };

        if let Some(error) = response.error {
            return Err(CDPError::Protocol {
                code: error.code,
                message: error.message,
            });
        }

        Ok(response.result.unwrap_or(Value::Null))
    }

    /// Subscribe to a CDP event method. The returned handle removes the
    /// subscription again via [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe(&self, method: impl Into<String>, callback: EventCallback) -> Subscription {
        let method = method.into();
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        self.subscribers
            .entry(method.clone())
            .or_default()
            .push((token, callback));
        Subscription { method, token }
    }

    /// Remove a previously registered subscription.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        if let Some(mut entry) = self.subscribers.get_mut(&subscription.method) {
            entry.retain(|(token, _)| *token != subscription.token);
        }
    }

    /// Handle one incoming WebSocket message.
    fn handle_message(&self, text: &str) -> Result<()> {
        let msg: CDPMessage = serde_json::from_str(text)?;

        match msg {
            CDPMessage::Response(response) => {
                if let Some((_, tx)) = self.pending.remove(&response.id) {
                    let _ = tx.send(response); // receiver may have timed out
                } else {
                    tracing::trace!(id = response.id, "response for unknown request");
                }
            }
            CDPMessage::Event(event) => {
                if let Some(subscribers) = self.subscribers.get(&event.method) {
                    for (_, callback) in subscribers.value() {
                        callback(&event);
                    }
                }
            }
        }

        Ok(())
    }

    /// Close the connection. In-flight requests resolve with `Closed`.
    pub async fn close(&self) -> Result<()> {
        let mut sink = self.ws_sink.lock().await;
        sink.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn unsubscribe_removes_only_the_matching_callback() {
        // Subscription bookkeeping is pure data; exercise it without a socket.
        let subscribers: DashMap<String, Vec<(u64, EventCallback)>> = DashMap::new();
        let counter = Arc::new(AtomicUsize::new(0));

        for token in 1..=3u64 {
            let counter = Arc::clone(&counter);
            subscribers
                .entry("Page.loadEventFired".to_string())
                .or_default()
                .push((
                    token,
                    Arc::new(move |_event: &CDPEvent| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }),
                ));
        }

        if let Some(mut entry) = subscribers.get_mut("Page.loadEventFired") {
            entry.retain(|(token, _)| *token != 2);
        }

        let event = CDPEvent {
            method: "Page.loadEventFired".to_string(),
            params: None,
            session_id: None,
        };
        for (_, callback) in subscribers.get("Page.loadEventFired").unwrap().value() {
            callback(&event);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    // Live tests need a running Chromium with --remote-debugging-port.

    #[tokio::test]
    #[ignore]
    async fn connect_and_get_version() {
        let client = CDPClient::connect(
            "ws://localhost:9222/devtools/browser",
            Duration::from_secs(30),
        )
        .await
        .unwrap();

        let result = client
            .send("Browser.getVersion", None, None)
            .await
            .unwrap();
        assert!(result.get("product").is_some());
    }
}
