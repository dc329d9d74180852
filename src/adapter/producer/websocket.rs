//! Generic JSON-over-WebSocket feed.
//!
//! # Wire format
//!
//! Outbound, one frame per batch of instruments:
//!
//! ```json
//! {"op":"subscribe","instruments":["SHFE.ru1901","SSE.600000"]}
//! ```
//!
//! Inbound, one tick per text frame. `instrument` and `timestamp` (epoch
//! millis) are required; the whole object is kept as the tick payload.
//!
//! ```json
//! {"instrument":"SHFE.ru1901","timestamp":1540429200000,"last_price":12650.0}
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::connect_async;
use tracing::{debug, info, trace, warn};

use super::state::{ProducerState, Session};
use super::{decode_parameters, serves_exchange};
use crate::domain::{Exchange, InstrumentId, InstrumentRegistry, ProducerConfig, Tick};
use crate::error::ProducerError;
use crate::port::{MarketDataProducer, ProducerSink, ProducerStatus};

pub const TYPE_NAME: &str = "websocket";

/// Parameters of a `websocket` producer.
#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketParams {
    pub url: String,
    /// Venues served; empty means all.
    #[serde(default)]
    pub exchanges: Vec<Exchange>,
    /// Sent as a bearer token during the handshake.
    #[serde(default)]
    pub token: Option<String>,
    /// Instruments per subscribe frame.
    #[serde(default = "default_subscribe_batch")]
    pub subscribe_batch: usize,
}

const fn default_subscribe_batch() -> usize {
    100
}

#[derive(Debug, Serialize)]
struct SubscribeRequest<'a> {
    op: &'static str,
    instruments: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct InboundTick {
    instrument: String,
    timestamp: i64,
}

/// Outbound queue of the live session, tagged with its generation.
type Outbound = Arc<Mutex<Option<(u64, mpsc::UnboundedSender<Message>)>>>;

pub struct WebSocketProducer {
    state: Arc<ProducerState>,
    params: WebSocketParams,
    registry: Arc<InstrumentRegistry>,
    outbound: Outbound,
}

impl WebSocketProducer {
    pub fn new(
        config: ProducerConfig,
        sink: Arc<dyn ProducerSink>,
        registry: Arc<InstrumentRegistry>,
    ) -> Result<Self, ProducerError> {
        let params: WebSocketParams = decode_parameters(&config)?;
        if params.url.trim().is_empty() {
            return Err(ProducerError::ConstructionFailed {
                id: config.id.clone(),
                reason: "url is required".into(),
            });
        }
        if params.subscribe_batch == 0 {
            return Err(ProducerError::ConstructionFailed {
                id: config.id.clone(),
                reason: "subscribe_batch must be greater than 0".into(),
            });
        }
        Ok(Self {
            state: ProducerState::new(config, sink),
            params,
            registry,
            outbound: Arc::new(Mutex::new(None)),
        })
    }
}

/// Errors raised before the handshake completes. Transport failures are
/// worth retrying; anything else means the endpoint refused us.
fn classify_connect_error(err: tungstenite::Error) -> ProducerError {
    match err {
        tungstenite::Error::Io(e) => ProducerError::ConnectionLost(e.to_string()),
        tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
            ProducerError::ConnectionLost(err.to_string())
        }
        other => ProducerError::ConnectFailed(other.to_string()),
    }
}

async fn run_session(
    session: Session,
    params: WebSocketParams,
    registry: Arc<InstrumentRegistry>,
    outbound: Outbound,
) -> Result<(), ProducerError> {
    let mut request = params
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| ProducerError::ConnectFailed(e.to_string()))?;
    if let Some(token) = &params.token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ProducerError::ConnectFailed(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    info!(producer = %session.producer_id(), url = %params.url, "Connecting to WebSocket");
    let (ws, response) = connect_async(request)
        .await
        .map_err(classify_connect_error)?;
    info!(
        producer = %session.producer_id(),
        status = %response.status(),
        "WebSocket connected"
    );

    let (mut write, mut read) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    {
        let mut slot = outbound.lock();
        if !session.is_current() {
            debug!(producer = %session.producer_id(), "Session closed during handshake");
            return Ok(());
        }
        *slot = Some((session.generation(), tx));
    }
    session.mark_connected();

    let result = loop {
        tokio::select! {
            Some(message) = rx.recv() => {
                if let Err(e) = write.send(message).await {
                    break Err(ProducerError::ConnectionLost(e.to_string()));
                }
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    trace!(bytes = text.len(), "Received WebSocket text frame");
                    if let Some(tick) = decode_tick(&session, &registry, &text) {
                        if !session.emit(tick) {
                            break Ok(());
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = write.send(Message::Pong(data)).await {
                        break Err(ProducerError::ConnectionLost(e.to_string()));
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    info!(producer = %session.producer_id(), frame = ?frame, "WebSocket closed by server");
                    break Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => break Err(ProducerError::ConnectionLost(e.to_string())),
                None => break Ok(()),
            },
        }
    };

    let mut slot = outbound.lock();
    if slot.as_ref().is_some_and(|(generation, _)| *generation == session.generation()) {
        *slot = None;
    }
    result
}

fn decode_tick(session: &Session, registry: &InstrumentRegistry, text: &str) -> Option<Tick> {
    let payload: serde_json::Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            warn!(producer = %session.producer_id(), error = %e, "Failed to parse message");
            return None;
        }
    };
    let header = match InboundTick::deserialize(&payload) {
        Ok(header) => header,
        Err(e) => {
            warn!(producer = %session.producer_id(), error = %e, "Message is not a tick");
            return None;
        }
    };
    match registry.parse(&header.instrument) {
        Ok(instrument) => Some(Tick::new(
            session.producer_id(),
            instrument,
            header.timestamp,
            payload,
        )),
        Err(e) => {
            warn!(producer = %session.producer_id(), error = %e, "Tick for unknown instrument");
            None
        }
    }
}

#[async_trait]
impl MarketDataProducer for WebSocketProducer {
    fn id(&self) -> &str {
        self.state.id()
    }

    fn producer_type(&self) -> &str {
        TYPE_NAME
    }

    fn config(&self) -> &ProducerConfig {
        self.state.config()
    }

    fn status(&self) -> ProducerStatus {
        self.state.status()
    }

    fn status_changed_at(&self) -> DateTime<Utc> {
        self.state.status_changed_at()
    }

    fn connect(&self) {
        let params = self.params.clone();
        let registry = Arc::clone(&self.registry);
        let outbound = Arc::clone(&self.outbound);
        self.state
            .connect_with(move |session| run_session(session, params, registry, outbound));
    }

    fn close(&self) {
        self.state.close();
        let current = self.state.generation();
        let mut slot = self.outbound.lock();
        if slot.as_ref().is_some_and(|(generation, _)| *generation != current) {
            *slot = None;
        }
    }

    fn can_subscribe(&self, instrument: &InstrumentId) -> bool {
        serves_exchange(&self.params.exchanges, instrument)
    }

    async fn subscribe(&self, instruments: &[InstrumentId]) -> Result<(), ProducerError> {
        let keys: Vec<&str> = instruments
            .iter()
            .filter(|i| self.can_subscribe(i))
            .map(InstrumentId::unique_key)
            .collect();
        if keys.is_empty() {
            return Ok(());
        }
        let sender = self
            .outbound
            .lock()
            .as_ref()
            .map(|(_, tx)| tx.clone())
            .ok_or_else(|| ProducerError::SubscribeFailed("not connected".into()))?;

        for batch in keys.chunks(self.params.subscribe_batch) {
            let request = SubscribeRequest {
                op: "subscribe",
                instruments: batch.to_vec(),
            };
            let json = serde_json::to_string(&request)
                .map_err(|e| ProducerError::SubscribeFailed(e.to_string()))?;
            sender
                .send(Message::Text(json))
                .map_err(|_| ProducerError::SubscribeFailed("session closed".into()))?;
        }
        debug!(producer = %self.state.id(), count = keys.len(), "Subscribe requests queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{wait_until, RecordingSink};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;
    use tokio_tungstenite::accept_async;

    /// Accepts one client, forwards every text frame it sends to `seen`
    /// and pushes `replies` once the first subscribe arrives.
    async fn spawn_server(
        replies: Vec<String>,
    ) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let mut replies = Some(replies);
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    let _ = seen_tx.send(text);
                    for reply in replies.take().unwrap_or_default() {
                        ws.send(Message::Text(reply)).await.unwrap();
                    }
                }
            }
        });
        (format!("ws://{addr}"), seen_rx)
    }

    fn config(url: &str) -> ProducerConfig {
        ProducerConfig::new("ws", TYPE_NAME)
            .with_parameter("url", url)
            .with_parameter("subscribe_batch", 1)
    }

    #[tokio::test]
    async fn subscribes_and_receives_ticks() {
        let (url, mut seen) = spawn_server(vec![
            r#"{"instrument":"SHFE.ru1901","timestamp":1540429200000,"last_price":12650.0}"#.into(),
            "not json".into(),
            r#"{"instrument":"NOPE.x","timestamp":1}"#.into(),
            r#"{"instrument":"ru1901","timestamp":1540429200500}"#.into(),
        ])
        .await;
        let registry = Arc::new(InstrumentRegistry::new());
        let ru = registry.intern_exchange(Exchange::SHFE, "ru1901", None);
        let stock = registry.intern_exchange(Exchange::SSE, "600000", None);
        let sink = Arc::new(RecordingSink::default());
        let producer = WebSocketProducer::new(config(&url), sink.clone(), registry).unwrap();

        producer.connect();
        wait_until(Duration::from_secs(2), || {
            producer.status() == ProducerStatus::Connected
        })
        .await;
        producer.subscribe(&[ru.clone(), stock]).await.unwrap();

        let first = seen.recv().await.unwrap();
        let second = seen.recv().await.unwrap();
        assert_eq!(first, r#"{"op":"subscribe","instruments":["SHFE.ru1901"]}"#);
        assert_eq!(second, r#"{"op":"subscribe","instruments":["SSE.600000"]}"#);

        wait_until(Duration::from_secs(2), || sink.ticks().len() == 2).await;
        let ticks = sink.ticks();
        assert_eq!(ticks[0].instrument, ru);
        assert_eq!(ticks[0].payload["last_price"], 12650.0);
        assert_eq!(ticks[1].timestamp, 1540429200500);

        producer.close();
        assert_eq!(producer.status(), ProducerStatus::Disconnected);
    }

    #[tokio::test]
    async fn subscribe_without_session_fails() {
        let registry = Arc::new(InstrumentRegistry::new());
        let ru = registry.intern_exchange(Exchange::SHFE, "ru1901", None);
        let sink = Arc::new(RecordingSink::default());
        let producer =
            WebSocketProducer::new(config("ws://127.0.0.1:1"), sink, registry).unwrap();

        assert!(matches!(
            producer.subscribe(&[ru]).await,
            Err(ProducerError::SubscribeFailed(_))
        ));
    }

    #[tokio::test]
    async fn invalid_url_is_a_rejection() {
        let registry = Arc::new(InstrumentRegistry::new());
        let sink = Arc::new(RecordingSink::default());
        let producer = WebSocketProducer::new(config("not a url"), sink, registry).unwrap();

        producer.connect();
        wait_until(Duration::from_secs(1), || {
            producer.status() == ProducerStatus::ConnectFailed
        })
        .await;
    }

    #[tokio::test]
    async fn server_going_away_disconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            ws.close(None).await.unwrap();
        });
        let registry = Arc::new(InstrumentRegistry::new());
        let sink = Arc::new(RecordingSink::default());
        let producer =
            WebSocketProducer::new(config(&format!("ws://{addr}")), sink.clone(), registry)
                .unwrap();

        producer.connect();
        wait_until(Duration::from_secs(2), || {
            sink.transitions().last()
                == Some(&(ProducerStatus::Connected, ProducerStatus::Disconnected))
        })
        .await;
    }

    #[tokio::test]
    async fn close_during_handshake_leaves_no_session() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (accepted_tx, accepted_rx) = oneshot::channel::<()>();
        let (release_tx, release_rx) = oneshot::channel::<()>();
        let (done_tx, done_rx) = oneshot::channel::<bool>();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let _ = accepted_tx.send(());
            let _ = release_rx.await;
            let still_open = match accept_async(stream).await {
                Ok(mut ws) => matches!(ws.next().await, Some(Ok(_))),
                Err(_) => false,
            };
            let _ = done_tx.send(still_open);
        });
        let registry = Arc::new(InstrumentRegistry::new());
        let ru = registry.intern_exchange(Exchange::SHFE, "ru1901", None);
        let sink = Arc::new(RecordingSink::default());
        let producer =
            WebSocketProducer::new(config(&format!("ws://{addr}")), sink, registry).unwrap();

        producer.connect();
        accepted_rx.await.unwrap();
        assert_eq!(producer.status(), ProducerStatus::Connecting);
        producer.close();
        release_tx.send(()).unwrap();

        assert!(!done_rx.await.unwrap());
        assert!(producer.outbound.lock().is_none());
        assert!(matches!(
            producer.subscribe(&[ru]).await,
            Err(ProducerError::SubscribeFailed(_))
        ));
        assert_eq!(producer.status(), ProducerStatus::Disconnected);
    }

    #[test]
    fn missing_url_fails_construction() {
        let registry = Arc::new(InstrumentRegistry::new());
        let sink = Arc::new(RecordingSink::default());
        let config = ProducerConfig::new("ws", TYPE_NAME).with_parameter("url", "");
        assert!(matches!(
            WebSocketProducer::new(config, sink, registry),
            Err(ProducerError::ConstructionFailed { .. })
        ));
    }
}
