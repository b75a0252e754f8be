//! WebSocket transport over tokio-tungstenite.
//!
//! One background task per transport:
//! - handshake with `Authorization: Bearer <token>`
//! - pump outbound frames from a bounded channel, decode inbound text frames
//! - on connectivity loss, retry with a fixed delay up to a bounded number
//!   of attempts, then report [`TransportEvent::Failed`]
//!
//! Frames queued while the socket is down are discarded, never replayed.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::{
    CloseReason, ConnectFailure, Connector, EventSink, Transport, TransportError, TransportEvent,
};
use crate::config::SessionConfig;
use crate::protocol::{ClientIntent, RoomId, ServerEvent};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connector opening one WebSocket per room visit.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
    reconnect_attempts: u32,
    reconnect_delay: Duration,
    outbound_capacity: usize,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self::from_config(&SessionConfig {
            server_url: url.into(),
            ..SessionConfig::default()
        })
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            url: config.server_url.clone(),
            reconnect_attempts: config.reconnect_attempts,
            reconnect_delay: config.reconnect_delay(),
            outbound_capacity: config.outbound_capacity.max(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WsConnector {
    type Transport = WsTransport;

    fn open(&mut self, room: &RoomId, token: &str, events: EventSink) -> WsTransport {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(self.outbound_capacity);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        log::debug!("opening websocket to {} for room {room}", self.url);
        tokio::spawn(run_socket(
            self.clone(),
            token.to_string(),
            outgoing_rx,
            events,
            shutdown_rx,
        ));

        WsTransport {
            outgoing: outgoing_tx,
            shutdown: Some(shutdown_tx),
        }
    }
}

/// Handle on a running socket task.
#[derive(Debug)]
pub struct WsTransport {
    outgoing: mpsc::Sender<String>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Transport for WsTransport {
    fn send(&mut self, intent: &ClientIntent) -> Result<(), TransportError> {
        if self.shutdown.is_none() {
            return Err(TransportError::Closed);
        }
        let text = intent.encode()?;
        self.outgoing.try_send(text).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => TransportError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }

    fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.close();
    }
}

enum PumpExit {
    Shutdown,
    ServerClosed,
    Lost(String),
}

fn build_request(
    url: &str,
    token: &str,
) -> Result<tungstenite::handshake::client::Request, String> {
    let mut request = url.into_client_request().map_err(|e| e.to_string())?;
    let bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| e.to_string())?;
    request.headers_mut().insert(AUTHORIZATION, bearer);
    Ok(request)
}

fn is_auth_rejection(err: &tungstenite::Error) -> bool {
    match err {
        tungstenite::Error::Http(response) => matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ),
        _ => false,
    }
}

/// Drop whatever the session queued while no socket was writable.
fn discard_pending(outgoing: &mut mpsc::Receiver<String>) -> usize {
    let mut dropped = 0;
    while outgoing.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}

async fn run_socket(
    connector: WsConnector,
    token: String,
    mut outgoing: mpsc::Receiver<String>,
    events: EventSink,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut opened_once = false;
    let mut attempt = 0u32;

    loop {
        let request = match build_request(&connector.url, &token) {
            Ok(request) => request,
            Err(e) => {
                let _ = events.send(TransportEvent::Failed(format!("invalid request: {e}")));
                return;
            }
        };

        let connected = tokio::select! {
            _ = &mut shutdown => return,
            result = tokio_tungstenite::connect_async(request) => result,
        };

        match connected {
            Ok((socket, _)) => {
                attempt = 0;
                let dropped = discard_pending(&mut outgoing);
                if dropped > 0 {
                    log::debug!("discarded {dropped} frames queued while disconnected");
                }
                let event = if opened_once {
                    TransportEvent::Reopened
                } else {
                    TransportEvent::Open
                };
                opened_once = true;
                if events.send(event).is_err() {
                    return;
                }

                match pump(socket, &mut outgoing, &events, &mut shutdown).await {
                    PumpExit::Shutdown => return,
                    PumpExit::ServerClosed => {
                        let _ = events.send(TransportEvent::Closed(CloseReason::ServerInitiated));
                        return;
                    }
                    PumpExit::Lost(reason) => {
                        log::info!("websocket lost: {reason}");
                        discard_pending(&mut outgoing);
                        if events
                            .send(TransportEvent::Closed(CloseReason::Lost(reason)))
                            .is_err()
                        {
                            return;
                        }
                    }
                }
            }
            Err(e) if is_auth_rejection(&e) => {
                let _ = events.send(TransportEvent::ConnectFailed(ConnectFailure::Unauthorized));
                return;
            }
            Err(e) => {
                if events
                    .send(TransportEvent::ConnectFailed(ConnectFailure::Unreachable(
                        e.to_string(),
                    )))
                    .is_err()
                {
                    return;
                }
            }
        }

        attempt += 1;
        if attempt > connector.reconnect_attempts {
            let _ = events.send(TransportEvent::Failed(format!(
                "gave up after {} reconnect attempts",
                connector.reconnect_attempts
            )));
            return;
        }
        if events.send(TransportEvent::Reconnecting { attempt }).is_err() {
            return;
        }
        tokio::select! {
            _ = &mut shutdown => return,
            _ = tokio::time::sleep(connector.reconnect_delay) => {}
        }
    }
}

async fn pump(
    socket: Socket,
    outgoing: &mut mpsc::Receiver<String>,
    events: &EventSink,
    shutdown: &mut oneshot::Receiver<()>,
) -> PumpExit {
    let (mut writer, mut reader) = socket.split();

    loop {
        tokio::select! {
            _ = &mut *shutdown => {
                let _ = writer.send(Message::Close(None)).await;
                return PumpExit::Shutdown;
            }
            Some(text) = outgoing.recv() => {
                if let Err(e) = writer.send(Message::text(text)).await {
                    return PumpExit::Lost(e.to_string());
                }
            }
            frame = reader.next() => match frame {
                Some(Ok(Message::Text(text))) => match ServerEvent::decode(text.as_str()) {
                    Ok(event) => {
                        if events.send(TransportEvent::Frame(event)).is_err() {
                            let _ = writer.send(Message::Close(None)).await;
                            return PumpExit::Shutdown;
                        }
                    }
                    Err(e) => log::warn!("skipping undecodable frame: {e}"),
                },
                Some(Ok(Message::Close(_))) => return PumpExit::ServerClosed,
                Some(Ok(_)) => {}
                Some(Err(e)) => return PumpExit::Lost(e.to_string()),
                None => return PumpExit::Lost("stream ended".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_sets_bearer() {
        let request = build_request("ws://127.0.0.1:9/ws", "abc").unwrap();
        assert_eq!(
            request.headers().get(AUTHORIZATION).unwrap(),
            &HeaderValue::from_static("Bearer abc")
        );
    }

    #[test]
    fn test_build_request_rejects_bad_url() {
        assert!(build_request("not a url", "abc").is_err());
    }

    #[test]
    fn test_from_config() {
        let config = SessionConfig {
            server_url: "ws://rooms".into(),
            reconnect_attempts: 2,
            reconnect_delay_ms: 10,
            outbound_capacity: 0,
            ..SessionConfig::default()
        };
        let connector = WsConnector::from_config(&config);
        assert_eq!(connector.url(), "ws://rooms");
        assert_eq!(connector.reconnect_attempts, 2);
        assert_eq!(connector.reconnect_delay, Duration::from_millis(10));
        assert_eq!(connector.outbound_capacity, 1);
    }

    #[tokio::test]
    async fn test_unreachable_then_gives_up() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut connector = WsConnector::from_config(&SessionConfig {
            server_url: format!("ws://127.0.0.1:{port}"),
            reconnect_attempts: 1,
            reconnect_delay_ms: 5,
            ..SessionConfig::default()
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _transport = connector.open(&RoomId::new("r1"), "tok", tx);

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            seen.push(event);
        }

        assert!(matches!(
            seen[0],
            TransportEvent::ConnectFailed(ConnectFailure::Unreachable(_))
        ));
        assert_eq!(seen[1], TransportEvent::Reconnecting { attempt: 1 });
        assert!(matches!(
            seen[2],
            TransportEvent::ConnectFailed(ConnectFailure::Unreachable(_))
        ));
        assert!(matches!(seen.last(), Some(TransportEvent::Failed(_))));
    }
}
