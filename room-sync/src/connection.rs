//! Connection manager: one transport per room visit.
//!
//! ```text
//!  idle ──connect──► connecting ──Open──► connected ◄──Reopened── reconnecting
//!                        │                    │  └──Reconnecting──────►│
//!                        │ Unauthorized       │ kicked / server close  │ Failed
//!                        ▼ (one refresh)      ▼ / error / Failed       ▼
//!                     connecting ─────────► error ◄────────────────────┘
//! ```
//!
//! `error` is terminal. Outbound intents are only handed to the transport
//! while `connected`; anything else is dropped on the floor.
//!
//! [`ConnectionManager::next_event`] is cancel-safe: a token refresh in
//! flight is kept on the manager and resumed by the next call.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::{mpsc, watch};

use crate::auth::{AuthError, AuthProvider};
use crate::protocol::{ClientIntent, RoomId, ServerEvent};
use crate::transport::{CloseReason, ConnectFailure, Connector, Transport, TransportEvent};

/// Connection lifecycle as seen by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Reconnecting,
    Error,
}

impl ConnectionState {
    pub fn is_terminal(self) -> bool {
        self == ConnectionState::Error
    }
}

/// What the manager hands up after processing one transport event.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    StateChanged(ConnectionState),
    Server(ServerEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("no auth token available")]
    MissingToken,
    #[error("session is in a terminal error state")]
    Terminal,
}

pub struct ConnectionManager<C: Connector, A: AuthProvider> {
    room_id: RoomId,
    connector: C,
    auth: Arc<A>,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    transport: Option<C::Transport>,
    events: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    /// Set once a token refresh was spent on the current connection attempt.
    refresh_attempted: bool,
    pending_refresh: Option<BoxFuture<'static, Result<String, AuthError>>>,
}

impl<C: Connector, A: AuthProvider> ConnectionManager<C, A> {
    pub fn new(room_id: RoomId, connector: C, auth: Arc<A>) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            room_id,
            connector,
            auth,
            state: ConnectionState::Idle,
            state_tx,
            transport: None,
            events: None,
            refresh_attempted: false,
            pending_refresh: None,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Connection-state signal for observers.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn auth(&self) -> &Arc<A> {
        &self.auth
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Whether a token refresh is in flight.
    pub fn is_refreshing(&self) -> bool {
        self.pending_refresh.is_some()
    }

    /// Whether a transport is currently held.
    pub fn has_transport(&self) -> bool {
        self.transport.is_some()
    }

    /// Tear down any previous transport and open a new one with the current token.
    pub fn connect(&mut self) -> Result<(), ConnectionError> {
        if self.state.is_terminal() {
            return Err(ConnectionError::Terminal);
        }
        let Some(token) = self.auth.current_token() else {
            self.teardown();
            self.set_state(ConnectionState::Idle);
            return Err(ConnectionError::MissingToken);
        };
        self.refresh_attempted = false;
        self.open(&token);
        Ok(())
    }

    /// Drop the transport; the state returns to `idle` unless it is already `error`.
    pub fn disconnect(&mut self) {
        self.teardown();
        if !self.state.is_terminal() {
            self.set_state(ConnectionState::Idle);
        }
    }

    /// Transmit an intent if connected. Returns whether it was handed to the transport.
    pub fn send(&mut self, intent: &ClientIntent) -> bool {
        if self.state != ConnectionState::Connected {
            log::trace!("dropping {} while {:?}", intent.name(), self.state);
            return false;
        }
        let Some(transport) = self.transport.as_mut() else {
            return false;
        };
        match transport.send(intent) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("failed to send {}: {e}", intent.name());
                false
            }
        }
    }

    /// Wait for the next transport event worth reporting.
    ///
    /// Lifecycle events are handled here; protocol frames are passed up.
    /// Returns `None` once no transport is listening and no refresh is
    /// pending. Dropping the returned future loses no state.
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        loop {
            if let Some(refresh) = self.pending_refresh.as_mut() {
                let result = refresh.await;
                self.pending_refresh = None;
                if let Some(reported) = self.finish_refresh(result) {
                    return Some(reported);
                }
                continue;
            }
            let received = match self.events.as_mut() {
                Some(events) => events.recv().await,
                None => return None,
            };
            let Some(event) = received else {
                log::debug!("transport for room {} went away", self.room_id);
                self.events = None;
                return None;
            };
            if let Some(reported) = self.handle(event) {
                return Some(reported);
            }
        }
    }

    fn handle(&mut self, event: TransportEvent) -> Option<ConnectionEvent> {
        match event {
            TransportEvent::Open => {
                self.refresh_attempted = false;
                self.join();
                self.transition(ConnectionState::Connected)
            }
            TransportEvent::Reopened => {
                self.join();
                self.transition(ConnectionState::Connected)
            }
            TransportEvent::Reconnecting { attempt } => {
                log::debug!("room {} reconnect attempt {attempt}", self.room_id);
                self.transition(ConnectionState::Reconnecting)
            }
            TransportEvent::ConnectFailed(ConnectFailure::Unauthorized) => self.recover_auth(),
            TransportEvent::ConnectFailed(ConnectFailure::Unreachable(reason)) => {
                log::debug!("room {} unreachable: {reason}", self.room_id);
                None
            }
            TransportEvent::Closed(CloseReason::ServerInitiated) => {
                log::warn!("room {} closed by server", self.room_id);
                self.fail()
            }
            TransportEvent::Closed(CloseReason::Lost(reason)) => {
                log::debug!("room {} connection lost: {reason}", self.room_id);
                None
            }
            TransportEvent::Failed(reason) => {
                log::warn!("room {} transport failed: {reason}", self.room_id);
                self.fail()
            }
            TransportEvent::Frame(ServerEvent::Kicked(_)) => {
                log::warn!("kicked from room {}", self.room_id);
                self.fail()
            }
            TransportEvent::Frame(ServerEvent::Error(fault)) => {
                log::warn!(
                    "server error in room {} ({}): {}",
                    self.room_id,
                    fault.event,
                    fault.message
                );
                self.fail()
            }
            TransportEvent::Frame(event) => Some(ConnectionEvent::Server(event)),
        }
    }

    /// One refresh per connection attempt, then give up.
    ///
    /// The refresh itself runs inside `next_event`.
    fn recover_auth(&mut self) -> Option<ConnectionEvent> {
        if self.refresh_attempted {
            log::warn!("room {} rejected refreshed credentials", self.room_id);
            return self.fail();
        }
        self.refresh_attempted = true;
        self.teardown();

        let auth = Arc::clone(&self.auth);
        self.pending_refresh = Some(async move { auth.refresh_token().await }.boxed());
        None
    }

    fn finish_refresh(&mut self, result: Result<String, AuthError>) -> Option<ConnectionEvent> {
        match result {
            Ok(token) => {
                log::info!("token refreshed, reconnecting to room {}", self.room_id);
                self.open(&token);
                Some(ConnectionEvent::StateChanged(self.state))
            }
            Err(e) => {
                log::warn!("token refresh failed: {e}");
                self.fail()
            }
        }
    }

    fn open(&mut self, token: &str) {
        self.teardown();
        self.set_state(ConnectionState::Connecting);

        // Listener first, then the transport that feeds it.
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(rx);
        self.transport = Some(self.connector.open(&self.room_id, token, tx));
        log::info!("connecting to room {}", self.room_id);
    }

    fn join(&mut self) {
        let intent = ClientIntent::Join(self.room_id.clone());
        if let Some(transport) = self.transport.as_mut() {
            if let Err(e) = transport.send(&intent) {
                log::warn!("failed to join room {}: {e}", self.room_id);
            }
        }
    }

    fn fail(&mut self) -> Option<ConnectionEvent> {
        self.teardown();
        self.transition(ConnectionState::Error)
    }

    /// Unsubscribe, then close. Idempotent.
    fn teardown(&mut self) {
        self.pending_refresh = None;
        self.events = None;
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
    }

    fn transition(&mut self, next: ConnectionState) -> Option<ConnectionEvent> {
        if self.set_state(next) {
            Some(ConnectionEvent::StateChanged(next))
        } else {
            None
        }
    }

    fn set_state(&mut self, next: ConnectionState) -> bool {
        if self.state == next {
            return false;
        }
        log::debug!("room {}: {:?} -> {:?}", self.room_id, self.state, next);
        self.state = next;
        self.state_tx.send_replace(next);
        true
    }
}

impl<C: Connector, A: AuthProvider> Drop for ConnectionManager<C, A> {
    fn drop(&mut self) {
        self.teardown();
    }
}
