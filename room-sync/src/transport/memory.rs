//! In-process transport.
//!
//! Every `open` call is recorded as a link. A link lets the caller play the
//! authority: inject [`TransportEvent`]s in order and read back the intents
//! the session sent.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Connector, EventSink, Transport, TransportError, TransportEvent};
use crate::protocol::{ClientIntent, RoomId, ServerEvent};

#[derive(Debug)]
struct LinkRecord {
    room: RoomId,
    token: String,
    events: EventSink,
    sent: Vec<ClientIntent>,
    closed: bool,
}

#[derive(Debug, Default)]
struct Hub {
    links: Vec<LinkRecord>,
}

fn lock(hub: &Mutex<Hub>) -> MutexGuard<'_, Hub> {
    hub.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Connector recording every link it opens.
#[derive(Debug, Clone, Default)]
pub struct MemoryConnector {
    hub: Arc<Mutex<Hub>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transports opened so far.
    pub fn open_count(&self) -> usize {
        lock(&self.hub).links.len()
    }

    pub fn link(&self, index: usize) -> Option<MemoryLink> {
        (index < self.open_count()).then(|| MemoryLink {
            hub: self.hub.clone(),
            index,
        })
    }

    /// Most recently opened link.
    pub fn latest(&self) -> Option<MemoryLink> {
        self.open_count().checked_sub(1).and_then(|i| self.link(i))
    }
}

impl Connector for MemoryConnector {
    type Transport = MemoryTransport;

    fn open(&mut self, room: &RoomId, token: &str, events: EventSink) -> MemoryTransport {
        let mut hub = lock(&self.hub);
        hub.links.push(LinkRecord {
            room: room.clone(),
            token: token.to_string(),
            events,
            sent: Vec::new(),
            closed: false,
        });
        MemoryTransport {
            hub: self.hub.clone(),
            index: hub.links.len() - 1,
        }
    }
}

/// Session-side half of a memory link.
#[derive(Debug)]
pub struct MemoryTransport {
    hub: Arc<Mutex<Hub>>,
    index: usize,
}

impl Transport for MemoryTransport {
    fn send(&mut self, intent: &ClientIntent) -> Result<(), TransportError> {
        let mut hub = lock(&self.hub);
        let link = &mut hub.links[self.index];
        if link.closed {
            return Err(TransportError::Closed);
        }
        link.sent.push(intent.clone());
        Ok(())
    }

    fn close(&mut self) {
        lock(&self.hub).links[self.index].closed = true;
    }
}

/// Authority-side handle of a memory link.
#[derive(Debug, Clone)]
pub struct MemoryLink {
    hub: Arc<Mutex<Hub>>,
    index: usize,
}

impl MemoryLink {
    /// Deliver a lifecycle event. Returns `false` once the session stopped listening.
    pub fn emit(&self, event: TransportEvent) -> bool {
        lock(&self.hub).links[self.index].events.send(event).is_ok()
    }

    /// Deliver an inbound protocol frame.
    pub fn deliver(&self, event: ServerEvent) -> bool {
        self.emit(TransportEvent::Frame(event))
    }

    /// Intents sent over this link, in order.
    pub fn sent(&self) -> Vec<ClientIntent> {
        lock(&self.hub).links[self.index].sent.clone()
    }

    /// Drain the intents sent so far.
    pub fn take_sent(&self) -> Vec<ClientIntent> {
        std::mem::take(&mut lock(&self.hub).links[self.index].sent)
    }

    pub fn token(&self) -> String {
        lock(&self.hub).links[self.index].token.clone()
    }

    pub fn room(&self) -> RoomId {
        lock(&self.hub).links[self.index].room.clone()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.hub).links[self.index].closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_open_records_link() {
        let mut connector = MemoryConnector::new();
        assert!(connector.latest().is_none());

        let (tx, _rx) = mpsc::unbounded_channel();
        let _transport = connector.open(&RoomId::new("r1"), "tok", tx);

        let link = connector.latest().unwrap();
        assert_eq!(connector.open_count(), 1);
        assert_eq!(link.token(), "tok");
        assert_eq!(link.room(), RoomId::new("r1"));
        assert!(!link.is_closed());
    }

    #[test]
    fn test_send_after_close_fails() {
        let mut connector = MemoryConnector::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut transport = connector.open(&RoomId::new("r1"), "tok", tx);

        transport.send(&ClientIntent::Join(RoomId::new("r1"))).unwrap();
        transport.close();
        transport.close();

        assert_eq!(
            transport.send(&ClientIntent::Join(RoomId::new("r1"))),
            Err(TransportError::Closed)
        );
        let link = connector.latest().unwrap();
        assert!(link.is_closed());
        assert_eq!(link.sent().len(), 1);
    }

    #[test]
    fn test_emit_reports_dropped_listener() {
        let mut connector = MemoryConnector::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let _transport = connector.open(&RoomId::new("r1"), "tok", tx);
        let link = connector.latest().unwrap();

        assert!(link.emit(TransportEvent::Open));
        drop(rx);
        assert!(!link.emit(TransportEvent::Open));
    }
}
