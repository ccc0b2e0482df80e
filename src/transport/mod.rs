//! stream sources: the seam between the controller and the network.
//!
//! a transport opens one connection per query and pushes typed
//! [`StreamEvent`]s into the controller's inbox through an [`EventSink`].
//! every event is tagged with the [`ConnectionId`] it was opened under, so
//! the controller can drop anything a superseded connection still delivers.

use flume::Sender;
use std::fmt;
use url::Url;

use crate::error::StreamError;

#[cfg(not(target_arch = "wasm32"))]
pub mod native;
#[cfg(target_arch = "wasm32")]
pub mod wasm;

#[cfg(not(target_arch = "wasm32"))]
pub use native::NativeTransport;
#[cfg(target_arch = "wasm32")]
pub use wasm::BrowserTransport;

/// identifies one connection for the lifetime of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// what a stream source reports, in receipt order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Open,
    Fragment(String),
    Error(StreamError),
    End,
}

/// an event tagged with the connection that produced it.
#[derive(Debug)]
pub struct Inbound {
    pub id: ConnectionId,
    pub event: StreamEvent,
}

/// producer half of the inbox, bound to one connection.
#[derive(Clone)]
pub struct EventSink {
    id: ConnectionId,
    tx: Sender<Inbound>,
}

impl EventSink {
    pub(crate) fn new(id: ConnectionId, tx: Sender<Inbound>) -> Self {
        Self { id, tx }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// blocks while the inbox is full. returns false once the controller is gone.
    pub fn send(&self, event: StreamEvent) -> bool {
        self.tx.send(Inbound { id: self.id, event }).is_ok()
    }

    /// async variant for sources running on a single-threaded executor.
    pub async fn send_async(&self, event: StreamEvent) -> bool {
        self.tx.send_async(Inbound { id: self.id, event }).await.is_ok()
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSink").field("id", &self.id).finish()
    }
}

/// a live connection as seen by its owner. closing must be safe to repeat.
pub trait Connection: Send + Sync {
    fn close(&mut self);
}

/// opens server-push connections.
pub trait StreamTransport: Send + Sync + 'static {
    fn open(&self, url: &Url, sink: EventSink) -> Result<Box<dyn Connection>, StreamError>;
}

/// owning handle over a connection; the close reaches the transport once.
pub struct ConnectionHandle {
    id: ConnectionId,
    inner: Option<Box<dyn Connection>>,
}

impl ConnectionHandle {
    pub fn new(id: ConnectionId, connection: Box<dyn Connection>) -> Self {
        Self { id, inner: Some(connection) }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    pub fn close(&mut self) {
        if let Some(mut connection) = self.inner.take() {
            connection.close();
        }
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("open", &self.is_open())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingTransport;
    use super::*;

    fn open_handle(transport: &RecordingTransport) -> ConnectionHandle {
        let (tx, _rx) = flume::unbounded();
        let url = Url::parse("http://localhost:8080/chat/stream?query=x").unwrap();
        let id = ConnectionId(1);
        let conn = transport.open(&url, EventSink::new(id, tx)).unwrap();
        ConnectionHandle::new(id, conn)
    }

    #[test]
    fn close_is_idempotent() {
        let transport = RecordingTransport::default();
        let mut handle = open_handle(&transport);
        assert!(handle.is_open());

        handle.close();
        handle.close();
        handle.close();

        assert!(!handle.is_open());
        assert_eq!(transport.close_count(0), 1);
    }

    #[test]
    fn drop_closes_once() {
        let transport = RecordingTransport::default();
        let mut handle = open_handle(&transport);
        handle.close();
        drop(handle);
        assert_eq!(transport.close_count(0), 1);

        let handle = open_handle(&transport);
        drop(handle);
        assert_eq!(transport.close_count(1), 1);
    }

    #[test]
    fn sink_reports_disconnected_inbox() {
        let (tx, rx) = flume::unbounded();
        let sink = EventSink::new(ConnectionId(3), tx);
        assert!(sink.send(StreamEvent::Open));
        let got = rx.recv().unwrap();
        assert_eq!(got.id, ConnectionId(3));
        assert_eq!(got.event, StreamEvent::Open);

        drop(rx);
        assert!(!sink.send(StreamEvent::End));
    }
}
