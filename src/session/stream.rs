//! Ordered per-connection event stream.
//!
//! Each connection owns exactly one [`EventPublisher`]; the host holds the
//! matching [`EventStream`]. Events are delivered in publication order and
//! are never replayed. The stream ends once the publisher is dropped.

// ============================================================================
// Imports
// ============================================================================

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tracing::trace;

use crate::identifiers::ConnectionId;

use super::PrintEvent;

// ============================================================================
// Constructor
// ============================================================================

/// Creates a linked publisher/stream pair for one connection.
#[must_use]
pub fn event_channel(connection_id: ConnectionId) -> (EventPublisher, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        EventPublisher { connection_id, tx },
        EventStream { connection_id, rx },
    )
}

// ============================================================================
// EventPublisher
// ============================================================================

/// Producing half of a connection's event stream.
#[derive(Debug)]
pub struct EventPublisher {
    connection_id: ConnectionId,
    tx: mpsc::UnboundedSender<PrintEvent>,
}

impl EventPublisher {
    /// Publishes an event.
    ///
    /// Events published after the host dropped its stream are discarded.
    pub fn publish(&self, event: PrintEvent) {
        trace!(connection_id = %self.connection_id, ?event, "Publishing event");
        let _ = self.tx.send(event);
    }

    /// Returns `true` if the host dropped its stream.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// EventStream
// ============================================================================

/// Consuming half of a connection's event stream.
///
/// Implements [`Stream`], so it composes with `futures_util::StreamExt`.
#[derive(Debug)]
pub struct EventStream {
    connection_id: ConnectionId,
    rx: mpsc::UnboundedReceiver<PrintEvent>,
}

impl EventStream {
    /// Returns the connection this stream belongs to.
    #[inline]
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Waits for the next event. Returns `None` once the stream ended.
    pub async fn next_event(&mut self) -> Option<PrintEvent> {
        self.rx.recv().await
    }

    /// Returns the next event if one is already queued.
    #[must_use]
    pub fn try_next_event(&mut self) -> Option<PrintEvent> {
        self.rx.try_recv().ok()
    }
}

impl Stream for EventStream {
    type Item = PrintEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use futures_util::StreamExt;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[tokio::test]
    async fn test_events_arrive_in_order() {
        let (publisher, mut stream) = event_channel(ConnectionId::next());

        publisher.publish(PrintEvent::Connecting);
        publisher.publish(PrintEvent::Connected);
        publisher.publish(PrintEvent::PrintEnabled);

        assert_eq!(stream.next_event().await, Some(PrintEvent::Connecting));
        assert_eq!(stream.next().await, Some(PrintEvent::Connected));
        assert_eq!(stream.try_next_event(), Some(PrintEvent::PrintEnabled));
        assert_eq!(stream.try_next_event(), None);
    }

    #[test]
    fn test_stream_ends_when_publisher_dropped() {
        let (publisher, stream) = event_channel(ConnectionId::next());
        let mut stream = task::spawn(stream);

        assert_pending!(stream.poll_next());

        publisher.publish(PrintEvent::Disconnected);
        assert!(stream.is_woken());
        assert_ready_eq!(stream.poll_next(), Some(PrintEvent::Disconnected));

        drop(publisher);
        assert_ready_eq!(stream.poll_next(), None);
    }

    #[test]
    fn test_publish_after_stream_dropped() {
        let (publisher, stream) = event_channel(ConnectionId::next());
        drop(stream);

        assert!(publisher.is_closed());
        publisher.publish(PrintEvent::Connected);
    }

    #[test]
    fn test_connection_id() {
        let id = ConnectionId::next();
        let (_publisher, stream) = event_channel(id);
        assert_eq!(stream.connection_id(), id);
    }
}
