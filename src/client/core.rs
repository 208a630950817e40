//! Connection manager.
//!
//! The [`ConnectionManager`] is the public command surface. It owns the
//! registry of live connections and the shared render sink; every
//! connection it creates runs as its own dispatch task.
//!
//! # Example
//!
//! ```ignore
//! use printlink::{ConnectOptions, ConnectTarget, ConnectionManager, PrintEvent};
//!
//! # async fn example() -> printlink::Result<()> {
//! let manager = ConnectionManager::new_default();
//! let mut events = manager.connect(ConnectTarget::new("print.local:9000"), ConnectOptions::default())?;
//! let id = events.connection_id();
//!
//! while let Some(event) = events.next_event().await {
//!     if let PrintEvent::JobAvailable { job_id, .. } = event {
//!         manager.open_printable(id, job_id);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, JobId};
use crate::render::SharedSink;
use crate::session::connection::{CloseHook, Connection, ConnectionHandle, Directive};
use crate::session::{ConnectionState, EventStream, PrintEvent, event_channel};
use crate::transport::Connector;

use super::builder::ConnectionManagerBuilder;
use super::options::{ConnectOptions, ConnectTarget};

// ============================================================================
// Types
// ============================================================================

/// Registry of live connections.
type Registry = RwLock<FxHashMap<ConnectionId, ConnectionHandle>>;

/// Internal shared state for the manager.
pub(crate) struct ManagerInner {
    /// Opens transports for new connections.
    connector: Arc<dyn Connector>,
    /// Render sink shared by all connections.
    sink: Arc<SharedSink>,
    /// Live connections.
    connections: Arc<Registry>,
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Registry and command surface for print connections.
///
/// Cheap to clone; clones share the same registry. Dropping the last clone
/// tears down every connection it still tracks.
#[derive(Clone)]
pub struct ConnectionManager {
    /// Shared inner state.
    pub(crate) inner: Arc<ManagerInner>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connection_count", &self.connection_count())
            .field("sink", &self.inner.sink)
            .finish_non_exhaustive()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new_default()
    }
}

// ============================================================================
// ConnectionManager - Construction
// ============================================================================

impl ConnectionManager {
    /// Creates a configuration builder for the manager.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new()
    }

    /// Creates a manager with the WebSocket transport and a discarding sink.
    #[inline]
    #[must_use]
    pub fn new_default() -> Self {
        ConnectionManagerBuilder::new().build()
    }

    /// Creates a manager from its parts.
    pub(crate) fn new(connector: Arc<dyn Connector>, sink: SharedSink) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                connector,
                sink: Arc::new(sink),
                connections: Arc::new(RwLock::new(FxHashMap::default())),
            }),
        }
    }
}

// ============================================================================
// ConnectionManager - Public API
// ============================================================================

impl ConnectionManager {
    /// Opens a new connection and returns its event stream.
    ///
    /// The first event is always [`PrintEvent::Connecting`]. Reachability
    /// problems do not fail this call; they are published as
    /// [`PrintEvent::Error`] with [`ErrorKind::Connection`](crate::ErrorKind::Connection).
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the target or options are invalid, or if
    ///   called outside a tokio runtime
    /// - [`Error::Url`] if the host does not form a valid URL
    /// - Any error the connector returns when creating the transport
    pub fn connect(&self, target: ConnectTarget, options: ConnectOptions) -> Result<EventStream> {
        options.validate()?;
        let url = target.endpoint_url()?;

        let runtime = Handle::try_current()
            .map_err(|_| Error::config("connect must be called within a tokio runtime"))?;

        let id = ConnectionId::next();
        let (publisher, events) = event_channel(id);
        publisher.publish(PrintEvent::Connecting);

        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        let transport = self
            .inner
            .connector
            .open(options.endpoint(url.clone()), notify_tx)?;

        let (connection, handle) = Connection::new(
            id,
            transport,
            notify_rx,
            publisher,
            Arc::clone(&self.inner.sink),
            options.connection_settings(),
            self.close_hook(),
        );

        self.inner.connections.write().insert(id, handle);
        runtime.spawn(connection.run());

        info!(
            connection_id = %id,
            host = url.host_str().unwrap_or_default(),
            "Print connection created"
        );

        Ok(events)
    }

    /// Closes a connection. Idempotent; unknown ids are ignored.
    ///
    /// Buffered jobs and unopened printables are discarded, a final
    /// [`PrintEvent::Disconnected`] is published if needed and the stream ends.
    pub fn disconnect(&self, id: ConnectionId) {
        let handle = self.inner.connections.write().remove(&id);

        match handle {
            Some(handle) => {
                debug!(connection_id = %id, "Disconnecting");
                handle.send(Directive::Disconnect);
            }
            None => debug!(connection_id = %id, "Disconnect for unknown connection"),
        }
    }

    /// Asks the server to start sending print jobs.
    ///
    /// The outcome is published as [`PrintEvent::PrintEnabled`] or an error event.
    pub fn enable_printing(&self, id: ConnectionId) {
        self.dispatch(id, Directive::EnablePrinting);
    }

    /// Asks the server to stop sending print jobs.
    ///
    /// The outcome is published as [`PrintEvent::PrintDisabled`] or an error event.
    pub fn disable_printing(&self, id: ConnectionId) {
        self.dispatch(id, Directive::DisablePrinting);
    }

    /// Acknowledges a completed job and hands it to the render sink.
    ///
    /// Does nothing if the job has no printable on that connection, for
    /// example because it was already opened.
    pub fn open_printable(&self, id: ConnectionId, job_id: JobId) {
        self.dispatch(id, Directive::OpenPrintable(job_id));
    }

    /// Returns the state of a live connection.
    #[must_use]
    pub fn state(&self, id: ConnectionId) -> Option<ConnectionState> {
        self.inner.connections.read().get(&id).map(ConnectionHandle::state)
    }

    /// Returns the number of live connections.
    #[inline]
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.connections.read().len()
    }

    /// Returns the ids of live connections, in ascending order.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.inner.connections.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Disconnects every live connection.
    pub fn shutdown(&self) {
        let handles: Vec<(ConnectionId, ConnectionHandle)> =
            self.inner.connections.write().drain().collect();

        info!(count = handles.len(), "Shutting down all print connections");

        for (id, handle) in handles {
            debug!(connection_id = %id, "Disconnecting");
            handle.send(Directive::Disconnect);
        }
    }
}

// ============================================================================
// ConnectionManager - Internal API
// ============================================================================

impl ConnectionManager {
    /// Posts a directive to a live connection.
    fn dispatch(&self, id: ConnectionId, directive: Directive) {
        let handle = self.inner.connections.read().get(&id).cloned();

        match handle {
            Some(handle) => {
                if !handle.send(directive) {
                    debug!(connection_id = %id, ?directive, "Connection task already ended");
                }
            }
            None => debug!(connection_id = %id, ?directive, "Directive for unknown connection"),
        }
    }

    /// Builds the hook removing a connection once its transport closed.
    fn close_hook(&self) -> CloseHook {
        let registry: Weak<Registry> = Arc::downgrade(&self.inner.connections);

        Box::new(move |id| {
            if let Some(registry) = registry.upgrade()
                && registry.write().remove(&id).is_some()
            {
                debug!(connection_id = %id, "Removed closed connection");
            }
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use crate::transport::ReconnectPolicy;

    fn offline_options() -> ConnectOptions {
        ConnectOptions::new()
            .with_reconnection(ReconnectPolicy::disabled())
            .with_connect_timeout(Duration::from_millis(200))
    }

    #[test]
    fn test_connect_outside_runtime() {
        let manager = ConnectionManager::new_default();
        let err = manager
            .connect(ConnectTarget::new("127.0.0.1:1"), ConnectOptions::default())
            .expect_err("no runtime");
        assert!(matches!(err, Error::Config { .. }));
        assert_eq!(manager.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_connect_rejects_empty_host() {
        let manager = ConnectionManager::new_default();
        let err = manager
            .connect(ConnectTarget::new(""), ConnectOptions::default())
            .expect_err("empty host");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_error_event() {
        let manager = ConnectionManager::new_default();
        let mut events = manager
            .connect(ConnectTarget::new("127.0.0.1:1"), offline_options())
            .expect("connect");
        let id = events.connection_id();

        assert_eq!(events.next_event().await, Some(PrintEvent::Connecting));
        assert_eq!(
            events.next_event().await.and_then(|e| e.error_kind()),
            Some(crate::ErrorKind::Connection)
        );
        assert_eq!(events.next_event().await, Some(PrintEvent::Disconnected));
        assert_eq!(events.next_event().await, None);
        assert_eq!(manager.state(id), None);
    }

    #[tokio::test]
    async fn test_unknown_ids_are_ignored() {
        let manager = ConnectionManager::new_default();
        let id = ConnectionId::next();

        manager.disconnect(id);
        manager.enable_printing(id);
        manager.open_printable(id, JobId::new(1));
        assert_eq!(manager.state(id), None);
    }
}
