//! Builder pattern for manager configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use printlink::{ConnectionManager, DirectorySink};
//!
//! let manager = ConnectionManager::builder()
//!     .render_sink(|| Arc::new(DirectorySink::new("/var/spool/printlink")))
//!     .build();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::render::{NullSink, RenderSink, SharedSink, SinkFactory};
use crate::transport::{Connector, WebSocketConnector};

use super::core::ConnectionManager;

// ============================================================================
// ConnectionManagerBuilder
// ============================================================================

/// Builder for configuring a [`ConnectionManager`].
///
/// Use [`ConnectionManager::builder()`] to create a new builder.
#[derive(Default)]
pub struct ConnectionManagerBuilder {
    /// Transport factory.
    connector: Option<Arc<dyn Connector>>,
    /// Render sink factory.
    sink: Option<SinkFactory>,
}

impl fmt::Debug for ConnectionManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManagerBuilder")
            .field("custom_connector", &self.connector.is_some())
            .field("custom_sink", &self.sink.is_some())
            .finish()
    }
}

// ============================================================================
// ConnectionManagerBuilder Implementation
// ============================================================================

impl ConnectionManagerBuilder {
    /// Creates a builder using the WebSocket transport and a discarding sink.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the connector used to open transports.
    #[inline]
    #[must_use]
    pub fn connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(connector));
        self
    }

    /// Sets the render sink factory.
    ///
    /// The factory is called once, the first time a printable is opened.
    #[inline]
    #[must_use]
    pub fn render_sink(
        mut self,
        factory: impl Fn() -> Arc<dyn RenderSink> + Send + Sync + 'static,
    ) -> Self {
        self.sink = Some(Box::new(factory));
        self
    }

    /// Builds the manager.
    #[must_use]
    pub fn build(self) -> ConnectionManager {
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(WebSocketConnector::new()));

        let sink = match self.sink {
            Some(factory) => SharedSink::new(factory),
            None => SharedSink::new(|| Arc::new(NullSink) as Arc<dyn RenderSink>),
        };

        ConnectionManager::new(connector, sink)
    }
}

// ============================================================================
// Tests
// ============================================================================
