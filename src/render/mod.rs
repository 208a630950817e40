//! Rendering sinks.
//!
//! A [`RenderSink`] receives the bytes of every printable the host opens.
//! One sink is shared by all connections of a manager; it is created lazily
//! from a factory the first time a printable is opened.
//!
//! | Sink | Behaviour |
//! |------|-----------|
//! | [`NullSink`] | Accepts and discards every document |
//! | [`DirectorySink`] | Writes each document into a directory |

// ============================================================================
// Submodules
// ============================================================================

/// Directory-backed sink.
pub mod directory;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::session::Printable;

// ============================================================================
// Re-exports
// ============================================================================

pub use directory::DirectorySink;

// ============================================================================
// Types
// ============================================================================

/// Factory producing the shared sink.
pub type SinkFactory = Box<dyn Fn() -> Arc<dyn RenderSink> + Send + Sync>;

// ============================================================================
// RenderSink
// ============================================================================

/// Destination for opened printables.
///
/// `open` should return as soon as the document is accepted. A sink that
/// takes longer than the connection's render timeout, or returns an error,
/// causes a [`PrintEvent::RenderFailed`](crate::PrintEvent::RenderFailed).
#[async_trait]
pub trait RenderSink: Send + Sync {
    /// Accepts a document for rendering.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be accepted.
    async fn open(&self, printable: Printable) -> Result<()>;
}

// ============================================================================
// NullSink
// ============================================================================

/// Sink that accepts and discards every document.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

#[async_trait]
impl RenderSink for NullSink {
    async fn open(&self, printable: Printable) -> Result<()> {
        debug!(
            job_id = %printable.job_id,
            file_length = printable.file_length(),
            "Discarding printable"
        );
        Ok(())
    }
}

// ============================================================================
// SharedSink
// ============================================================================

/// Lazily created, process-wide sink of a manager.
pub(crate) struct SharedSink {
    factory: SinkFactory,
    sink: OnceLock<Arc<dyn RenderSink>>,
}

impl SharedSink {
    /// Wraps a factory. The factory runs at most once.
    pub fn new(factory: impl Fn() -> Arc<dyn RenderSink> + Send + Sync + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            sink: OnceLock::new(),
        }
    }

    /// Returns the sink, creating it on first use.
    pub fn get(&self) -> Arc<dyn RenderSink> {
        Arc::clone(self.sink.get_or_init(|| {
            debug!("Creating render sink");
            (self.factory)()
        }))
    }

    /// Returns `true` if the sink was already created.
    #[inline]
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.sink.get().is_some()
    }
}

impl fmt::Debug for SharedSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSink")
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Tests
// ============================================================================
