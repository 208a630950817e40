//! Transport layer.
//!
//! The print session logic never touches sockets directly. It consumes
//! [`Notification`]s pushed by a [`Transport`] and sends [`Command`]s back
//! through it. Hosts can plug their own transport through [`Connector`];
//! the crate bundles a WebSocket implementation.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   Notification (mpsc)   ┌──────────────────┐
//! │  Transport task  │ ──────────────────────► │  Connection task │
//! │  (WebSocket I/O) │                         │  (reassembly)    │
//! │                  │ ◄────────────────────── │                  │
//! └──────────────────┘   Command / Ack         └──────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | WebSocket event loop and request correlation |
//! | `connector` | WebSocket dialing and [`Connector`] implementation |
//! | `reconnect` | Reconnection backoff policy |

// ============================================================================
// Submodules
// ============================================================================

/// WebSocket event loop and request correlation.
pub mod connection;

/// WebSocket dialing.
pub mod connector;

/// Reconnection backoff policy.
pub mod reconnect;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use crate::error::Result;
use crate::identifiers::JobId;
use crate::protocol::{Chunk, Command};

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::WebSocketTransport;
pub use connector::WebSocketConnector;
pub use reconnect::ReconnectPolicy;

// ============================================================================
// Types
// ============================================================================

/// Channel the transport pushes notifications into.
pub type NotificationSender = mpsc::UnboundedSender<Notification>;

// ============================================================================
// Ack
// ============================================================================

/// One-shot acknowledgement callback for a received chunk.
///
/// Consumed by [`Ack::send`], so a chunk can be acknowledged at most once.
pub struct Ack {
    reply: Box<dyn FnOnce(bool) + Send>,
}

impl Ack {
    /// Wraps a reply callback.
    #[inline]
    #[must_use]
    pub fn new(reply: impl FnOnce(bool) + Send + 'static) -> Self {
        Self {
            reply: Box::new(reply),
        }
    }

    /// An acknowledgement that goes nowhere.
    #[inline]
    #[must_use]
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    /// Sends the positive or negative acknowledgement.
    #[inline]
    pub fn send(self, accepted: bool) {
        (self.reply)(accepted);
    }
}

impl fmt::Debug for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ack").finish_non_exhaustive()
    }
}

// ============================================================================
// Notification
// ============================================================================

/// Raw notification surfaced by a transport.
#[derive(Debug)]
pub enum Notification {
    /// Session established (also after a reconnect).
    Connected,

    /// Session could not be established.
    ConnectError(String),

    /// Session lost. The transport may still reconnect.
    Disconnected,

    /// Generic transport or server error.
    Error(String),

    /// Server-signalled application exception.
    Exception(String),

    /// Server reports a job as handled.
    JobHandled(JobId),

    /// Server started transferring a job.
    TransferStarted(JobId),

    /// Server stopped transferring a job.
    TransferTerminated(JobId),

    /// A job chunk, to be acknowledged exactly once.
    Chunk {
        /// The received chunk.
        chunk: Chunk,
        /// Acknowledgement back to the server.
        ack: Ack,
    },

    /// Transport stopped for good. No notification follows.
    Closed,
}

// ============================================================================
// Endpoint
// ============================================================================

/// Everything a connector needs to open a transport.
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Fully resolved server URL (path and token query included).
    pub url: Url,
    /// Reconnection policy, passed through unmodified.
    pub reconnection: ReconnectPolicy,
    /// Timeout for a single connection attempt.
    pub connect_timeout: Duration,
}

// ============================================================================
// Traits
// ============================================================================

/// Command surface of an open transport.
///
/// Implementations must be cheap to call from async tasks: `notify` and
/// `shutdown` never block, `request` only suspends its caller.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a command that expects a boolean acknowledgement.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestTimeout`](crate::Error::RequestTimeout) if no ack arrives in time
    /// - [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the transport is gone
    async fn request(&self, command: Command, timeout: Duration) -> Result<bool>;

    /// Sends a fire-and-forget command.
    ///
    /// Implementations that reconnect should hold the command until the
    /// next session instead of dropping it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if the transport is gone.
    fn notify(&self, command: Command) -> Result<()>;

    /// Tears the transport down. Idempotent.
    fn shutdown(&self);
}

/// Opens transports for new connections.
pub trait Connector: Send + Sync {
    /// Opens a transport towards `endpoint`.
    ///
    /// Must not wait for the network: reachability problems are reported
    /// later as [`Notification::ConnectError`].
    ///
    /// # Errors
    ///
    /// Returns an error only if the transport cannot be created at all.
    fn open(
        &self,
        endpoint: Endpoint,
        notifications: NotificationSender,
    ) -> Result<Arc<dyn Transport>>;
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_ack_invokes_callback_once() {
        let accepted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&accepted);
        let ack = Ack::new(move |ok| flag.store(ok, Ordering::SeqCst));

        ack.send(true);
        assert!(accepted.load(Ordering::SeqCst));
    }

    #[test]
    fn test_noop_ack() {
        Ack::noop().send(false);
    }

    #[test]
    fn test_ack_debug() {
        assert!(format!("{:?}", Ack::noop()).starts_with("Ack"));
    }
}
