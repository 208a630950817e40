//! printlink - Client-side print job receiver.
//!
//! This library receives print jobs streamed by a print server as ordered
//! chunks over a persistent connection, reassembles and validates each job,
//! and hands completed documents to a rendering sink.
//!
//! # Architecture
//!
//! - **Transport**: WebSocket session to the server (pluggable via [`Connector`])
//! - **Connection**: one dispatch task per connection, owning its job buffer
//! - **Events**: every outcome is published on the connection's [`EventStream`]
//!
//! Key design principles:
//!
//! - Each connection is independent; job ids are scoped to their connection
//! - A job becomes a [`Printable`] only after its length checks pass
//! - Failures after `connect` are events, never panics or late `Err`s
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use printlink::{
//!     ConnectOptions, ConnectTarget, ConnectionManager, DirectorySink, PrintEvent, RenderSink,
//!     Result,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = ConnectionManager::builder()
//!         .render_sink(|| Arc::new(DirectorySink::new("./spool")) as Arc<dyn RenderSink>)
//!         .build();
//!
//!     let target = ConnectTarget::new("print.local:9000").with_token("secret");
//!     let mut events = manager.connect(target, ConnectOptions::default())?;
//!     let id = events.connection_id();
//!
//!     while let Some(event) = events.next_event().await {
//!         match event {
//!             PrintEvent::Connected => manager.enable_printing(id),
//!             PrintEvent::JobAvailable { job_id, .. } => manager.open_printable(id, job_id),
//!             other => println!("{other:?}"),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | [`ConnectionManager`] and its configuration |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Wire message types |
//! | [`render`] | Rendering sinks |
//! | [`session`] | Per-connection state, reassembly and events |
//! | [`transport`] | Transport seam and WebSocket implementation |

// ============================================================================
// Modules
// ============================================================================

/// Connection manager and configuration.
///
/// Use [`ConnectionManager::builder()`] to create a configured manager.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
///
/// Newtype wrappers prevent mixing incompatible IDs at compile time.
pub mod identifiers;

/// Wire message types.
///
/// Chunks, commands, requests, responses and server events.
pub mod protocol;

/// Rendering sinks.
pub mod render;

/// Per-connection session logic.
///
/// Lifecycle state, chunk reassembly and the ordered event stream.
pub mod session;

/// Transport layer.
///
/// The [`Transport`] seam and the bundled WebSocket implementation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{ConnectOptions, ConnectTarget, ConnectionManager, ConnectionManagerBuilder};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, JobId, RequestId};

// Protocol types
pub use protocol::{Chunk, Command};

// Render types
pub use render::{DirectorySink, NullSink, RenderSink};

// Session types
pub use session::{
    ChunkOrdering, ConnectionState, ErrorKind, EventStream, PrintEvent, Printable,
    ReassemblyConfig,
};

// Transport types
pub use transport::{
    Ack, Connector, Endpoint, Notification, NotificationSender, ReconnectPolicy, Transport,
    WebSocketConnector,
};
