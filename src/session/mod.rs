//! Per-connection print session.
//!
//! Everything that happens between a transport and the host's event stream
//! lives here: lifecycle state, chunk reassembly and event publication.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `connection` | Dispatch task and lifecycle state |
//! | `event` | [`PrintEvent`] and [`ErrorKind`] |
//! | `reassembly` | [`ChunkReassembler`] and [`Printable`] |
//! | `stream` | [`EventStream`] and its publisher |

// ============================================================================
// Submodules
// ============================================================================

/// Dispatch task and lifecycle state.
pub mod connection;

/// Events published on a connection's stream.
pub mod event;

/// Chunk reassembly engine.
pub mod reassembly;

/// Ordered per-connection event stream.
pub mod stream;

// ============================================================================
// Re-exports
// ============================================================================

pub use connection::ConnectionState;
pub use event::{ErrorKind, PrintEvent};
pub use reassembly::{ChunkOrdering, ChunkReassembler, Printable, ReassemblyConfig, Step};
pub use stream::{EventPublisher, EventStream, event_channel};
