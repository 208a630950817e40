//! WebSocket protocol message types.
//!
//! This module defines the JSON message format spoken by the bundled
//! WebSocket transport. Each message is one JSON text frame; there is no
//! socket.io packet or namespace framing, so the bundled transport does not
//! interoperate with a socket.io print server. Such servers need an adapter
//! [`Connector`](crate::transport::Connector) that maps their events onto
//! [`Notification`](crate::transport::Notification)s.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Client → Server | Command (`enable_print`, ...) |
//! | `Response` | Server → Client | Command acknowledgement |
//! | `Event` | Server → Client | Job data and notifications |
//! | `EventReply` | Client → Server | Chunk acknowledgement |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `chunk` | Print job chunk |
//! | `command` | Client command definitions |
//! | `event` | Event and EventReply types |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Print job chunk wire type.
pub mod chunk;

/// Client command definitions.
pub mod command;

/// Event message types.
pub mod event;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use chunk::Chunk;
pub use command::Command;
pub use event::{Event, EventReply, ParsedEvent};
pub use request::{Request, Response, ResponseType};
