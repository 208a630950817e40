//! Request and Response message types.
//!
//! Commands are sent as requests carrying a UUID. Commands that expect an
//! acknowledgement are answered by a response carrying the same id.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::RequestId;

use super::Command;

// ============================================================================
// Request
// ============================================================================

/// A command request from client to server.
///
/// # Format
///
/// ```json
/// {
///   "id": "uuid",
///   "method": "enable_print"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct Request {
    /// Unique identifier for request/response correlation.
    pub id: RequestId,

    /// Command with method and params.
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Creates a new request with auto-generated ID.
    #[inline]
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            id: RequestId::generate(),
            command,
        }
    }
}

// ============================================================================
// Response
// ============================================================================

/// A response from server to client.
///
/// # Format
///
/// Success:
/// ```json
/// { "id": "uuid", "type": "success", "result": true }
/// ```
///
/// Error:
/// ```json
/// { "id": "uuid", "type": "error", "message": "printing locked" }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// Matches the request `id`.
    pub id: RequestId,

    /// Response type.
    #[serde(rename = "type")]
    pub response_type: ResponseType,

    /// Result data (if success).
    #[serde(default)]
    pub result: Option<Value>,

    /// Error message (if error).
    #[serde(default)]
    pub message: Option<String>,
}

impl Response {
    /// Returns `true` if this is a success response.
    #[inline]
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.response_type == ResponseType::Success
    }

    /// Interprets the response as a boolean acknowledgement.
    ///
    /// A success response acknowledges unless its result is literally
    /// `false`. Error responses never acknowledge.
    #[must_use]
    pub fn ack(&self) -> bool {
        match self.response_type {
            ResponseType::Success => self
                .result
                .as_ref()
                .and_then(Value::as_bool)
                .unwrap_or(true),
            ResponseType::Error => false,
        }
    }
}

// ============================================================================
// ResponseType
// ============================================================================

/// Response type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Successful response.
    Success,
    /// Error response.
    Error,
}

// ============================================================================
// Tests
// ============================================================================
