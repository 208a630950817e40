//! Server event message types.
//!
//! Events are notifications pushed by the print server. Events that need a
//! decision from the client (only `print_job_data` today) carry an `id` and
//! are answered with an [`EventReply`]. Method names match the socket.io
//! event names of print servers, but the envelope is this crate's own JSON
//! format (see [`crate::protocol`]).
//!
//! # Event Types
//!
//! | Method | Params |
//! |--------|--------|
//! | `print_job_data` | [`Chunk`] |
//! | `print_job_start` | job id |
//! | `print_job_end` | job id |
//! | `print_job_handled` | job id |
//! | `exception` | `{ "message": .. }` or string |
//! | `error` | `{ "message": .. }` or string |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Value, from_value};

use crate::identifiers::{JobId, RequestId};

use super::Chunk;

// ============================================================================
// Event
// ============================================================================

/// An event notification from server to client.
///
/// # Format
///
/// ```json
/// {
///   "id": "event-uuid",
///   "type": "event",
///   "method": "print_job_data",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    /// Identifier for EventReply correlation, if a reply is expected.
    #[serde(default)]
    pub id: Option<RequestId>,

    /// Event type marker (always "event").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event name.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,
}

impl Event {
    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        match self.method.as_str() {
            "print_job_data" => match from_value::<Chunk>(self.params.clone()) {
                Ok(chunk) => ParsedEvent::JobData(chunk),
                Err(e) => ParsedEvent::Malformed {
                    method: self.method.clone(),
                    reason: e.to_string(),
                },
            },

            "print_job_start" => self.job_event(ParsedEvent::JobStarted),

            "print_job_end" => self.job_event(ParsedEvent::JobTerminated),

            "print_job_handled" => self.job_event(ParsedEvent::JobHandled),

            "exception" => ParsedEvent::Exception {
                message: self.get_message(),
            },

            "error" => ParsedEvent::Error {
                message: self.get_message(),
            },

            _ => ParsedEvent::Unknown {
                method: self.method.clone(),
                params: self.params.clone(),
            },
        }
    }

    /// Builds a job-scoped variant, or `Malformed` if params is not a job id.
    fn job_event(&self, variant: fn(JobId) -> ParsedEvent) -> ParsedEvent {
        match self.get_job_id() {
            Some(job_id) => variant(job_id),
            None => ParsedEvent::Malformed {
                method: self.method.clone(),
                reason: format!("expected job id, got {}", self.params),
            },
        }
    }

    /// Gets a job id from params, accepting a bare number or `{"jobId": n}`.
    #[inline]
    fn get_job_id(&self) -> Option<JobId> {
        self.params
            .as_u64()
            .or_else(|| self.params.get("jobId").and_then(Value::as_u64))
            .map(JobId::new)
    }

    /// Gets a message from params, accepting a bare string or `{"message": ..}`.
    #[inline]
    fn get_message(&self) -> String {
        self.params
            .as_str()
            .or_else(|| self.params.get("message").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string()
    }
}

// ============================================================================
// EventReply
// ============================================================================

/// A reply from client to server for events requiring a decision.
///
/// # Format
///
/// ```json
/// {
///   "id": "event-uuid",
///   "replyTo": "print_job_data",
///   "result": true
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct EventReply {
    /// Matches the event's ID.
    pub id: RequestId,

    /// Event method being replied to.
    #[serde(rename = "replyTo")]
    pub reply_to: String,

    /// Decision.
    pub result: Value,
}

impl EventReply {
    /// Creates a new event reply.
    #[inline]
    #[must_use]
    pub fn new(id: RequestId, reply_to: impl Into<String>, result: Value) -> Self {
        Self {
            id,
            reply_to: reply_to.into(),
            result,
        }
    }

    /// Creates a boolean acknowledgement reply.
    #[inline]
    #[must_use]
    pub fn ack(id: RequestId, reply_to: impl Into<String>, accepted: bool) -> Self {
        Self::new(id, reply_to, Value::Bool(accepted))
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone)]
pub enum ParsedEvent {
    /// A chunk of a job.
    JobData(Chunk),

    /// Server started transferring a job.
    JobStarted(JobId),

    /// Server finished (or aborted) transferring a job.
    JobTerminated(JobId),

    /// Server considers a job handled.
    JobHandled(JobId),

    /// Server-side exception.
    Exception {
        /// Exception message.
        message: String,
    },

    /// Generic server error.
    Error {
        /// Error message.
        message: String,
    },

    /// Known method with unusable params.
    Malformed {
        /// Event method.
        method: String,
        /// Why the params were rejected.
        reason: String,
    },

    /// Unknown event type.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_data_parsing() {
        let json_str = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "event",
            "method": "print_job_data",
            "params": {
                "jobId": 4,
                "chunkId": 1,
                "chunkCount": 1,
                "chunkLength": 4,
                "data": "QUJD",
                "fileName": "a.pdf",
                "fileLength": 3
            }
        }"#;

        let event: Event = serde_json::from_str(json_str).expect("parse event");
        assert!(event.id.is_some());

        match event.parse() {
            ParsedEvent::JobData(chunk) => {
                assert_eq!(chunk.job_id, JobId::new(4));
                assert_eq!(chunk.file_name, "a.pdf");
            }
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_job_data_malformed() {
        let json_str = r#"{
            "type": "event",
            "method": "print_job_data",
            "params": { "jobId": "seven" }
        }"#;

        let event: Event = serde_json::from_str(json_str).expect("parse event");
        assert!(matches!(event.parse(), ParsedEvent::Malformed { .. }));
    }

    #[test]
    fn test_job_id_forms() {
        let bare: Event = serde_json::from_str(
            r#"{"type":"event","method":"print_job_start","params":3}"#,
        )
        .expect("parse");
        let object: Event = serde_json::from_str(
            r#"{"type":"event","method":"print_job_end","params":{"jobId":3}}"#,
        )
        .expect("parse");

        assert!(matches!(bare.parse(), ParsedEvent::JobStarted(id) if id == JobId::new(3)));
        assert!(matches!(object.parse(), ParsedEvent::JobTerminated(id) if id == JobId::new(3)));
    }

    #[test]
    fn test_exception_message_forms() {
        let object: Event = serde_json::from_str(
            r#"{"type":"event","method":"exception","params":{"message":"boom"}}"#,
        )
        .expect("parse");
        let bare: Event =
            serde_json::from_str(r#"{"type":"event","method":"error","params":"bad"}"#)
                .expect("parse");

        match object.parse() {
            ParsedEvent::Exception { message } => assert_eq!(message, "boom"),
            other => panic!("expected Exception, got {other:?}"),
        }
        match bare.parse() {
            ParsedEvent::Error { message } => assert_eq!(message, "bad"),
            other => panic!("expected Error, got {other:?}"),
        }
    }

    #[test]
    fn test_event_reply_ack() {
        let reply = EventReply::ack(RequestId::generate(), "print_job_data", false);
        let json = serde_json::to_string(&reply).expect("serialize");

        assert!(json.contains("replyTo"));
        assert!(json.contains("false"));
    }

    #[test]
    fn test_unknown_event() {
        let event: Event = serde_json::from_str(
            r#"{"type":"event","method":"custom.thing","params":{"foo":"bar"}}"#,
        )
        .expect("parse");

        match event.parse() {
            ParsedEvent::Unknown { method, .. } => assert_eq!(method, "custom.thing"),
            other => panic!("expected Unknown, got {other:?}"),
        }
    }
}
