//! Events published on a connection's stream.
//!
//! Every observable outcome of a connection is one [`PrintEvent`]. Events
//! serialize with a `type` tag so hosts can forward them to other layers
//! unchanged:
//!
//! ```json
//! { "type": "JOB_AVAILABLE", "jobId": 7, "fileName": "a.pdf", "fileLength": 3 }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;

use crate::identifiers::JobId;

// ============================================================================
// ErrorKind
// ============================================================================

/// Category of an error event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// Session could not be established or maintained.
    #[serde(rename = "CONNECTION_ERROR")]
    Connection,

    /// Chunk or reassembled document violated the protocol.
    #[serde(rename = "PROTOCOL_ERROR")]
    Protocol,

    /// Server signalled an application exception or refused a command.
    #[serde(rename = "EXCEPTION")]
    Exception,

    /// Generic transport error.
    #[serde(rename = "ERROR")]
    Transport,

    /// Correlated request was not acknowledged in time.
    #[serde(rename = "TIMEOUT")]
    Timeout,
}

// ============================================================================
// PrintEvent
// ============================================================================

/// One observable outcome on a connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum PrintEvent {
    /// Connection created; the transport is dialing.
    Connecting,

    /// Session established.
    Connected,

    /// Session lost or closed.
    Disconnected,

    /// Something went wrong. The connection keeps running.
    Error {
        /// Error category.
        kind: ErrorKind,
        /// Human-readable description.
        message: String,
    },

    /// A chunk passed validation and was buffered.
    ChunkReceived {
        /// Job the chunk belongs to.
        job_id: JobId,
        /// 1-based ordinal.
        chunk_id: u32,
        /// Total chunks in the job.
        chunk_count: u32,
        /// Length of the chunk's base64 text.
        chunk_length: usize,
    },

    /// A job was reassembled and validated; it can be opened.
    JobAvailable {
        /// Job ready to open.
        job_id: JobId,
        /// Document file name.
        file_name: String,
        /// Decoded document length in bytes.
        file_length: usize,
    },

    /// Server considers the job handled.
    JobHandled {
        /// Handled job.
        job_id: JobId,
    },

    /// Server accepted `enable_print`.
    PrintEnabled,

    /// Server accepted `disable_print`.
    PrintDisabled,

    /// Rendering sink failed or did not answer in time.
    RenderFailed {
        /// Job whose document was delivered.
        job_id: JobId,
    },

    /// Server started transferring a job.
    TransferStarted {
        /// Job being transferred.
        job_id: JobId,
    },

    /// Server stopped transferring a job.
    TransferTerminated {
        /// Job no longer transferred.
        job_id: JobId,
    },
}

impl PrintEvent {
    /// Creates an error event.
    #[inline]
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    /// Returns the job this event is about, if any.
    #[must_use]
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Self::ChunkReceived { job_id, .. }
            | Self::JobAvailable { job_id, .. }
            | Self::JobHandled { job_id }
            | Self::RenderFailed { job_id }
            | Self::TransferStarted { job_id }
            | Self::TransferTerminated { job_id } => Some(*job_id),
            _ => None,
        }
    }

    /// Returns the error kind if this is an error event.
    #[inline]
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
