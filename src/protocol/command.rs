//! Commands sent from the client to the print server.
//!
//! | Method | Params | Expects ack |
//! |--------|--------|-------------|
//! | `enable_print` | none | yes |
//! | `disable_print` | none | yes |
//! | `print_job_handled` | job id | no |

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::identifiers::JobId;

// ============================================================================
// Command
// ============================================================================

/// Client-to-server command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum Command {
    /// Ask the server to start dispatching jobs to this client.
    #[serde(rename = "enable_print")]
    EnablePrint,

    /// Ask the server to stop dispatching jobs to this client.
    #[serde(rename = "disable_print")]
    DisablePrint,

    /// Tell the server a job was taken over by the rendering sink.
    #[serde(rename = "print_job_handled")]
    JobHandled(JobId),
}

impl Command {
    /// Returns the wire method name.
    #[inline]
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::EnablePrint => "enable_print",
            Self::DisablePrint => "disable_print",
            Self::JobHandled(_) => "print_job_handled",
        }
    }

    /// Returns `true` if the server answers this command with an ack.
    #[inline]
    #[must_use]
    pub const fn expects_ack(&self) -> bool {
        matches!(self, Self::EnablePrint | Self::DisablePrint)
    }
}

// ============================================================================
// Tests
// ============================================================================
