//! Type-safe identifiers.
//!
//! Newtype wrappers keep connection ids, server job ids and request
//! correlation ids from being mixed up.
//!
//! | Type | Source | Representation |
//! |------|--------|----------------|
//! | [`ConnectionId`] | process-wide counter | `u64`, starts at 1 |
//! | [`JobId`] | assigned by the print server | `u64` |
//! | [`RequestId`] | generated per correlated request | UUID v4 |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// ConnectionId
// ============================================================================

/// Process-wide connection counter. Never reset.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one logical print connection.
///
/// Allocated monotonically from a process-wide atomic counter starting at 1.
/// Ids are never reused for the life of the process, including after the
/// connection is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next connection id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw counter value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "print-connection-{}", self.0)
    }
}

// ============================================================================
// JobId
// ============================================================================

/// Server-assigned print job identifier.
///
/// Only unique within one connection: two connections may carry jobs with
/// the same id at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(u64);

impl JobId {
    /// Creates a job id from its wire value.
    #[inline]
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the wire value.
    #[inline]
    #[must_use]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

// ============================================================================
// RequestId
// ============================================================================

/// Correlation id for requests that expect an acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Generates a fresh random request id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::thread;

    #[test]
    fn test_connection_id_monotonic() {
        let first = ConnectionId::next();
        let second = ConnectionId::next();
        assert!(second > first);
        assert!(first.as_u64() >= 1);
    }

    #[test]
    fn test_connection_id_unique_across_threads() {
        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| (0..100).map(|_| ConnectionId::next()).collect::<Vec<_>>()))
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().expect("thread panicked") {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 800);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId(3);
        assert_eq!(id.to_string(), "print-connection-3");
    }

    #[test]
    fn test_job_id_serde_transparent() {
        let id: JobId = serde_json::from_str("42").expect("parse");
        assert_eq!(id, JobId::new(42));
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "42");
    }

    #[test]
    fn test_request_id_unique() {
        assert_ne!(RequestId::generate(), RequestId::generate());
    }
}
