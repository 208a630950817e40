//! Print job chunk wire type.
//!
//! A job is transferred as `chunkCount` chunks. Each chunk carries a slice
//! of the base64-encoded document and the declared length of that slice.
//! Decoding happens only once, over the concatenation of all slices, so
//! the server may cut the encoded text at any position.
//!
//! # Format
//!
//! ```json
//! {
//!   "jobId": 7,
//!   "chunkId": 1,
//!   "chunkCount": 3,
//!   "chunkLength": 4,
//!   "data": "JVBE",
//!   "fileName": "invoice.pdf",
//!   "fileLength": 9
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use base64::Engine;
use base64::engine::general_purpose::STANDARD as Base64Standard;
use serde::{Deserialize, Serialize};

use crate::identifiers::JobId;

// ============================================================================
// Chunk
// ============================================================================

/// One wire unit of a job transfer.
///
/// `file_name` and `file_length` may be present on every chunk or only on
/// the terminal one; the reassembler reads them from the chunk that
/// completes the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Job this chunk belongs to.
    pub job_id: JobId,

    /// 1-based ordinal of this chunk.
    pub chunk_id: u32,

    /// Total number of chunks in the job.
    pub chunk_count: u32,

    /// Declared length of `data` as received.
    pub chunk_length: usize,

    /// Base64 text slice.
    pub data: String,

    /// Document file name.
    #[serde(default)]
    pub file_name: String,

    /// Expected decoded length of the whole document.
    #[serde(default)]
    pub file_length: usize,
}

impl Chunk {
    /// Returns `true` if the declared length matches the received payload.
    #[inline]
    #[must_use]
    pub fn has_consistent_length(&self) -> bool {
        self.chunk_length == self.data.len()
    }

    /// Returns `true` if this chunk claims to be the last one of its job.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.chunk_id == self.chunk_count
    }

    /// Splits a document into chunks the way a print server sends them.
    ///
    /// The document is base64-encoded once and the text is cut into slices
    /// of at most `slice_len` characters. Every chunk carries the file
    /// metadata. An empty document still yields one (empty) chunk.
    ///
    /// # Panics
    ///
    /// Panics if `slice_len` is zero.
    #[must_use]
    pub fn split_document(
        job_id: JobId,
        file_name: &str,
        document: &[u8],
        slice_len: usize,
    ) -> Vec<Chunk> {
        assert!(slice_len > 0, "slice_len must be greater than zero");

        let encoded = Base64Standard.encode(document);
        // base64 output is ASCII, so byte slicing never splits a character.
        let slices: Vec<&str> = if encoded.is_empty() {
            vec![""]
        } else {
            encoded
                .as_bytes()
                .chunks(slice_len)
                .map(|s| std::str::from_utf8(s).unwrap_or_default())
                .collect()
        };

        let chunk_count = slices.len() as u32;
        slices
            .into_iter()
            .enumerate()
            .map(|(index, data)| Chunk {
                job_id,
                chunk_id: index as u32 + 1,
                chunk_count,
                chunk_length: data.len(),
                data: data.to_string(),
                file_name: file_name.to_string(),
                file_length: document.len(),
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
