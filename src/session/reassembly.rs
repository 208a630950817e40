//! Chunk reassembly engine.
//!
//! Pure state machine with no I/O: every received chunk is pushed into a
//! [`ChunkReassembler`], which answers with the [`Step`]s the connection
//! turns into acknowledgements and events.
//!
//! # Rules
//!
//! 1. A chunk whose `chunkLength` differs from its payload length is
//!    rejected and never buffered.
//! 2. A valid chunk is accepted and appended to its job's buffer.
//! 3. With [`ChunkOrdering::Arrival`] a job completes when the chunk with
//!    `chunkId == chunkCount` arrives; the buffered slices are joined in
//!    arrival order. A job with the wrong number of buffered chunks is
//!    dropped without an event.
//! 4. With [`ChunkOrdering::Strict`] duplicates and out-of-range ordinals
//!    are rejected, and a job completes once every ordinal is present.
//! 5. The joined text is base64-decoded and checked against `fileLength`.
//!    Decoding is forgiving: ASCII whitespace is skipped, padding is
//!    optional and non-zero trailing bits are accepted.
//!
//! Partial jobs are bounded: jobs idle for longer than the configured
//! timeout, and the oldest job when the buffer is full, are evicted. A
//! chunk that completes a new job by itself never takes a buffer slot, so
//! it evicts nothing for capacity.

// ============================================================================
// Imports
// ============================================================================

use std::time::{Duration, Instant};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use crate::identifiers::JobId;
use crate::protocol::Chunk;

// ============================================================================
// Constants
// ============================================================================

/// Default maximum number of partial jobs per connection.
pub const DEFAULT_MAX_PENDING_JOBS: usize = 64;

/// Default idle time after which a partial job is abandoned.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(60);

/// Rejection reason for a chunk whose declared length is wrong.
pub const INCORRECT_CHUNK_LENGTH: &str = "Incorrect data length in chunk";

/// Error message for a reassembled document with the wrong length.
pub const INCONSISTENT_FILE_LENGTH: &str = "Processed print data has inconsistent length";

/// Standard alphabet, optional padding, lenient trailing bits.
const FORGIVING: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

const ORDINAL_OUT_OF_RANGE: &str = "Chunk ordinal out of range";
const DUPLICATE_CHUNK: &str = "Duplicate chunk in print job";
const CHUNK_COUNT_CHANGED: &str = "Chunk count changed within print job";

// ============================================================================
// Configuration
// ============================================================================

/// How chunk ordinals are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkOrdering {
    /// Complete on the terminal ordinal and join in arrival order.
    #[default]
    Arrival,

    /// Track ordinals: reject duplicates and join sorted by ordinal.
    Strict,
}

/// Limits and policy for a reassembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReassemblyConfig {
    /// Maximum partial jobs kept at once.
    pub max_pending_jobs: usize,
    /// Idle time since a job's latest chunk before it is abandoned.
    pub job_timeout: Duration,
    /// Ordinal policy.
    pub ordering: ChunkOrdering,
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            max_pending_jobs: DEFAULT_MAX_PENDING_JOBS,
            job_timeout: DEFAULT_JOB_TIMEOUT,
            ordering: ChunkOrdering::default(),
        }
    }
}

// ============================================================================
// Printable
// ============================================================================

/// A complete, validated document that has not been rendered yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Printable {
    /// Job the document came from.
    pub job_id: JobId,
    /// Document file name as sent by the server.
    pub file_name: String,
    /// Decoded document bytes.
    pub data: Vec<u8>,
}

impl Printable {
    /// Returns the decoded document length.
    #[inline]
    #[must_use]
    pub fn file_length(&self) -> usize {
        self.data.len()
    }
}

// ============================================================================
// Step
// ============================================================================

/// One outcome of pushing a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Chunk refused: nack it and report a protocol error.
    Rejected {
        /// Job the chunk claimed to belong to.
        job_id: JobId,
        /// Ordinal of the refused chunk.
        chunk_id: u32,
        /// Why it was refused.
        reason: &'static str,
    },

    /// Chunk accepted: ack it.
    Received {
        /// Job the chunk belongs to.
        job_id: JobId,
        /// Ordinal of the chunk.
        chunk_id: u32,
        /// Total chunks in the job.
        chunk_count: u32,
        /// Length of the chunk's base64 text.
        chunk_length: usize,
    },

    /// A partial job was abandoned.
    Evicted {
        /// Abandoned job.
        job_id: JobId,
        /// Why it was abandoned.
        reason: String,
    },

    /// A job was reassembled and validated.
    Completed(Printable),

    /// The decoded document length differs from `fileLength`.
    LengthMismatch {
        /// Job that failed validation.
        job_id: JobId,
        /// Declared length.
        expected: usize,
        /// Decoded length.
        actual: usize,
    },

    /// The joined payload is not valid base64.
    DecodeFailed {
        /// Job that failed decoding.
        job_id: JobId,
        /// Decoder message.
        reason: String,
    },

    /// The terminal chunk arrived with the wrong number of chunks buffered.
    Dropped {
        /// Dropped job.
        job_id: JobId,
        /// Chunks buffered.
        received: usize,
        /// Chunks declared.
        expected: u32,
    },
}

// ============================================================================
// PendingJob
// ============================================================================

/// Chunks buffered for a job that has not completed yet.
#[derive(Debug)]
struct PendingJob {
    chunks: Vec<Chunk>,
    last_seen: Instant,
}

// ============================================================================
// ChunkReassembler
// ============================================================================

/// Per-connection job buffer.
#[derive(Debug, Default)]
pub struct ChunkReassembler {
    config: ReassemblyConfig,
    jobs: FxHashMap<JobId, PendingJob>,
}

impl ChunkReassembler {
    /// Creates an empty reassembler.
    #[must_use]
    pub fn new(config: ReassemblyConfig) -> Self {
        Self {
            config,
            jobs: FxHashMap::default(),
        }
    }

    /// Returns the configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &ReassemblyConfig {
        &self.config
    }

    /// Returns the number of partial jobs.
    #[inline]
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.jobs.len()
    }

    /// Returns `true` if chunks are buffered for `job_id`.
    #[inline]
    #[must_use]
    pub fn is_pending(&self, job_id: JobId) -> bool {
        self.jobs.contains_key(&job_id)
    }

    /// Discards every partial job. Returns how many were discarded.
    pub fn discard_all(&mut self) -> usize {
        let count = self.jobs.len();
        self.jobs.clear();
        count
    }

    /// Pushes a received chunk.
    pub fn push(&mut self, chunk: Chunk) -> Vec<Step> {
        self.push_at(chunk, Instant::now())
    }

    /// Pushes a received chunk at a given instant.
    ///
    /// The first step is always [`Step::Rejected`] or [`Step::Received`].
    pub fn push_at(&mut self, chunk: Chunk, now: Instant) -> Vec<Step> {
        if let Some(reason) = self.violation(&chunk) {
            warn!(
                job_id = %chunk.job_id,
                chunk_id = chunk.chunk_id,
                declared = chunk.chunk_length,
                actual = chunk.data.len(),
                reason,
                "Rejected chunk"
            );
            return vec![Step::Rejected {
                job_id: chunk.job_id,
                chunk_id: chunk.chunk_id,
                reason,
            }];
        }

        trace!(
            job_id = %chunk.job_id,
            chunk_id = chunk.chunk_id,
            chunk_count = chunk.chunk_count,
            "Chunk accepted"
        );

        let job_id = chunk.job_id;
        let mut steps = vec![Step::Received {
            job_id,
            chunk_id: chunk.chunk_id,
            chunk_count: chunk.chunk_count,
            chunk_length: chunk.chunk_length,
        }];

        let terminal = chunk.is_terminal();
        let chunk_count = chunk.chunk_count as usize;
        let completes_alone = !self.jobs.contains_key(&job_id)
            && match self.config.ordering {
                ChunkOrdering::Arrival => terminal,
                ChunkOrdering::Strict => chunk_count == 1,
            };

        self.evict(job_id, !completes_alone, now, &mut steps);

        let job = self.jobs.entry(job_id).or_insert_with(|| PendingJob {
            chunks: Vec::new(),
            last_seen: now,
        });
        job.last_seen = now;
        job.chunks.push(chunk);

        let complete = match self.config.ordering {
            ChunkOrdering::Arrival => terminal,
            ChunkOrdering::Strict => job.chunks.len() == chunk_count,
        };

        if complete && let Some(job) = self.jobs.remove(&job_id) {
            steps.push(self.finish(job_id, job.chunks));
        }

        steps
    }

    /// Returns why a chunk must be refused, if it must.
    fn violation(&self, chunk: &Chunk) -> Option<&'static str> {
        if !chunk.has_consistent_length() {
            return Some(INCORRECT_CHUNK_LENGTH);
        }

        if self.config.ordering == ChunkOrdering::Arrival {
            return None;
        }

        if chunk.chunk_id == 0 || chunk.chunk_id > chunk.chunk_count {
            return Some(ORDINAL_OUT_OF_RANGE);
        }

        let job = self.jobs.get(&chunk.job_id)?;
        if job.chunks.iter().any(|c| c.chunk_id == chunk.chunk_id) {
            return Some(DUPLICATE_CHUNK);
        }
        if job
            .chunks
            .first()
            .is_some_and(|c| c.chunk_count != chunk.chunk_count)
        {
            return Some(CHUNK_COUNT_CHANGED);
        }

        None
    }

    /// Evicts idle jobs, then the oldest job if `incoming` needs a slot and
    /// there is none.
    fn evict(&mut self, incoming: JobId, needs_slot: bool, now: Instant, steps: &mut Vec<Step>) {
        let timeout = self.config.job_timeout;

        let mut stale: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|(id, job)| {
                **id != incoming && now.saturating_duration_since(job.last_seen) > timeout
            })
            .map(|(id, _)| *id)
            .collect();
        stale.sort_unstable();

        for job_id in stale {
            self.jobs.remove(&job_id);
            let reason = format!(
                "Print job {job_id} abandoned after {}s without data",
                timeout.as_secs()
            );
            warn!(%job_id, "Evicted idle print job");
            steps.push(Step::Evicted { job_id, reason });
        }

        if !needs_slot
            || self.jobs.contains_key(&incoming)
            || self.jobs.len() < self.config.max_pending_jobs
        {
            return;
        }

        let oldest = self
            .jobs
            .iter()
            .min_by_key(|(id, job)| (job.last_seen, **id))
            .map(|(id, _)| *id);

        if let Some(job_id) = oldest {
            self.jobs.remove(&job_id);
            let reason = format!(
                "Print job {job_id} abandoned: more than {} pending jobs",
                self.config.max_pending_jobs
            );
            warn!(%job_id, "Evicted oldest print job");
            steps.push(Step::Evicted { job_id, reason });
        }
    }

    /// Joins, decodes and validates a job whose completion was triggered.
    fn finish(&self, job_id: JobId, mut chunks: Vec<Chunk>) -> Step {
        if self.config.ordering == ChunkOrdering::Strict {
            chunks.sort_unstable_by_key(|c| c.chunk_id);
        }

        let Some(terminal) = chunks.last() else {
            return Step::Dropped {
                job_id,
                received: 0,
                expected: 0,
            };
        };

        if chunks.len() != terminal.chunk_count as usize {
            warn!(
                %job_id,
                received = chunks.len(),
                expected = terminal.chunk_count,
                "Dropped print job with missing or extra chunks"
            );
            return Step::Dropped {
                job_id,
                received: chunks.len(),
                expected: terminal.chunk_count,
            };
        }

        let expected = terminal.file_length;
        let file_name = terminal.file_name.clone();

        let mut text = String::with_capacity(chunks.iter().map(|c| c.data.len()).sum());
        for chunk in &chunks {
            text.extend(chunk.data.chars().filter(|c| !c.is_ascii_whitespace()));
        }

        let data = match FORGIVING.decode(text.as_bytes()) {
            Ok(data) => data,
            Err(e) => {
                warn!(%job_id, error = %e, "Print job payload is not valid base64");
                return Step::DecodeFailed {
                    job_id,
                    reason: e.to_string(),
                };
            }
        };

        if data.len() != expected {
            warn!(%job_id, expected, actual = data.len(), "Print job length mismatch");
            return Step::LengthMismatch {
                job_id,
                expected,
                actual: data.len(),
            };
        }

        trace!(%job_id, file_length = expected, "Print job reassembled");
        Step::Completed(Printable {
            job_id,
            file_name,
            data,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    const DOCUMENT: &[u8] = b"%PDF-1.4 hello printer";

    fn job(id: u64, slice_len: usize) -> Vec<Chunk> {
        Chunk::split_document(JobId::new(id), "doc.pdf", DOCUMENT, slice_len)
    }

    fn strict() -> ChunkReassembler {
        ChunkReassembler::new(ReassemblyConfig {
            ordering: ChunkOrdering::Strict,
            ..ReassemblyConfig::default()
        })
    }

    fn completed(steps: &[Step]) -> Option<&Printable> {
        steps.iter().find_map(|step| match step {
            Step::Completed(printable) => Some(printable),
            _ => None,
        })
    }

    // ========================================================================
    // Arrival Ordering
    // ========================================================================

    #[test]
    fn test_in_order_job_completes_once() {
        let mut reassembler = ChunkReassembler::default();
        let chunks = job(1, 8);
        let count = chunks.len();
        let mut completions = 0;

        for (index, chunk) in chunks.into_iter().enumerate() {
            let steps = reassembler.push(chunk);
            assert!(matches!(steps[0], Step::Received { .. }));

            if let Some(printable) = completed(&steps) {
                assert_eq!(index + 1, count);
                assert_eq!(printable.data, DOCUMENT);
                assert_eq!(printable.file_name, "doc.pdf");
                completions += 1;
            }
        }

        assert_eq!(completions, 1);
        assert_eq!(reassembler.pending_jobs(), 0);
    }

    #[test]
    fn test_three_chunk_example() {
        let mut reassembler = ChunkReassembler::default();
        let chunk = |chunk_id, data: &str| Chunk {
            job_id: JobId::new(7),
            chunk_id,
            chunk_count: 3,
            chunk_length: data.len(),
            data: data.to_string(),
            file_name: "a.pdf".into(),
            file_length: 9,
        };

        // "JVBE" + "Ri0x" + "LjQK" decodes to "%PDF-1.4\n"
        assert_eq!(reassembler.push(chunk(1, "JVBE")).len(), 1);
        assert_eq!(reassembler.push(chunk(2, "Ri0x")).len(), 1);
        let steps = reassembler.push(chunk(3, "LjQK"));

        let printable = completed(&steps).expect("completed");
        assert_eq!(printable.job_id, JobId::new(7));
        assert_eq!(printable.data, b"%PDF-1.4\n");
        assert_eq!(printable.file_length(), 9);
    }

    #[test]
    fn test_bad_chunk_length_rejected_without_buffering() {
        let mut reassembler = ChunkReassembler::default();
        let mut chunk = job(1, 8).remove(0);
        chunk.chunk_length += 1;

        let steps = reassembler.push(chunk);

        assert_eq!(steps.len(), 1);
        assert!(matches!(
            steps[0],
            Step::Rejected { reason: INCORRECT_CHUNK_LENGTH, .. }
        ));
        assert_eq!(reassembler.pending_jobs(), 0);
    }

    #[test]
    fn test_file_length_mismatch() {
        let mut reassembler = ChunkReassembler::default();
        let mut chunks = job(1, 1024);
        chunks[0].file_length += 1;

        let steps = reassembler.push(chunks.remove(0));

        assert!(matches!(
            steps[1],
            Step::LengthMismatch { expected, actual, .. } if expected == actual + 1
        ));
        assert!(completed(&steps).is_none());
    }

    #[test]
    fn test_invalid_base64() {
        let mut reassembler = ChunkReassembler::default();
        let chunk = Chunk {
            job_id: JobId::new(3),
            chunk_id: 1,
            chunk_count: 1,
            chunk_length: 5,
            data: "!!!!!".into(),
            file_name: String::new(),
            file_length: 3,
        };

        let steps = reassembler.push(chunk);
        assert!(matches!(steps[1], Step::DecodeFailed { .. }));
    }

    #[test]
    fn test_unpadded_base64_with_whitespace_decodes() {
        let mut reassembler = ChunkReassembler::default();
        let chunk = Chunk {
            job_id: JobId::new(4),
            chunk_id: 1,
            chunk_count: 1,
            chunk_length: 5,
            data: "YW\r\nI".into(),
            file_name: "ab.pdf".into(),
            file_length: 2,
        };

        let steps = reassembler.push(chunk);
        assert_eq!(completed(&steps).map(|p| p.data.as_slice()), Some(&b"ab"[..]));
    }

    #[test]
    fn test_missing_chunk_drops_job() {
        let mut reassembler = ChunkReassembler::default();
        let mut chunks = job(1, 4);
        assert!(chunks.len() >= 3);
        chunks.remove(1);

        let mut last = Vec::new();
        for chunk in chunks {
            last = reassembler.push(chunk);
        }

        assert!(matches!(last[1], Step::Dropped { received, expected, .. } if received + 1 == expected as usize));
        assert_eq!(reassembler.pending_jobs(), 0);
    }

    #[test]
    fn test_arrival_order_is_kept() {
        let mut reassembler = ChunkReassembler::default();
        let mut chunks = job(1, 4);
        chunks.swap(0, 1);

        let mut last = Vec::new();
        for chunk in chunks {
            last = reassembler.push(chunk);
        }

        // Swapped slices decode to different bytes, so the job is not delivered intact.
        assert!(completed(&last).is_none_or(|p| p.data != DOCUMENT));
    }

    #[test]
    fn test_jobs_are_independent() {
        let mut reassembler = ChunkReassembler::default();
        let first = job(1, 6);
        let second = job(2, 6);

        for (a, b) in first.into_iter().zip(second) {
            reassembler.push(a);
            reassembler.push(b);
        }

        assert_eq!(reassembler.pending_jobs(), 0);
    }

    // ========================================================================
    // Eviction
    // ========================================================================

    #[test]
    fn test_idle_job_evicted() {
        let mut reassembler = ChunkReassembler::new(ReassemblyConfig {
            job_timeout: Duration::from_secs(1),
            ..ReassemblyConfig::default()
        });
        let start = Instant::now();

        reassembler.push_at(job(1, 4).remove(0), start);
        let steps = reassembler.push_at(job(2, 4).remove(0), start + Duration::from_secs(2));

        assert!(matches!(&steps[1], Step::Evicted { job_id, reason }
            if *job_id == JobId::new(1) && reason.starts_with("Print job 1 abandoned")));
        assert!(!reassembler.is_pending(JobId::new(1)));
        assert!(reassembler.is_pending(JobId::new(2)));
    }

    #[test]
    fn test_active_job_not_evicted() {
        let mut reassembler = ChunkReassembler::new(ReassemblyConfig {
            job_timeout: Duration::from_secs(1),
            ..ReassemblyConfig::default()
        });
        let start = Instant::now();
        let mut chunks = job(1, 4);

        reassembler.push_at(chunks.remove(0), start);
        let steps = reassembler.push_at(chunks.remove(0), start + Duration::from_secs(5));

        assert_eq!(steps.len(), 1);
    }

    #[test]
    fn test_full_buffer_evicts_oldest() {
        let mut reassembler = ChunkReassembler::new(ReassemblyConfig {
            max_pending_jobs: 2,
            ..ReassemblyConfig::default()
        });
        let start = Instant::now();

        reassembler.push_at(job(1, 4).remove(0), start);
        reassembler.push_at(job(2, 4).remove(0), start + Duration::from_millis(1));
        let steps = reassembler.push_at(job(3, 4).remove(0), start + Duration::from_millis(2));

        assert!(matches!(&steps[1], Step::Evicted { job_id, .. } if *job_id == JobId::new(1)));
        assert_eq!(reassembler.pending_jobs(), 2);
    }

    #[test]
    fn test_single_chunk_job_keeps_partial_job_when_full() {
        let mut reassembler = ChunkReassembler::new(ReassemblyConfig {
            max_pending_jobs: 1,
            ..ReassemblyConfig::default()
        });
        let partial = job(1, 4);
        assert!(partial.len() > 1);

        reassembler.push(partial[0].clone());
        let steps = reassembler.push(job(2, 1024).remove(0));

        assert_eq!(steps.len(), 2);
        assert_eq!(completed(&steps).map(|p| p.job_id), Some(JobId::new(2)));
        assert!(reassembler.is_pending(JobId::new(1)));
    }

    #[test]
    fn test_strict_single_chunk_job_keeps_partial_job_when_full() {
        let mut reassembler = ChunkReassembler::new(ReassemblyConfig {
            max_pending_jobs: 1,
            ordering: ChunkOrdering::Strict,
            ..ReassemblyConfig::default()
        });

        reassembler.push(job(1, 4).remove(0));
        let steps = reassembler.push(job(2, 1024).remove(0));

        assert!(!steps.iter().any(|s| matches!(s, Step::Evicted { .. })));
        assert!(completed(&steps).is_some());
        assert!(reassembler.is_pending(JobId::new(1)));
    }

    #[test]
    fn test_discard_all() {
        let mut reassembler = ChunkReassembler::default();
        reassembler.push(job(1, 4).remove(0));
        reassembler.push(job(2, 4).remove(0));

        assert_eq!(reassembler.discard_all(), 2);
        assert_eq!(reassembler.pending_jobs(), 0);
    }

    // ========================================================================
    // Strict Ordering
    // ========================================================================

    #[test]
    fn test_strict_out_of_order_completes() {
        let mut reassembler = strict();
        let mut chunks = job(1, 4);
        chunks.reverse();

        let mut last = Vec::new();
        for chunk in chunks {
            last = reassembler.push(chunk);
        }

        assert_eq!(completed(&last).expect("completed").data, DOCUMENT);
    }

    #[test]
    fn test_strict_rejects_duplicate() {
        let mut reassembler = strict();
        let chunk = job(1, 4).remove(0);

        reassembler.push(chunk.clone());
        let steps = reassembler.push(chunk);

        assert!(matches!(steps[0], Step::Rejected { reason: DUPLICATE_CHUNK, .. }));
    }

    #[test]
    fn test_strict_rejects_out_of_range() {
        let mut reassembler = strict();
        let mut chunk = job(1, 4).remove(0);
        chunk.chunk_id = chunk.chunk_count + 1;

        let steps = reassembler.push(chunk);
        assert!(matches!(steps[0], Step::Rejected { reason: ORDINAL_OUT_OF_RANGE, .. }));
    }

    #[test]
    fn test_strict_rejects_changed_count() {
        let mut reassembler = strict();
        let mut chunks = job(1, 4);
        reassembler.push(chunks.remove(0));
        let mut next = chunks.remove(0);
        next.chunk_count += 1;

        let steps = reassembler.push(next);
        assert!(matches!(steps[0], Step::Rejected { reason: CHUNK_COUNT_CHANGED, .. }));
    }

    // ========================================================================
    // Properties
    // ========================================================================

    fn shuffled_job() -> impl Strategy<Value = (Vec<u8>, Vec<Chunk>)> {
        (prop::collection::vec(any::<u8>(), 0..512), 1usize..64).prop_flat_map(|(doc, slice)| {
            let chunks = Chunk::split_document(JobId::new(9), "doc.pdf", &doc, slice);
            (Just(doc), Just(chunks).prop_shuffle())
        })
    }

    proptest! {
        #[test]
        fn prop_in_order_job_roundtrips(
            doc in prop::collection::vec(any::<u8>(), 0..1024),
            slice in 1usize..128,
        ) {
            let mut reassembler = ChunkReassembler::default();
            let chunks = Chunk::split_document(JobId::new(1), "doc.pdf", &doc, slice);

            let mut printables = Vec::new();
            for chunk in chunks {
                let steps = reassembler.push(chunk);
                prop_assert!(matches!(steps[0], Step::Received { .. }), "first step must be Received");
                printables.extend(completed(&steps).cloned());
            }

            prop_assert_eq!(printables.len(), 1);
            prop_assert_eq!(&printables[0].data, &doc);
            prop_assert_eq!(reassembler.pending_jobs(), 0);
        }

        #[test]
        fn prop_strict_any_order_roundtrips((doc, chunks) in shuffled_job()) {
            let mut reassembler = strict();

            let mut printables = Vec::new();
            for chunk in chunks {
                printables.extend(completed(&reassembler.push(chunk)).cloned());
            }

            prop_assert_eq!(printables.len(), 1);
            prop_assert_eq!(&printables[0].data, &doc);
        }
    }
}
