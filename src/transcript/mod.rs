//! Transcript reconciliation
//!
//! This module owns the session transcript's source of truth:
//! - `TranscriptAccumulator`: the append-only, deduplicated transcript and
//!   its committed segments and metrics
//! - `InterimStore`: provisional recognition results awaiting finalization,
//!   recoverable when the recognition stream terminates mid-utterance

mod accumulator;
mod interim;

pub use accumulator::{CommitResult, TranscriptAccumulator, TranscriptSegment};
pub use interim::{InterimEntry, InterimStore};
