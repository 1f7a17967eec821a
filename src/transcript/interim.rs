use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use super::accumulator::count_words;

/// A provisional recognition result awaiting finalization.
#[derive(Debug, Clone)]
pub struct InterimEntry {
    pub text: String,
    pub confidence: f32,
    pub received_at: Instant,
    pub word_count: usize,
}

impl InterimEntry {
    /// Preservation score: the longest, most-confident interim wins.
    fn score(&self) -> f64 {
        self.text.len() as f64 * f64::from(self.confidence)
    }
}

/// Interim recognition results keyed by result index.
///
/// Indices are only comparable within one recognizer instance's lifetime;
/// the store must be emptied whenever a new instance is created.
#[derive(Debug, Default)]
pub struct InterimStore {
    entries: HashMap<usize, InterimEntry>,
}

impl InterimStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite-or-insert the entry for `index`. Empty text is ignored.
    pub fn update(&mut self, index: usize, text: &str, confidence: f32, at: Instant) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        self.entries.insert(
            index,
            InterimEntry {
                text: trimmed.to_string(),
                confidence,
                received_at: at,
                word_count: count_words(trimmed),
            },
        );
    }

    /// Remove the entry for `index`; its content became a final result.
    pub fn finalize(&mut self, index: usize) -> Option<InterimEntry> {
        self.entries.remove(&index)
    }

    /// Take the single oldest entry older than `max_age`, if any.
    ///
    /// At most one entry per sweep keeps a burst of near-duplicate partials
    /// from flooding the transcript in one pass.
    pub fn take_stale(&mut self, max_age: Duration, now: Instant) -> Option<(usize, InterimEntry)> {
        let index = self
            .entries
            .iter()
            .filter(|(_, e)| now.duration_since(e.received_at) > max_age)
            .min_by_key(|(_, e)| e.received_at)
            .map(|(i, _)| *i)?;
        let entry = self.entries.remove(&index)?;
        debug!(index, text = %entry.text, "draining stale interim result");
        Some((index, entry))
    }

    /// Take the best remaining entry by `text length * confidence`.
    ///
    /// The store is cleared regardless of whether a candidate was found:
    /// indices become invalid across a recognizer restart.
    pub fn take_best(&mut self) -> Option<InterimEntry> {
        let best = self
            .entries
            .values()
            .max_by(|a, b| a.score().total_cmp(&b.score()))
            .cloned();
        self.entries.clear();
        best
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
