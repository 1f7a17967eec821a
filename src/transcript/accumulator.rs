use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, error};

/// Exact-duplicate rejection looks at this many trailing segments.
const EXACT_DUPLICATE_WINDOW: usize = 3;

/// Size of the trailing transcript window used for overlap detection.
const OVERLAP_WINDOW_CHARS: usize = 200;

/// Word-overlap ratio above which a candidate is a near-duplicate.
const OVERLAP_REJECT_RATIO: f64 = 0.8;

/// One committed, immutable unit of the session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Committed text (non-empty, trimmed)
    pub text: String,

    /// When this segment was committed
    pub timestamp: DateTime<Utc>,

    /// Number of words in `text`
    pub word_count: usize,

    /// Confidence score (0.0 to 1.0), if the recognizer reported one
    pub confidence: Option<f32>,
}

/// Outcome of a commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    /// Appended as a new segment.
    Committed,
    /// Empty or whitespace-only input; nothing to do.
    Empty,
    /// Case-insensitive match of a recently committed segment.
    RecentDuplicate,
    /// Near-duplicate of the trailing window of the transcript.
    Overlapping,
}

impl CommitResult {
    pub fn is_committed(&self) -> bool {
        matches!(self, CommitResult::Committed)
    }
}

/// The append-only, deduplicated session transcript.
///
/// Segments are never mutated or reordered after append, and the transcript
/// word count never decreases across commits.
#[derive(Debug, Default)]
pub struct TranscriptAccumulator {
    transcript: String,
    segments: Vec<TranscriptSegment>,
    word_count: usize,
    sentence_count: usize,
    confidence_sum: f64,
    confidence_count: usize,
}

impl TranscriptAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit raw, possibly-duplicate text to the transcript.
    ///
    /// Empty input, an exact repeat of one of the last few segments, and
    /// text already covered by the trailing window are all rejected.
    pub fn commit(&mut self, text: &str, confidence: Option<f32>) -> CommitResult {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return CommitResult::Empty;
        }

        let lowered = trimmed.to_lowercase();
        if self
            .segments
            .iter()
            .rev()
            .take(EXACT_DUPLICATE_WINDOW)
            .any(|s| s.text.to_lowercase() == lowered)
        {
            debug!(text = %trimmed, "rejecting repeat of a recent segment");
            return CommitResult::RecentDuplicate;
        }

        if !self.transcript.is_empty() {
            let ratio = overlap_ratio(trimmed, self.trailing_window());
            if ratio > OVERLAP_REJECT_RATIO {
                debug!(text = %trimmed, ratio, "rejecting near-duplicate of committed content");
                return CommitResult::Overlapping;
            }
        }

        let words_before = count_words(&self.transcript);

        // Exactly one separating space between segments
        if !self.transcript.is_empty() && !self.transcript.ends_with(' ') {
            self.transcript.push(' ');
        }
        self.transcript.push_str(trimmed);

        // Append-only commits must never shrink the transcript
        let words_after = count_words(&self.transcript);
        if words_after < words_before {
            error!(
                before = words_before,
                after = words_after,
                "transcript word count decreased"
            );
        }
        debug_assert!(words_after >= words_before);

        let word_count = count_words(trimmed);
        self.segments.push(TranscriptSegment {
            text: trimmed.to_string(),
            timestamp: Utc::now(),
            word_count,
            confidence,
        });

        self.word_count += word_count;
        self.sentence_count += count_sentence_breaks(trimmed);
        if let Some(c) = confidence {
            self.confidence_sum += f64::from(c);
            self.confidence_count += 1;
        }

        CommitResult::Committed
    }

    /// The accumulated transcript, segments joined by single spaces.
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn segments(&self) -> &[TranscriptSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.word_count
    }

    pub fn sentence_count(&self) -> usize {
        self.sentence_count
    }

    /// Mean reported confidence across committed segments, if any.
    pub fn average_confidence(&self) -> Option<f64> {
        if self.confidence_count == 0 {
            return None;
        }
        Some(self.confidence_sum / self.confidence_count as f64)
    }

    /// Drop all committed content and metrics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Rebuild accumulator state from a persisted snapshot.
    ///
    /// Metrics are recomputed from the segments rather than trusted from
    /// the snapshot.
    pub fn restore(&mut self, transcript: String, segments: Vec<TranscriptSegment>) {
        self.word_count = segments.iter().map(|s| s.word_count).sum();
        self.sentence_count = count_sentence_breaks(&transcript);
        self.confidence_sum = segments
            .iter()
            .filter_map(|s| s.confidence)
            .map(f64::from)
            .sum();
        self.confidence_count = segments.iter().filter(|s| s.confidence.is_some()).count();
        self.transcript = transcript;
        self.segments = segments;
    }

    fn trailing_window(&self) -> &str {
        let len = self.transcript.len();
        if len <= OVERLAP_WINDOW_CHARS {
            return &self.transcript;
        }
        let mut start = len - OVERLAP_WINDOW_CHARS;
        while !self.transcript.is_char_boundary(start) {
            start += 1;
        }
        &self.transcript[start..]
    }
}

pub(crate) fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Number of sentence-terminal punctuation groups (`...`, `!?` count once).
fn count_sentence_breaks(text: &str) -> usize {
    let mut count = 0;
    let mut in_group = false;
    for c in text.chars() {
        if matches!(c, '.' | '!' | '?') {
            if !in_group {
                count += 1;
                in_group = true;
            }
        } else {
            in_group = false;
        }
    }
    count
}

/// Fraction of the candidate's distinct words already present in `window`.
fn overlap_ratio(candidate: &str, window: &str) -> f64 {
    let window_words: HashSet<String> = normalized_words(window).collect();
    let candidate_words: HashSet<String> = normalized_words(candidate).collect();
    if candidate_words.is_empty() {
        return 0.0;
    }
    let hits = candidate_words
        .iter()
        .filter(|w| window_words.contains(*w))
        .count();
    hits as f64 / candidate_words.len() as f64
}

fn normalized_words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
}
