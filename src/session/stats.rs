use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::recovery::RecoveryStats;

/// Statistics about a coaching session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,

    /// Whether recording is currently active
    pub is_recording: bool,

    /// When the recording started
    pub started_at: Option<DateTime<Utc>>,

    /// When the recording stopped (still running if absent)
    pub ended_at: Option<DateTime<Utc>>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Words committed to the transcript
    pub word_count: usize,

    /// Sentence-terminal punctuation groups seen
    pub sentence_count: usize,

    /// Speaking pace over the session duration
    pub words_per_minute: u32,

    /// Mean reported confidence, as a percentage
    pub average_confidence_pct: Option<f32>,

    /// Number of committed transcript segments
    pub segment_count: usize,

    /// Coaching tips fired this session
    pub tips_triggered: usize,

    pub recovery: RecoveryStats,
}

/// Render the Markdown session report.
pub fn render_session_report(name: &str, stats: &SessionStats, transcript: &str) -> String {
    let minutes = (stats.duration_secs as u64) / 60;
    let seconds = (stats.duration_secs as u64) % 60;
    let confidence = stats
        .average_confidence_pct
        .map(|c| format!("{c:.1}%"))
        .unwrap_or_else(|| "n/a".to_string());
    let date = stats
        .started_at
        .unwrap_or_else(Utc::now)
        .format("%Y-%m-%d %H:%M:%S UTC");

    format!(
        "# {name}\n\n\
         **Date:** {date}\n\
         **Duration:** {minutes}:{seconds:02}\n\
         **Words:** {words}\n\
         **Sentences:** {sentences}\n\
         **Words per Minute:** {wpm}\n\
         **Average Confidence:** {confidence}\n\
         **Coaching Tips Triggered:** {tips}\n\n\
         ---\n\n\
         ## Transcript\n\n\
         {transcript}\n\n\
         ---\n\n\
         *Generated by callcoach*\n",
        words = stats.word_count,
        sentences = stats.sentence_count,
        wpm = stats.words_per_minute,
        tips = stats.tips_triggered,
    )
}
