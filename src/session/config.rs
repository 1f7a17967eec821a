use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a coaching session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Unique session identifier (e.g., "call-2026-08-06-discovery")
    pub session_id: String,

    /// No-result window after which the stream is proactively cycled
    pub silence_timeout: Duration,

    /// Age at which a lingering interim result is committed by the sweep
    pub stale_interim_age: Duration,

    /// Cadence of the stale-interim sweep (also runs the silence guard)
    pub sweep_interval: Duration,

    /// Cadence of opportunistic session snapshots
    pub snapshot_interval: Duration,

    /// First restart delay; grows with each recovery attempt
    pub restart_base_delay: Duration,

    /// Upper bound for the restart delay
    pub restart_max_delay: Duration,

    /// Confidence assumed when the recognizer does not report one
    pub default_confidence: f32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("call-{}", uuid::Uuid::new_v4()),
            silence_timeout: Duration::from_secs(45),
            stale_interim_age: Duration::from_secs(5),
            sweep_interval: Duration::from_secs(2),
            snapshot_interval: Duration::from_secs(10),
            restart_base_delay: Duration::from_millis(300),
            restart_max_delay: Duration::from_secs(5),
            default_confidence: 0.9,
        }
    }
}
