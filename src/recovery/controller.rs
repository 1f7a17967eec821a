use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::recognizer::RecognizerErrorCode;

/// Lifecycle phase of the recognition stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryPhase {
    Idle,
    Listening,
    Restarting,
    Stopped,
}

/// What the session should do in response to a stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Drain the interim store into the transcript before indices go stale.
    PreserveInterims,
    /// Arm the restart timer.
    RestartAfter(Duration),
    /// Permission failure: terminate the session, no retry.
    FatalPermission,
}

/// How an error code is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Stop the session and surface the error; no restart.
    Fatal,
    /// Not an error condition; no state transition.
    Ignored,
    /// Preserve interim results, then restart with backoff.
    Recoverable,
}

/// Fixed classification table for recognizer error codes.
pub fn classify(code: &RecognizerErrorCode) -> ErrorDisposition {
    match code {
        RecognizerErrorCode::NotAllowed => ErrorDisposition::Fatal,
        RecognizerErrorCode::NoSpeech => ErrorDisposition::Ignored,
        RecognizerErrorCode::Network
        | RecognizerErrorCode::Aborted
        | RecognizerErrorCode::Other(_) => ErrorDisposition::Recoverable,
    }
}

/// Serializable view of the recovery state, for stats and the control API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryStats {
    pub phase: RecoveryPhase,
    pub is_restarting: bool,
    pub recovery_count: u32,
    pub network_error_count: u32,
    pub current_backoff_ms: u64,
}

/// Restart/backoff/error-classification state machine.
///
/// Pure state: no I/O and no timers of its own. Transitions return the
/// actions the session loop executes, which keeps the restart logic
/// testable without a live recognition stream.
#[derive(Debug)]
pub struct RecoveryController {
    phase: RecoveryPhase,
    recovery_count: u32,
    network_error_count: u32,
    base_delay: Duration,
    max_delay: Duration,
    current_backoff: Duration,
}

impl RecoveryController {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            phase: RecoveryPhase::Idle,
            recovery_count: 0,
            network_error_count: 0,
            base_delay,
            max_delay,
            current_backoff: base_delay,
        }
    }

    /// `Idle -> Listening` on session start; clears all recovery counters.
    pub fn begin_session(&mut self) {
        self.phase = RecoveryPhase::Listening;
        self.clear_counters();
    }

    /// Reset counters without touching the phase (session clear).
    pub fn clear_counters(&mut self) {
        self.recovery_count = 0;
        self.network_error_count = 0;
        self.current_backoff = self.base_delay;
    }

    pub fn phase(&self) -> RecoveryPhase {
        self.phase
    }

    pub fn is_restarting(&self) -> bool {
        self.phase == RecoveryPhase::Restarting
    }

    pub fn recovery_count(&self) -> u32 {
        self.recovery_count
    }

    pub fn network_error_count(&self) -> u32 {
        self.network_error_count
    }

    /// The stream ended. While listening this begins a restart sequence;
    /// a duplicate end while one is already in flight is ignored.
    pub fn on_stream_end(&mut self) -> Vec<RecoveryAction> {
        match self.phase {
            RecoveryPhase::Listening => {
                self.phase = RecoveryPhase::Restarting;
                let delay = self.next_restart_delay();
                vec![
                    RecoveryAction::PreserveInterims,
                    RecoveryAction::RestartAfter(delay),
                ]
            }
            RecoveryPhase::Restarting => {
                debug!("ignoring duplicate stream end while a restart is in flight");
                Vec::new()
            }
            RecoveryPhase::Idle | RecoveryPhase::Stopped => Vec::new(),
        }
    }

    /// An error code was reported on the stream.
    pub fn on_error(&mut self, code: &RecognizerErrorCode) -> Vec<RecoveryAction> {
        if matches!(code, RecognizerErrorCode::Network) {
            self.network_error_count += 1;
        }
        match classify(code) {
            ErrorDisposition::Fatal => {
                self.phase = RecoveryPhase::Stopped;
                vec![RecoveryAction::FatalPermission]
            }
            ErrorDisposition::Ignored => Vec::new(),
            // Same preserve-then-restart path as a stream end
            ErrorDisposition::Recoverable => self.on_stream_end(),
        }
    }

    /// Whether the silence guard should proactively cycle the stream.
    pub fn should_interrupt_silence(&self) -> bool {
        self.phase == RecoveryPhase::Listening
    }

    /// `Restarting -> Listening` after a successful restart.
    pub fn on_restart_succeeded(&mut self) {
        if self.phase == RecoveryPhase::Restarting {
            self.phase = RecoveryPhase::Listening;
        }
    }

    /// Both restart attempts failed; the session surfaces the failure.
    pub fn on_restart_exhausted(&mut self) {
        self.phase = RecoveryPhase::Stopped;
    }

    /// Explicit stop request, effective from any state.
    pub fn on_stop(&mut self) {
        self.phase = RecoveryPhase::Stopped;
    }

    pub fn snapshot(&self) -> RecoveryStats {
        RecoveryStats {
            phase: self.phase,
            is_restarting: self.is_restarting(),
            recovery_count: self.recovery_count,
            network_error_count: self.network_error_count,
            current_backoff_ms: self.current_backoff.as_millis() as u64,
        }
    }

    /// `min(base * (1 + recovery_count * 0.5), max)`, then count the attempt.
    fn next_restart_delay(&mut self) -> Duration {
        let scaled = self
            .base_delay
            .mul_f64(1.0 + f64::from(self.recovery_count) * 0.5);
        let delay = scaled.min(self.max_delay);
        self.current_backoff = delay;
        self.recovery_count += 1;
        delay
    }
}
