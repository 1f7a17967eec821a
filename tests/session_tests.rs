// Integration tests for the coaching session: interim preservation across
// stream restarts, error recovery, stop/cancel semantics, stale sweeps,
// and snapshot resume. Recognition streams are scripted end to end so no
// live STT service is needed.

use anyhow::Result;
use callcoach::recognizer::{RecognizerErrorCode, RecognizerEvent};
use callcoach::recovery::RecoveryPhase;
use callcoach::session::{CoachSession, SessionConfig, SessionEvent};
use callcoach::storage::{MemoryStore, SessionSnapshot, SnapshotStore};
use callcoach::transcript::TranscriptSegment;
use callcoach::{
    ContentMapping, ScriptedInstance, ScriptedRecognizer, ScriptedRecognizerFactory, TipKind,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep;

fn test_config() -> SessionConfig {
    SessionConfig {
        session_id: "test-session".to_string(),
        silence_timeout: Duration::from_secs(30),
        stale_interim_age: Duration::from_millis(40),
        sweep_interval: Duration::from_millis(20),
        snapshot_interval: Duration::from_millis(50),
        restart_base_delay: Duration::from_millis(10),
        restart_max_delay: Duration::from_millis(100),
        default_confidence: 0.9,
    }
}

fn result(index: usize, text: &str, confidence: f32, is_final: bool) -> RecognizerEvent {
    RecognizerEvent::Result {
        index,
        text: text.to_string(),
        confidence: Some(confidence),
        is_final,
    }
}

fn scripted_session(
    config: SessionConfig,
    recognizers: Vec<ScriptedRecognizer>,
    store: Arc<MemoryStore>,
) -> (CoachSession, UnboundedReceiver<SessionEvent>) {
    let factory = Arc::new(ScriptedRecognizerFactory::new(recognizers));
    CoachSession::new(config, factory, store)
}

fn drain(events: &mut UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

fn tip_ids(events: &[SessionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Tip(tip) => Some(tip.id.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_interim_preserved_when_stream_ends() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let recognizer = ScriptedRecognizer::new(vec![
        // Stream dies right after an interim result
        ScriptedInstance::new().then(result(0, "hello", 0.8, false)),
        // Restarted stream stays quiet
        ScriptedInstance::new().hold_open(),
    ]);
    let (session, mut events) = scripted_session(test_config(), vec![recognizer], store);

    session.start().await?;
    sleep(Duration::from_millis(200)).await;

    assert_eq!(session.transcript().await, "hello");
    assert_eq!(session.segments().await.len(), 1);

    let stats = session.stats().await;
    assert_eq!(stats.recovery.recovery_count, 1);
    assert_eq!(stats.recovery.phase, RecoveryPhase::Listening);

    let drained = drain(&mut events);
    let finals: Vec<&SessionEvent> = drained
        .iter()
        .filter(|e| matches!(e, SessionEvent::TranscriptUpdate { is_final: true, .. }))
        .collect();
    assert_eq!(finals.len(), 1, "the preserved interim commits exactly once");

    session.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_network_error_recovers_without_duplicates() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let recognizer = ScriptedRecognizer::new(vec![
        ScriptedInstance::new()
            .then(result(0, "the price is high", 0.6, false))
            .then(RecognizerEvent::Error(RecognizerErrorCode::Network)),
        // The restarted stream re-emits the same content as a final result
        ScriptedInstance::new()
            .then(result(0, "the price is high", 0.9, true))
            .hold_open(),
    ]);
    let (session, mut events) = scripted_session(test_config(), vec![recognizer], store);

    session.start().await?;
    sleep(Duration::from_millis(300)).await;

    // Preserved once before the restart; the re-emitted final deduplicates
    assert_eq!(session.transcript().await, "the price is high");
    assert_eq!(session.segments().await.len(), 1);

    let stats = session.stats().await;
    assert_eq!(stats.recovery.phase, RecoveryPhase::Listening);
    assert_eq!(stats.recovery.recovery_count, 1);
    assert_eq!(stats.recovery.network_error_count, 1);

    // The built-in price rule fired exactly once, on the interim text
    let drained = drain(&mut events);
    assert_eq!(tip_ids(&drained), vec!["price".to_string()]);

    session.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_not_allowed_terminates_without_restart() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let recognizer = ScriptedRecognizer::new(vec![ScriptedInstance::new()
        .then(result(0, "hello", 0.8, false))
        .then(RecognizerEvent::Error(RecognizerErrorCode::NotAllowed))
        .hold_open()]);
    let (session, mut events) = scripted_session(test_config(), vec![recognizer], store);

    session.start().await?;
    sleep(Duration::from_millis(200)).await;

    assert!(!session.is_recording());
    // The pending interim is still preserved on the way down
    assert_eq!(session.transcript().await, "hello");

    let stats = session.stats().await;
    assert_eq!(stats.recovery.phase, RecoveryPhase::Stopped);
    assert_eq!(stats.recovery.recovery_count, 0);

    let drained = drain(&mut events);
    assert!(drained
        .iter()
        .any(|e| matches!(e, SessionEvent::PermissionDenied)));
    assert!(!drained
        .iter()
        .any(|e| matches!(e, SessionEvent::RestartExhausted)));

    Ok(())
}

#[tokio::test]
async fn test_stop_cancels_pending_restart() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let config = SessionConfig {
        restart_base_delay: Duration::from_millis(500),
        ..test_config()
    };
    // The only stream dies immediately; nothing is left to restart into
    let recognizer = ScriptedRecognizer::new(vec![ScriptedInstance::new()]);
    let (session, mut events) = scripted_session(config, vec![recognizer], store);

    session.start().await?;
    sleep(Duration::from_millis(80)).await;

    // End processed, restart still pending
    assert_eq!(session.stats().await.recovery.phase, RecoveryPhase::Restarting);

    session.stop().await?;
    assert!(!session.is_recording());
    assert_eq!(session.stats().await.recovery.phase, RecoveryPhase::Stopped);

    // The cancelled timer never fires: no exhausted-restart failure surfaces
    sleep(Duration::from_millis(600)).await;
    let drained = drain(&mut events);
    assert!(!drained
        .iter()
        .any(|e| matches!(e, SessionEvent::RestartExhausted)));
    assert!(!session.is_recording());

    Ok(())
}

#[tokio::test]
async fn test_restart_exhausted_surfaces_failure() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    // Stream dies immediately; the same instance cannot restart and the
    // factory has no fresh recognizers left
    let recognizer = ScriptedRecognizer::new(vec![ScriptedInstance::new()]);
    let (session, mut events) = scripted_session(test_config(), vec![recognizer], store);

    session.start().await?;
    sleep(Duration::from_millis(200)).await;

    assert!(!session.is_recording());
    assert_eq!(session.stats().await.recovery.phase, RecoveryPhase::Stopped);

    let drained = drain(&mut events);
    assert!(drained
        .iter()
        .any(|e| matches!(e, SessionEvent::RestartExhausted)));

    Ok(())
}

#[tokio::test]
async fn test_restart_falls_back_to_fresh_recognizer() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    // First recognizer: stream dies, and restarting the same instance fails
    let first = ScriptedRecognizer::new(vec![
        ScriptedInstance::new().then(result(0, "before the drop", 0.9, true)),
        ScriptedInstance::failing("stream already consumed"),
    ]);
    // The factory-fresh recognizer takes over
    let second = ScriptedRecognizer::new(vec![ScriptedInstance::new()
        .then(result(0, "after the recovery", 0.9, true))
        .hold_open()]);
    let (session, _events) = scripted_session(test_config(), vec![first, second], store);

    session.start().await?;
    sleep(Duration::from_millis(300)).await;

    assert_eq!(
        session.transcript().await,
        "before the drop after the recovery"
    );
    let stats = session.stats().await;
    assert_eq!(stats.recovery.phase, RecoveryPhase::Listening);
    assert_eq!(stats.recovery.recovery_count, 1);

    session.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_stale_interim_committed_by_sweep() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let recognizer = ScriptedRecognizer::new(vec![ScriptedInstance::new()
        .then(result(0, "let us review the proposal", 0.9, false))
        .hold_open()]);
    let (session, _events) = scripted_session(test_config(), vec![recognizer], store);

    session.start().await?;
    sleep(Duration::from_millis(200)).await;

    // Committed by the sweep without any restart
    assert_eq!(session.transcript().await, "let us review the proposal");
    let stats = session.stats().await;
    assert_eq!(stats.recovery.recovery_count, 0);
    assert_eq!(stats.recovery.phase, RecoveryPhase::Listening);

    session.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_silence_guard_cycles_quiet_stream() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let config = SessionConfig {
        silence_timeout: Duration::from_millis(60),
        ..test_config()
    };
    let recognizer = ScriptedRecognizer::new(vec![
        // Streams that stay open but never produce a result; enough of
        // them for every silence cycle within the test window
        ScriptedInstance::new().hold_open(),
        ScriptedInstance::new().hold_open(),
        ScriptedInstance::new().hold_open(),
        ScriptedInstance::new().hold_open(),
        ScriptedInstance::new().hold_open(),
    ]);
    let (session, _events) = scripted_session(config, vec![recognizer], store);

    session.start().await?;
    sleep(Duration::from_millis(300)).await;

    let stats = session.stats().await;
    assert!(
        stats.recovery.recovery_count >= 1,
        "the silence guard should have cycled the stream"
    );
    assert_eq!(stats.recovery.phase, RecoveryPhase::Listening);

    session.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_snapshot_saved_on_commit() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let recognizer = ScriptedRecognizer::new(vec![ScriptedInstance::new()
        .then(result(0, "note this down", 0.9, true))
        .hold_open()]);
    let (session, _events) =
        scripted_session(test_config(), vec![recognizer], Arc::clone(&store));

    session.start().await?;
    sleep(Duration::from_millis(100)).await;

    let snapshot = store.load().await?.expect("snapshot saved during recording");
    assert!(snapshot.is_recording);
    assert_eq!(snapshot.transcript, "note this down");
    assert_eq!(snapshot.segments.len(), 1);

    session.stop().await?;
    let snapshot = store.load().await?.expect("final snapshot saved on stop");
    assert!(!snapshot.is_recording);

    Ok(())
}

#[tokio::test]
async fn test_resume_restores_completed_session() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store
        .save(&SessionSnapshot {
            transcript: "hello world".to_string(),
            segments: vec![TranscriptSegment {
                text: "hello world".to_string(),
                timestamp: Utc::now(),
                word_count: 2,
                confidence: Some(0.9),
            }],
            triggered_tips: vec!["price".to_string()],
            started_at: Some(Utc::now()),
            is_recording: false,
        })
        .await?;

    let (session, _events) = scripted_session(test_config(), vec![], Arc::clone(&store));

    let resumed = session.resume().await?;
    assert!(!resumed, "a completed session does not resume recording");
    assert!(!session.is_recording());
    assert_eq!(session.transcript().await, "hello world");
    assert_eq!(session.stats().await.tips_triggered, 1);

    Ok(())
}

#[tokio::test]
async fn test_resume_restarts_interrupted_recording() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    store
        .save(&SessionSnapshot {
            transcript: "hello world".to_string(),
            segments: vec![TranscriptSegment {
                text: "hello world".to_string(),
                timestamp: Utc::now(),
                word_count: 2,
                confidence: Some(0.9),
            }],
            triggered_tips: vec![],
            started_at: Some(Utc::now()),
            is_recording: true,
        })
        .await?;

    let recognizer = ScriptedRecognizer::new(vec![ScriptedInstance::new()
        .then(result(0, "and the next step", 0.9, true))
        .hold_open()]);
    let (session, _events) =
        scripted_session(test_config(), vec![recognizer], Arc::clone(&store));

    let resumed = session.resume().await?;
    assert!(resumed);
    assert!(session.is_recording());

    sleep(Duration::from_millis(100)).await;
    assert_eq!(session.transcript().await, "hello world and the next step");

    session.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_clear_resets_session_data() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let recognizer = ScriptedRecognizer::new(vec![ScriptedInstance::new()
        .then(result(0, "the price is high", 0.9, true))
        .hold_open()]);
    let (session, _events) =
        scripted_session(test_config(), vec![recognizer], Arc::clone(&store));

    session.start().await?;
    sleep(Duration::from_millis(100)).await;
    session.stop().await?;

    assert!(!session.transcript().await.is_empty());

    session.clear().await?;

    assert_eq!(session.transcript().await, "");
    let stats = session.stats().await;
    assert_eq!(stats.word_count, 0);
    assert_eq!(stats.segment_count, 0);
    assert_eq!(stats.tips_triggered, 0);
    assert!(stats.started_at.is_none());
    assert!(store.load().await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_mapping_tip_fires_once_per_session() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let recognizer = ScriptedRecognizer::new(vec![ScriptedInstance::new()
        .then(result(0, "what roi can we expect", 0.9, true))
        .then(result(1, "the roi again matters here", 0.9, true))
        .hold_open()]);
    let (session, mut events) = scripted_session(test_config(), vec![recognizer], store);

    session
        .set_mappings(vec![ContentMapping {
            id: "m1".to_string(),
            kind: TipKind::Keyword,
            keywords: vec!["roi".to_string()],
            content: "Share the ROI calculator results.".to_string(),
        }])
        .await;

    session.start().await?;
    sleep(Duration::from_millis(150)).await;

    let drained = drain(&mut events);
    assert_eq!(tip_ids(&drained), vec!["m1".to_string()]);

    session.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_session_report_renders_markdown() -> Result<()> {
    let store = Arc::new(MemoryStore::new());
    let recognizer = ScriptedRecognizer::new(vec![ScriptedInstance::new()
        .then(result(0, "we agreed on the rollout plan.", 0.9, true))
        .hold_open()]);
    let (session, _events) = scripted_session(test_config(), vec![recognizer], store);

    // No transcript yet: report is a no-op
    assert!(session.session_report("Discovery Call").await.is_none());

    session.start().await?;
    sleep(Duration::from_millis(100)).await;
    session.stop().await?;

    let report = session
        .session_report("Discovery Call")
        .await
        .expect("transcript exists");
    assert!(report.starts_with("# Discovery Call"));
    assert!(report.contains("**Words:** 6"));
    assert!(report.contains("we agreed on the rollout plan."));

    Ok(())
}
