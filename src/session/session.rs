use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep_until, Instant as TokioInstant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::stats::{render_session_report, SessionStats};
use crate::analysis::{render_prompt, TranscriptAnalyzer, DEFAULT_ANALYSIS_PROMPT};
use crate::coaching::{CoachingEngine, CoachingTip, ContentMapping, ImportMode, MappingPack};
use crate::recognizer::{Recognizer, RecognizerErrorCode, RecognizerEvent, RecognizerFactory};
use crate::recovery::{RecoveryAction, RecoveryController};
use crate::storage::{SessionSnapshot, SnapshotStore};
use crate::transcript::{InterimStore, TranscriptAccumulator, TranscriptSegment};

/// Event emitted to the UI sink.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// A processed segment or interim update.
    TranscriptUpdate { text: String, is_final: bool },

    /// A coaching tip fired for newly processed text.
    Tip(CoachingTip),

    /// Recognition permission denied; the session has terminated.
    PermissionDenied,

    /// Both restart attempts failed; manual retry required.
    RestartExhausted,
}

/// Engine state, mutated only on the session event loop plus brief
/// accessor locks.
struct EngineState {
    accumulator: TranscriptAccumulator,
    interims: InterimStore,
    coaching: CoachingEngine,
    recovery: RecoveryController,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

/// A coaching session that manages the recognition stream, transcript
/// reconciliation, coaching tips, and snapshot persistence.
///
/// The session is long-lived: `start`/`stop` toggle recording, `clear`
/// resets the accumulated data. All engine mutation happens on a single
/// event-loop task that is spawned on `start` and deterministically shut
/// down on `stop` (cancelling any pending restart timer with it).
pub struct CoachSession {
    config: SessionConfig,
    state: Arc<Mutex<EngineState>>,
    factory: Arc<dyn RecognizerFactory>,
    store: Arc<dyn SnapshotStore>,
    analyzer: Option<Arc<dyn TranscriptAnalyzer>>,
    analysis_prompt: String,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    is_recording: Arc<AtomicBool>,
    /// Stop signal for the current event loop run; replaced on every start
    /// so a late stop cannot leak a permit into the next run.
    stop_signal: Mutex<Arc<Notify>>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl CoachSession {
    /// Create a session engine and the receiver for its sink events.
    pub fn new(
        config: SessionConfig,
        factory: Arc<dyn RecognizerFactory>,
        store: Arc<dyn SnapshotStore>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = EngineState {
            accumulator: TranscriptAccumulator::new(),
            interims: InterimStore::new(),
            coaching: CoachingEngine::new(),
            recovery: RecoveryController::new(
                config.restart_base_delay,
                config.restart_max_delay,
            ),
            started_at: None,
            ended_at: None,
        };
        let session = Self {
            config,
            state: Arc::new(Mutex::new(state)),
            factory,
            store,
            analyzer: None,
            analysis_prompt: DEFAULT_ANALYSIS_PROMPT.to_string(),
            events_tx,
            is_recording: Arc::new(AtomicBool::new(false)),
            stop_signal: Mutex::new(Arc::new(Notify::new())),
            loop_handle: Mutex::new(None),
        };
        (session, events_rx)
    }

    pub fn with_analyzer(mut self, analyzer: Arc<dyn TranscriptAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn with_analysis_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.analysis_prompt = prompt.into();
        self
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording.load(Ordering::SeqCst)
    }

    /// Restore state from the last snapshot; resumes recording if the
    /// snapshot marks an interrupted session. Returns whether recording
    /// was resumed. Load failures are logged and treated as no snapshot.
    pub async fn resume(&self) -> Result<bool> {
        let snapshot = match self.store.load().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Failed to load session snapshot: {:#}", e);
                None
            }
        };
        let Some(snapshot) = snapshot else {
            return Ok(false);
        };

        let resume_recording = snapshot.is_recording;
        {
            let mut state = self.state.lock().await;
            state
                .accumulator
                .restore(snapshot.transcript, snapshot.segments);
            state.coaching.restore_triggered(snapshot.triggered_tips);
            state.started_at = snapshot.started_at;
        }
        info!("Restored previous session state");

        if resume_recording {
            info!("Resuming interrupted recording session");
            self.start().await?;
        }
        Ok(resume_recording)
    }

    /// Start recording
    pub async fn start(&self) -> Result<()> {
        if self.is_recording.swap(true, Ordering::SeqCst) {
            warn!("Recording already started");
            return Ok(());
        }

        info!("Starting coaching session: {}", self.config.session_id);

        let started = self.start_inner().await;
        if started.is_err() {
            self.is_recording.store(false, Ordering::SeqCst);
        }
        started
    }

    async fn start_inner(&self) -> Result<()> {
        let mut recognizer = self
            .factory
            .create()
            .context("Failed to create recognizer")?;
        let rx = recognizer
            .start()
            .await
            .context("Failed to start recognition")?;

        {
            let mut state = self.state.lock().await;
            state.recovery.begin_session();
            if state.started_at.is_none() {
                state.started_at = Some(Utc::now());
            }
            state.ended_at = None;
        }
        self.save_snapshot(true).await;

        let stop_signal = Arc::new(Notify::new());
        *self.stop_signal.lock().await = Arc::clone(&stop_signal);

        let ctx = LoopContext {
            config: self.config.clone(),
            state: Arc::clone(&self.state),
            store: Arc::clone(&self.store),
            factory: Arc::clone(&self.factory),
            events: self.events_tx.clone(),
            is_recording: Arc::clone(&self.is_recording),
            stop_signal,
        };
        let handle = tokio::spawn(run_loop(ctx, recognizer, rx));
        *self.loop_handle.lock().await = Some(handle);

        info!("Coaching session started");
        Ok(())
    }

    /// Stop recording
    pub async fn stop(&self) -> Result<SessionStats> {
        if !self.is_recording.swap(false, Ordering::SeqCst) {
            warn!("Recording not active");
            return Ok(self.stats().await);
        }

        info!("Stopping coaching session: {}", self.config.session_id);
        self.stop_signal.lock().await.notify_one();

        if let Some(handle) = self.loop_handle.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Session event loop panicked: {}", e);
            }
        }

        info!("Coaching session stopped");
        Ok(self.stats().await)
    }

    /// Reset transcript, metrics, triggered tips, and stored state.
    /// Recording, if active, continues with a fresh transcript.
    pub async fn clear(&self) -> Result<()> {
        info!("Clearing session data");
        {
            let mut state = self.state.lock().await;
            state.accumulator.reset();
            state.interims.clear();
            state.coaching.reset_session();
            state.recovery.clear_counters();
            state.started_at = if self.is_recording() {
                Some(Utc::now())
            } else {
                None
            };
            state.ended_at = None;
        }
        if let Err(e) = self.store.clear().await {
            warn!("Failed to clear stored session state: {:#}", e);
        }
        Ok(())
    }

    /// Get current session statistics
    pub async fn stats(&self) -> SessionStats {
        let state = self.state.lock().await;
        let end = state.ended_at.unwrap_or_else(Utc::now);
        let duration_secs = state
            .started_at
            .map(|s| end.signed_duration_since(s).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0)
            .max(0.0);
        let word_count = state.accumulator.word_count();
        let words_per_minute = if duration_secs > 0.0 {
            ((word_count as f64 / duration_secs) * 60.0).round() as u32
        } else {
            0
        };

        SessionStats {
            session_id: self.config.session_id.clone(),
            is_recording: self.is_recording(),
            started_at: state.started_at,
            ended_at: state.ended_at,
            duration_secs,
            word_count,
            sentence_count: state.accumulator.sentence_count(),
            words_per_minute,
            average_confidence_pct: state
                .accumulator
                .average_confidence()
                .map(|c| (c * 100.0) as f32),
            segment_count: state.accumulator.segments().len(),
            tips_triggered: state.coaching.triggered_count(),
            recovery: state.recovery.snapshot(),
        }
    }

    /// Get the accumulated transcript
    pub async fn transcript(&self) -> String {
        self.state.lock().await.accumulator.transcript().to_string()
    }

    /// Get the committed transcript segments
    pub async fn segments(&self) -> Vec<TranscriptSegment> {
        self.state.lock().await.accumulator.segments().to_vec()
    }

    /// Render the session report; `None` when there is no transcript.
    pub async fn session_report(&self, name: &str) -> Option<String> {
        let transcript = self.transcript().await;
        if transcript.trim().is_empty() {
            return None;
        }
        let stats = self.stats().await;
        Some(render_session_report(name, &stats, &transcript))
    }

    /// Hand the transcript to the analysis collaborator.
    /// `Ok(None)` when there is no transcript to analyze.
    pub async fn analyze(&self) -> Result<Option<String>> {
        let transcript = self.transcript().await;
        if transcript.trim().is_empty() {
            return Ok(None);
        }
        let Some(analyzer) = &self.analyzer else {
            bail!("No analyzer configured");
        };
        let prompt = render_prompt(&self.analysis_prompt, &transcript);
        let response = analyzer
            .analyze(&prompt)
            .await
            .context("Analysis request failed")?;
        Ok(Some(response))
    }

    pub async fn mappings(&self) -> Vec<ContentMapping> {
        self.state.lock().await.coaching.mappings().to_vec()
    }

    pub async fn set_mappings(&self, mappings: Vec<ContentMapping>) {
        self.state.lock().await.coaching.set_mappings(mappings);
    }

    pub async fn add_mapping(&self, mapping: ContentMapping) {
        self.state.lock().await.coaching.add_mapping(mapping);
    }

    pub async fn remove_mapping(&self, id: &str) -> bool {
        self.state.lock().await.coaching.remove_mapping(id)
    }

    pub async fn export_mappings(&self) -> MappingPack {
        self.state.lock().await.coaching.export_pack()
    }

    pub async fn import_mappings(&self, pack: MappingPack, mode: ImportMode) -> Result<usize> {
        self.state.lock().await.coaching.import_pack(pack, mode)
    }

    async fn save_snapshot(&self, is_recording: bool) {
        let snapshot = {
            let state = self.state.lock().await;
            build_snapshot(&state, is_recording)
        };
        if let Err(e) = self.store.save(&snapshot).await {
            warn!("Failed to save session snapshot: {:#}", e);
        }
    }
}

/// Everything the event loop needs, detached from the session handle.
struct LoopContext {
    config: SessionConfig,
    state: Arc<Mutex<EngineState>>,
    store: Arc<dyn SnapshotStore>,
    factory: Arc<dyn RecognizerFactory>,
    events: mpsc::UnboundedSender<SessionEvent>,
    is_recording: Arc<AtomicBool>,
    stop_signal: Arc<Notify>,
}

/// The session event loop.
///
/// Owns the recognizer and reacts to: stream events, the stale-interim
/// sweep (which doubles as the silence guard), the snapshot timer, the
/// pending restart deadline, and the stop signal. Breaking out of the loop
/// drops the restart timer, so a stop can never be resurrected by a late
/// restart.
async fn run_loop(
    ctx: LoopContext,
    mut recognizer: Box<dyn Recognizer>,
    mut rx: mpsc::Receiver<RecognizerEvent>,
) {
    let mut rx_open = true;
    let mut restart_at: Option<TokioInstant> = None;
    let mut last_result = Instant::now();

    let mut sweep = interval(ctx.config.sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut snapshot_tick = interval(ctx.config.snapshot_interval);
    snapshot_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!("Session event loop started");

    loop {
        tokio::select! {
            _ = ctx.stop_signal.notified() => {
                debug!("Stop requested");
                break;
            }

            maybe_event = rx.recv(), if rx_open => {
                match maybe_event {
                    Some(RecognizerEvent::Started) => {
                        debug!("Recognition stream live");
                    }
                    Some(RecognizerEvent::Result { index, text, confidence, is_final }) => {
                        last_result = Instant::now();
                        handle_result(&ctx, index, &text, confidence, is_final).await;
                    }
                    Some(RecognizerEvent::Error(code)) => {
                        if !handle_error(&ctx, &code, &mut restart_at).await {
                            break;
                        }
                    }
                    Some(RecognizerEvent::Ended) | None => {
                        rx_open = false;
                        handle_stream_end(&ctx, &mut restart_at).await;
                    }
                }
            }

            _ = sweep.tick() => {
                sweep_interims(&ctx).await;

                if last_result.elapsed() > ctx.config.silence_timeout {
                    let interrupt = ctx.state.lock().await.recovery.should_interrupt_silence();
                    if interrupt {
                        info!(
                            "No recognition results for {:?}, cycling the stream",
                            ctx.config.silence_timeout
                        );
                        if let Err(e) = recognizer.stop().await {
                            warn!("Failed to stop recognizer: {:#}", e);
                        }
                        last_result = Instant::now();
                    }
                }
            }

            _ = snapshot_tick.tick() => {
                save_snapshot_from_loop(&ctx).await;
                log_transcript_state(&ctx).await;
            }

            _ = maybe_sleep_until(restart_at), if restart_at.is_some() => {
                restart_at = None;
                match execute_restart(&ctx, &mut recognizer).await {
                    Some(new_rx) => {
                        rx = new_rx;
                        rx_open = true;
                        last_result = Instant::now();
                    }
                    None => break,
                }
            }
        }
    }

    // Teardown: preserve whatever the stream still held, release it,
    // record the final state.
    preserve_interims(&ctx).await;
    if let Err(e) = recognizer.stop().await {
        warn!("Failed to stop recognizer: {:#}", e);
    }
    ctx.is_recording.store(false, Ordering::SeqCst);
    {
        let mut state = ctx.state.lock().await;
        state.recovery.on_stop();
        state.ended_at = Some(Utc::now());
    }
    save_snapshot_from_loop(&ctx).await;

    debug!("Session event loop stopped");
}

async fn maybe_sleep_until(deadline: Option<TokioInstant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn handle_result(
    ctx: &LoopContext,
    index: usize,
    text: &str,
    confidence: Option<f32>,
    is_final: bool,
) {
    let confidence = confidence.unwrap_or(ctx.config.default_confidence);
    let mut tip = None;
    let mut committed = false;

    {
        let mut state = ctx.state.lock().await;
        if is_final {
            // The interim entry for this index is superseded by the final
            state.interims.finalize(index);
            let result = state.accumulator.commit(text, Some(confidence));
            committed = result.is_committed();
            if committed {
                tip = state.coaching.scan(text);
            } else {
                debug!(?result, text = %text, "final result not committed");
            }
        } else {
            state
                .interims
                .update(index, text, confidence, Instant::now());
            // Interim text is scanned so tips fire before finalization
            tip = state.coaching.scan(text);
        }
    }

    emit(
        ctx,
        SessionEvent::TranscriptUpdate {
            text: text.to_string(),
            is_final,
        },
    );
    if let Some(tip) = tip {
        info!(title = %tip.title, "coaching tip fired");
        emit(ctx, SessionEvent::Tip(tip));
    }
    if committed {
        save_snapshot_from_loop(ctx).await;
    }
}

/// Returns false when the session must terminate (permission failure).
async fn handle_error(
    ctx: &LoopContext,
    code: &RecognizerErrorCode,
    restart_at: &mut Option<TokioInstant>,
) -> bool {
    if matches!(code, RecognizerErrorCode::NoSpeech) {
        debug!("No speech detected, continuing");
    } else {
        warn!(code = %code, "recognition error");
    }
    let actions = ctx.state.lock().await.recovery.on_error(code);
    apply_recovery_actions(ctx, actions, restart_at).await
}

async fn handle_stream_end(ctx: &LoopContext, restart_at: &mut Option<TokioInstant>) {
    debug!("Recognition stream ended");
    let actions = ctx.state.lock().await.recovery.on_stream_end();
    apply_recovery_actions(ctx, actions, restart_at).await;
}

/// Returns false when the session must terminate.
async fn apply_recovery_actions(
    ctx: &LoopContext,
    actions: Vec<RecoveryAction>,
    restart_at: &mut Option<TokioInstant>,
) -> bool {
    for action in actions {
        match action {
            RecoveryAction::PreserveInterims => preserve_interims(ctx).await,
            RecoveryAction::RestartAfter(delay) => {
                info!(delay_ms = delay.as_millis() as u64, "scheduling recognition restart");
                *restart_at = Some(TokioInstant::now() + delay);
            }
            RecoveryAction::FatalPermission => {
                error!("Recognition permission denied; stopping session");
                emit(ctx, SessionEvent::PermissionDenied);
                return false;
            }
        }
    }
    true
}

/// Commit the best pending interim before result indices go stale.
async fn preserve_interims(ctx: &LoopContext) {
    let mut events = Vec::new();
    {
        let mut state = ctx.state.lock().await;
        let pending = state.interims.len();
        if let Some(entry) = state.interims.take_best() {
            info!(pending, text = %entry.text, "preserving best interim result");
            if state
                .accumulator
                .commit(&entry.text, Some(entry.confidence))
                .is_committed()
            {
                events.push(SessionEvent::TranscriptUpdate {
                    text: entry.text.clone(),
                    is_final: true,
                });
                if let Some(tip) = state.coaching.scan(&entry.text) {
                    events.push(SessionEvent::Tip(tip));
                }
            }
        }
    }
    for event in events {
        emit(ctx, event);
    }
}

/// Commit at most one over-age interim per sweep.
async fn sweep_interims(ctx: &LoopContext) {
    let mut events = Vec::new();
    {
        let mut state = ctx.state.lock().await;
        if let Some((index, entry)) = state
            .interims
            .take_stale(ctx.config.stale_interim_age, Instant::now())
        {
            info!(index, text = %entry.text, "committing stale interim result");
            if state
                .accumulator
                .commit(&entry.text, Some(entry.confidence))
                .is_committed()
            {
                events.push(SessionEvent::TranscriptUpdate {
                    text: entry.text.clone(),
                    is_final: true,
                });
                if let Some(tip) = state.coaching.scan(&entry.text) {
                    events.push(SessionEvent::Tip(tip));
                }
            }
        }
    }
    for event in events {
        emit(ctx, event);
    }
}

/// Restart the stream: same instance first, then once more with a fresh
/// instance from the factory. `None` means both attempts failed.
async fn execute_restart(
    ctx: &LoopContext,
    recognizer: &mut Box<dyn Recognizer>,
) -> Option<mpsc::Receiver<RecognizerEvent>> {
    info!("Restarting recognition stream");
    if let Err(e) = recognizer.stop().await {
        debug!("Recognizer stop before restart failed: {:#}", e);
    }

    match recognizer.start().await {
        Ok(rx) => {
            ctx.state.lock().await.recovery.on_restart_succeeded();
            info!("Recognition restarted");
            return Some(rx);
        }
        Err(e) => {
            warn!("Recognition restart failed: {:#}; creating a fresh recognizer", e);
        }
    }

    match ctx.factory.create() {
        Ok(mut fresh) => match fresh.start().await {
            Ok(rx) => {
                *recognizer = fresh;
                ctx.state.lock().await.recovery.on_restart_succeeded();
                info!("Recognition recovered with a fresh stream");
                return Some(rx);
            }
            Err(e) => error!("Fresh recognizer failed to start: {:#}", e),
        },
        Err(e) => error!("Failed to create fresh recognizer: {:#}", e),
    }

    ctx.state.lock().await.recovery.on_restart_exhausted();
    emit(ctx, SessionEvent::RestartExhausted);
    None
}

async fn save_snapshot_from_loop(ctx: &LoopContext) {
    let snapshot = {
        let state = ctx.state.lock().await;
        build_snapshot(&state, ctx.is_recording.load(Ordering::SeqCst))
    };
    if let Err(e) = ctx.store.save(&snapshot).await {
        warn!("Failed to save session snapshot: {:#}", e);
    }
}

fn build_snapshot(state: &EngineState, is_recording: bool) -> SessionSnapshot {
    SessionSnapshot {
        transcript: state.accumulator.transcript().to_string(),
        segments: state.accumulator.segments().to_vec(),
        triggered_tips: state.coaching.triggered_ids(),
        started_at: state.started_at,
        is_recording,
    }
}

async fn log_transcript_state(ctx: &LoopContext) {
    let state = ctx.state.lock().await;
    debug!(
        chars = state.accumulator.transcript().len(),
        words = state.accumulator.word_count(),
        segments = state.accumulator.segments().len(),
        interims = state.interims.len(),
        phase = ?state.recovery.phase(),
        "transcript state"
    );
}

fn emit(ctx: &LoopContext, event: SessionEvent) {
    if ctx.events.send(event).is_err() {
        debug!("Event sink dropped");
    }
}
