pub mod analysis;
pub mod coaching;
pub mod config;
pub mod http;
pub mod recognizer;
pub mod recovery;
pub mod session;
pub mod storage;
pub mod transcript;

pub use analysis::{render_prompt, TranscriptAnalyzer, DEFAULT_ANALYSIS_PROMPT};
pub use coaching::{CoachingEngine, CoachingTip, ContentMapping, ImportMode, MappingPack, TipKind};
pub use config::Config;
pub use http::{create_router, AppState};
pub use recognizer::{
    NatsRecognizer, NatsRecognizerFactory, Recognizer, RecognizerErrorCode, RecognizerEvent,
    RecognizerFactory, ScriptedInstance, ScriptedRecognizer, ScriptedRecognizerFactory,
};
pub use recovery::{RecoveryAction, RecoveryController, RecoveryPhase, RecoveryStats};
pub use session::{CoachSession, SessionConfig, SessionEvent, SessionStats};
pub use storage::{JsonFileStore, MemoryStore, SessionSnapshot, SnapshotStore};
pub use transcript::{
    CommitResult, InterimEntry, InterimStore, TranscriptAccumulator, TranscriptSegment,
};
