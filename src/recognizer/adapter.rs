use anyhow::Result;
use std::fmt;
use tokio::sync::mpsc;

/// Error codes reported by a recognition stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognizerErrorCode {
    /// Microphone or recognition permission denied.
    NotAllowed,
    /// Nothing was said; not an error condition.
    NoSpeech,
    Network,
    Aborted,
    Other(String),
}

impl RecognizerErrorCode {
    pub fn parse(code: &str) -> Self {
        match code {
            "not-allowed" => Self::NotAllowed,
            "no-speech" => Self::NoSpeech,
            "network" => Self::Network,
            "aborted" => Self::Aborted,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::NotAllowed => "not-allowed",
            Self::NoSpeech => "no-speech",
            Self::Network => "network",
            Self::Aborted => "aborted",
            Self::Other(code) => code,
        }
    }
}

impl fmt::Display for RecognizerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event emitted by a recognition stream.
#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    /// The stream is live and producing results.
    Started,
    /// One indexed result. Indices are scoped to the emitting instance
    /// and arrive in increasing order within it.
    Result {
        index: usize,
        text: String,
        confidence: Option<f32>,
        is_final: bool,
    },
    Error(RecognizerErrorCode),
    /// The stream terminated. A closed event channel means the same thing.
    Ended,
}

/// A continuous, resumable speech-recognition stream.
///
/// Implementations are treated as unreliable: the stream can end at any
/// time, and result indices reset whenever `start` is called again.
#[async_trait::async_trait]
pub trait Recognizer: Send {
    /// Begin recognition. The returned channel carries events for this
    /// instance's lifetime and closes when the stream ends.
    async fn start(&mut self) -> Result<mpsc::Receiver<RecognizerEvent>>;

    /// Stop recognition and release the underlying capture.
    async fn stop(&mut self) -> Result<()>;

    /// Check if the stream is currently live.
    fn is_active(&self) -> bool;

    /// Get adapter name for logging.
    fn name(&self) -> &str;
}

/// Creates fresh recognizer instances for restart recovery.
pub trait RecognizerFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn Recognizer>>;
}
