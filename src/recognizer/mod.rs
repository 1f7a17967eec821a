//! Recognition stream adapters
//!
//! The engine consumes speech recognition as an ordered, indexed event
//! stream behind the `Recognizer` trait:
//! - `NatsRecognizer`: production adapter over a NATS-connected STT service
//! - `ScriptedRecognizer`: deterministic playback for tests and offline runs

mod adapter;
mod nats;
mod scripted;

pub use adapter::{Recognizer, RecognizerErrorCode, RecognizerEvent, RecognizerFactory};
pub use nats::{
    NatsRecognizer, NatsRecognizerFactory, RecognitionControlMessage, RecognitionResultMessage,
    RecognitionStatusMessage,
};
pub use scripted::{ScriptedInstance, ScriptedRecognizer, ScriptedRecognizerFactory};
