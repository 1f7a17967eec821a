use anyhow::{Context, Result};
use async_nats::Client;
use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::adapter::{Recognizer, RecognizerErrorCode, RecognizerEvent, RecognizerFactory};

/// Recognition result message received from the STT service.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecognitionResultMessage {
    pub session_id: String,
    /// Result index, scoped to the emitting recognizer instance
    pub index: usize,
    pub text: String,
    pub confidence: Option<f32>,
    #[serde(rename = "final")]
    pub is_final: bool,
    pub timestamp: String, // RFC3339 timestamp
}

/// Stream status message from the STT service.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecognitionStatusMessage {
    pub session_id: String,
    /// "started", "ended", or "error"
    pub status: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Control message published to the STT service.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecognitionControlMessage {
    pub session_id: String,
    /// "start" or "stop"
    pub command: String,
    pub timestamp: String,
}

/// Recognition stream over NATS.
///
/// Subscribes to all result/status subjects and filters by session id in
/// the payload; the STT service publishes to `stt.result.*` and
/// `stt.status.*`.
pub struct NatsRecognizer {
    url: String,
    session_id: String,
    client: Option<Client>,
    forward_task: Option<JoinHandle<()>>,
    active: bool,
}

impl NatsRecognizer {
    pub fn new(url: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            session_id: session_id.into(),
            client: None,
            forward_task: None,
            active: false,
        }
    }

    async fn publish_control(&self, client: &Client, command: &str) -> Result<()> {
        let subject = format!("stt.control.{}", self.session_id);
        let message = RecognitionControlMessage {
            session_id: self.session_id.clone(),
            command: command.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        let payload = serde_json::to_vec(&message)?;
        client
            .publish(subject, payload.into())
            .await
            .context("Failed to publish recognition control message")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Recognizer for NatsRecognizer {
    async fn start(&mut self) -> Result<mpsc::Receiver<RecognizerEvent>> {
        info!("Connecting to NATS at {}", self.url);
        let client = async_nats::connect(&self.url)
            .await
            .context("Failed to connect to NATS")?;

        let mut results = client
            .subscribe("stt.result.>")
            .await
            .context("Failed to subscribe to recognition results")?;
        let mut statuses = client
            .subscribe("stt.status.>")
            .await
            .context("Failed to subscribe to recognition status")?;

        self.publish_control(&client, "start").await?;
        info!("Recognition stream requested for session {}", self.session_id);

        let (tx, rx) = mpsc::channel(100);
        let session_id = self.session_id.clone();

        let forward_task = tokio::spawn(async move {
            if tx.send(RecognizerEvent::Started).await.is_err() {
                return;
            }
            loop {
                tokio::select! {
                    msg = results.next() => {
                        let Some(msg) = msg else { break };
                        match serde_json::from_slice::<RecognitionResultMessage>(&msg.payload) {
                            Ok(result) => {
                                if result.session_id != session_id {
                                    continue;
                                }
                                let event = RecognizerEvent::Result {
                                    index: result.index,
                                    text: result.text,
                                    confidence: result.confidence,
                                    is_final: result.is_final,
                                };
                                if tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                            Err(e) => warn!("Failed to parse recognition result: {}", e),
                        }
                    }
                    msg = statuses.next() => {
                        let Some(msg) = msg else { break };
                        match serde_json::from_slice::<RecognitionStatusMessage>(&msg.payload) {
                            Ok(status) => {
                                if status.session_id != session_id {
                                    continue;
                                }
                                match status.status.as_str() {
                                    "started" => debug!("STT service reported stream start"),
                                    "ended" => {
                                        let _ = tx.send(RecognizerEvent::Ended).await;
                                        break;
                                    }
                                    "error" => {
                                        let code = status.error.as_deref().unwrap_or("unknown");
                                        let event = RecognizerEvent::Error(
                                            RecognizerErrorCode::parse(code),
                                        );
                                        if tx.send(event).await.is_err() {
                                            return;
                                        }
                                    }
                                    other => warn!("Unknown recognition status: {}", other),
                                }
                            }
                            Err(e) => warn!("Failed to parse recognition status: {}", e),
                        }
                    }
                }
            }
        });

        self.client = Some(client);
        self.forward_task = Some(forward_task);
        self.active = true;

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.active = false;
        if let Some(client) = self.client.take() {
            if let Err(e) = self.publish_control(&client, "stop").await {
                warn!("Failed to publish recognition stop: {:#}", e);
            }
        }
        if let Some(task) = self.forward_task.take() {
            task.abort();
        }
        debug!("Recognition stream released for session {}", self.session_id);
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn name(&self) -> &str {
        "nats"
    }
}

/// Factory for fresh NATS recognizer instances.
pub struct NatsRecognizerFactory {
    url: String,
    session_id: String,
}

impl NatsRecognizerFactory {
    pub fn new(url: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            session_id: session_id.into(),
        }
    }
}

impl RecognizerFactory for NatsRecognizerFactory {
    fn create(&self) -> Result<Box<dyn Recognizer>> {
        Ok(Box::new(NatsRecognizer::new(
            self.url.clone(),
            self.session_id.clone(),
        )))
    }
}
