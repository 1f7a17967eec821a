use anyhow::{bail, Context, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

use super::adapter::{Recognizer, RecognizerEvent, RecognizerFactory};

/// One scripted instance lifetime: what happens between a `start` call and
/// the stream ending.
#[derive(Debug, Clone, Default)]
pub struct ScriptedInstance {
    start_error: Option<String>,
    timeline: Vec<(Duration, RecognizerEvent)>,
    hold_open: bool,
}

impl ScriptedInstance {
    pub fn new() -> Self {
        Self::default()
    }

    /// `start` fails with this message instead of producing a stream.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            start_error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Emit `event` immediately after the previous one.
    pub fn then(mut self, event: RecognizerEvent) -> Self {
        self.timeline.push((Duration::ZERO, event));
        self
    }

    /// Emit `event` after waiting `delay`.
    pub fn then_after(mut self, delay: Duration, event: RecognizerEvent) -> Self {
        self.timeline.push((delay, event));
        self
    }

    /// Keep the stream open after the timeline until `stop` is called.
    pub fn hold_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

/// Plays scripted instance timelines; for tests and offline runs.
///
/// Each `start` call consumes the next instance, so a restart sequence can
/// be scripted end to end without a live recognition service.
pub struct ScriptedRecognizer {
    instances: VecDeque<ScriptedInstance>,
    stop_signal: Option<Arc<Notify>>,
    play_task: Option<JoinHandle<()>>,
    active: bool,
}

impl ScriptedRecognizer {
    pub fn new(instances: Vec<ScriptedInstance>) -> Self {
        Self {
            instances: instances.into(),
            stop_signal: None,
            play_task: None,
            active: false,
        }
    }
}

#[async_trait::async_trait]
impl Recognizer for ScriptedRecognizer {
    async fn start(&mut self) -> Result<mpsc::Receiver<RecognizerEvent>> {
        let Some(instance) = self.instances.pop_front() else {
            bail!("recognition script exhausted");
        };
        if let Some(message) = instance.start_error {
            bail!("{message}");
        }

        let (tx, rx) = mpsc::channel(100);
        let stop = Arc::new(Notify::new());
        let stop_wait = Arc::clone(&stop);
        let timeline = instance.timeline;
        let hold_open = instance.hold_open;

        let play_task = tokio::spawn(async move {
            if tx.send(RecognizerEvent::Started).await.is_err() {
                return;
            }
            for (delay, event) in timeline {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            if hold_open {
                stop_wait.notified().await;
            }
            // Dropping the sender closes the stream
        });

        self.stop_signal = Some(stop);
        self.play_task = Some(play_task);
        self.active = true;

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.active = false;
        if let Some(stop) = self.stop_signal.take() {
            stop.notify_one();
        }
        if let Some(task) = self.play_task.take() {
            task.abort();
        }
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Hands out pre-built scripted recognizers, one per `create` call.
#[derive(Default)]
pub struct ScriptedRecognizerFactory {
    recognizers: Mutex<VecDeque<ScriptedRecognizer>>,
}

impl ScriptedRecognizerFactory {
    pub fn new(recognizers: Vec<ScriptedRecognizer>) -> Self {
        Self {
            recognizers: Mutex::new(recognizers.into()),
        }
    }
}

impl RecognizerFactory for ScriptedRecognizerFactory {
    fn create(&self) -> Result<Box<dyn Recognizer>> {
        let mut queue = self
            .recognizers
            .lock()
            .map_err(|_| anyhow::anyhow!("scripted recognizer queue poisoned"))?;
        let recognizer = queue
            .pop_front()
            .context("recognition script exhausted: no recognizer instances left")?;
        Ok(Box::new(recognizer))
    }
}
