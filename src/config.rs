use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::session::SessionConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub recognition: RecognitionConfig,
    pub storage: StorageConfig,
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct RecognitionConfig {
    pub nats_url: String,
    pub silence_timeout_secs: u64,
    pub stale_interim_age_secs: u64,
    pub sweep_interval_secs: u64,
    pub restart_base_delay_ms: u64,
    pub restart_max_delay_ms: u64,
    pub default_confidence: f32,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    pub snapshot_path: String,
    pub snapshot_interval_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub prompt: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Session tunables derived from the recognition and storage sections.
    pub fn session_config(&self, session_id: String) -> SessionConfig {
        SessionConfig {
            session_id,
            silence_timeout: Duration::from_secs(self.recognition.silence_timeout_secs),
            stale_interim_age: Duration::from_secs(self.recognition.stale_interim_age_secs),
            sweep_interval: Duration::from_secs(self.recognition.sweep_interval_secs),
            snapshot_interval: Duration::from_secs(self.storage.snapshot_interval_secs),
            restart_base_delay: Duration::from_millis(self.recognition.restart_base_delay_ms),
            restart_max_delay: Duration::from_millis(self.recognition.restart_max_delay_ms),
            default_confidence: self.recognition.default_confidence,
        }
    }
}
