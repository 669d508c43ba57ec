use anyhow::Result;
use serde::Deserialize;

use crate::transcription::TranscriptionBackend;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub transcription: TranscriptionConfig,
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
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    /// Milliseconds between emitted chunks.
    pub chunk_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct TranscriptionConfig {
    pub backend: TranscriptionBackend,
    /// Absent means no service is configured; sessions fall back to
    /// placeholder fragments.
    pub nats_url: Option<String>,
    pub batch_subject: String,
    pub publish_prefix: String,
    pub results_subject: String,
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    pub subject: String,
    pub email_subject: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
