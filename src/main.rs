use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use meetscribe::http::{AppState, DeviceFactory};
use meetscribe::meeting::{
    Analyzer, EmailGenerator, InMemoryMeetingStore, NatsAnalyzer, NatsEmailGenerator,
    UnconfiguredAnalyzer, UnconfiguredEmailGenerator,
};
use meetscribe::session::SessionConfig;
use meetscribe::transcription::TranscriberFactory;
use meetscribe::{Config, ScriptedDevice};

#[derive(Parser)]
#[command(name = "meetscribe", about = "Meeting recording and transcription service")]
struct Args {
    /// Config file (without extension), loaded via the config crate.
    #[arg(long, default_value = "config/meetscribe")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let nats = match &cfg.transcription.nats_url {
        Some(url) => Some(
            async_nats::connect(url)
                .await
                .context("Failed to connect to NATS")?,
        ),
        None => {
            warn!("No NATS URL configured; transcription and analysis run in fallback mode");
            None
        }
    };

    let transcriber_factory = TranscriberFactory::new(
        cfg.transcription.backend,
        nats.clone(),
        cfg.transcription.batch_subject.clone(),
        cfg.transcription.publish_prefix.clone(),
        cfg.transcription.results_subject.clone(),
        cfg.audio.sample_rate,
        cfg.audio.channels,
        cfg.transcription.language.clone(),
    );

    let (analyzer, email): (Arc<dyn Analyzer>, Arc<dyn EmailGenerator>) = match &nats {
        Some(client) => (
            Arc::new(NatsAnalyzer::new(client.clone(), cfg.analysis.subject.clone())),
            Arc::new(NatsEmailGenerator::new(
                client.clone(),
                cfg.analysis.email_subject.clone(),
            )),
        ),
        None => (Arc::new(UnconfiguredAnalyzer), Arc::new(UnconfiguredEmailGenerator)),
    };

    let session_defaults = SessionConfig {
        chunk_interval: Duration::from_millis(cfg.audio.chunk_interval_ms),
        sample_rate: cfg.audio.sample_rate,
        channels: cfg.audio.channels,
        ..SessionConfig::default()
    };

    // Simulated microphone; a platform capture backend plugs in here.
    let sample_rate = cfg.audio.sample_rate;
    let channels = cfg.audio.channels;
    let device_factory: DeviceFactory = Arc::new(move || {
        Box::new(ScriptedDevice::tone(
            Duration::from_secs(30),
            sample_rate,
            channels,
        ))
    });

    let state = AppState::new(
        Arc::new(InMemoryMeetingStore::new()),
        analyzer,
        email,
        transcriber_factory,
        device_factory,
        session_defaults,
    );

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, meetscribe::create_router(state))
        .await
        .context("HTTP server failed")?;

    Ok(())
}
