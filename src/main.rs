use anyhow::Result;
use callcoach::{
    create_router, AppState, CoachSession, Config, JsonFileStore, NatsRecognizerFactory,
    SessionEvent,
};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "callcoach", about = "Real-time call transcription and coaching service")]
struct Args {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/callcoach")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("callcoach v0.1.0");
    info!("Loaded config: {}", cfg.service.name);
    info!(
        "HTTP server will bind to {}:{}",
        cfg.service.http.bind, cfg.service.http.port
    );

    let session_id = format!("call-{}", uuid::Uuid::new_v4());
    let factory = Arc::new(NatsRecognizerFactory::new(
        cfg.recognition.nats_url.clone(),
        session_id.clone(),
    ));
    let store = Arc::new(JsonFileStore::new(&cfg.storage.snapshot_path));

    let (session, mut events) = CoachSession::new(
        cfg.session_config(session_id),
        factory,
        store,
    );
    let session = Arc::new(session.with_analysis_prompt(cfg.analysis.prompt.clone()));

    if session.resume().await? {
        info!("Resumed interrupted recording session");
    }

    // Forward engine events to the log until a UI sink attaches
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::TranscriptUpdate { text, is_final } if is_final => {
                    info!("transcript: {}", text);
                }
                SessionEvent::TranscriptUpdate { .. } => {}
                SessionEvent::Tip(tip) => {
                    info!(title = %tip.title, "coaching tip: {}", tip.content);
                }
                SessionEvent::PermissionDenied => {
                    warn!("Recognition permission denied; session terminated");
                }
                SessionEvent::RestartExhausted => {
                    warn!("Recognition restart failed twice; manual restart required");
                }
            }
        }
    });

    let state = AppState::new(Arc::clone(&session));
    let router = create_router(state);
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("HTTP control API listening on {}", addr);
    axum::serve(listener, router).await?;

    Ok(())
}
