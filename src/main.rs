//! Voice Dialogue - turns a speaker-annotated script into one audio file.
//!
//! Each `[男性]` / `[女性]` block of the script is synthesized by a speech
//! backend (a local COEIROINK-compatible engine, Google Cloud TTS, or an
//! offline Kokoro model), and the clips are joined with short pauses.

mod audio;
mod config;
mod pipeline;
mod script;
mod server;
mod tts;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::LocalTime;

use config::{AppConfig, BackendKind};
use pipeline::{Pipeline, PipelineSettings};
use server::AppState;
use tts::{BackendChain, CloudBackend, EngineBackend, EngineProcess, SpeechBackend};

/// Start the engine executable when one is configured, and wait for it to answer.
async fn start_engine(config: &AppConfig) -> Option<EngineProcess> {
    let executable = config.engine_executable.as_ref().filter(|_| config.uses_backend(BackendKind::Engine))?;

    let Some(port) = config.engine_port() else {
        warn!("Engine URL {} has no port, not starting {}", config.engine_url, executable.display());
        return None;
    };

    let mut process = match EngineProcess::spawn(executable, port) {
        Ok(process) => process,
        Err(e) => {
            warn!("{:#}", e);
            return None;
        }
    };

    let probe = EngineBackend::new(&config.engine_url, config.probe_timeout());
    if !process.wait_ready(&probe, config.engine_startup_timeout()).await {
        warn!("Continuing without a ready engine; other backends will be tried");
    }
    Some(process)
}

/// Build the configured backends in fallback order.
fn build_backends(config: &AppConfig) -> Vec<Arc<dyn SpeechBackend>> {
    let mut backends: Vec<Arc<dyn SpeechBackend>> = Vec::new();

    for kind in &config.backends {
        match kind {
            BackendKind::Engine => backends.push(Arc::new(EngineBackend::new(&config.engine_url, config.probe_timeout()))),
            BackendKind::Cloud => {
                let key = config.cloud_api_key.as_deref().unwrap_or_default();
                backends.push(Arc::new(CloudBackend::new(&config.cloud_url, key, config.cloud_voices(), config.probe_timeout())));
            }
            #[cfg(feature = "kokoro")]
            BackendKind::Kokoro => match tts::KokoroBackend::new(config) {
                Ok(backend) => backends.push(Arc::new(backend)),
                Err(e) => warn!("Kokoro backend unavailable: {:#}", e),
            },
            #[cfg(not(feature = "kokoro"))]
            BackendKind::Kokoro => warn!("Kokoro backend requested but this build lacks the 'kokoro' feature"),
        }
    }

    backends
}

/// Synthesize the script once and report where the result went.
async fn run_once(pipeline: &Pipeline, script: &Path) -> Result<()> {
    let report = pipeline.run_script_file(script).await?;

    for skipped in &report.lines_skipped {
        warn!("Line {} skipped: {}", skipped.index + 1, skipped.reason);
    }
    info!("🎧 {}/{} line(s) synthesized", report.lines_synthesized, report.lines_total);
    println!("{}", report.file_path.display());
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() {
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("🛑 Received Ctrl+C, shutting down...");
        }
        _ = async {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => { sigterm.recv().await; }
                    Err(e) => {
                        warn!("Failed to register SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            info!("🛑 Received SIGTERM, shutting down...");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let config = AppConfig::from_args();

    // Respect RUST_LOG env var, fallback to verbose flag, default to info
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| if config.verbose { EnvFilter::try_new("debug") } else { EnvFilter::try_new("info") })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_timer(LocalTime::new(time::macros::format_description!("[hour]:[minute]:[second]")))
        .init();

    info!("🎙️  Voice Dialogue v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = config.validate() {
        error!("❌ Configuration error: {}", e);
        std::process::exit(1);
    }
    config.log_config();

    let engine = start_engine(&config).await;

    let mut chain = BackendChain::new(build_backends(&config), config.synthesis_timeout());
    let roster = match chain.initialize().await {
        Ok(roster) => roster,
        Err(e) => {
            error!("❌ Initialization failed: {}", e);
            if let Some(engine) = engine {
                engine.shutdown().await;
            }
            std::process::exit(1);
        }
    };
    info!("Active backends: {}", chain.names().join(" -> "));

    let result = if config.list_speakers {
        roster.print();
        Ok(())
    } else {
        let pipeline = Arc::new(Pipeline::new(chain, roster, PipelineSettings::from_config(&config)));
        if config.serve {
            let state = Arc::new(AppState::new(pipeline, config.script.clone()));
            server::serve(state, &config.listen, wait_for_shutdown()).await
        } else {
            run_once(&pipeline, &config.script).await
        }
    };

    if let Some(engine) = engine {
        engine.shutdown().await;
    }

    if let Err(e) = &result {
        error!("❌ {:#}", e);
    }
    result
}
