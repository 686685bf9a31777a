mod config;
mod constants;
mod detection;
mod logging;
mod models;
mod routes;
mod services;
mod text;

use anyhow::{Context, Result};
use std::sync::Arc;

use config::ServerConfig;
use detection::{FfmpegSampler, MediaAnalyzer, SeetaDetector, XceptionScorer};
use text::{DistilBertClassifier, TextClassifier};

/// Loaded backends. `None` means the model failed to load and its endpoint
/// answers 503.
pub struct AppState {
    pub analyzer: Option<Arc<MediaAnalyzer>>,
    pub text: Option<Arc<dyn TextClassifier>>,
}

fn load_analyzer(config: &ServerConfig) -> Result<MediaAnalyzer> {
    let detector = SeetaDetector::from_file(&config.face_model)?;
    let scorer = XceptionScorer::load(&config.deepfake_weights)?;
    Ok(MediaAnalyzer::new(
        Box::new(FfmpegSampler::new()),
        Box::new(detector),
        Box::new(scorer),
    ))
}

fn load_state(config: &ServerConfig) -> AppState {
    let analyzer = match load_analyzer(config) {
        Ok(analyzer) => Some(Arc::new(analyzer)),
        Err(e) => {
            log::warn!("Deepfake detection disabled: {e:#}");
            None
        }
    };

    let text: Option<Arc<dyn TextClassifier>> = match DistilBertClassifier::load(&config.text_model)
    {
        Ok(classifier) => Some(Arc::new(classifier)),
        Err(e) => {
            log::warn!("Text classification disabled: {e:#}");
            None
        }
    };

    AppState { analyzer, text }
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let config = ServerConfig::from_env()?;
    log::info!("Starting with {:?}", config);

    let port = config.port;
    let state = tokio::task::spawn_blocking(move || load_state(&config))
        .await
        .context("Model loading task failed")?;

    let app = routes::build_app(Arc::new(state));

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    log::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await.context("Server failed")?;
    Ok(())
}
