use anyhow::Context;
use engine::DetectionEngine;
use gateway::{
    config::{GatewayConfig, get_configuration},
    dispatch::{DispatchConfig, DispatchHandle},
    routes,
    state::AppState,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = get_configuration().context("failed to load configuration")?;
    common::setup_logging(config.log_level.as_str(), config.environment);

    tracing::info!(
        listen_addr = %config.listen_addr,
        model_path = %config.model_path,
        queue_depth = config.queue_depth,
        pacing_interval_ms = config.pacing_interval_ms,
        "Gateway starting"
    );

    // Engine-load failure aborts startup; serving without a model would
    // degrade silently.
    let detection_engine = load_engine(&config).context("failed to load detection engine")?;

    let dispatch = DispatchHandle::spawn(
        detection_engine,
        DispatchConfig {
            queue_depth: config.queue_depth,
            infer_timeout: config.infer_timeout(),
            confidence_threshold: config.confidence_threshold,
        },
    );

    let state = AppState::new(dispatch, config.pacing_interval());
    let app = routes::router(state, config.static_dir.as_deref());

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!("Listening on {}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "ort-backend")]
fn load_engine(config: &GatewayConfig) -> anyhow::Result<Arc<dyn DetectionEngine>> {
    tracing::info!("Loading inference model");
    let backend = engine::backend::ort::OrtEngine::load(&config.model_path, config.input_size())?;
    tracing::info!("Model loaded successfully");
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "ort-backend"))]
fn load_engine(_config: &GatewayConfig) -> anyhow::Result<Arc<dyn DetectionEngine>> {
    anyhow::bail!(
        "gateway was built without an inference backend; rebuild with `--features ort-backend`"
    )
}
