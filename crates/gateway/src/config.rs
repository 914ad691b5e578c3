use common::Environment;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GatewayConfig {
    pub log_level: LogLevel,
    #[serde(deserialize_with = "deserialize_environment")]
    pub environment: Environment,
    pub listen_addr: String,
    pub model_path: String,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub pacing_interval_ms: u64,
    pub queue_depth: usize,
    pub infer_timeout_ms: u64,
    pub static_dir: Option<String>,
}

impl GatewayConfig {
    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval_ms)
    }

    pub fn infer_timeout(&self) -> Duration {
        Duration::from_millis(self.infer_timeout_ms)
    }

    pub fn input_size(&self) -> (u32, u32) {
        (self.input_size, self.input_size)
    }
}

/// Load configuration from `GATEWAY_`-prefixed environment variables on
/// top of built-in defaults.
pub fn get_configuration() -> Result<GatewayConfig, config::ConfigError> {
    let config = config::Config::builder()
        .set_default("log_level", "info")?
        .set_default("environment", "development")?
        .set_default("listen_addr", "0.0.0.0:8080")?
        .set_default("model_path", "models/best.onnx")?
        .set_default("input_size", 640)?
        .set_default("confidence_threshold", 0.25)?
        .set_default("pacing_interval_ms", 66)?
        .set_default("queue_depth", 32)?
        .set_default("infer_timeout_ms", 10_000)?
        .add_source(
            config::Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    config.try_deserialize::<GatewayConfig>()
}

fn deserialize_environment<'de, D>(deserializer: D) -> Result<Environment, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Environment::try_from(raw).map_err(serde::de::Error::custom)
}
