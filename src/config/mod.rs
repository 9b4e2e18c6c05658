// config/mod.rs
use ::config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub metrics: MetricsSettings,
    pub logging: LoggingSettings,
    pub gateway: GatewaySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub address: String,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Fallback `EnvFilter` directive when `RUST_LOG` is not set.
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySettings {
    pub devices_file: PathBuf,
    /// Executed commands remembered per device.
    pub history_limit: usize,
    /// Write descriptor updates back to `devices_file`.
    pub persist_updates: bool,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::load("config/config")
    }

    /// Defaults, then the optional file at `path`, then `APP__*` variables.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("server.address", "0.0.0.0:8080")?
            .set_default("server.max_body_bytes", 65_536_i64)?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.port", 9000_i64)?
            .set_default("logging.filter", "info")?
            .set_default("gateway.devices_file", "config/devices.json")?
            .set_default("gateway.history_limit", 100_i64)?
            .set_default("gateway.persist_updates", false)?
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            .build()?;

        settings.try_deserialize()
    }
}
