use std::path::Path;

use serde::Deserialize;

use crate::error::{BridgeError, BridgeResult};

/// Root application configuration. Loaded from environment variables
/// with the prefix `RAMEN_BRIDGE__` and an optional TOML config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub ramen: RamenConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Adaptor-level options for the Ramen destination.
#[derive(Debug, Clone, Deserialize)]
pub struct RamenConfig {
    /// Copied into every published `organization_id`.
    #[serde(default)]
    pub organization_id: String,
    /// Key under `integrations` that carries per-destination options.
    #[serde(default = "default_integration_name")]
    pub integration_name: String,
    #[serde(default = "default_partner")]
    pub partner: String,
    #[serde(default = "default_disable_location_watch")]
    pub disable_location_watch: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
    #[serde(default = "default_log_json")]
    pub json: bool,
}

// Default functions
fn default_integration_name() -> String {
    "Ramen".to_string()
}
fn default_partner() -> String {
    "segment.com".to_string()
}
fn default_disable_location_watch() -> bool {
    true
}
fn default_log_filter() -> String {
    "ramen_bridge=info,ramen_web_sdk=info".to_string()
}
fn default_log_json() -> bool {
    true
}

impl Default for RamenConfig {
    fn default() -> Self {
        Self {
            organization_id: String::new(),
            integration_name: default_integration_name(),
            partner: default_partner(),
            disable_location_watch: default_disable_location_watch(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            json: default_log_json(),
        }
    }
}

impl RamenConfig {
    pub fn new(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> BridgeResult<()> {
        if self.organization_id.trim().is_empty() {
            return Err(BridgeError::Config(
                "ramen.organization_id must not be empty".into(),
            ));
        }
        if self.integration_name.trim().is_empty() {
            return Err(BridgeError::Config(
                "ramen.integration_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file, then environment
    /// variables (which take precedence).
    pub fn load(path: Option<&Path>) -> BridgeResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("RAMEN_BRIDGE")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}
