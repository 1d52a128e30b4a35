use config::{Config, ConfigError};
use serde::Deserialize;
use tracing::debug;

/// Immutable run configuration, threaded explicitly through every stage.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Root holding the song catalog and event logs (URL or local path).
    pub input_data: String,
    /// Root receiving the five output tables (URL or local path).
    pub output_data: String,
    #[serde(default = "default_song_data_prefix")]
    pub song_data_prefix: String,
    #[serde(default = "default_log_data_prefix")]
    pub log_data_prefix: String,
    #[serde(default)]
    pub storage: StorageSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageSettings {
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom S3 endpoint (MinIO, localstack).
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub allow_http: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            access_key_id: None,
            secret_access_key: None,
            region: default_region(),
            endpoint: None,
            allow_http: false,
        }
    }
}

fn default_song_data_prefix() -> String {
    "song_data".to_string()
}

fn default_log_data_prefix() -> String {
    "log_data".to_string()
}

fn default_region() -> String {
    "us-west-2".to_string()
}

impl Settings {
    pub fn new(path: &str) -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        Self::from_config(builder.build()?)
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        let settings: Settings = config.try_deserialize()?;

        debug!(
            input = %settings.input_data,
            output = %settings.output_data,
            region = %settings.storage.region,
            endpoint = ?settings.storage.endpoint,
            "Loaded pipeline settings"
        );

        Ok(settings)
    }
}
