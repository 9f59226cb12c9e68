//! # Configuration
//!
//! An explicit [`Config`] value is built once at startup and handed to the components that need it.
//! There's no process-wide default instance.
//!
//! The on-disk format is JSON. Durations are stored in milliseconds:
//!
//! ```json
//! {
//!   "connect_timeout_ms": 5000,
//!   "default_deadline_ms": 30000,
//!   "schema": { "max_depth": 8 },
//!   "json": { "emit_default_fields": false, "use_proto_field_names": false },
//!   "endpoints": [{ "name": "greeter", "host": "127.0.0.1", "port": 50051 }]
//! }
//! ```
//!
//! Every field is optional; missing fields take their default value.
use prost_reflect::{DeserializeOptions, SerializeOptions};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': '{source}'")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Invalid config: '{0}'")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Upper bound for establishing a channel to a new endpoint.
    pub connect_timeout_ms: u64,
    /// Deadline applied to calls that don't bring their own. `None` means no deadline.
    pub default_deadline_ms: Option<u64>,
    pub schema: SchemaConfig,
    pub json: JsonConfig,
    /// Endpoints to register at startup.
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            default_deadline_ms: None,
            schema: SchemaConfig::default(),
            json: JsonConfig::default(),
            endpoints: Vec::new(),
        }
    }
}

impl Config {
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn default_deadline(&self) -> Option<Duration> {
        self.default_deadline_ms.map(Duration::from_millis)
    }
}

/// Settings of the schema compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaConfig {
    /// Maximum nesting of message expansion below the root. `None` expands until a
    /// message repeats on the current path.
    pub max_depth: Option<usize>,
}

/// How payloads are mapped between JSON and Protobuf.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonConfig {
    /// Emit fields holding their default value in responses.
    pub emit_default_fields: bool,
    /// Use the `.proto` field names in responses instead of lowerCamelCase.
    pub use_proto_field_names: bool,
}

impl JsonConfig {
    pub fn serialize_options(&self) -> SerializeOptions {
        SerializeOptions::new()
            .skip_default_fields(!self.emit_default_fields)
            .use_proto_field_name(self.use_proto_field_names)
    }

    /// Requests are strict: unknown fields are rejected.
    pub fn deserialize_options(&self) -> DeserializeOptions {
        DeserializeOptions::new().deny_unknown_fields(true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
}
