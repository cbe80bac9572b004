//! Configuration management for the protocol migrator
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (protocol.toml)
//! - Environment variables (COMPAT__*)
//!
//! ## Example config file (protocol.toml):
//! ```toml
//! [protocol]
//! min_version = "0.0.0"
//! max_version = "1.0.0"
//! default_version = "0.2.0"
//! detection_line_limit = 10
//!
//! [output]
//! format = "compact"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::version::{ProtocolVersion, ProtocolVersionRange, DEFAULT_PROTOCOL_VERSION, V1};

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompatConfig {
    /// Protocol version settings
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Protocol version settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Oldest version accepted from connectors
    #[serde(default = "default_min_version")]
    pub min_version: String,

    /// Newest version accepted from connectors
    #[serde(default = "default_max_version")]
    pub max_version: String,

    /// Assumed when a connector does not declare a version
    #[serde(default = "default_version")]
    pub default_version: String,

    /// How many leading lines to inspect for a SPEC message
    #[serde(default = "default_detection_line_limit")]
    pub detection_line_limit: usize,
}

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pretty,
    #[default]
    Compact,
}

impl OutputFormat {
    /// Render `value` as JSON text in this format
    pub fn render<T: Serialize + ?Sized>(&self, value: &T) -> serde_json::Result<String> {
        match self {
            OutputFormat::Pretty => serde_json::to_string_pretty(value),
            OutputFormat::Compact => serde_json::to_string(value),
        }
    }
}

// Default value functions
fn default_min_version() -> String {
    "0.0.0".to_string()
}

fn default_max_version() -> String {
    V1.version_string()
}

fn default_version() -> String {
    DEFAULT_PROTOCOL_VERSION.version_string()
}

fn default_detection_line_limit() -> usize {
    10
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            min_version: default_min_version(),
            max_version: default_max_version(),
            default_version: default_version(),
            detection_line_limit: default_detection_line_limit(),
        }
    }
}

impl CompatConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering a specific file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["protocol.toml", ".protocol.toml", "config/protocol.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) =
            directories::ProjectDirs::from("dev", "protocol-compat", "migrate")
        {
            let xdg_config = config_dir.config_dir().join("protocol.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // COMPAT__PROTOCOL__MAX_VERSION=1.0.0
        builder = builder.add_source(
            Environment::with_prefix("COMPAT")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Versions accepted from connectors
    pub fn supported_range(&self) -> Result<ProtocolVersionRange, semver::Error> {
        Ok(ProtocolVersionRange::new(
            ProtocolVersion::parse(&self.protocol.min_version)?,
            ProtocolVersion::parse(&self.protocol.max_version)?,
        ))
    }

    pub fn default_version(&self) -> Result<ProtocolVersion, semver::Error> {
        ProtocolVersion::parse(&self.protocol.default_version)
    }
}
