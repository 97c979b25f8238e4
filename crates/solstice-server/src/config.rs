//! Server configuration module
//!
//! Handles loading and validation of server configuration from environment
//! variables, configuration files, and defaults.

use serde::{Deserialize, Serialize};
use solstice_host::PluginHostConfig;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Request timeout in seconds
    pub request_timeout_secs: u64,

    /// CORS configuration
    pub cors: CorsConfig,

    /// Plugin engine configuration
    pub plugins: PluginHostConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// CORS (Cross-Origin Resource Sharing) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Allow any origin (development only)
    pub allow_any_origin: bool,

    /// List of allowed origins
    pub allowed_origins: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            cors: CorsConfig::default(),
            plugins: PluginHostConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_any_origin: false,
            allowed_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment and config files
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            // Start with default values
            .add_source(config::Config::try_from(&ServerConfig::default())?)
            // Add environment-specific config file
            .add_source(config::File::with_name("config/solstice").required(false))
            // Add environment variables with prefix SOLSTICE_
            .add_source(config::Environment::with_prefix("SOLSTICE").separator("__"))
            .build()?;

        settings.try_deserialize()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.port == 0 {
            return Err("Port must be greater than 0".to_string());
        }

        self.plugins.validate()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, "0.0.0.0");
        assert!(config.plugins.enable_hot_swap);
    }

    #[test]
    fn test_config_validation() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid_config = ServerConfig::default();
        invalid_config.port = 0;
        assert!(invalid_config.validate().is_err());
    }
}
