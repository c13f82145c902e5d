//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::ClientConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading and client setup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(
        "Validation failed: {}",
        .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    Validation(Vec<ValidationError>),

    #[error("TLS setup failed: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_document_yields_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.max_total_connections, 200);
        assert_eq!(config.per_route_max_connections, 50);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert_eq!(config.socket_timeout(), Duration::from_secs(5));
        assert_eq!(config.connection_request_timeout(), Duration::from_secs(5));
        assert_eq!(config.default_keep_alive(), Duration::from_secs(60));
    }

    #[test]
    fn overrides_are_applied() {
        let config = parse_config(
            r#"
            max_total_connections = 20
            per_route_max_connections = 4
            max_retries = 0
            default_keep_alive_ms = 1500

            [retry_overrides]
            other = false

            [observability]
            log_level = "debug"
            metrics_address = "127.0.0.1:9100"
            "#,
        )
        .unwrap();

        assert_eq!(config.max_total_connections, 20);
        assert_eq!(config.per_route_max_connections, 4);
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.default_keep_alive(), Duration::from_millis(1500));
        assert_eq!(config.retry_overrides.get("other"), Some(&false));
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(
            config.observability.metrics_address.as_deref(),
            Some("127.0.0.1:9100")
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = parse_config("max_total_connections = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert!(err.to_string().contains("max_total_connections"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = parse_config("max_retries = \"lots\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
