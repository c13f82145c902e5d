//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and names that serde
//! cannot. All problems are reported at once rather than just the first.

use std::net::SocketAddr;

use crate::config::schema::ClientConfig;
use crate::error::FaultKind;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("max_total_connections must be greater than zero")]
    ZeroMaxTotal,

    #[error("per_route_max_connections must be greater than zero")]
    ZeroPerRoute,

    #[error("unknown fault kind `{0}` in retry_overrides")]
    UnknownFaultKind(String),

    #[error("invalid metrics_address `{0}`")]
    InvalidMetricsAddress(String),

    #[error("invalid user_agent `{0}`")]
    InvalidUserAgent(String),
}

/// Check a parsed configuration.
pub fn validate_config(config: &ClientConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.max_total_connections == 0 {
        errors.push(ValidationError::ZeroMaxTotal);
    }
    if config.per_route_max_connections == 0 {
        errors.push(ValidationError::ZeroPerRoute);
    }

    for name in config.retry_overrides.keys() {
        if name.parse::<FaultKind>().is_err() {
            errors.push(ValidationError::UnknownFaultKind(name.clone()));
        }
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.clone()));
        }
    }

    if hyper::header::HeaderValue::from_str(&config.user_agent).is_err() {
        errors.push(ValidationError::InvalidUserAgent(config.user_agent.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
