//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (buffers > 0, ports valid, URLs parse)
//! - Detect two applications statically assigned to the same port
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: TlbConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashMap;
use std::net::SocketAddr;

use thiserror::Error;
use url::Url;

use crate::config::schema::TlbConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("marathon.url is not a valid URL: {0}")]
    MarathonUrl(String),

    #[error("listener.max_connections must be greater than 0")]
    ZeroMaxConnections,

    #[error("discovery.command_buffer must be greater than 0")]
    ZeroCommandBuffer,

    #[error("relay.connect_timeout_secs must be greater than 0")]
    ZeroConnectTimeout,

    #[error("frontend port for {0} must be non-zero")]
    ZeroPort(String),

    #[error("port {port} is assigned to both {first} and {second}")]
    DuplicatePort {
        port: u16,
        first: String,
        second: String,
    },

    #[error("observability.metrics_address is not a socket address: {0}")]
    MetricsAddress(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &TlbConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if Url::parse(&config.marathon.url).is_err() {
        errors.push(ValidationError::MarathonUrl(config.marathon.url.clone()));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }
    if config.discovery.command_buffer == 0 {
        errors.push(ValidationError::ZeroCommandBuffer);
    }
    if config.relay.connect_timeout_secs == 0 {
        errors.push(ValidationError::ZeroConnectTimeout);
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    // Sort so duplicate reports are deterministic.
    let mut assignments: Vec<(&String, &u16)> = config.frontends.iter().collect();
    assignments.sort();
    let mut seen: HashMap<u16, &String> = HashMap::new();
    for (app_id, port) in assignments {
        if *port == 0 {
            errors.push(ValidationError::ZeroPort(app_id.clone()));
            continue;
        }
        if let Some(first) = seen.insert(*port, app_id) {
            errors.push(ValidationError::DuplicatePort {
                port: *port,
                first: first.clone(),
                second: app_id.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&TlbConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = TlbConfig::default();
        config.marathon.url = "not a url".into();
        config.discovery.command_buffer = 0;
        config.frontends.insert("/a".into(), 9000);
        config.frontends.insert("/b".into(), 9000);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::ZeroCommandBuffer));
        assert!(errors.contains(&ValidationError::DuplicatePort {
            port: 9000,
            first: "/a".into(),
            second: "/b".into(),
        }));
    }

    #[test]
    fn metrics_address_ignored_when_disabled() {
        let mut config = TlbConfig::default();
        config.observability.metrics_enabled = false;
        config.observability.metrics_address = "nonsense".into();
        assert!(validate_config(&config).is_ok());
    }
}
