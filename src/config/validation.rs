//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate address lists and value ranges
//! - Reject load balancing modes other than singlewriter
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RouterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;

use crate::config::schema::RouterConfig;
use crate::net::endpoint::parse_host_list;

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending key, e.g. `galera.cluster_host`.
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const LOG_FORMATS: &[&str] = &["pretty", "json"];

pub fn validate_config(config: &RouterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let galera = &config.galera;

    if galera.cluster_host.trim().is_empty() {
        errors.push(ValidationError::new("galera.cluster_host", "must not be empty"));
    } else if let Err(e) = parse_host_list(&galera.cluster_host) {
        errors.push(ValidationError::new("galera.cluster_host", e.to_string()));
    }

    if let Some(blacklist) = &galera.writer_blacklist {
        if let Err(e) = parse_host_list(blacklist) {
            errors.push(ValidationError::new("galera.writer_blacklist", e.to_string()));
        }
    }

    if galera.writer_hostgroup_id == galera.reader_hostgroup_id {
        errors.push(ValidationError::new(
            "galera.reader_hostgroup_id",
            "must differ from writer_hostgroup_id",
        ));
    }

    if galera.load_balancing_mode != "singlewriter" {
        errors.push(ValidationError::new(
            "galera.load_balancing_mode",
            format!("unsupported mode '{}'", galera.load_balancing_mode),
        ));
    }

    if config.proxysql.admin_socket.is_none() && config.proxysql.host.trim().is_empty() {
        errors.push(ValidationError::new(
            "proxysql.host",
            "must be set when admin_socket is not",
        ));
    }

    if config.timeouts.node_connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.node_connect_secs", "must be > 0"));
    }
    if config.timeouts.admin_connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.admin_connect_secs", "must be > 0"));
    }

    if !LOG_FORMATS.contains(&config.observability.log_format.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("expected one of {:?}", LOG_FORMATS),
        ));
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

    fn valid() -> RouterConfig {
        let mut config = RouterConfig::default();
        config.galera.cluster_host = "db1:3306,db2:3306".to_string();
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid()).is_ok());
    }

    #[test]
    fn test_reports_every_error() {
        let mut config = valid();
        config.galera.cluster_host = "db1".to_string();
        config.galera.reader_hostgroup_id = 10;
        config.galera.load_balancing_mode = "loadbal".to_string();
        config.timeouts.node_connect_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "galera.cluster_host",
                "galera.reader_hostgroup_id",
                "galera.load_balancing_mode",
                "timeouts.node_connect_secs",
            ]
        );
    }

    #[test]
    fn test_empty_cluster_host() {
        let errors = validate_config(&RouterConfig::default()).unwrap_err();
        assert_eq!(errors[0].to_string(), "galera.cluster_host: must not be empty");
    }

    #[test]
    fn test_bad_blacklist_and_log_format() {
        let mut config = valid();
        config.galera.writer_blacklist = Some("db1:port".to_string());
        config.observability.log_format = "xml".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
