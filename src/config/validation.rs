//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate mount paths and that IDE routes don't shadow the GraphQL route
//! - Validate value ranges (timeouts > 0, body limit > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system
//! - Codegen output extensions are checked at codegen time, not here

use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("`{}` is not a socket address", config.listener.bind_address),
        ));
    }

    check_mount_path(&mut errors, "graphql.path", &config.graphql.path);
    if let Some(path) = &config.subscriptions.path {
        check_mount_path(&mut errors, "subscriptions.path", path);
    }

    if config.ide.altair.enabled {
        check_mount_path(&mut errors, "ide.altair.path", &config.ide.altair.path);
        // Its asset catch-all would swallow every other route.
        if trim_slash(&config.ide.altair.path) == "/" {
            errors.push(ValidationError::new("ide.altair.path", "must not be the root path"));
        }
        check_no_collision(&mut errors, "ide.altair.path", &config.ide.altair.path, &config.graphql.path);
    }
    if config.ide.graphiql.enabled {
        check_mount_path(&mut errors, "ide.graphiql.path", &config.ide.graphiql.path);
        check_no_collision(&mut errors, "ide.graphiql.path", &config.ide.graphiql.path, &config.graphql.path);
    }
    if config.ide.altair.enabled
        && config.ide.graphiql.enabled
        && trim_slash(&config.ide.altair.path) == trim_slash(&config.ide.graphiql.path)
    {
        errors.push(ValidationError::new(
            "ide.graphiql.path",
            "must differ from ide.altair.path",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("`{}` is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.codegen.enabled && config.codegen.target_path.as_os_str().is_empty() {
        errors.push(ValidationError::new("codegen.target_path", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_mount_path(errors: &mut Vec<ValidationError>, field: &str, path: &str) {
    if !path.starts_with('/') {
        errors.push(ValidationError::new(field, format!("`{path}` must start with '/'")));
    }
    if path.contains('?') || path.contains('#') {
        errors.push(ValidationError::new(field, format!("`{path}` must be a bare path")));
    }
}

fn check_no_collision(errors: &mut Vec<ValidationError>, field: &str, path: &str, graphql_path: &str) {
    if trim_slash(path) == trim_slash(graphql_path) {
        errors.push(ValidationError::new(field, "must differ from graphql.path"));
    }
}

fn trim_slash(path: &str) -> &str {
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}
