//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors such as an empty route list, invalid or duplicate handler paths,
//! malformed upstream URLs, zero timeouts, and half-configured client
//! certificates. Returns a list of [`ValidationError`] values with
//! per-field suggestions.

use url::Url;

use super::model::Config;
use crate::error::ValidationError;

/// Validate a single handler path. Returns `Ok(())` or a human-readable error.
pub fn validate_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("path cannot be empty".into());
    }
    if !path.starts_with('/') {
        return Err(format!("path must start with '/' (did you mean '/{path}'?)"));
    }
    if path.contains(['{', '}', '*']) {
        return Err("path must be literal; '{', '}' and '*' are not allowed".into());
    }
    if path.split('/').any(|segment| segment.starts_with(':')) {
        return Err("path segments cannot start with ':'".into());
    }
    Ok(())
}

/// Validate a single upstream URL. Returns `Ok(())` or a human-readable error.
pub fn validate_upstream_url(url: &str) -> Result<(), String> {
    match Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else {
                Ok(())
            }
        }
        Err(_) => Err(format!("'{url}' is not a valid URL")),
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.metrics.is_empty() {
        errors.push(ValidationError {
            route: "(root)".into(),
            field: "metrics".into(),
            message: "at least one metrics route must be defined".into(),
            suggestion: Some("remove the empty 'metrics' list to use the default route".into()),
        });
        return Err(errors);
    }

    let mut seen_paths = std::collections::HashSet::new();

    for (i, metric) in config.metrics.iter().enumerate() {
        let route_id = if metric.handler_path.is_empty() {
            format!("metrics[{i}]")
        } else {
            metric.handler_path.clone()
        };

        if let Err(msg) = validate_path(&metric.handler_path) {
            errors.push(ValidationError {
                route: route_id.clone(),
                field: "handler_path".into(),
                message: msg,
                suggestion: if !metric.handler_path.is_empty()
                    && !metric.handler_path.starts_with('/')
                {
                    Some(format!("did you mean '/{}'?", metric.handler_path))
                } else {
                    None
                },
            });
        }

        if !seen_paths.insert(&metric.handler_path) {
            errors.push(ValidationError {
                route: route_id.clone(),
                field: "handler_path".into(),
                message: "duplicate handler path".into(),
                suggestion: None,
            });
        }

        if let Err(msg) = validate_upstream_url(&metric.url) {
            errors.push(ValidationError {
                route: route_id.clone(),
                field: "url".into(),
                message: msg,
                suggestion: None,
            });
        }

        if metric.response_timeout == 0 {
            errors.push(ValidationError {
                route: route_id.clone(),
                field: "response_timeout".into(),
                message: "timeout must be at least 1 second".into(),
                suggestion: None,
            });
        }

        match (&metric.tls_cert, &metric.tls_key) {
            (Some(_), None) => errors.push(ValidationError {
                route: route_id.clone(),
                field: "tls_key".into(),
                message: "tls_key is required when tls_cert is set".into(),
                suggestion: None,
            }),
            (None, Some(_)) => errors.push(ValidationError {
                route: route_id.clone(),
                field: "tls_cert".into(),
                message: "tls_cert is required when tls_key is set".into(),
                suggestion: None,
            }),
            _ => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let mut lines = vec![format!(
        "  {} routes, listening on port {}\n",
        config.metrics.len(),
        config.server.port
    )];

    for metric in &config.metrics {
        lines.push(format!("  {}  -> {}", metric.handler_path, metric.url));
        lines.push(format!("    timeout: {}s", metric.response_timeout));
        if metric.tls_cert.is_some() {
            lines.push("    tls: client certificate".into());
        }
        if metric.tls_insecure_verify {
            lines.push("    tls: server certificate NOT verified".into());
        }
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}
