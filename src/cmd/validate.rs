//! `prom2json-gateway validate`: check a configuration file for errors.
//!
//! Parses, defaults, and validates the config file, then builds every
//! upstream client so unreadable TLS material is caught too. Reports in
//! either human-readable text or machine-readable JSON.

use crate::cli::{ValidateArgs, ValidateFormat};
use crate::config::{self, validation};
use crate::error::GatewayError;
use crate::gateway::RouteRegistry;

pub async fn execute(args: &ValidateArgs) -> Result<(), GatewayError> {
    let path = &args.config;

    let result = match config::load(path).await {
        Ok(config) => RouteRegistry::from_specs(&config.upstream_specs()).map(|_| config),
        Err(e) => Err(e),
    };

    let config = match result {
        Ok(config) => config,
        Err(e) => {
            match args.format {
                ValidateFormat::Text => {
                    eprintln!("\u{2717} {} is invalid\n", path.display());
                }
                ValidateFormat::Json => {
                    println!("{}", invalid_report(&e));
                }
            }
            return Err(e);
        }
    };

    match args.format {
        ValidateFormat::Text => {
            println!(
                "\u{2713} {}",
                validation::format_validation_report(&path.display().to_string(), &config)
            );
        }
        ValidateFormat::Json => {
            let routes: Vec<serde_json::Value> = config
                .metrics
                .iter()
                .map(|m| {
                    serde_json::json!({
                        "handler_path": m.handler_path,
                        "url": m.url,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::json!({
                    "valid": true,
                    "port": config.server.port,
                    "routes": routes,
                })
            );
        }
    }

    Ok(())
}

fn invalid_report(e: &GatewayError) -> serde_json::Value {
    let errors: Vec<serde_json::Value> = match e {
        GatewayError::ConfigValidation { errors } => errors
            .iter()
            .map(|e| {
                serde_json::json!({
                    "route": e.route,
                    "field": e.field,
                    "message": e.message,
                    "suggestion": e.suggestion,
                })
            })
            .collect(),
        other => vec![serde_json::json!({ "message": other.to_string() })],
    };
    serde_json::json!({
        "valid": false,
        "errors": errors,
    })
}
