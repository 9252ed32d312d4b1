//! Configuration loading, defaulting, and validation.
//!
//! [`load`] reads a config file, picks the parser from its extension via
//! [`parse_config_str`], fills defaults, and validates the result.
//! Submodules provide the data model and validation logic.

pub mod model;
pub mod validation;

use std::path::Path;

use crate::error::GatewayError;
use model::Config;

/// Parse a config string based on file extension.
///
/// Blank content yields the default configuration.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, GatewayError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" if content.trim().is_empty() => Ok(Config::default()),

        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| GatewayError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" if content.trim().is_empty() => Ok(Config::default()),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| GatewayError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(GatewayError::UnsupportedFormat(other.to_string())),
    }
}

/// Parse, fill defaults, and validate a config string.
pub fn resolve_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, GatewayError> {
    let mut config = parse_config_str(ext, content, path_display)?;
    config.apply_defaults();

    if let Err(errors) = validation::validate(&config) {
        return Err(GatewayError::ConfigValidation { errors });
    }

    Ok(config)
}

/// Read and resolve the config file at `path`.
pub async fn load(path: &Path) -> Result<Config, GatewayError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            GatewayError::ConfigFileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            GatewayError::Io(e)
        }
    })?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    resolve_config_str(ext, &content, &path.display().to_string())
}
