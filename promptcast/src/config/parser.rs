//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;

use super::defaults::MAX_WORKERS;
use super::file::ConfigFileError;
use super::settings::{ConfigFile, ServiceSettings};

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [generator] section
    if let Some(section) = ini.section(Some("generator")) {
        parse_service(section, "generator", &mut config.generator)?;
    }

    // [upscaler] section
    if let Some(section) = ini.section(Some("upscaler")) {
        parse_service(section, "upscaler", &mut config.upscaler)?;
    }

    // [pipeline] section
    if let Some(section) = ini.section(Some("pipeline")) {
        if let Some(v) = section.get("generate_workers") {
            config.pipeline.generate_workers = parse_workers(v, "generate_workers")?;
        }
        if let Some(v) = section.get("upscale_workers") {
            config.pipeline.upscale_workers = parse_workers(v, "upscale_workers")?;
        }
        if let Some(v) = section.get("request_timeout") {
            config.pipeline.request_timeout = parse_positive(v, "pipeline", "request_timeout")?;
        }
        if let Some(v) = section.get("failure_policy") {
            config.pipeline.failure_policy =
                v.parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: "pipeline".to_string(),
                    key: "failure_policy".to_string(),
                    value: v.to_string(),
                    reason: "must be 'drop' or 'retry'".to_string(),
                })?;
        }
        if let Some(v) = section.get("max_retries") {
            config.pipeline.max_retries =
                v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: "pipeline".to_string(),
                    key: "max_retries".to_string(),
                    value: v.to_string(),
                    reason: "must be a non-negative integer".to_string(),
                })?;
        }
        if let Some(v) = section.get("retry_backoff_ms") {
            config.pipeline.retry_backoff_ms =
                v.trim().parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: "pipeline".to_string(),
                    key: "retry_backoff_ms".to_string(),
                    value: v.to_string(),
                    reason: "must be a non-negative integer (milliseconds)".to_string(),
                })?;
        }
    }

    // [output] section
    if let Some(section) = ini.section(Some("output")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.output.directory = expand_tilde(v);
            }
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn parse_service(
    section: &Properties,
    name: &str,
    settings: &mut ServiceSettings,
) -> Result<(), ConfigFileError> {
    if let Some(v) = section.get("url") {
        let v = v.trim();
        if !(v.starts_with("http://") || v.starts_with("https://")) {
            return Err(ConfigFileError::InvalidValue {
                section: name.to_string(),
                key: "url".to_string(),
                value: v.to_string(),
                reason: "must be an http:// or https:// URL".to_string(),
            });
        }
        settings.url = v.to_string();
    }
    if let Some(v) = section.get("timeout") {
        settings.timeout = parse_positive(v, name, "timeout")?;
    }
    Ok(())
}

fn parse_workers(value: &str, key: &str) -> Result<usize, ConfigFileError> {
    match value.trim().parse::<usize>() {
        Ok(n) if (1..=MAX_WORKERS).contains(&n) => Ok(n),
        _ => Err(ConfigFileError::InvalidValue {
            section: "pipeline".to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: format!("must be an integer between 1 and {}", MAX_WORKERS),
        }),
    }
}

fn parse_positive<T>(value: &str, section: &str, key: &str) -> Result<T, ConfigFileError>
where
    T: FromStr + PartialOrd + Default,
{
    match value.trim().parse::<T>() {
        Ok(n) if n > T::default() => Ok(n),
        _ => Err(ConfigFileError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be a positive integer (seconds)".to_string(),
        }),
    }
}

pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
