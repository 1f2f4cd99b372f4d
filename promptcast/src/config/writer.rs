//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::defaults::*;
use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[generator]
; Image generation endpoint. Receives {{"prompt": "..."}} and answers with
; {{"images": ["<base64>", ...]}}
url = {}
; HTTP timeout in seconds (default: {})
timeout = {}

[upscaler]
; Image upscaling endpoint. Receives {{"image_data": "data:...;base64,..."}} and
; answers with {{"upscaled": "data:...;base64,..."}}
url = {}
; HTTP timeout in seconds (default: {})
timeout = {}

[pipeline]
; Concurrent generation requests (default: 5, max: {})
; Also the capacity of the descriptions queue
generate_workers = {}
; Concurrent upscale requests (default: 5, max: {})
; Also the capacity of the upscale queue
upscale_workers = {}
; Limit in seconds on a single generation or upscale attempt (default: {})
request_timeout = {}
; What to do when a remote call fails:
;   drop  - log the failure and skip the item
;   retry - retry transient failures with exponential backoff, then skip
failure_policy = {}
; Retries per call when failure_policy = retry (default: {})
max_retries = {}
; Delay before the first retry in milliseconds; doubles on each retry (default: {})
retry_backoff_ms = {}

[output]
; Images are written to <directory>/<folder>/<id>_small.png and <id>_big.png
directory = {}

[logging]
; Log file, cleared at the start of every run
file = {}
"#,
        config.generator.url,
        DEFAULT_SERVICE_TIMEOUT_SECS,
        config.generator.timeout,
        config.upscaler.url,
        DEFAULT_SERVICE_TIMEOUT_SECS,
        config.upscaler.timeout,
        MAX_WORKERS,
        config.pipeline.generate_workers,
        MAX_WORKERS,
        config.pipeline.upscale_workers,
        DEFAULT_REQUEST_TIMEOUT_SECS,
        config.pipeline.request_timeout,
        config.pipeline.failure_policy,
        DEFAULT_MAX_RETRIES,
        config.pipeline.max_retries,
        DEFAULT_RETRY_BACKOFF_MS,
        config.pipeline.retry_backoff_ms,
        path_to_string(&config.output.directory),
        path_to_string(&config.logging.file),
    )
}

/// Shortens paths under the home directory to `~/...`.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ini::Ini;

    #[test]
    fn test_output_is_valid_ini() {
        let content = to_config_string(&ConfigFile::default());
        let ini = Ini::load_from_str(&content).unwrap();

        for section in ["generator", "upscaler", "pipeline", "output", "logging"] {
            assert!(ini.section(Some(section)).is_some(), "missing [{}]", section);
        }
        assert_eq!(
            ini.section(Some("pipeline"))
                .and_then(|s| s.get("failure_policy")),
            Some("drop")
        );
    }

    #[test]
    fn test_output_round_trips() {
        let mut config = ConfigFile::default();
        config.upscaler.url = "http://localhost:9000/up".to_string();
        config.pipeline.retry_backoff_ms = 42;

        let ini = Ini::load_from_str(&to_config_string(&config)).unwrap();
        let parsed = crate::config::parser::parse_ini(&ini).unwrap();

        assert_eq!(parsed, config);
    }

    #[test]
    fn test_home_paths_are_shortened() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(path_to_string(&home.join("results")), "~/results");
        }
        assert_eq!(path_to_string(Path::new("/var/out")), "/var/out");
    }
}
