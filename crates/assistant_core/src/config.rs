use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{bail, Context};
use tracing::warn;
use url::Url;

pub const DEFAULT_ACCEPTED_MEDIA_TYPE: &str = "application/pdf";
pub const DEFAULT_RESPONSE_LATENCY_MS: u64 = 1500;
pub const DEFAULT_INGESTION_DELAY_MS: u64 = 2000;
pub const DEFAULT_RESPONSE_TIMEOUT_SECS: u64 = 60;
pub const SETTINGS_FILE: &str = "assistant.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub accepted_media_type: String,
    pub backend_url: Option<String>,
    pub response_latency_ms: u64,
    pub ingestion_delay_ms: u64,
    pub response_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            accepted_media_type: DEFAULT_ACCEPTED_MEDIA_TYPE.into(),
            backend_url: None,
            response_latency_ms: DEFAULT_RESPONSE_LATENCY_MS,
            ingestion_delay_ms: DEFAULT_INGESTION_DELAY_MS,
            response_timeout_secs: DEFAULT_RESPONSE_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    pub fn response_latency(&self) -> Duration {
        Duration::from_millis(self.response_latency_ms)
    }

    pub fn ingestion_delay(&self) -> Duration {
        Duration::from_millis(self.ingestion_delay_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }
}

/// Defaults, then `assistant.toml` in the working directory, then `APP__*`
/// environment variables.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        apply_file_config(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    settings
}

pub fn load_settings_from(path: &Path) -> anyhow::Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    let mut settings = Settings::default();
    apply_file_config(&mut settings, &raw);
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file_config(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, toml::Value>>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(error) => {
            warn!(%error, "ignoring unreadable settings file");
            return;
        }
    };

    let text = |key: &str| match file_cfg.get(key) {
        Some(toml::Value::String(v)) => Some(v.clone()),
        Some(toml::Value::Integer(v)) => Some(v.to_string()),
        _ => None,
    };

    if let Some(v) = text("accepted_media_type") {
        settings.accepted_media_type = v;
    }
    if let Some(v) = text("backend_url") {
        settings.backend_url = Some(v);
    }
    if let Some(v) = text("response_latency_ms").and_then(|v| v.parse().ok()) {
        settings.response_latency_ms = v;
    }
    if let Some(v) = text("ingestion_delay_ms").and_then(|v| v.parse().ok()) {
        settings.ingestion_delay_ms = v;
    }
    if let Some(v) = text("response_timeout_secs").and_then(|v| v.parse().ok()) {
        settings.response_timeout_secs = v;
    }
}

fn apply_env_overrides(settings: &mut Settings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("APP__ACCEPTED_MEDIA_TYPE") {
        settings.accepted_media_type = v;
    }
    if let Some(v) = env("APP__BACKEND_URL") {
        settings.backend_url = Some(v);
    }
    if let Some(v) = env("APP__RESPONSE_LATENCY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.response_latency_ms = parsed;
        }
    }
    if let Some(v) = env("APP__INGESTION_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.ingestion_delay_ms = parsed;
        }
    }
    if let Some(v) = env("APP__RESPONSE_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.response_timeout_secs = parsed;
        }
    }
}

/// Normalises a backend base URL: adds a scheme when missing and drops a
/// trailing slash so endpoint paths can be appended.
pub fn prepare_backend_url(raw_backend_url: &str) -> anyhow::Result<String> {
    let raw_backend_url = raw_backend_url.trim();
    if raw_backend_url.is_empty() {
        bail!("backend url is empty");
    }

    let candidate = if raw_backend_url.contains("://") {
        raw_backend_url.to_string()
    } else {
        format!("http://{raw_backend_url}")
    };

    let parsed = Url::parse(&candidate)
        .with_context(|| format!("invalid backend url '{raw_backend_url}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("unsupported backend url scheme '{}'", parsed.scheme());
    }

    Ok(parsed.as_str().trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_accepts_strings_and_integers() {
        let mut settings = Settings::default();
        apply_file_config(
            &mut settings,
            r#"
            accepted_media_type = "text/plain"
            ingestion_delay_ms = 250
            response_latency_ms = "10"
            "#,
        );
        assert_eq!(settings.accepted_media_type, "text/plain");
        assert_eq!(settings.ingestion_delay_ms, 250);
        assert_eq!(settings.response_latency_ms, 10);
        assert_eq!(settings.response_timeout_secs, DEFAULT_RESPONSE_TIMEOUT_SECS);
    }

    #[test]
    fn unreadable_file_config_keeps_defaults() {
        let mut settings = Settings::default();
        apply_file_config(&mut settings, "this is = = not toml");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn env_overrides_win_over_file_and_skip_bad_numbers() {
        let mut settings = Settings::default();
        apply_file_config(&mut settings, "ingestion_delay_ms = 250");
        apply_env_overrides(&mut settings, |key| match key {
            "APP__INGESTION_DELAY_MS" => Some("5".into()),
            "APP__RESPONSE_TIMEOUT_SECS" => Some("soon".into()),
            "APP__BACKEND_URL" => Some("localhost:8000".into()),
            _ => None,
        });
        assert_eq!(settings.ingestion_delay_ms, 5);
        assert_eq!(settings.response_timeout_secs, DEFAULT_RESPONSE_TIMEOUT_SECS);
        assert_eq!(settings.backend_url.as_deref(), Some("localhost:8000"));
    }

    #[test]
    fn prepares_backend_url_without_scheme() {
        assert_eq!(
            prepare_backend_url("localhost:8000/").expect("prepare"),
            "http://localhost:8000"
        );
    }

    #[test]
    fn keeps_https_backend_url_path() {
        assert_eq!(
            prepare_backend_url(" https://notes.example.com/api/ ").expect("prepare"),
            "https://notes.example.com/api"
        );
    }

    #[test]
    fn rejects_empty_and_non_http_backend_urls() {
        assert!(prepare_backend_url("   ").is_err());
        assert!(prepare_backend_url("ftp://files.example.com").is_err());
    }
}
