// src/config.rs
use crate::errors::ThumbsmithError;
use crate::services::workspace::WorkspaceLimits;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub base_url: String,
    pub redis_url: Option<String>,
    pub bind: String,
    pub request_timeout: Option<Duration>,
    pub max_upload_bytes: usize,
    pub workspace_limits: WorkspaceLimits,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ThumbsmithError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ThumbsmithError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("GEMINI_API_KEY")
            .or_else(|| non_empty("API_KEY"))
            .ok_or_else(|| ThumbsmithError::Config("GEMINI_API_KEY must be set".to_string()))?;

        let parsed = |key: &str| -> Result<Option<u64>, ThumbsmithError> {
            non_empty(key)
                .map(|raw| parse_number(key, &raw))
                .transpose()
        };

        let request_timeout = parsed("THUMBSMITH_REQUEST_TIMEOUT_SECS")?.map(Duration::from_secs);
        let max_upload_bytes = match non_empty("THUMBSMITH_MAX_UPLOAD_BYTES") {
            Some(raw) => parse_number("THUMBSMITH_MAX_UPLOAD_BYTES", &raw)?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let mut workspace_limits = WorkspaceLimits::default();
        if let Some(max) = non_empty("THUMBSMITH_MAX_SESSIONS") {
            workspace_limits.max_sessions = parse_number("THUMBSMITH_MAX_SESSIONS", &max)?;
        }
        if let Some(secs) = parsed("THUMBSMITH_SESSION_IDLE_SECS")? {
            let secs = secs.min(i64::MAX as u64 / 1000) as i64;
            workspace_limits.idle_ttl = chrono::Duration::seconds(secs);
        }
        if let Some(size) = non_empty("THUMBSMITH_GALLERY_SIZE") {
            workspace_limits.gallery_size = parse_number("THUMBSMITH_GALLERY_SIZE", &size)?;
        }

        Ok(Self {
            api_key,
            base_url: non_empty("GEMINI_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            redis_url: non_empty("REDIS_URL"),
            bind: non_empty("THUMBSMITH_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            request_timeout,
            max_upload_bytes,
            workspace_limits,
        })
    }

    /// JSON bodies may carry an upload as base64, which is a third larger.
    pub fn json_limit(&self) -> usize {
        self.max_upload_bytes.saturating_mul(2)
    }
}

fn parse_number<T>(key: &str, raw: &str) -> Result<T, ThumbsmithError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| ThumbsmithError::Config(format!("Invalid {}: {}", key, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<AppConfig, ThumbsmithError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_key_is_set() {
        let config = config_from(&[("GEMINI_API_KEY", "secret")]).unwrap();

        assert_eq!(config.api_key, "secret");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.bind, DEFAULT_BIND);
        assert!(config.redis_url.is_none());
        assert!(config.request_timeout.is_none());
        assert_eq!(config.max_upload_bytes, DEFAULT_MAX_UPLOAD_BYTES);
    }

    #[test]
    fn legacy_api_key_variable_is_accepted() {
        let config = config_from(&[("API_KEY", "legacy")]).unwrap();
        assert_eq!(config.api_key, "legacy");
    }

    #[test]
    fn missing_key_is_a_config_error() {
        assert!(matches!(config_from(&[]), Err(ThumbsmithError::Config(_))));
        assert!(matches!(
            config_from(&[("GEMINI_API_KEY", "  ")]),
            Err(ThumbsmithError::Config(_))
        ));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_BASE_URL", "http://localhost:9000/"),
            ("REDIS_URL", "redis://127.0.0.1:6379"),
            ("THUMBSMITH_REQUEST_TIMEOUT_SECS", "90"),
            ("THUMBSMITH_MAX_UPLOAD_BYTES", "2048"),
        ])
        .unwrap();

        assert_eq!(config.base_url, "http://localhost:9000");
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(90)));
        assert_eq!(config.max_upload_bytes, 2048);
    }

    #[test]
    fn workspace_limits_are_configurable() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "k"),
            ("THUMBSMITH_MAX_SESSIONS", "16"),
            ("THUMBSMITH_SESSION_IDLE_SECS", "600"),
            ("THUMBSMITH_GALLERY_SIZE", "5"),
        ])
        .unwrap();

        assert_eq!(config.workspace_limits.max_sessions, 16);
        assert_eq!(config.workspace_limits.idle_ttl, chrono::Duration::minutes(10));
        assert_eq!(config.workspace_limits.gallery_size, 5);
    }

    #[test]
    fn json_limit_saturates_on_huge_uploads() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "k"),
            ("THUMBSMITH_MAX_UPLOAD_BYTES", &usize::MAX.to_string()),
        ])
        .unwrap();

        assert_eq!(config.max_upload_bytes, usize::MAX);
        assert_eq!(config.json_limit(), usize::MAX);

        let default = config_from(&[("GEMINI_API_KEY", "k")]).unwrap();
        assert_eq!(default.json_limit(), DEFAULT_MAX_UPLOAD_BYTES * 2);
    }

    #[test]
    fn bad_timeout_is_rejected() {
        let result = config_from(&[
            ("GEMINI_API_KEY", "k"),
            ("THUMBSMITH_REQUEST_TIMEOUT_SECS", "soon"),
        ]);
        assert!(matches!(result, Err(ThumbsmithError::Config(_))));
    }
}
