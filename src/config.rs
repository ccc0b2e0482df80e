//! endpoint configuration.

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;

/// environment variable consulted for the inference service base url.
pub const BASE_URL_ENV: &str = "CHAT_API_BASE_URL";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

/// where and how the controller opens streams.
#[derive(bevy::prelude::Resource, Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// path of the streaming endpoint, appended to `base_url`.
    #[serde(default = "default_stream_path")]
    pub stream_path: String,

    /// name of the query parameter carrying the question.
    #[serde(default = "default_query_param")]
    pub query_param: String,

    /// appended to the partial answer when a stream fails.
    /// `None` leaves a failed answer un-marked.
    #[serde(default)]
    pub error_notice: Option<String>,

    /// capacity of the cross-thread inbox between transports and the main thread.
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_stream_path() -> String {
    "/chat/stream".to_string()
}

fn default_query_param() -> String {
    "query".to_string()
}

fn default_inbox_capacity() -> usize {
    2048
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            stream_path: default_stream_path(),
            query_param: default_query_param(),
            error_notice: None,
            inbox_capacity: default_inbox_capacity(),
        }
    }
}

impl ChatConfig {
    /// reads the base url from the runtime environment, then from the value
    /// captured at build time (browser builds have no runtime environment).
    pub fn from_env() -> Self {
        let base_url = std::env::var(BASE_URL_ENV)
            .ok()
            .or_else(|| option_env!("CHAT_API_BASE_URL").map(str::to_string))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(default_base_url);
        Self { base_url, ..Self::default() }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = Url::parse(&self.base_url)?;
        match base.scheme() {
            "http" | "https" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
        if self.inbox_capacity == 0 {
            return Err(ConfigError::InvalidInboxCapacity);
        }
        Ok(())
    }

    /// `{base_url}{stream_path}?{query_param}=<percent-encoded query>`.
    ///
    /// a trailing slash on the base url is dropped so `http://host/` and
    /// `http://host` yield the same endpoint.
    pub fn stream_url(&self, query: &str) -> Result<Url, url::ParseError> {
        let base = self.base_url.trim_end_matches('/');
        let path = if self.stream_path.starts_with('/') {
            self.stream_path.clone()
        } else {
            format!("/{}", self.stream_path)
        };
        let mut url = Url::parse(&format!("{base}{path}"))?;
        url.query_pairs_mut().append_pair(&self.query_param, query);
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_service() {
        let config = ChatConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.stream_path, "/chat/stream");
        assert!(config.error_notice.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn stream_url_encodes_the_query() {
        let config = ChatConfig::default();
        let url = config.stream_url("What is Fermat's Last Theorem?").unwrap();
        assert_eq!(url.path(), "/chat/stream");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(
            pairs,
            vec![("query".to_string(), "What is Fermat's Last Theorem?".to_string())]
        );
        let raw = url.query().unwrap();
        assert!(!raw.contains(' '), "raw query must be encoded: {raw}");
        assert!(!raw.contains('?'), "raw query must be encoded: {raw}");
    }

    #[test]
    fn stream_url_handles_reserved_and_non_ascii_text() {
        let config = ChatConfig::default();
        let url = config.stream_url("a&b=c / フェルマー").unwrap();
        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "query");
        assert_eq!(value, "a&b=c / フェルマー");
        assert_eq!(url.query_pairs().count(), 1);
    }

    #[test]
    fn stream_url_ignores_trailing_slash_on_base() {
        let config = ChatConfig {
            base_url: "https://chat.example.com/".into(),
            ..ChatConfig::default()
        };
        let url = config.stream_url("x").unwrap();
        assert_eq!(url.as_str(), "https://chat.example.com/chat/stream?query=x");
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config = ChatConfig::from_json_str(r#"{ "base_url": "https://api.example.com" }"#).unwrap();
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.query_param, "query");
        assert_eq!(config.inbox_capacity, 2048);
    }

    #[test]
    fn validate_rejects_bad_configs() {
        let ftp = ChatConfig { base_url: "ftp://example.com".into(), ..ChatConfig::default() };
        assert!(matches!(ftp.validate(), Err(ConfigError::UnsupportedScheme(s)) if s == "ftp"));

        let garbage = ChatConfig { base_url: "not a url".into(), ..ChatConfig::default() };
        assert!(matches!(garbage.validate(), Err(ConfigError::InvalidBaseUrl(_))));

        let zero = ChatConfig { inbox_capacity: 0, ..ChatConfig::default() };
        assert!(matches!(zero.validate(), Err(ConfigError::InvalidInboxCapacity)));

        assert!(matches!(
            ChatConfig::from_json_str("{ nope"),
            Err(ConfigError::Parse(_))
        ));
    }
}
