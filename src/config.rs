use crate::error::TranscriberError;
use serde::{Deserialize, Serialize};

/// Environment variable consulted when no API key is set in the config.
pub const API_KEY_ENV: &str = "REV_AI_API_KEY";

/// When the current utterance is considered finished absent a server `final`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EndpointingMode {
    /// Never force finality client-side.
    #[default]
    None,
    /// Rely solely on the server's `final` messages.
    ServerSignal,
    /// Force finality once the buffered text has not grown for `seconds`.
    TimeCutoff { seconds: f64 },
}

/// Per-client configuration. Constructed once, read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriberConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u16,
    /// Sample format token sent in the content type, e.g. "S16LE".
    #[serde(default = "default_sample_format")]
    pub sample_format: String,
    /// API key; falls back to REV_AI_API_KEY when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpointing: EndpointingMode,
    /// Maximum number of connection attempts before going silent.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
    /// How long the send flow waits for audio before ending the session.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// WebSocket endpoint; overridable for tests and self-hosted gateways.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl TranscriberConfig {
    /// Explicit key wins; otherwise REV_AI_API_KEY. Both missing is fatal.
    pub fn resolve_api_key(&self) -> Result<String, TranscriberError> {
        if let Some(key) = self.api_key.as_deref() {
            if !key.is_empty() {
                return Ok(key.to_string());
            }
        }
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(TranscriberError::MissingApiKey),
        }
    }

    /// Builds the connection URL. The content type is the semicolon-delimited
    /// string the service expects, sent unescaped.
    pub fn stream_url(&self, api_key: &str) -> String {
        let content_type = format!(
            "audio/x-raw;layout=interleaved;rate={};format={};channels={}",
            self.sample_rate, self.sample_format, self.channels
        );
        // A bare-authority base like "ws://127.0.0.1:9000" needs a path
        // before the query string or the handshake request-target is invalid.
        let has_path = match self.base_url.find("://") {
            Some(i) => self.base_url[i + 3..].contains('/'),
            None => self.base_url.contains('/'),
        };
        let sep = if has_path { "" } else { "/" };
        format!(
            "{}{}?access_token={}&content_type={}",
            self.base_url, sep, api_key, content_type
        )
    }
}

impl Default for TranscriberConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            channels: default_channels(),
            sample_format: default_sample_format(),
            api_key: None,
            endpointing: EndpointingMode::default(),
            retry_budget: default_retry_budget(),
            idle_timeout_secs: default_idle_timeout_secs(),
            base_url: default_base_url(),
        }
    }
}

fn default_sample_rate() -> u32 {
    16000
}
fn default_channels() -> u16 {
    1
}
fn default_sample_format() -> String {
    "S16LE".into()
}
fn default_retry_budget() -> u32 {
    5
}
fn default_idle_timeout_secs() -> u64 {
    5
}
fn default_base_url() -> String {
    "wss://api.rev.ai/speechtotext/v1/stream".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_url_encodes_audio_parameters() {
        let config = TranscriberConfig::default();
        let url = config.stream_url("tok123");
        assert_eq!(
            url,
            "wss://api.rev.ai/speechtotext/v1/stream?access_token=tok123\
             &content_type=audio/x-raw;layout=interleaved;rate=16000;format=S16LE;channels=1"
        );
    }

    #[test]
    fn stream_url_reflects_configured_audio_shape() {
        let config = TranscriberConfig {
            sample_rate: 8000,
            channels: 2,
            sample_format: "F32LE".into(),
            base_url: "ws://127.0.0.1:9000/stream".into(),
            ..TranscriberConfig::default()
        };
        let url = config.stream_url("k");
        assert!(url.starts_with("ws://127.0.0.1:9000/stream?access_token=k"));
        assert!(url.ends_with("rate=8000;format=F32LE;channels=2"));
    }

    #[test]
    fn stream_url_inserts_a_path_for_bare_authority_bases() {
        let config = TranscriberConfig {
            base_url: "ws://127.0.0.1:9000".into(),
            ..TranscriberConfig::default()
        };
        let url = config.stream_url("k");
        assert!(
            url.starts_with("ws://127.0.0.1:9000/?access_token=k"),
            "got {}",
            url
        );
    }

    #[test]
    fn api_key_resolution_prefers_explicit_key() {
        // Env interactions stay in one test to avoid races between tests.
        std::env::remove_var(API_KEY_ENV);
        let mut config = TranscriberConfig::default();
        assert!(matches!(
            config.resolve_api_key(),
            Err(TranscriberError::MissingApiKey)
        ));

        std::env::set_var(API_KEY_ENV, "from-env");
        assert_eq!(config.resolve_api_key().unwrap(), "from-env");

        config.api_key = Some("explicit".into());
        assert_eq!(config.resolve_api_key().unwrap(), "explicit");

        // Empty explicit key falls through to the environment.
        config.api_key = Some(String::new());
        assert_eq!(config.resolve_api_key().unwrap(), "from-env");
        std::env::remove_var(API_KEY_ENV);
    }

    #[test]
    fn endpointing_mode_round_trips_through_serde() {
        let mode = EndpointingMode::TimeCutoff { seconds: 2.5 };
        let json = serde_json::to_string(&mode).unwrap();
        assert_eq!(json, r#"{"mode":"time_cutoff","seconds":2.5}"#);
        let back: EndpointingMode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mode);
    }
}
