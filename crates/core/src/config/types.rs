use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

use crate::fetcher::FetcherConfig;
use crate::orchestrator::PipelineConfig;
use crate::transcoder::TranscoderConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub transcoder: TranscoderConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub method: AuthMethod,
    /// Required when `method` is `api_key`. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    /// No credentials; only accepted on a loopback host.
    #[default]
    None,
    /// `Authorization: Bearer <key>` or `X-API-Key: <key>`.
    ApiKey,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcoder::AudioContainer;
    use std::path::PathBuf;

    #[test]
    fn test_deserialize_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.auth.method, AuthMethod::None);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.fetcher.reject_html);
        assert_eq!(config.transcoder.sample_rate_hz, 16_000);
        assert_eq!(config.pipeline.default_output, PathBuf::from("converted.wav"));
    }

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[auth]
method = "api_key"
api_key = "secret"

[server]
host = "0.0.0.0"
port = 9000

[logging]
format = "json"

[fetcher]
user_agent = "test-agent"
idle_timeout_secs = 5
reject_html = false

[transcoder]
ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
timeout_secs = 120
extra_ffmpeg_args = ["-threads", "2"]
sample_rate_hz = 22050
channels = 2
container = "wav"

[pipeline]
download_dir = "/srv/media"
default_output = "speech.wav"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.method, AuthMethod::ApiKey);
        assert_eq!(config.auth.api_key.as_deref(), Some("secret"));
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.fetcher.user_agent, "test-agent");
        assert_eq!(config.fetcher.idle_timeout_secs, 5);
        assert!(!config.fetcher.reject_html);
        assert_eq!(
            config.transcoder.ffmpeg_path,
            PathBuf::from("/opt/ffmpeg/bin/ffmpeg")
        );
        assert_eq!(config.transcoder.ffprobe_path, PathBuf::from("ffprobe")); // default
        assert_eq!(config.transcoder.extra_ffmpeg_args, vec!["-threads", "2"]);
        assert_eq!(config.transcoder.channels, 2);
        assert_eq!(config.transcoder.container, AudioContainer::Wav);
        assert_eq!(config.pipeline.download_dir, PathBuf::from("/srv/media"));
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let mut config = Config::default();
        config.auth = AuthConfig {
            method: AuthMethod::ApiKey,
            api_key: Some("secret".to_string()),
        };

        let json = serde_json::to_string(&config).unwrap();

        assert!(json.contains("\"api_key\""), "{}", json); // the method name
        assert!(!json.contains("secret"), "{}", json);
    }

    #[test]
    fn test_unknown_log_format_fails() {
        let toml = r#"
[logging]
format = "xml"
"#;
        let result: Result<Config, _> = toml::from_str(toml);
        assert!(result.is_err());
    }
}
