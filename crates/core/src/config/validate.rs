use super::{
    types::{AuthMethod, Config},
    ConfigError,
};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Authentication is configured whenever the host is not loopback
/// - Fetcher and transcoder timeouts are not 0
/// - Output sample rate and channel count are not 0
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Auth validation
    match config.auth.method {
        AuthMethod::ApiKey => {
            if config.auth.api_key.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::ValidationError(
                    "auth.api_key must be set when auth.method is api_key".to_string(),
                ));
            }
        }
        AuthMethod::None => {
            if !config.server.host.is_loopback() {
                return Err(ConfigError::ValidationError(format!(
                    "auth.method none is only allowed on a loopback host, not {}",
                    config.server.host
                )));
            }
        }
    }

    // Fetcher validation
    if config.fetcher.connect_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "fetcher.connect_timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.fetcher.idle_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "fetcher.idle_timeout_secs cannot be 0".to_string(),
        ));
    }

    if config.fetcher.resolver.enabled && config.fetcher.resolver.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "fetcher.resolver.timeout_secs cannot be 0".to_string(),
        ));
    }

    // Transcoder validation
    if config.transcoder.timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "transcoder.timeout_secs cannot be 0".to_string(),
        ));
    }
    if config.transcoder.sample_rate_hz == 0 {
        return Err(ConfigError::ValidationError(
            "transcoder.sample_rate_hz cannot be 0".to_string(),
        ));
    }
    if config.transcoder.channels == 0 {
        return Err(ConfigError::ValidationError(
            "transcoder.channels cannot be 0".to_string(),
        ));
    }

    if config.pipeline.default_output.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "pipeline.default_output cannot be empty".to_string(),
        ));
    }
    if let Err(e) = config.pipeline.resolve(&config.pipeline.default_output) {
        return Err(ConfigError::ValidationError(format!(
            "pipeline.default_output {}",
            e
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn assert_invalid(config: &Config, field: &str) {
        match validate_config(config) {
            Err(ConfigError::ValidationError(msg)) => assert!(msg.contains(field), "{}", msg),
            other => panic!("expected validation error for {}, got {:?}", field, other),
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        assert_invalid(&config, "server.port");
    }

    #[test]
    fn test_validate_open_host_requires_auth() {
        let mut config = Config::default();
        config.server.host = "0.0.0.0".parse().unwrap();
        assert_invalid(&config, "auth.method");

        config.auth.method = AuthMethod::ApiKey;
        assert_invalid(&config, "auth.api_key");

        config.auth.api_key = Some("secret".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_default_output_stays_in_download_dir() {
        let mut config = Config::default();
        config.pipeline.default_output = PathBuf::from("/etc/converted.wav");
        assert_invalid(&config, "pipeline.default_output");

        config.pipeline.default_output = PathBuf::from("../converted.wav");
        assert_invalid(&config, "pipeline.default_output");
    }

    #[test]
    fn test_validate_zero_timeouts_fail() {
        let mut config = Config::default();
        config.fetcher.idle_timeout_secs = 0;
        assert_invalid(&config, "fetcher.idle_timeout_secs");

        let mut config = Config::default();
        config.transcoder.timeout_secs = 0;
        assert_invalid(&config, "transcoder.timeout_secs");

        let mut config = Config::default();
        config.fetcher.resolver.timeout_secs = 0;
        assert_invalid(&config, "fetcher.resolver.timeout_secs");
    }

    #[test]
    fn test_validate_audio_format() {
        let mut config = Config::default();
        config.transcoder.sample_rate_hz = 0;
        assert_invalid(&config, "sample_rate_hz");

        let mut config = Config::default();
        config.transcoder.channels = 0;
        assert_invalid(&config, "channels");
    }
}
