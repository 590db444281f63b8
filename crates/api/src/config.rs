use std::path::PathBuf;
use std::time::Duration;

use acemusic_acestep::AceStepConfig;
use acemusic_core::generation::AudioFormat;
use acemusic_pipeline::PollSettings;

/// A configuration value that could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error("{0}")]
    Constraint(String),
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running next to a local ACE-Step
/// service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `127.0.0.1`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    pub database_url: String,
    /// Base URL of the ACE-Step REST API.
    pub acestep_api_url: String,
    /// Bearer token for ACE-Step; `None` when unset or empty.
    pub acestep_api_key: Option<String>,
    /// Per-request timeout for calls to ACE-Step.
    pub acestep_timeout: Duration,
    /// Model label shown in the UI.
    pub default_model: String,
    /// Pre-filled duration on the generate form, in seconds.
    pub default_duration: f64,
    pub default_format: AudioFormat,
    pub default_batch_size: i32,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    /// Directory generated audio is written to and served from.
    pub output_dir: PathBuf,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                      |
    /// |------------------------|------------------------------|
    /// | `HOST`                 | `127.0.0.1`                  |
    /// | `PORT`                 | `8000`                       |
    /// | `DATABASE_URL`         | `sqlite://data/ace_music.db` |
    /// | `ACESTEP_API_URL`      | `http://localhost:8001`      |
    /// | `ACESTEP_API_KEY`      | (empty: no auth header)      |
    /// | `ACESTEP_TIMEOUT_SECS` | `30`                         |
    /// | `DEFAULT_MODEL`        | `turbo`                      |
    /// | `DEFAULT_DURATION`     | `120`                        |
    /// | `DEFAULT_FORMAT`       | `mp3`                        |
    /// | `DEFAULT_BATCH_SIZE`   | `1`                          |
    /// | `POLL_INTERVAL_SECS`   | `2.0`                        |
    /// | `POLL_TIMEOUT_SECS`    | `300.0`                      |
    /// | `OUTPUT_DIR`           | `outputs`                    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                         |
    /// | `CORS_ORIGINS`         | `http://127.0.0.1:8000`      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let host = var("HOST", "127.0.0.1");
        let port: u16 = parse("PORT", "a valid port number", var("PORT", "8000"))?;
        let database_url = var("DATABASE_URL", "sqlite://data/ace_music.db");

        let acestep_api_url = var("ACESTEP_API_URL", "http://localhost:8001");
        if !(acestep_api_url.starts_with("http://") || acestep_api_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                var: "ACESTEP_API_URL",
                expected: "an http(s) URL",
                value: acestep_api_url,
            });
        }
        let acestep_api_key = lookup("ACESTEP_API_KEY").filter(|k| !k.trim().is_empty());
        let acestep_timeout = Duration::from_secs(parse(
            "ACESTEP_TIMEOUT_SECS",
            "a whole number of seconds",
            var("ACESTEP_TIMEOUT_SECS", "30"),
        )?);

        let default_model = var("DEFAULT_MODEL", "turbo");
        let default_duration: f64 = parse(
            "DEFAULT_DURATION",
            "a number of seconds",
            var("DEFAULT_DURATION", "120"),
        )?;
        if !default_duration.is_finite() || default_duration <= 0.0 {
            return Err(ConfigError::Constraint(format!(
                "DEFAULT_DURATION must be positive, got {default_duration}"
            )));
        }
        let raw_format = var("DEFAULT_FORMAT", "mp3");
        let default_format: AudioFormat = raw_format.parse().map_err(|_| ConfigError::Invalid {
            var: "DEFAULT_FORMAT",
            expected: "one of mp3, wav, flac",
            value: raw_format.clone(),
        })?;
        let default_batch_size: i32 = parse(
            "DEFAULT_BATCH_SIZE",
            "an integer",
            var("DEFAULT_BATCH_SIZE", "1"),
        )?;
        if default_batch_size < 1 {
            return Err(ConfigError::Constraint(format!(
                "DEFAULT_BATCH_SIZE must be at least 1, got {default_batch_size}"
            )));
        }

        let poll_interval = seconds("POLL_INTERVAL_SECS", var("POLL_INTERVAL_SECS", "2.0"))?;
        let poll_timeout = seconds("POLL_TIMEOUT_SECS", var("POLL_TIMEOUT_SECS", "300.0"))?;
        if poll_interval.is_zero() {
            return Err(ConfigError::Constraint(
                "POLL_INTERVAL_SECS must be greater than zero".into(),
            ));
        }
        if poll_timeout < poll_interval {
            return Err(ConfigError::Constraint(format!(
                "POLL_TIMEOUT_SECS ({}) must not be shorter than POLL_INTERVAL_SECS ({})",
                poll_timeout.as_secs_f64(),
                poll_interval.as_secs_f64()
            )));
        }

        let output_dir = PathBuf::from(var("OUTPUT_DIR", "outputs"));
        let request_timeout_secs: u64 = parse(
            "REQUEST_TIMEOUT_SECS",
            "a whole number of seconds",
            var("REQUEST_TIMEOUT_SECS", "30"),
        )?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS", "http://127.0.0.1:8000")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host,
            port,
            database_url,
            acestep_api_url,
            acestep_api_key,
            acestep_timeout,
            default_model,
            default_duration,
            default_format,
            default_batch_size,
            poll_interval,
            poll_timeout,
            output_dir,
            request_timeout_secs,
            cors_origins,
        })
    }

    /// Connection settings for the ACE-Step client.
    pub fn acestep_config(&self) -> AceStepConfig {
        AceStepConfig {
            base_url: self.acestep_api_url.clone(),
            api_key: self.acestep_api_key.clone(),
            request_timeout: self.acestep_timeout,
        }
    }

    /// Settings for the background poll loops.
    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            output_dir: self.output_dir.clone(),
            poll_interval: self.poll_interval,
            poll_timeout: self.poll_timeout,
        }
    }
}

fn parse<T: std::str::FromStr>(
    var: &'static str,
    expected: &'static str,
    value: String,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid {
            var,
            expected,
            value,
        })
}

fn seconds(var: &'static str, value: String) -> Result<Duration, ConfigError> {
    let secs: f64 = parse(var, "a number of seconds", value.clone())?;
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::Invalid {
        var,
        expected: "a non-negative number of seconds",
        value,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.database_url, "sqlite://data/ace_music.db");
        assert_eq!(config.acestep_api_url, "http://localhost:8001");
        assert_eq!(config.acestep_api_key, None);
        assert_eq!(config.acestep_timeout, Duration::from_secs(30));
        assert_eq!(config.default_model, "turbo");
        assert_eq!(config.default_duration, 120.0);
        assert_eq!(config.default_format, AudioFormat::Mp3);
        assert_eq!(config.default_batch_size, 1);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.poll_timeout, Duration::from_secs(300));
        assert_eq!(config.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.cors_origins, vec!["http://127.0.0.1:8000".to_string()]);
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("PORT", "9000"),
            ("ACESTEP_API_KEY", "secret"),
            ("DEFAULT_FORMAT", "FLAC"),
            ("POLL_INTERVAL_SECS", "0.5"),
            ("POLL_TIMEOUT_SECS", "60"),
            ("CORS_ORIGINS", "http://a.test, http://b.test,"),
        ])
        .unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.acestep_api_key.as_deref(), Some("secret"));
        assert_eq!(config.default_format, AudioFormat::Flac);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.poll_settings().poll_timeout, Duration::from_secs(60));
        assert_eq!(config.cors_origins, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn blank_api_key_means_no_key() {
        let config = load(&[("ACESTEP_API_KEY", "  ")]).unwrap();
        assert_eq!(config.acestep_config().api_key, None);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        assert_matches!(
            load(&[("PORT", "eighty")]),
            Err(ConfigError::Invalid { var: "PORT", .. })
        );
        assert_matches!(
            load(&[("POLL_INTERVAL_SECS", "-1")]),
            Err(ConfigError::Invalid {
                var: "POLL_INTERVAL_SECS",
                ..
            })
        );
    }

    #[test]
    fn constraints_are_enforced() {
        assert_matches!(
            load(&[("POLL_INTERVAL_SECS", "0")]),
            Err(ConfigError::Constraint(_))
        );
        assert_matches!(
            load(&[("POLL_INTERVAL_SECS", "10"), ("POLL_TIMEOUT_SECS", "5")]),
            Err(ConfigError::Constraint(_))
        );
        assert_matches!(
            load(&[("DEFAULT_BATCH_SIZE", "0")]),
            Err(ConfigError::Constraint(_))
        );
        assert_matches!(
            load(&[("DEFAULT_FORMAT", "ogg")]),
            Err(ConfigError::Invalid {
                var: "DEFAULT_FORMAT",
                ..
            })
        );
        assert_matches!(
            load(&[("ACESTEP_API_URL", "localhost:8001")]),
            Err(ConfigError::Invalid {
                var: "ACESTEP_API_URL",
                ..
            })
        );
    }
}
