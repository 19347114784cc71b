use std::path::PathBuf;
use std::time::Duration;

/// Default Processing Service address (the host starts it on this port).
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:7860";

/// Quiet period before a preview request is sent.
pub const DEFAULT_PREVIEW_DEBOUNCE_MS: u64 = 150;

/// Upper bound on a single preview round trip.
pub const DEFAULT_PREVIEW_TIMEOUT_SECS: u64 = 10;

/// Interval between export job status polls.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 600;

/// Consecutive failed polls tolerated before the job is considered lost.
pub const DEFAULT_MAX_POLL_FAILURES: u32 = 5;

/// Preview pipeline timing.
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    pub debounce: Duration,
    pub timeout: Duration,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(DEFAULT_PREVIEW_DEBOUNCE_MS),
            timeout: Duration::from_secs(DEFAULT_PREVIEW_TIMEOUT_SECS),
        }
    }
}

/// Export job polling.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub poll_interval: Duration,
    pub max_poll_failures: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_poll_failures: DEFAULT_MAX_POLL_FAILURES,
        }
    }
}

/// Session configuration loaded from environment variables.
///
/// All fields have defaults suitable for a locally hosted service.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the Processing Service.
    pub service_url: String,
    pub preview: PreviewConfig,
    pub export: ExportConfig,
    /// Where finished export archives are written.
    pub download_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            preview: PreviewConfig::default(),
            export: ExportConfig::default(),
            download_dir: PathBuf::from("."),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has an invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

impl SessionConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                  |
    /// |-------------------------------|--------------------------|
    /// | `CUTOUT_SERVICE_URL`          | `http://127.0.0.1:7860`  |
    /// | `CUTOUT_PREVIEW_DEBOUNCE_MS`  | `150`                    |
    /// | `CUTOUT_PREVIEW_TIMEOUT_SECS` | `10`                     |
    /// | `CUTOUT_POLL_INTERVAL_MS`     | `600`                    |
    /// | `CUTOUT_MAX_POLL_FAILURES`    | `5`                      |
    /// | `CUTOUT_DOWNLOAD_DIR`         | `.`                      |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let service_url = lookup("CUTOUT_SERVICE_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string());

        let debounce_ms = parse_var(
            &lookup,
            "CUTOUT_PREVIEW_DEBOUNCE_MS",
            DEFAULT_PREVIEW_DEBOUNCE_MS,
        )?;
        let timeout_secs = parse_var(
            &lookup,
            "CUTOUT_PREVIEW_TIMEOUT_SECS",
            DEFAULT_PREVIEW_TIMEOUT_SECS,
        )?;
        let poll_ms = parse_var(&lookup, "CUTOUT_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?;
        let max_poll_failures = parse_var(
            &lookup,
            "CUTOUT_MAX_POLL_FAILURES",
            DEFAULT_MAX_POLL_FAILURES,
        )?;

        let download_dir = lookup("CUTOUT_DOWNLOAD_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                var: "CUTOUT_PREVIEW_TIMEOUT_SECS",
                value: "0".into(),
            });
        }

        Ok(Self {
            service_url,
            preview: PreviewConfig {
                debounce: Duration::from_millis(debounce_ms),
                timeout: Duration::from_secs(timeout_secs),
            },
            export: ExportConfig {
                poll_interval: Duration::from_millis(poll_ms),
                max_poll_failures: max_poll_failures.max(1),
            },
            download_dir,
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
