use serde::Deserialize;
use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

use lookalike_providers::{DEFAULT_GEMINI_MODEL, GEMINI_API_BASE_URL};

use crate::input::DEFAULT_SAMPLE_SEED;
use crate::judge::DEFAULT_TEMPERATURE;
use crate::retrying::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_BACKOFF, RetryPolicy};
use crate::runner::{DEFAULT_BATCH_DELAY, DEFAULT_BATCH_SIZE, RunOptions};

/// Environment variable naming an alternate config file.
pub const CONFIG_PATH_ENV: &str = "LOOKALIKE_CONFIG";
/// Fallback source for the Gemini API key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub const DEFAULT_INPUT_FILE: &str = "copycat_candidates_full.csv";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize)]
pub struct LookalikeConfig {
    pub google: Option<GoogleConfig>,
    pub run: Option<RunConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid `{field}`: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
    #[error("no Gemini API key: set [google] api_key or GEMINI_API_KEY")]
    MissingApiKey,
}

impl ConfigError {
    pub fn path(&self) -> Option<&Path> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => {
                Some(path.as_path())
            }
            ConfigError::Invalid { .. } | ConfigError::MissingApiKey => None,
        }
    }
}

/// Gemini request defaults.
///
/// ```toml
/// [google]
/// api_key = "${GEMINI_API_KEY}"
/// model = "gemini-1.5-flash"
/// temperature = 0.1
/// timeout_seconds = 60
/// ```
#[derive(Default, Deserialize)]
pub struct GoogleConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = if self.api_key.is_some() {
            "[REDACTED]"
        } else {
            "None"
        };
        f.debug_struct("GoogleConfig")
            .field("api_key", &key)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Batch loop settings.
///
/// ```toml
/// [run]
/// batch_size = 10
/// max_attempts = 3
/// retry_backoff_ms = 2000
/// batch_delay_ms = 2000
/// sample_seed = 42
/// input = "copycat_candidates_full.csv"
/// output_dir = "."
/// ```
#[derive(Debug, Default, Deserialize)]
pub struct RunConfig {
    pub batch_size: Option<usize>,
    pub max_attempts: Option<u32>,
    pub retry_backoff_ms: Option<u64>,
    pub batch_delay_ms: Option<u64>,
    pub sample_seed: Option<u64>,
    pub input: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let Some(len) = rest[start + 2..].find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &rest[start + 2..start + 2 + len];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &rest[start + 2 + len + 1..];
    }

    out.push_str(rest);
    out
}

/// Pick the configured key, falling back to the environment. Blank values count as unset.
fn resolve_api_key(
    configured: Option<&str>,
    from_env: Option<String>,
) -> Result<String, ConfigError> {
    configured
        .map(expand_env_vars)
        .filter(|key| !key.trim().is_empty())
        .or_else(|| from_env.filter(|key| !key.trim().is_empty()))
        .map(|key| key.trim().to_string())
        .ok_or(ConfigError::MissingApiKey)
}

impl LookalikeConfig {
    /// Load from `explicit`, else the default location.
    ///
    /// An explicit path must exist. A missing default file yields the defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!("Failed to read config at {:?}: {}", path, err);
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: err,
                });
            }
        };

        match toml::from_str(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "Loaded config");
                Ok(config)
            }
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    fn google(&self) -> Option<&GoogleConfig> {
        self.google.as_ref()
    }

    fn run(&self) -> Option<&RunConfig> {
        self.run.as_ref()
    }

    /// Configured key (after `${VAR}` expansion), else `GEMINI_API_KEY`.
    pub fn api_key(&self) -> Result<String, ConfigError> {
        resolve_api_key(
            self.google().and_then(|g| g.api_key.as_deref()),
            env::var(API_KEY_ENV).ok(),
        )
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.google()
            .and_then(|g| g.model.as_deref())
            .unwrap_or(DEFAULT_GEMINI_MODEL)
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.google()
            .and_then(|g| g.base_url.as_deref())
            .unwrap_or(GEMINI_API_BASE_URL)
    }

    pub fn temperature(&self) -> Result<f32, ConfigError> {
        let temperature = self
            .google()
            .and_then(|g| g.temperature)
            .unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::Invalid {
                field: "google.temperature",
                message: format!("{temperature} is outside [0.0, 2.0]"),
            });
        }
        Ok(temperature)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.google()
                .and_then(|g| g.timeout_seconds)
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        let run = self.run();
        RetryPolicy {
            max_attempts: run
                .and_then(|r| r.max_attempts)
                .unwrap_or(DEFAULT_MAX_ATTEMPTS),
            backoff: run
                .and_then(|r| r.retry_backoff_ms)
                .map_or(DEFAULT_RETRY_BACKOFF, Duration::from_millis),
        }
    }

    /// Loop settings. Sampling and dry-run are chosen per invocation, not here.
    pub fn run_options(&self) -> Result<RunOptions, ConfigError> {
        let run = self.run();
        let batch_size = run
            .and_then(|r| r.batch_size)
            .unwrap_or(DEFAULT_BATCH_SIZE);
        if batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "run.batch_size",
                message: "must be at least 1".to_string(),
            });
        }
        if run.and_then(|r| r.max_attempts) == Some(0) {
            return Err(ConfigError::Invalid {
                field: "run.max_attempts",
                message: "must be at least 1".to_string(),
            });
        }

        Ok(RunOptions {
            batch_size,
            batch_delay: run
                .and_then(|r| r.batch_delay_ms)
                .map_or(DEFAULT_BATCH_DELAY, Duration::from_millis),
            sample: None,
            seed: run
                .and_then(|r| r.sample_seed)
                .unwrap_or(DEFAULT_SAMPLE_SEED),
            dry_run: false,
        })
    }

    #[must_use]
    pub fn input_path(&self) -> PathBuf {
        self.run()
            .and_then(|r| r.input.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT_FILE))
    }

    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.run()
            .and_then(|r| r.output_dir.clone())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// `$LOOKALIKE_CONFIG`, else `<config dir>/lookalike/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_PATH_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::config_dir().map(|dir| dir.join("lookalike").join("config.toml"))
}
