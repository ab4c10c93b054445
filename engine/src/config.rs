//! `~/.alon/config.toml` and the immutable [`EngineConfig`] resolved from it.

use std::time::Duration;
use std::{env, fs, path::Path, path::PathBuf};

use alon_types::{DEFAULT_MODEL, DEFAULT_TEMPERATURE, DEFAULT_TOP_P, OracleSettings};
use serde::Deserialize;

use crate::combinations::{DEFAULT_MIN_SIZE, DEFAULT_WINDOW_SIZE};
use crate::tokenizer::DEFAULT_AFFIXES;

pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_INTER_BATCH_DELAY_MS: u64 = 4100;

/// Environment variable consulted when the config file has no Google key.
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
/// Environment variable that overrides the configured model.
pub const MODEL_ENV: &str = "ALON_MODEL";

#[derive(Debug, Default, Deserialize)]
pub struct AlonConfig {
    pub app: Option<AppConfig>,
    pub api_keys: Option<ApiKeys>,
    pub tokenizer: Option<TokenizerConfig>,
    pub combinations: Option<CombinationsConfig>,
    pub hallucination: Option<HallucinationConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => Some(path),
            ConfigError::Invalid { .. } => None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    pub model: Option<String>,
    /// Clamped to `[0, 1]`.
    pub temperature: Option<f32>,
    /// Clamped to `[0, 1]`.
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
}

#[derive(Default, Deserialize)]
pub struct ApiKeys {
    pub google: Option<String>,
}

// Manual Debug impl to prevent leaking API keys in logs.
impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let google = if self.google.is_some() {
            "[REDACTED]"
        } else {
            "None"
        };
        f.debug_struct("ApiKeys").field("google", &google).finish()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenizerConfig {
    /// Replaces the default particle list; order is split priority.
    pub affixes: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CombinationsConfig {
    pub window_size: Option<usize>,
    pub min_size: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HallucinationConfig {
    pub batch_size: Option<usize>,
    pub inter_batch_delay_ms: Option<u64>,
}

pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        let var = &after[..end];
        if !var.is_empty() {
            out.push_str(&env::var(var).unwrap_or_default());
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

impl AlonConfig {
    /// Load from the default path. `Ok(None)` when there is no home
    /// directory or no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        let Some(path) = config_path() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(&path).map(Some)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
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
            Ok(config) => Ok(config),
            Err(err) => {
                tracing::warn!("Failed to parse config at {:?}: {}", path, err);
                Err(ConfigError::Parse {
                    path: path.to_path_buf(),
                    source: err,
                })
            }
        }
    }

    #[must_use]
    pub fn path() -> Option<PathBuf> {
        config_path()
    }

    /// Google key from the file (with `${VAR}` expansion), else `GEMINI_API_KEY`.
    #[must_use]
    pub fn google_api_key(&self) -> Option<String> {
        let from_file = self
            .api_keys
            .as_ref()
            .and_then(|keys| keys.google.as_deref())
            .map(expand_env_vars)
            .filter(|key| !key.trim().is_empty());
        from_file.or_else(|| env::var(API_KEY_ENV).ok().filter(|key| !key.trim().is_empty()))
    }

    /// Resolve the engine configuration, honouring `ALON_MODEL`.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigError> {
        self.engine_config_with_model(env::var(MODEL_ENV).ok())
    }

    fn engine_config_with_model(
        &self,
        model_override: Option<String>,
    ) -> Result<EngineConfig, ConfigError> {
        let defaults = EngineConfig::default();
        let app = self.app.as_ref();

        let model = model_override
            .filter(|model| !model.trim().is_empty())
            .or_else(|| app.and_then(|app| app.model.clone()))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let mut settings = OracleSettings::new(
            model,
            app.and_then(|app| app.temperature)
                .unwrap_or(DEFAULT_TEMPERATURE),
            app.and_then(|app| app.top_p).unwrap_or(DEFAULT_TOP_P),
        );
        if let Some(top_k) = app.and_then(|app| app.top_k) {
            settings = settings.with_top_k(top_k);
        }

        let affixes = self
            .tokenizer
            .as_ref()
            .and_then(|tokenizer| tokenizer.affixes.clone())
            .unwrap_or(defaults.affixes);
        let combinations = self.combinations.as_ref();
        let hallucination = self.hallucination.as_ref();

        let config = EngineConfig {
            settings,
            affixes,
            window_size: combinations
                .and_then(|c| c.window_size)
                .unwrap_or(defaults.window_size),
            min_size: combinations
                .and_then(|c| c.min_size)
                .unwrap_or(defaults.min_size),
            batch_size: hallucination
                .and_then(|h| h.batch_size)
                .unwrap_or(defaults.batch_size),
            inter_batch_delay: hallucination
                .and_then(|h| h.inter_batch_delay_ms)
                .map_or(defaults.inter_batch_delay, Duration::from_millis),
        };
        config.validate()?;
        Ok(config)
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".alon").join("config.toml"))
}

/// Immutable parameters shared by every pipeline of an [`crate::Engine`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub settings: OracleSettings,
    pub affixes: Vec<String>,
    pub window_size: usize,
    pub min_size: usize,
    pub batch_size: usize,
    pub inter_batch_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settings: OracleSettings::default(),
            affixes: DEFAULT_AFFIXES.iter().map(ToString::to_string).collect(),
            window_size: DEFAULT_WINDOW_SIZE,
            min_size: DEFAULT_MIN_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            inter_batch_delay: Duration::from_millis(DEFAULT_INTER_BATCH_DELAY_MS),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "hallucination.batch_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.min_size == 0 {
            return Err(ConfigError::Invalid {
                field: "combinations.min_size",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.window_size < self.min_size {
            return Err(ConfigError::Invalid {
                field: "combinations.window_size",
                reason: format!(
                    "must be at least min_size ({}), got {}",
                    self.min_size, self.window_size
                ),
            });
        }
        Ok(())
    }
}
