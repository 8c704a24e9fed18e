//! Runtime settings - every tunable of the inference job as TOML values
//!
//! Each struct implements `Default` with the values the job has always used,
//! so a missing file or section changes nothing.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::{defaults, ConfigError};

/// Environment variable pointing at a settings file.
pub const SETTINGS_ENV: &str = "BATTERY_CONFIG";

/// Settings file looked up in the working directory.
pub const SETTINGS_FILE: &str = "battery_config.toml";

// ============================================================================
// Top-Level Settings
// ============================================================================

/// Root runtime settings for the inference job.
///
/// Load with `PipelineSettings::load()` which searches:
/// 1. `$BATTERY_CONFIG` env var
/// 2. `./battery_config.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Upstream fetch behaviour
    #[serde(default)]
    pub fetch: FetchSettings,

    /// CMS time-lapsed endpoint parameters
    #[serde(default)]
    pub cms: CmsSettings,

    /// Model inference deadline
    #[serde(default)]
    pub inference: InferenceSettings,

    /// Pretrained artifact location
    #[serde(default)]
    pub artifacts: ArtifactSettings,

    /// Report output
    #[serde(default)]
    pub reports: ReportSettings,

    /// Log output
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl PipelineSettings {
    /// Load settings using the standard search order.
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(SETTINGS_ENV) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(settings) => {
                        info!(path = %p.display(), "Loaded settings from {}", SETTINGS_ENV);
                        return settings;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load settings from {}, falling back", SETTINGS_ENV);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", SETTINGS_ENV);
            }
        }

        // 2. Check ./battery_config.toml
        let local = PathBuf::from(SETTINGS_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(settings) => {
                    info!("Loaded settings from ./{}", SETTINGS_FILE);
                    return settings;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", SETTINGS_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", SETTINGS_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let settings: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check every rule and report all violations at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.fetch.timeout_secs == 0 {
            errors.push("fetch.timeout_secs must be > 0".to_string());
        }
        if self.inference.timeout_secs == 0 {
            errors.push("inference.timeout_secs must be > 0".to_string());
        }
        if self.fetch.limit == 0 {
            errors.push("fetch.limit must be > 0".to_string());
        }
        if !defaults::AUTH_SCHEMES.contains(&self.fetch.auth_scheme.as_str()) {
            errors.push(format!(
                "fetch.auth_scheme must be one of {:?}, got '{}'",
                defaults::AUTH_SCHEMES,
                self.fetch.auth_scheme
            ));
        }
        if self.cms.connector_id == 0 {
            errors.push("cms.connector_id must be > 0".to_string());
        }
        if self.cms.page == 0 {
            errors.push("cms.page must be > 0".to_string());
        }
        if self.cms.base_url.trim().is_empty() {
            errors.push("cms.base_url must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Fetch
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Hard deadline for one fetch, covering connect, response and body (seconds)
    pub timeout_secs: u64,
    /// Number of latest documents to request
    pub limit: usize,
    /// Scheme applied when the token carries none ("Bearer", "Basic", "basic")
    pub auth_scheme: String,
    /// Environment variable consulted when no token is supplied explicitly
    pub token_env: String,
    /// Route fetches through the proxy named by the environment
    pub use_system_proxy: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::FETCH_TIMEOUT_SECS,
            limit: defaults::FETCH_LIMIT,
            auth_scheme: defaults::AUTH_SCHEME.to_string(),
            token_env: defaults::TOKEN_ENV.to_string(),
            use_system_proxy: defaults::USE_SYSTEM_PROXY,
        }
    }
}

/// Token plus the scheme to send it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub scheme: String,
}

impl FetchSettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }

    /// Resolve credentials for a fetch.
    ///
    /// An explicit token uses the configured scheme. Otherwise a token found
    /// in `token_env` is used with the `Basic` scheme.
    pub fn credentials(&self, explicit_token: Option<&str>) -> Option<Credentials> {
        if let Some(token) = explicit_token.filter(|t| !t.trim().is_empty()) {
            return Some(Credentials {
                token: token.to_string(),
                scheme: self.auth_scheme.clone(),
            });
        }
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(|token| Credentials {
                token,
                scheme: "Basic".to_string(),
            })
    }
}

// ============================================================================
// CMS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CmsSettings {
    pub base_url: String,
    pub role: String,
    pub operator: String,
    pub connector_id: u32,
    pub page: u32,
}

impl Default for CmsSettings {
    fn default() -> Self {
        Self {
            base_url: defaults::CMS_TIME_LAPSED_URL.to_string(),
            role: defaults::CMS_ROLE.to_string(),
            operator: defaults::CMS_OPERATOR.to_string(),
            connector_id: defaults::CMS_CONNECTOR_ID,
            page: defaults::CMS_PAGE,
        }
    }
}

// ============================================================================
// Inference
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    /// Hard deadline for scoring one batch with both models (seconds)
    pub timeout_secs: u64,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::INFERENCE_TIMEOUT_SECS,
        }
    }
}

impl InferenceSettings {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

// ============================================================================
// Artifacts / Reports / Logging
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    /// Directory holding config.json, feature_names.json and scaler.json
    pub model_dir: PathBuf,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(defaults::MODEL_DIR),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportSettings {
    /// Write reports under this directory instead of discarding them
    pub local_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json: false,
        }
    }
}
