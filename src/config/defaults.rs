//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery. Values match the behaviour of the
//! deployed battery inference job.

// ============================================================================
// Fetch
// ============================================================================

/// Hard deadline for one upstream fetch (seconds).
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Number of latest documents requested per fetch.
pub const FETCH_LIMIT: usize = 10;

/// Honour `HTTP_PROXY`/`HTTPS_PROXY`/`NO_PROXY` for upstream fetches.
pub const USE_SYSTEM_PROXY: bool = true;

/// Authorization scheme applied when the token carries none.
pub const AUTH_SCHEME: &str = "Bearer";

/// Environment variable holding a pre-issued CMS token (implies `Basic`).
pub const TOKEN_ENV: &str = "CMS_BASIC_TOKEN";

/// Accepted authorization schemes.
pub const AUTH_SCHEMES: &[&str] = &["Bearer", "Basic", "basic"];

// ============================================================================
// CMS endpoint
// ============================================================================

pub const CMS_TIME_LAPSED_URL: &str =
    "https://cms.charjkaro.in/commands/secure/api/v1/get/charger/time_lapsed";
pub const CMS_ROLE: &str = "Admin";
pub const CMS_OPERATOR: &str = "All";
pub const CMS_CONNECTOR_ID: u32 = 1;
pub const CMS_PAGE: u32 = 1;

// ============================================================================
// Inference
// ============================================================================

/// Hard deadline for one batch of model inference (seconds).
pub const INFERENCE_TIMEOUT_SECS: u64 = 60;

// ============================================================================
// Model artifacts
// ============================================================================

pub const MODEL_DIR: &str = "models";
pub const MODEL_CONFIG_FILE: &str = "config.json";
pub const FEATURE_NAMES_FILE: &str = "feature_names.json";
pub const SCALER_FILE: &str = "scaler.json";

/// Rolling window used when the model config carries no `roll_win`.
pub const ROLL_WIN: usize = 5;

/// Current thresholds (A) when the model config omits them.
pub const CURRENT_UPPER_WARNING: f64 = 2.0;
pub const CURRENT_UPPER_CRITICAL: f64 = 100.0;

/// Temperature thresholds (°C) when the model config omits them.
pub const TEMPERATURE_UPPER_WARNING: f64 = 70.0;
pub const TEMPERATURE_UPPER_CRITICAL: f64 = 80.0;

// ============================================================================
// Reports
// ============================================================================

/// Fixed file name so downstream consumers can always find the latest report.
pub const REPORT_FILE_NAME: &str = "battery_health_report.json";

// ============================================================================
// Logging
// ============================================================================

pub const LOG_LEVEL: &str = "info";
