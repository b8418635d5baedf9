use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_CURRENCY: &str = "TL";
const DEFAULT_PAYTR_BASE_URL: &str = "https://www.paytr.com";
const DEFAULT_CONFIRMATION_POLL_ATTEMPTS: u32 = 5;
const DEFAULT_CONFIRMATION_POLL_INTERVAL_MS: u64 = 2000;

/// PayTR iFrame API settings. Secrets stay optional so that their absence can be
/// detected and rejected when the adapter is used.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct PaytrConfig {
    #[serde(default = "default_true_bool")]
    pub enabled: bool,
    #[serde(default)]
    pub merchant_id: Option<String>,
    #[serde(default)]
    pub merchant_key: Option<String>,
    #[serde(default)]
    pub merchant_salt: Option<String>,
    /// Sends `test_mode=1` to PayTR
    #[serde(default)]
    pub test_mode: bool,
    #[serde(default)]
    pub debug_on: bool,
    #[serde(default = "default_paytr_base_url")]
    pub api_base_url: String,
    /// Customer lands here after a successful payment
    #[serde(default)]
    pub ok_url: Option<String>,
    /// Customer lands here after a failed payment
    #[serde(default)]
    pub fail_url: Option<String>,
    #[serde(default)]
    pub no_installment: bool,
    #[serde(default)]
    #[validate(range(max = 12))]
    pub max_installment: u8,
    #[serde(default = "default_timeout_limit_minutes")]
    pub timeout_limit_minutes: u32,
    #[serde(default = "default_lang")]
    pub lang: String,
}

impl Default for PaytrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            merchant_id: None,
            merchant_key: None,
            merchant_salt: None,
            test_mode: false,
            debug_on: false,
            api_base_url: default_paytr_base_url(),
            ok_url: None,
            fail_url: None,
            no_installment: false,
            max_installment: 0,
            timeout_limit_minutes: default_timeout_limit_minutes(),
            lang: default_lang(),
        }
    }
}

/// Settings shared by the JSON-webhook providers
#[derive(Clone, Debug, Default, Deserialize)]
pub struct GenericProviderConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default)]
    pub sandbox: bool,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub return_url: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Validate)]
pub struct PaymentsConfig {
    /// Timeout applied to every outbound provider request
    #[serde(default = "default_http_timeout_secs")]
    #[validate(custom = "validate_http_timeout")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    #[validate]
    pub paytr: PaytrConfig,
    #[serde(default)]
    pub iyzico: GenericProviderConfig,
    #[serde(default)]
    pub papara: GenericProviderConfig,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            http_timeout_secs: default_http_timeout_secs(),
            paytr: PaytrConfig::default(),
            iyzico: GenericProviderConfig::default(),
            papara: GenericProviderConfig::default(),
        }
    }
}

impl PaymentsConfig {
    /// Names of the providers whose `enabled` flag is set
    pub fn enabled_providers(&self) -> Vec<&'static str> {
        let mut enabled = Vec::new();
        if self.paytr.enabled {
            enabled.push("paytr");
        }
        if self.iyzico.enabled {
            enabled.push("iyzico");
        }
        if self.papara.enabled {
            enabled.push("papara");
        }
        enabled
    }
}

/// Order confirmation dispatch
#[derive(Clone, Debug, Deserialize)]
pub struct NotificationConfig {
    /// Mail service endpoint; confirmations are only logged when unset
    #[serde(default)]
    pub order_confirmation_url: Option<String>,
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            order_confirmation_url: None,
            timeout_secs: default_http_timeout_secs(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL (`memory://` selects the in-process store)
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Upper bound for any single HTTP request handled by this service
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Currency recorded on orders
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Confirmation poll: number of store reads before answering "pending"
    #[serde(default = "default_confirmation_poll_attempts")]
    #[validate(range(min = 1, max = 30))]
    pub confirmation_poll_attempts: u32,

    /// Confirmation poll: delay between reads
    #[serde(default = "default_confirmation_poll_interval_ms")]
    pub confirmation_poll_interval_ms: u64,

    #[serde(default)]
    #[validate]
    pub payments: PaymentsConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,
}

impl AppConfig {
    /// Creates a new configuration with defaults for everything but the essentials
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            default_currency: default_currency(),
            confirmation_poll_attempts: default_confirmation_poll_attempts(),
            confirmation_poll_interval_ms: default_confirmation_poll_interval_ms(),
            payments: PaymentsConfig::default(),
            notifications: NotificationConfig::default(),
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// True when the in-process store was requested instead of a database
    pub fn uses_memory_store(&self) -> bool {
        self.database_url.starts_with("memory://")
    }

    pub fn confirmation_poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.confirmation_poll_interval_ms)
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let enabled = self.payments.enabled_providers();
        if enabled.len() != 1 {
            let mut err = ValidationError::new("payments_single_provider");
            err.message = Some(
                format!(
                    "Exactly one payment provider must be enabled, found {:?}. Set APP__PAYMENTS__<PROVIDER>__ENABLED",
                    enabled
                )
                .into(),
            );
            errors.add("payments", err);
        }

        if !self.is_development() && self.uses_memory_store() {
            let mut err = ValidationError::new("database_url_memory");
            err.message =
                Some("The in-process store is only allowed in development".into());
            errors.add("database_url", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true_bool() -> bool {
    true
}

fn default_db_max_connections() -> u32 {
    16
}
fn default_db_min_connections() -> u32 {
    2
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_http_timeout_secs() -> u64 {
    20
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_paytr_base_url() -> String {
    DEFAULT_PAYTR_BASE_URL.to_string()
}

fn default_timeout_limit_minutes() -> u32 {
    30
}

fn default_lang() -> String {
    "tr".to_string()
}

fn default_confirmation_poll_attempts() -> u32 {
    DEFAULT_CONFIRMATION_POLL_ATTEMPTS
}

fn default_confirmation_poll_interval_ms() -> u64 {
    DEFAULT_CONFIRMATION_POLL_INTERVAL_MS
}

fn validate_http_timeout(secs: u64) -> Result<(), ValidationError> {
    if (1..=120).contains(&secs) {
        Ok(())
    } else {
        let mut err = ValidationError::new("http_timeout_secs");
        err.message = Some("http_timeout_secs must be between 1 and 120".into());
        Err(err)
    }
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("storefront_payments={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://storefront.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!(
        providers = ?app_config.payments.enabled_providers(),
        "Configuration loaded successfully"
    );
    Ok(app_config)
}
