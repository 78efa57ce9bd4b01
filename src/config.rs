//! Configuration for veridesk.
//!
//! Everything is serializable to TOML with serde defaults, so a partial
//! config file overrides only what it names. Secrets (provider and
//! notifier credentials) are read from the environment, never from the
//! file and never serialized back out.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Provider endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the aggregated government-registry provider.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Token endpoint of the national document locker.
    #[serde(default = "default_locker_token_url")]
    pub locker_token_url: String,

    /// Base URL of the MyInfo foreign-identity service.
    #[serde(default = "default_myinfo_base_url")]
    pub myinfo_base_url: String,

    /// Endpoint of the co-located vision OCR service.
    #[serde(default = "default_vision_endpoint")]
    pub vision_endpoint: String,

    /// Per-call timeout in seconds.
    #[serde(default = "default_call_timeout")]
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            locker_token_url: default_locker_token_url(),
            myinfo_base_url: default_myinfo_base_url(),
            vision_endpoint: default_vision_endpoint(),
            timeout_secs: default_call_timeout(),
        }
    }
}

impl ProviderConfig {
    /// Per-call timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Provider credentials, injected centrally into every outbound call.
#[derive(Debug, Clone, Default)]
pub struct ProviderCredentials {
    /// API key header value.
    pub api_key: Option<String>,
    /// Bearer token for the Authorization header.
    pub bearer_token: Option<String>,
}

impl ProviderCredentials {
    /// Load credentials from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("VERIDESK_PROVIDER_API_KEY").ok(),
            bearer_token: std::env::var("VERIDESK_PROVIDER_TOKEN").ok(),
        }
    }
}

/// Retry policy for outbound provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds; doubles per attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    /// Exponential backoff delay after the given failed attempt (1-based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

/// Circuit breaker tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Failure percentage within the rolling window that opens the circuit.
    #[serde(default = "default_error_threshold_pct")]
    pub error_threshold_pct: u8,

    /// Rolling window length in seconds.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Minimum calls in the window before the threshold applies.
    #[serde(default = "default_min_calls")]
    pub min_calls: u32,

    /// Cool-down in seconds before a half-open trial is allowed.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            error_threshold_pct: default_error_threshold_pct(),
            window_secs: default_window_secs(),
            min_calls: default_min_calls(),
            cooldown_secs: default_cooldown_secs(),
        }
    }
}

impl BreakerConfig {
    /// Rolling window as a [`Duration`].
    #[must_use]
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Cool-down as a [`Duration`].
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

/// Notification delivery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Master switch. Disabled in tests and local development.
    #[serde(default)]
    pub enabled: bool,

    /// Transactional email endpoint.
    #[serde(default = "default_email_endpoint")]
    pub email_endpoint: String,

    /// Template-message (WhatsApp-style) endpoint.
    #[serde(default = "default_message_endpoint")]
    pub message_endpoint: String,

    /// From address for system email.
    #[serde(default = "default_from_address")]
    pub from_address: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            email_endpoint: default_email_endpoint(),
            message_endpoint: default_message_endpoint(),
            from_address: default_from_address(),
        }
    }
}

/// Batch processor tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Delay between items in milliseconds, to respect provider rate limits.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,

    /// Overall batch deadline in seconds.
    #[serde(default = "default_batch_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            throttle_ms: default_throttle_ms(),
            timeout_secs: default_batch_timeout_secs(),
        }
    }
}

impl BatchConfig {
    /// Inter-item throttle as a [`Duration`].
    #[must_use]
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    /// Overall deadline as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Async job worker tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Simulated provider-side processing delay in seconds.
    #[serde(default = "default_processing_delay_secs")]
    pub processing_delay_secs: u64,

    /// Age in hours after which a still-pending job is swept to REJECTED.
    #[serde(default = "default_stale_after_hours")]
    pub stale_after_hours: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            processing_delay_secs: default_processing_delay_secs(),
            stale_after_hours: default_stale_after_hours(),
        }
    }
}

impl WorkerConfig {
    /// Processing delay as a [`Duration`].
    #[must_use]
    pub fn processing_delay(&self) -> Duration {
        Duration::from_secs(self.processing_delay_secs)
    }

    /// Stale-job threshold as a [`Duration`].
    #[must_use]
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_hours * 3600)
    }
}

/// Top-level gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Fixed cost of one verification in minor currency units.
    #[serde(default = "default_verification_cost")]
    pub verification_cost: i64,

    /// Wallet currency code.
    #[serde(default = "default_currency")]
    pub currency: String,

    /// Provider endpoints.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Retry policy.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Circuit breaker tuning.
    #[serde(default)]
    pub breaker: BreakerConfig,

    /// Notification delivery.
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Batch processor tuning.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Async job worker tuning.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            verification_cost: default_verification_cost(),
            currency: default_currency(),
            provider: ProviderConfig::default(),
            retry: RetryConfig::default(),
            breaker: BreakerConfig::default(),
            notify: NotifyConfig::default(),
            batch: BatchConfig::default(),
            worker: WorkerConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Default config file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("", "", "veridesk")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("veridesk.toml"))
    }
}

fn default_base_url() -> String {
    "https://uat.risewithprotean.io".to_string()
}

fn default_locker_token_url() -> String {
    "https://api.digitallocker.gov.in/public/oauth2/1/token".to_string()
}

fn default_myinfo_base_url() -> String {
    "https://api.myinfo.gov.sg".to_string()
}

fn default_vision_endpoint() -> String {
    "http://127.0.0.1:8300/v1/images:annotate".to_string()
}

const fn default_call_timeout() -> u64 {
    10
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_delay_ms() -> u64 {
    100
}

const fn default_error_threshold_pct() -> u8 {
    50
}

const fn default_window_secs() -> u64 {
    10
}

const fn default_min_calls() -> u32 {
    5
}

const fn default_cooldown_secs() -> u64 {
    30
}

fn default_email_endpoint() -> String {
    "https://api.sendgrid.com/v3/mail/send".to_string()
}

fn default_message_endpoint() -> String {
    "https://graph.facebook.com/v17.0/messages".to_string()
}

fn default_from_address() -> String {
    "alerts@veridesk.example".to_string()
}

const fn default_throttle_ms() -> u64 {
    500
}

const fn default_batch_timeout_secs() -> u64 {
    600
}

const fn default_processing_delay_secs() -> u64 {
    30
}

const fn default_stale_after_hours() -> u64 {
    24
}

fn default_verification_cost() -> i64 {
    crate::billing::VERIFICATION_COST
}

fn default_currency() -> String {
    "INR".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}
