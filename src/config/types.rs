use crate::storage::CredentialMode;
use serde::Deserialize;

/// Main configuration structure for Price-Scout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub vendor: VendorConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub prober: ProberConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    pub output: OutputConfig,
}

/// Vendor connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct VendorConfig {
    /// Credential mode used when the settings store has no active mode
    #[serde(rename = "default-mode", default)]
    pub default_mode: CredentialMode,

    /// User-Agent header sent on every vendor request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Total timeout for a single vendor request (seconds)
    #[serde(rename = "request-timeout-secs", default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Connect timeout for a single vendor request (seconds)
    #[serde(rename = "connect-timeout-secs", default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            default_mode: CredentialMode::default(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Per-mode credential sections
///
/// The two sections are kept apart so that resolution for one mode can never
/// pick up a value from the other.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub test: CredentialSection,
    #[serde(default)]
    pub live: CredentialSection,
}

impl CredentialsConfig {
    /// Returns the section for the given mode
    pub fn section(&self, mode: CredentialMode) -> &CredentialSection {
        match mode {
            CredentialMode::Test => &self.test,
            CredentialMode::Live => &self.live,
        }
    }
}

/// Raw, possibly incomplete credential values for one mode
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialSection {
    #[serde(rename = "client-id")]
    pub client_id: Option<String>,

    #[serde(rename = "client-secret")]
    pub client_secret: Option<String>,

    /// OAuth token endpoint
    #[serde(rename = "auth-url")]
    pub auth_url: Option<String>,

    /// Base URL for the options and price endpoints
    #[serde(rename = "api-base-url")]
    pub api_base_url: Option<String>,

    pub audience: Option<String>,
}

/// Price probing behavior
#[derive(Debug, Clone, Deserialize)]
pub struct ProberConfig {
    /// Maximum number of combinations probed per product
    #[serde(rename = "combination-cap", default = "default_combination_cap")]
    pub combination_cap: usize,

    /// Maximum number of price requests in flight per wave
    #[serde(rename = "wave-width", default = "default_wave_width")]
    pub wave_width: usize,

    /// Upper bound on how long a single wave may take (seconds)
    #[serde(rename = "wave-timeout-secs", default = "default_wave_timeout")]
    pub wave_timeout_secs: u64,

    /// Fixed seed for combination sampling; unset means OS entropy
    #[serde(rename = "sample-seed")]
    pub sample_seed: Option<u64>,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            combination_cap: default_combination_cap(),
            wave_width: default_wave_width(),
            wave_timeout_secs: default_wave_timeout(),
            sample_seed: None,
        }
    }
}

/// Batch selection defaults
#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    /// Rows per invocation when the request does not say
    #[serde(rename = "default-batch-size", default = "default_batch_size")]
    pub default_batch_size: u32,

    /// Vendor store code when the request does not say
    #[serde(rename = "default-store-code", default = "default_store_code")]
    pub default_store_code: u32,

    /// Upper bound on one product's network pipeline (seconds)
    #[serde(rename = "product-timeout-secs", default = "default_product_timeout")]
    pub product_timeout_secs: u64,

    /// Placeholder `min_price_cents` marking a product as not yet enriched
    #[serde(rename = "sentinel-price-cents", default)]
    pub sentinel_price_cents: i64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            default_batch_size: default_batch_size(),
            default_store_code: default_store_code(),
            product_timeout_secs: default_product_timeout(),
            sentinel_price_cents: 0,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite catalog database
    #[serde(rename = "database-path")]
    pub database_path: String,
}

fn default_user_agent() -> String {
    format!("price-scout/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_combination_cap() -> usize {
    50
}

fn default_wave_width() -> usize {
    30
}

fn default_wave_timeout() -> u64 {
    60
}

fn default_batch_size() -> u32 {
    20
}

fn default_store_code() -> u32 {
    9
}

fn default_product_timeout() -> u64 {
    300
}
