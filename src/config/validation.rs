use crate::config::types::{
    BatchConfig, Config, CredentialSection, OutputConfig, ProberConfig, VendorConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
///
/// Credential completeness is deliberately not checked here: a missing value
/// only matters for the mode that is active when a batch is invoked.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_vendor_config(&config.vendor)?;
    validate_credential_urls("test", &config.credentials.test)?;
    validate_credential_urls("live", &config.credentials.live)?;
    validate_prober_config(&config.prober)?;
    validate_batch_config(&config.batch)?;
    validate_output_config(&config.output)?;
    Ok(())
}

fn validate_vendor_config(config: &VendorConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "connect-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates any URLs present in a credential section
fn validate_credential_urls(mode: &str, section: &CredentialSection) -> Result<(), ConfigError> {
    for (field, value) in [
        ("auth-url", &section.auth_url),
        ("api-base-url", &section.api_base_url),
    ] {
        if let Some(raw) = value {
            let url = Url::parse(raw).map_err(|e| {
                ConfigError::InvalidUrl(format!("credentials.{}.{} '{}': {}", mode, field, raw, e))
            })?;

            if url.scheme() != "https" && url.scheme() != "http" {
                return Err(ConfigError::InvalidUrl(format!(
                    "credentials.{}.{} must use http or https, got '{}'",
                    mode,
                    field,
                    url.scheme()
                )));
            }
        }
    }

    Ok(())
}

fn validate_prober_config(config: &ProberConfig) -> Result<(), ConfigError> {
    if config.combination_cap < 1 || config.combination_cap > 10_000 {
        return Err(ConfigError::Validation(format!(
            "combination-cap must be between 1 and 10000, got {}",
            config.combination_cap
        )));
    }

    if config.wave_width < 1 || config.wave_width > 100 {
        return Err(ConfigError::Validation(format!(
            "wave-width must be between 1 and 100, got {}",
            config.wave_width
        )));
    }

    if config.wave_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "wave-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_batch_config(config: &BatchConfig) -> Result<(), ConfigError> {
    if config.default_batch_size < 1 || config.default_batch_size > 1_000 {
        return Err(ConfigError::Validation(format!(
            "default-batch-size must be between 1 and 1000, got {}",
            config.default_batch_size
        )));
    }

    if config.product_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "product-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.sentinel_price_cents < 0 {
        return Err(ConfigError::Validation(format!(
            "sentinel-price-cents must be >= 0, got {}",
            config.sentinel_price_cents
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}
