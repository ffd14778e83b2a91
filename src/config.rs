use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Base URL of the REST backend that owns persistence (clients, leads, subscriptions).
    pub backend_base_url: String,
    pub backend_timeout_secs: u64,
    pub subscription_cache_ttl_secs: u64,
    /// ISO 3166 region used to parse lead phone numbers without a country prefix.
    pub default_phone_region: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            backend_base_url: std::env::var("BACKEND_BASE_URL")
                .map_err(|_| anyhow::anyhow!("BACKEND_BASE_URL environment variable required"))
                .and_then(|raw| validate_base_url(&raw))?,
            backend_timeout_secs: std::env::var("BACKEND_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("BACKEND_TIMEOUT_SECS must be a whole number"))?,
            subscription_cache_ttl_secs: std::env::var("SUBSCRIPTION_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .map_err(|_| {
                    anyhow::anyhow!("SUBSCRIPTION_CACHE_TTL_SECS must be a whole number")
                })?,
            default_phone_region: std::env::var("DEFAULT_PHONE_REGION")
                .unwrap_or_else(|_| "IN".to_string())
                .trim()
                .to_uppercase(),
        };

        if config
            .default_phone_region
            .parse::<phonenumber::country::Id>()
            .is_err()
        {
            anyhow::bail!(
                "DEFAULT_PHONE_REGION '{}' is not a known region code",
                config.default_phone_region
            );
        }

        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Backend Base URL: {}", config.backend_base_url);
        tracing::debug!("Backend timeout: {}s", config.backend_timeout_secs);
        tracing::debug!(
            "Subscription cache TTL: {}s",
            config.subscription_cache_ttl_secs
        );
        tracing::debug!("Default phone region: {}", config.default_phone_region);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }
}

/// Checks that the backend URL is an absolute http(s) URL and strips any trailing slash.
pub fn validate_base_url(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        anyhow::bail!("BACKEND_BASE_URL cannot be empty");
    }

    let parsed = url::Url::parse(trimmed)
        .map_err(|e| anyhow::anyhow!("BACKEND_BASE_URL is not a valid URL: {}", e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("BACKEND_BASE_URL must start with http:// or https://");
    }

    Ok(trimmed.trim_end_matches('/').to_string())
}
