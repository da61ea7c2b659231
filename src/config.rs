use anyhow::Context;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub junopay_base_url: String,
    pub junopay_client_id: String,
    pub junopay_client_secret: String,
    pub junopay_timeout_secs: u64,
    pub provider_refresh_concurrency: usize,
    pub admin_api_key: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let config = Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            junopay_base_url: env::var("JUNOPAY_BASE_URL")
                .context("JUNOPAY_BASE_URL must be set")?,
            junopay_client_id: env::var("JUNOPAY_CLIENT_ID")
                .context("JUNOPAY_CLIENT_ID must be set")?,
            junopay_client_secret: env::var("JUNOPAY_CLIENT_SECRET")
                .context("JUNOPAY_CLIENT_SECRET must be set")?,
            junopay_timeout_secs: env::var("JUNOPAY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            provider_refresh_concurrency: env::var("PROVIDER_REFRESH_CONCURRENCY")
                .unwrap_or_else(|_| "8".to_string())
                .parse()?,
            admin_api_key: env::var("ADMIN_API_KEY").context("ADMIN_API_KEY must be set")?,
        };

        url::Url::parse(&config.junopay_base_url)
            .context("JUNOPAY_BASE_URL is not a valid URL")?;

        if config.provider_refresh_concurrency == 0 {
            anyhow::bail!("PROVIDER_REFRESH_CONCURRENCY must be greater than 0");
        }

        Ok(config)
    }
}
