use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub database_url: String,
    pub crypto_pay_token: String,
    pub crypto_pay_api: String,
    /// Channels (by @handle or numeric id) a user must join before the main
    /// menu opens. Empty disables the gate.
    pub required_channels: Vec<String>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN").context("BOT_TOKEN is not set")?;
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let crypto_pay_token = env::var("CRYPTO_PAY_TOKEN").unwrap_or_default();
        let crypto_pay_api = env::var("CRYPTO_PAY_API")
            .unwrap_or_else(|_| "https://pay.crypt.bot/api".to_string());
        let required_channels = env::var("REQUIRED_CHANNELS")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Ok(Self {
            bot_token,
            database_url,
            crypto_pay_token,
            crypto_pay_api,
            required_channels,
        })
    }
}
