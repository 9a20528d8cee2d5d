use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;

mod bot;
mod config;
mod gateway;
mod state;

use crate::config::BotConfig;
use crate::gateway::CryptoPayClient;
pub use crate::state::AppState;
use kassa_core::steps::PendingSteps;
use kassa_db::services::{
    AccountService, LedgerService, PaymentService, QueueService, VoucherService,
};

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();

    log::info!("Starting Kassa Bot...");

    let config = match BotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Configuration error: {e:#}");
            return;
        }
    };

    let pool = match kassa_db::connect(&config.database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            log::error!("Database error: {e:#}");
            return;
        }
    };

    let gateway = CryptoPayClient::new(
        config.crypto_pay_token.clone(),
        config.crypto_pay_api.clone(),
    );

    let state = AppState {
        accounts: AccountService::new(pool.clone()),
        ledger: LedgerService::new(pool.clone()),
        vouchers: VoucherService::new(pool.clone()),
        payments: PaymentService::new(pool.clone()),
        queue: QueueService::new(pool),
        gateway: Arc::new(gateway),
        steps: Arc::new(PendingSteps::new()),
        required_channels: Arc::new(config.required_channels.clone()),
    };

    let bot = Bot::new(config.bot_token);

    let (_tx, rx) = tokio::sync::broadcast::channel(1);

    bot::run_bot(bot, rx, state).await;
}
