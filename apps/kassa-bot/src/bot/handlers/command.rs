use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::{error, info, warn};

use crate::AppState;
use crate::bot::actions::Action;
use crate::bot::handlers::{payment, redeem};
use crate::bot::keyboards;
use crate::bot::membership;
use crate::bot::steps;
use crate::bot::views;

const HELP_TEXT: &str = "You can control me with these commands:\n\n\
    🔃 /start — restart the bot\n\
    🗣 /hold — show your holds\n\
    🗑 /del <number> — remove a queued number\n\
    🔄 /menu — refresh the menu";

pub async fn message_handler(
    bot: Bot,
    msg: Message,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id;

    // Pushed confirmation from the Stars rail. Matching and the granted
    // effect are both idempotent; a duplicate delivery is a no-op.
    if let Some(paid) = msg.successful_payment() {
        state.steps.clear(chat_id.0);
        let payer = msg.from.as_ref().map(|u| u.id.0 as i64).unwrap_or(chat_id.0);
        match state
            .payments
            .reconcile_push(
                &paid.invoice_payload,
                payer,
                &paid.provider_payment_charge_id,
            )
            .await
        {
            Ok(Some(effect)) => {
                let _ = bot
                    .send_message(chat_id, payment::effect_message(&effect))
                    .await;
            }
            Ok(None) => {
                warn!("Unmatched successful payment payload: {}", paid.invoice_payload);
            }
            Err(e) => {
                error!("Failed to reconcile pushed payment: {}", e);
                let _ = bot
                    .send_message(chat_id, "❌ Error processing payment. Please contact support.")
                    .await;
            }
        }
        return Ok(());
    }

    if let Some(text) = msg.text() {
        if text.starts_with('/') {
            let text = text.to_string();
            return handle_command(&bot, &msg, &state, &text).await;
        }
    }

    // Freeform message: consumed by the pending continuation if one exists.
    if let Some(step) = state.steps.take(chat_id.0) {
        info!("Dispatching pending step {:?} for chat {}", step, chat_id);
        let nav = steps::run_step(&bot, &msg, &state, step).await?;
        return views::render(&bot, &state, chat_id, nav).await;
    }

    if msg.text().is_some() {
        let _ = bot.send_message(chat_id, HELP_TEXT).await;
    }
    Ok(())
}

async fn handle_command(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    text: &str,
) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id;
    // Commands always abandon whatever input was being collected.
    state.steps.clear(chat_id.0);

    let mut parts = text.split_whitespace();
    let command = parts.next().unwrap_or_default();
    match command {
        "/start" => handle_start(bot, msg, state, parts.next()).await,
        "/menu" => {
            views::main_menu(bot, state, chat_id).await;
            Ok(())
        }
        "/hold" => {
            let rows = state.queue.successful_for(chat_id.0).await.unwrap_or_default();
            let lines: Vec<String> = rows
                .iter()
                .filter_map(|row| {
                    row.hold_time
                        .as_deref()
                        .map(|hold| format!("{} ({}) hold: {hold}", row.phone_number, row.kind))
                })
                .collect();
            let text = if lines.is_empty() {
                "No holds yet.".to_string()
            } else {
                lines.join("\n")
            };
            let _ = bot.send_message(chat_id, text).await;
            Ok(())
        }
        "/del" => {
            let Some(number) = parts.next() else {
                let _ = bot.send_message(chat_id, "Usage: /del <number>").await;
                return Ok(());
            };
            let reply = match state.queue.remove(chat_id.0, number).await {
                Ok(true) => "Number removed.",
                Ok(false) => "Number not found.",
                Err(e) => views::user_message(&e),
            };
            let _ = bot.send_message(chat_id, reply).await;
            Ok(())
        }
        _ => {
            let _ = bot.send_message(chat_id, HELP_TEXT).await;
            Ok(())
        }
    }
}

async fn handle_start(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    param: Option<&str>,
) -> Result<(), teloxide::RequestError> {
    let chat_id = msg.chat.id;
    let Some(from) = msg.from.as_ref() else {
        return Ok(());
    };
    if from.username.is_none() {
        let _ = bot
            .send_message(
                chat_id,
                "📼 You need a Telegram username to use this bot.\n\n\
                 ⚙️ Settings → Username, set one, then send /start again.",
            )
            .await;
        return Ok(());
    }

    if let Err(e) = state.accounts.upsert(chat_id.0, from.username.as_deref()).await {
        error!("Failed to upsert account {}: {}", chat_id, e);
        return Ok(());
    }

    if let Some(param) = param {
        if let Some(code) = param.strip_prefix("check_") {
            return redeem::start(bot, state, from, chat_id, code).await;
        }
        if let Some(referrer) = param.strip_prefix("ref_").and_then(|s| s.parse::<i64>().ok()) {
            match state.accounts.register_referral(referrer, chat_id.0).await {
                Ok(Some(bonus)) => {
                    let _ = bot
                        .send_message(
                            ChatId(referrer),
                            format!("+${} for a new referral [{}]", views::usd(bonus), chat_id.0),
                        )
                        .await;
                }
                Ok(None) => {}
                Err(e) => error!("Failed to register referral for {}: {}", referrer, e),
            }
        }
    }

    if !state.required_channels.is_empty()
        && !membership::all_members(bot, &state.required_channels, from.id).await
    {
        let mut rows: Vec<Vec<InlineKeyboardButton>> = state
            .required_channels
            .iter()
            .filter(|channel| channel.parse::<i64>().is_err())
            .filter_map(|channel| {
                let url = format!("https://t.me/{}", channel.trim_start_matches('@'));
                url.parse()
                    .ok()
                    .map(|url| vec![InlineKeyboardButton::url("Join 📢", url)])
            })
            .collect();
        rows.push(vec![keyboards::button("Verify ✅", Action::CheckSub)]);
        let _ = bot
            .send_message(
                chat_id,
                "Welcome! Join the channels below so the bot can work.",
            )
            .reply_markup(InlineKeyboardMarkup::new(rows))
            .await;
        return Ok(());
    }

    views::main_menu(bot, state, chat_id).await;
    Ok(())
}
