use chrono::Utc;
use kassa_core::DomainError;
use kassa_db::StoreError;
use kassa_db::models::ledger::LedgerEventKind;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardMarkup, MessageId};

use crate::AppState;
use crate::bot::actions::Action;
use crate::bot::keyboards;

/// Where a step handler wants the user to land once it is done. Interpreted
/// in one place by [`render`]; handlers never call into each other's
/// rendering paths.
#[derive(Debug, Clone, Copy)]
pub enum Nav {
    Stay,
    MainMenu,
    Profile(MessageId),
    CheckOptions { check_id: i64, message_id: MessageId },
    Card(MessageId),
    Referral(MessageId),
    DepositMenu(MessageId),
    ViewRequest { request_id: i64, message_id: MessageId },
}

pub async fn render(
    bot: &Bot,
    state: &AppState,
    chat_id: ChatId,
    nav: Nav,
) -> Result<(), teloxide::RequestError> {
    match nav {
        Nav::Stay => {}
        Nav::MainMenu => main_menu(bot, state, chat_id).await,
        Nav::Profile(message_id) => profile(bot, state, chat_id, Some(message_id)).await,
        Nav::CheckOptions {
            check_id,
            message_id,
        } => check_options(bot, state, chat_id, check_id, Some(message_id)).await,
        Nav::Card(message_id) => card_display(bot, state, chat_id, Some(message_id)).await,
        Nav::Referral(message_id) => referral(bot, state, chat_id, Some(message_id)).await,
        Nav::DepositMenu(message_id) => deposit_menu(bot, chat_id, Some(message_id)).await,
        Nav::ViewRequest {
            request_id,
            message_id,
        } => view_request(bot, state, chat_id, request_id, Some(message_id)).await,
    }
    Ok(())
}

/// "12.34" for 1234 cents; sign handled by the caller.
pub fn usd(cents: i64) -> String {
    let cents = cents.abs();
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Parse a user-typed dollar amount into cents.
pub fn parse_usd(input: &str) -> Option<i64> {
    let value: f64 = input.trim().parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    Some((value * 100.0).round() as i64)
}

pub fn user_message(err: &StoreError) -> &'static str {
    match err.domain() {
        Some(DomainError::InsufficientFunds) => "❌ Insufficient funds.",
        Some(DomainError::InvalidAmount) => "❌ Invalid amount.",
        Some(DomainError::SelfTransfer) => "❌ You cannot transfer to yourself.",
        Some(DomainError::AlreadyRedeemed) => "❌ This check has already been redeemed.",
        Some(DomainError::PremiumRequired) => "❌ This check is for Telegram Premium users only.",
        Some(DomainError::MembershipRequired) => "❌ Join the required channels first.",
        Some(DomainError::WrongPassword) => "❌ Wrong password.",
        Some(DomainError::VoucherNotFound) => "❌ Check not found.",
        Some(DomainError::AccountNotFound) => "❌ Account not found.",
        Some(DomainError::DuplicatePhoneNumber) => "❌ This number is already queued.",
        Some(DomainError::GatewayUnavailable(_)) => {
            "❌ Payment gateway is unavailable, try again later."
        }
        Some(DomainError::AlreadyReconciled) => "Payment was already processed.",
        None => "❌ Something went wrong, please try again.",
    }
}

async fn put(
    bot: &Bot,
    chat_id: ChatId,
    edit: Option<MessageId>,
    text: String,
    keyboard: InlineKeyboardMarkup,
) {
    match edit {
        Some(message_id) => {
            let _ = bot
                .edit_message_text(chat_id, message_id, text)
                .reply_markup(keyboard)
                .await;
        }
        None => {
            let _ = bot.send_message(chat_id, text).reply_markup(keyboard).await;
        }
    }
}

pub async fn bot_username(bot: &Bot) -> String {
    bot.get_me()
        .await
        .ok()
        .and_then(|me| me.username.clone())
        .unwrap_or_else(|| "bot".to_string())
}

pub async fn main_menu(bot: &Bot, state: &AppState, chat_id: ChatId) {
    // Opening the main menu always invalidates any pending input prompt.
    state.steps.clear(chat_id.0);

    let Ok(Some(account)) = state.accounts.get(chat_id.0).await else {
        return;
    };
    let queue_total = state.queue.len().await.unwrap_or(0);
    let mine = state
        .queue
        .user_entries(chat_id.0)
        .await
        .map(|v| v.len())
        .unwrap_or(0);

    let username = account.username.as_deref().unwrap_or("-");
    let text = format!(
        "@{username} | Kassa\n\
         ➢ Work status: Full work 🟢\n\
         ➣ Reputation: {}\n\
         ➢ Referral balance: ${}\n\
         ╓ Total queue: {queue_total}\n\
         ╚ Your numbers queued: {mine}",
        account.reputation,
        usd(account.referral_balance),
    );
    let _ = bot
        .send_message(chat_id, text)
        .reply_markup(keyboards::main_menu())
        .await;
}

pub async fn profile(bot: &Bot, state: &AppState, chat_id: ChatId, edit: Option<MessageId>) {
    let Ok(Some(account)) = state.accounts.get(chat_id.0).await else {
        return;
    };
    let tier = account.active_tier(Utc::now());
    let tier_line = tier.map(|t| t.as_str()).unwrap_or("none");
    let price_line = tier
        .map(|t| {
            format!(
                "hour +${} / 30 min +${}",
                usd(t.boost_hour_cents()),
                usd(t.boost_half_hour_cents())
            )
        })
        .unwrap_or_default();

    let text = format!(
        "▶ Username: @{}\n\
         ╓ Reputation: {}\n\
         ║\n\
         ╚ Subscription: {tier_line}\n\
         ▶ Price boost: {price_line}\n\
         ╓ Referral balance: ${}",
        account.username.as_deref().unwrap_or("-"),
        account.reputation,
        usd(account.referral_balance),
    );
    put(bot, chat_id, edit, text, keyboards::profile()).await;
}

pub async fn check_options(
    bot: &Bot,
    state: &AppState,
    chat_id: ChatId,
    check_id: i64,
    edit: Option<MessageId>,
) {
    let voucher = match state.vouchers.get(check_id).await {
        Ok(Some(v)) => v,
        _ => {
            let _ = bot.send_message(chat_id, "❌ Check not found.").await;
            return;
        }
    };
    let username = bot_username(bot).await;
    let link = format!("https://t.me/{}?start=check_{}", username, voucher.code);
    let text = format!(
        "🧾 My check\n💰 Amount: ${}\n🔗 Redemption link: {link}",
        usd(voucher.amount)
    );
    put(bot, chat_id, edit, text, keyboards::check_options(&voucher)).await;
}

pub async fn card_display(bot: &Bot, state: &AppState, chat_id: ChatId, edit: Option<MessageId>) {
    let Ok(Some(account)) = state.accounts.get(chat_id.0).await else {
        return;
    };
    let text = format!(
        "💳 Card number: {}\n⚙️ CVV: {}\n💰 Balance: ${}\n💾 Status: {}",
        account.card_number.as_deref().unwrap_or("-"),
        account.card_cvv.as_deref().unwrap_or("-"),
        usd(account.card_balance),
        account.card_status,
    );
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![keyboards::button("Settings ⚙️", Action::CardSettings)],
        keyboards::back_row(Action::Profile),
    ]);
    put(bot, chat_id, edit, text, keyboard).await;
}

pub async fn card_settings(bot: &Bot, chat_id: ChatId, edit: Option<MessageId>) {
    put(
        bot,
        chat_id,
        edit,
        "Card settings".to_string(),
        keyboards::card_settings(),
    )
    .await;
}

pub async fn deposit_menu(bot: &Bot, chat_id: ChatId, edit: Option<MessageId>) {
    put(
        bot,
        chat_id,
        edit,
        "Choose a top-up method:".to_string(),
        keyboards::deposit_menu(),
    )
    .await;
}

pub async fn referral(bot: &Bot, state: &AppState, chat_id: ChatId, edit: Option<MessageId>) {
    let Ok(Some(account)) = state.accounts.get(chat_id.0).await else {
        return;
    };
    let username = bot_username(bot).await;
    let code = account
        .referral_code
        .clone()
        .unwrap_or_else(|| format!("ref_{}", account.id));
    let link = format!("https://t.me/{username}?start={code}");
    let text = format!(
        "💎 Referral program\n\n\
         Share your link and earn $0.50 on every new referral.\n\n\
         🔗 Link: {link}\n\n\
         💰 Earned: ${}\n\n\
         👤 Referrals: {}",
        usd(account.referral_balance),
        account.referrals_count,
    );
    put(bot, chat_id, edit, text, keyboards::referral()).await;
}

pub async fn view_request(
    bot: &Bot,
    state: &AppState,
    chat_id: ChatId,
    request_id: i64,
    edit: Option<MessageId>,
) {
    let request = match state.accounts.withdraw_request(chat_id.0, request_id).await {
        Ok(Some(r)) => r,
        _ => {
            let _ = bot.send_message(chat_id, "❌ Request not found.").await;
            return;
        }
    };
    let text = format!(
        "💾 Request #{:06}\n\n\
         🔹 Amount: ${}\n\
         🔹 Status: {}\n\
         🔹 Created: {}",
        request.id,
        usd(request.amount),
        request.status,
        request.created_at.format("%Y-%m-%d %H:%M:%S"),
    );
    let keyboard = InlineKeyboardMarkup::new(vec![
        vec![keyboards::button(
            "Change amount",
            Action::EditRequestAmount(request.id),
        )],
        vec![keyboards::button(
            "Close request",
            Action::CloseRequest(request.id),
        )],
        keyboards::back_row(Action::RequestsList),
    ]);
    put(bot, chat_id, edit, text, keyboard).await;
}

/// Card statement, newest first, with transfer counterparties resolved.
pub async fn card_history_text(state: &AppState, account_id: i64) -> String {
    let events = match state.ledger.history(account_id).await {
        Ok(events) if !events.is_empty() => events,
        _ => return "No history yet.".to_string(),
    };

    let mut lines = vec!["History:".to_string()];
    for event in &events {
        let sign = if event.amount >= 0 { "+" } else { "-" };
        let when = event.created_at.format("%Y-%m-%d %H:%M");
        let peer = match state.ledger.transfer_peer(account_id, event).await {
            Ok(Some(peer_id)) => match state.accounts.get(peer_id).await {
                Ok(Some(peer)) => peer.username,
                _ => None,
            },
            _ => None,
        };
        let detail = match (LedgerEventKind::parse(&event.kind), peer) {
            (Some(LedgerEventKind::TransferIn), Some(name)) => format!("from @{name}"),
            (Some(LedgerEventKind::TransferOut), Some(name)) => format!("to @{name}"),
            _ => event.kind.clone(),
        };
        lines.push(format!("{sign}${} {when} {detail}", usd(event.amount)));
    }
    lines.join("\n")
}
