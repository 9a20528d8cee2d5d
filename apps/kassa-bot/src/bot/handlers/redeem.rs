use kassa_core::DomainError;
use teloxide::prelude::*;
use teloxide::types::{InputFile, User};

use crate::AppState;
use crate::bot::keyboards;
use crate::bot::membership;
use crate::bot::steps::Step;
use crate::bot::views;

/// Entry point of the redemption flow, reached through the
/// `?start=check_<code>` deep link. Walks the gates in order and either
/// finishes immediately or parks the flow behind a join prompt / password
/// continuation.
pub async fn start(
    bot: &Bot,
    state: &AppState,
    from: &User,
    chat_id: ChatId,
    code: &str,
) -> Result<(), teloxide::RequestError> {
    let voucher = match state.vouchers.get_by_code(code).await {
        Ok(Some(voucher)) => voucher,
        _ => {
            let _ = bot.send_message(chat_id, "❌ Check not found.").await;
            return Ok(());
        }
    };
    if voucher.is_redeemed() {
        let _ = bot
            .send_message(chat_id, "❌ This check has already been redeemed.")
            .await;
        return Ok(());
    }
    if voucher.premium_only && !from.is_premium && chat_id.0 != voucher.creator_id {
        let _ = bot
            .send_message(chat_id, "❌ This check is for Telegram Premium users only.")
            .await;
        return Ok(());
    }

    if let Some(file_id) = voucher.image_file_id.clone() {
        let _ = bot.send_photo(chat_id, InputFile::file_id(teloxide::types::FileId(file_id))).await;
    }

    let mut caption = format!("🧾 Redeeming a check for ${}", views::usd(voucher.amount));
    if let Some(description) = &voucher.description {
        caption.push_str(&format!("\n📝 {description}"));
    }

    let gates = voucher.channel_gates();
    if !gates.is_empty() {
        caption.push_str("\n📢 Channel subscription required.");
        let _ = bot
            .send_message(chat_id, caption)
            .reply_markup(keyboards::redeem_gate(voucher.id, &gates))
            .await;
        return Ok(());
    }

    if voucher.password.is_some() {
        caption.push_str("\n🔑 Password required. Type it in the chat.");
        let _ = bot.send_message(chat_id, caption).await;
        state
            .steps
            .register(chat_id.0, Step::RedeemPassword { check_id: voucher.id });
        return Ok(());
    }

    finish(bot, state, chat_id, from, voucher.id, None).await
}

/// "Verify subscription" button under a gated check. Returns the alert text
/// for the callback answer.
pub async fn verify_subs(
    bot: &Bot,
    state: &AppState,
    from: &User,
    chat_id: ChatId,
    check_id: i64,
) -> Result<String, teloxide::RequestError> {
    let voucher = match state.vouchers.get(check_id).await {
        Ok(Some(voucher)) => voucher,
        _ => return Ok("Check not found.".to_string()),
    };
    let channels: Vec<String> = voucher
        .channel_gates()
        .into_iter()
        .map(|gate| gate.channel)
        .collect();
    if !membership::all_members(bot, &channels, from.id).await {
        return Ok("❌ You are not subscribed to all channels yet.".to_string());
    }

    if voucher.password.is_some() {
        let _ = bot
            .send_message(chat_id, "🔑 Enter the check password.")
            .await;
        state
            .steps
            .register(chat_id.0, Step::RedeemPassword { check_id });
        return Ok("✅ Subscriptions verified.".to_string());
    }

    finish(bot, state, chat_id, from, check_id, None).await?;
    Ok("✅ Subscriptions verified.".to_string())
}

/// Final gate evaluation plus the exactly-once redemption itself. Channel
/// memberships are resolved here, right before the guarded transaction, so
/// the stored state is never trusted across a user prompt.
pub async fn finish(
    bot: &Bot,
    state: &AppState,
    chat_id: ChatId,
    from: &User,
    check_id: i64,
    password: Option<&str>,
) -> Result<(), teloxide::RequestError> {
    let voucher = match state.vouchers.get(check_id).await {
        Ok(Some(voucher)) => voucher,
        _ => {
            let _ = bot.send_message(chat_id, "❌ Check not found.").await;
            return Ok(());
        }
    };
    let channels: Vec<String> = voucher
        .channel_gates()
        .into_iter()
        .map(|gate| gate.channel)
        .collect();
    let memberships_ok = if channels.is_empty() {
        true
    } else {
        membership::all_members(bot, &channels, from.id).await
    };

    match state
        .vouchers
        .redeem(check_id, chat_id.0, password, from.is_premium, memberships_ok)
        .await
    {
        Ok(redeemed) => {
            let creator_name = match state.accounts.get(redeemed.creator_id).await {
                Ok(Some(creator)) => creator.username.unwrap_or_else(|| "unknown".to_string()),
                _ => "unknown".to_string(),
            };
            let _ = bot
                .send_message(
                    chat_id,
                    format!(
                        "✅ You redeemed a check from @{creator_name} and received ${}.",
                        views::usd(redeemed.amount)
                    ),
                )
                .await;

            // Fire-and-forget notification to the creator.
            let redeemer_name = from
                .username
                .clone()
                .unwrap_or_else(|| chat_id.0.to_string());
            let _ = bot
                .send_message(
                    ChatId(redeemed.creator_id),
                    format!(
                        "✅ @{redeemer_name} redeemed your check for ${}.",
                        views::usd(redeemed.amount)
                    ),
                )
                .await;
        }
        Err(e) if matches!(e.domain(), Some(DomainError::WrongPassword)) => {
            let _ = bot
                .send_message(chat_id, "❌ Wrong password. Try again.")
                .await;
            state
                .steps
                .register(chat_id.0, Step::RedeemPassword { check_id });
        }
        Err(e) => {
            let _ = bot.send_message(chat_id, views::user_message(&e)).await;
        }
    }
    Ok(())
}
