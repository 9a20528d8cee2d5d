use kassa_core::purpose::{PaymentPurpose, PaymentRail};
use kassa_core::queue::NumberKind;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};

use crate::AppState;
use crate::bot::actions::Action;
use crate::bot::handlers::redeem;
use crate::bot::keyboards;
use crate::bot::views::{self, Nav};
use crate::gateway::InvoiceStatus;

/// One saved continuation: what to do with the next message from a chat,
/// plus the context captured when the prompt was sent. At most one lives
/// per chat; see [`kassa_core::steps::PendingSteps`].
#[derive(Debug, Clone, Copy)]
pub enum Step {
    PhoneNumber { kind: NumberKind, message_id: MessageId },
    CheckAmount { message_id: MessageId },
    CheckDescription { check_id: i64, message_id: MessageId },
    CheckPassword { check_id: i64, message_id: MessageId },
    CheckImage { check_id: i64, message_id: MessageId },
    CheckChannelGate { check_id: i64, message_id: MessageId },
    RedeemPassword { check_id: i64 },
    WithdrawAmount { message_id: MessageId },
    EditRequestAmount { request_id: i64, message_id: MessageId },
    CardPin { message_id: MessageId },
    CardPassword { message_id: MessageId },
    TransferDetails { message_id: MessageId },
    DepositAmount { rail: PaymentRail, message_id: MessageId },
}

/// Run a consumed continuation against the incoming message. The slot was
/// already removed by the caller, so a failure in here can never replay a
/// stale handler; a retryable mistake re-registers the step explicitly.
pub async fn run_step(
    bot: &Bot,
    msg: &Message,
    state: &AppState,
    step: Step,
) -> Result<Nav, teloxide::RequestError> {
    let chat_id = msg.chat.id;

    match step {
        Step::PhoneNumber { kind, message_id: _ } => {
            let phone = msg.text().unwrap_or_default().trim().to_string();
            if !kind.validate(&phone) {
                let _ = bot
                    .send_message(
                        chat_id,
                        format!("❌ Invalid format. Expected {}.", kind.format_hint()),
                    )
                    .await;
                state.steps.register(chat_id.0, step);
                return Ok(Nav::Stay);
            }
            match state.queue.enqueue(chat_id.0, &phone, kind).await {
                Ok(_) => {
                    let _ = bot.send_message(chat_id, "✅ Number added to the queue.").await;
                }
                Err(e) => {
                    let _ = bot.send_message(chat_id, views::user_message(&e)).await;
                }
            }
            Ok(Nav::MainMenu)
        }

        Step::CheckAmount { message_id } => {
            let Some(cents) = msg.text().and_then(views::parse_usd) else {
                let _ = bot.send_message(chat_id, "❌ Invalid amount format.").await;
                state.steps.register(chat_id.0, step);
                return Ok(Nav::Stay);
            };
            match state.vouchers.create(chat_id.0, cents).await {
                Ok(voucher) => Ok(Nav::CheckOptions {
                    check_id: voucher.id,
                    message_id,
                }),
                Err(e) => {
                    let _ = bot.send_message(chat_id, views::user_message(&e)).await;
                    state.steps.register(chat_id.0, step);
                    Ok(Nav::Stay)
                }
            }
        }

        Step::CheckDescription { check_id, message_id } => {
            let Some(text) = msg.text() else {
                state.steps.register(chat_id.0, step);
                return Ok(Nav::Stay);
            };
            match state.vouchers.set_description(check_id, text).await {
                Ok(()) => {
                    let _ = bot.send_message(chat_id, "✅ Description added.").await;
                }
                Err(e) => {
                    let _ = bot.send_message(chat_id, views::user_message(&e)).await;
                }
            }
            Ok(Nav::CheckOptions { check_id, message_id })
        }

        Step::CheckPassword { check_id, message_id } => {
            let Some(text) = msg.text() else {
                state.steps.register(chat_id.0, step);
                return Ok(Nav::Stay);
            };
            match state.vouchers.set_password(check_id, text).await {
                Ok(()) => {
                    let _ = bot.send_message(chat_id, "✅ Password set.").await;
                }
                Err(e) => {
                    let _ = bot.send_message(chat_id, views::user_message(&e)).await;
                }
            }
            Ok(Nav::CheckOptions { check_id, message_id })
        }

        Step::CheckImage { check_id, message_id } => {
            let Some(photo) = msg.photo().and_then(|sizes| sizes.last()) else {
                let _ = bot.send_message(chat_id, "❌ Please send a photo.").await;
                state.steps.register(chat_id.0, step);
                return Ok(Nav::Stay);
            };
            let file_id = photo.file.id.to_string();
            match state.vouchers.set_image(check_id, &file_id).await {
                Ok(()) => {
                    let _ = bot.send_message(chat_id, "✅ Image added.").await;
                }
                Err(e) => {
                    let _ = bot.send_message(chat_id, views::user_message(&e)).await;
                }
            }
            Ok(Nav::CheckOptions { check_id, message_id })
        }

        Step::CheckChannelGate { check_id, message_id } => {
            let gate = msg.text().and_then(kassa_core::voucher::ChannelGate::parse);
            let Some(gate) = gate else {
                let _ = bot
                    .send_message(chat_id, "❌ Format: Name https://t.me/yourchannel")
                    .await;
                state.steps.register(chat_id.0, step);
                return Ok(Nav::Stay);
            };
            match state.vouchers.add_channel_gate(check_id, gate).await {
                Ok(()) => {
                    let _ = bot.send_message(chat_id, "✅ Subscription gate added.").await;
                }
                Err(e) => {
                    let _ = bot.send_message(chat_id, views::user_message(&e)).await;
                }
            }
            Ok(Nav::CheckOptions { check_id, message_id })
        }

        Step::RedeemPassword { check_id } => {
            let Some(password) = msg.text() else {
                state.steps.register(chat_id.0, step);
                return Ok(Nav::Stay);
            };
            let Some(from) = msg.from.as_ref() else {
                return Ok(Nav::Stay);
            };
            redeem::finish(bot, state, chat_id, from, check_id, Some(password)).await?;
            Ok(Nav::Stay)
        }

        Step::WithdrawAmount { message_id } => {
            let Some(cents) = msg.text().and_then(views::parse_usd) else {
                let _ = bot.send_message(chat_id, "❌ Invalid amount format.").await;
                state.steps.register(chat_id.0, step);
                return Ok(Nav::Stay);
            };
            match state.accounts.create_withdraw(chat_id.0, cents).await {
                Ok(_) => {
                    let _ = bot.send_message(chat_id, "✅ Request created.").await;
                }
                Err(e) => {
                    let _ = bot.send_message(chat_id, views::user_message(&e)).await;
                }
            }
            Ok(Nav::Referral(message_id))
        }

        Step::EditRequestAmount { request_id, message_id } => {
            let Some(cents) = msg.text().and_then(views::parse_usd) else {
                let _ = bot.send_message(chat_id, "❌ Invalid amount format.").await;
                state.steps.register(chat_id.0, step);
                return Ok(Nav::Stay);
            };
            match state.accounts.edit_withdraw(chat_id.0, request_id, cents).await {
                Ok(()) => {
                    let _ = bot.send_message(chat_id, "✅ Amount updated.").await;
                }
                Err(e) => {
                    let _ = bot.send_message(chat_id, views::user_message(&e)).await;
                }
            }
            Ok(Nav::ViewRequest { request_id, message_id })
        }

        Step::CardPin { message_id } => {
            let pin = msg.text().unwrap_or_default().trim().to_string();
            if pin.len() != 4 || !pin.bytes().all(|b| b.is_ascii_digit()) {
                let _ = bot
                    .send_message(chat_id, "❌ The PIN must be exactly 4 digits.")
                    .await;
                state.steps.register(chat_id.0, step);
                return Ok(Nav::Stay);
            }
            match state.accounts.activate_card(chat_id.0, &pin).await {
                Ok(Some(_)) => Ok(Nav::Card(message_id)),
                Ok(None) => {
                    let _ = bot
                        .send_message(chat_id, "❌ The card is not ready for activation.")
                        .await;
                    Ok(Nav::Profile(message_id))
                }
                Err(e) => {
                    let _ = bot.send_message(chat_id, views::user_message(&e)).await;
                    Ok(Nav::Profile(message_id))
                }
            }
        }

        Step::CardPassword { message_id } => {
            let given = msg.text().unwrap_or_default();
            let account = match state.accounts.get(chat_id.0).await {
                Ok(Some(account)) => account,
                _ => return Ok(Nav::Stay),
            };
            if account.card_password.as_deref() == Some(given) {
                Ok(Nav::Card(message_id))
            } else {
                let _ = bot.send_message(chat_id, "❌ Wrong password.").await;
                Ok(Nav::Profile(message_id))
            }
        }

        Step::TransferDetails { message_id } => {
            let text = msg.text().unwrap_or_default();
            let parts: Vec<&str> = text.split_whitespace().collect();
            let parsed = match parts.as_slice() {
                [username, amount] => views::parse_usd(amount)
                    .filter(|cents| *cents > 0)
                    .map(|cents| (username.trim_start_matches('@').to_string(), cents)),
                _ => None,
            };
            let Some((username, cents)) = parsed else {
                let _ = bot
                    .send_message(chat_id, "❌ Format: username amount")
                    .await;
                state.steps.register(chat_id.0, step);
                return Ok(Nav::Stay);
            };

            let recipient = match state.accounts.get_by_username(&username).await {
                Ok(Some(recipient)) => recipient,
                Ok(None) => {
                    let _ = bot.send_message(chat_id, "❌ Account not found.").await;
                    state.steps.register(chat_id.0, step);
                    return Ok(Nav::Stay);
                }
                Err(e) => {
                    let _ = bot.send_message(chat_id, views::user_message(&e)).await;
                    return Ok(Nav::Stay);
                }
            };
            if recipient.id == chat_id.0 {
                let _ = bot
                    .send_message(chat_id, "❌ You cannot transfer to yourself.")
                    .await;
                state.steps.register(chat_id.0, step);
                return Ok(Nav::Stay);
            }
            if !recipient.card_active() {
                let _ = bot
                    .send_message(chat_id, "❌ The recipient has no active card.")
                    .await;
                state.steps.register(chat_id.0, step);
                return Ok(Nav::Stay);
            }

            let text = format!("Recipient: @{username}\nAmount: ${}", views::usd(cents));
            let keyboard = InlineKeyboardMarkup::new(vec![
                vec![keyboards::button(
                    "Transfer ✅",
                    Action::ConfirmTransfer {
                        to: recipient.id,
                        amount: cents,
                    },
                )],
                keyboards::back_row(Action::CardSettings),
            ]);
            let _ = bot
                .edit_message_text(chat_id, message_id, text)
                .reply_markup(keyboard)
                .await;
            Ok(Nav::Stay)
        }

        Step::DepositAmount { rail, message_id } => {
            let Some(cents) = msg.text().and_then(views::parse_usd) else {
                let _ = bot.send_message(chat_id, "❌ Invalid amount format.").await;
                state.steps.register(chat_id.0, step);
                return Ok(Nav::Stay);
            };
            if cents < 1000 {
                let _ = bot.send_message(chat_id, "❌ Minimum top-up is $10.").await;
                state.steps.register(chat_id.0, step);
                return Ok(Nav::Stay);
            }

            let payload =
                PaymentPurpose::Deposit.to_payload_string(chat_id.0, rand::random::<u64>());
            match rail {
                PaymentRail::Stars => {
                    // 2 stars buy one dollar of card balance.
                    let stars = cents / 50;
                    let intent = match state
                        .payments
                        .create_intent(
                            chat_id.0,
                            PaymentPurpose::Deposit,
                            PaymentRail::Stars,
                            stars,
                            &payload,
                            None,
                        )
                        .await
                    {
                        Ok(intent) => intent,
                        Err(e) => {
                            let _ = bot.send_message(chat_id, views::user_message(&e)).await;
                            return Ok(Nav::DepositMenu(message_id));
                        }
                    };
                    let text = format!(
                        "🏦 Method: ⭐ Telegram Stars\n💰 Cost: {stars} Stars\n⏰ Pay within 120 minutes."
                    );
                    let keyboard = InlineKeyboardMarkup::new(vec![
                        vec![
                            keyboards::button("Pay ✅", Action::SendStarsInvoice(intent.id)),
                            keyboards::button("Verify 🔍", Action::CheckPayment(intent.id)),
                        ],
                        keyboards::back_row(Action::DepositMenu),
                    ]);
                    let _ = bot
                        .edit_message_text(chat_id, message_id, text)
                        .reply_markup(keyboard)
                        .await;
                }
                PaymentRail::CryptoPay => {
                    let created = match state
                        .gateway
                        .create_invoice("USDT", &views::usd(cents), "Card top-up", &payload)
                        .await
                    {
                        Ok(created) => created,
                        Err(e) => {
                            let _ = bot
                                .send_message(
                                    chat_id,
                                    views::user_message(&kassa_db::StoreError::Domain(e)),
                                )
                                .await;
                            return Ok(Nav::DepositMenu(message_id));
                        }
                    };
                    let intent = match state
                        .payments
                        .create_intent(
                            chat_id.0,
                            PaymentPurpose::Deposit,
                            PaymentRail::CryptoPay,
                            cents,
                            &payload,
                            Some(&created.invoice_id),
                        )
                        .await
                    {
                        Ok(intent) => intent,
                        Err(e) => {
                            let _ = bot.send_message(chat_id, views::user_message(&e)).await;
                            return Ok(Nav::DepositMenu(message_id));
                        }
                    };
                    let text = format!(
                        "🏦 Method: 🌐 CryptoPay\n💰 Cost: {} USDT\n⏰ Pay within 120 minutes.",
                        views::usd(cents)
                    );
                    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();
                    if let Ok(url) = created.pay_url.parse() {
                        rows.push(vec![InlineKeyboardButton::url("Pay ✅", url)]);
                    }
                    rows.push(vec![keyboards::button(
                        "Verify 🔍",
                        Action::CheckPayment(intent.id),
                    )]);
                    rows.push(keyboards::back_row(Action::DepositMenu));
                    let _ = bot
                        .edit_message_text(chat_id, message_id, text)
                        .reply_markup(InlineKeyboardMarkup::new(rows))
                        .await;
                }
            }
            Ok(Nav::Stay)
        }
    }
}

/// Pull-side confirmation shared by the deposit and subscription flows:
/// fetch the gateway status first, then reconcile with the known fact.
pub async fn check_payment(
    bot: &Bot,
    state: &AppState,
    chat_id: ChatId,
    payment_id: i64,
) -> Result<String, teloxide::RequestError> {
    let intent = match state.payments.get(payment_id).await {
        Ok(Some(intent)) => intent,
        Ok(None) => return Ok("Invoice not found.".to_string()),
        Err(e) => return Ok(views::user_message(&e).to_string()),
    };
    if intent.account_id != chat_id.0 {
        return Ok("Invoice not found.".to_string());
    }
    if intent.is_paid() {
        return Ok("Payment already confirmed.".to_string());
    }

    match intent.rail_parsed() {
        Some(PaymentRail::Stars) => Ok("Payment not confirmed yet.".to_string()),
        Some(PaymentRail::CryptoPay) => {
            let Some(invoice_id) = intent.invoice_id.as_deref() else {
                return Ok("Invoice not found.".to_string());
            };
            // No ledger lock is held while this request is in flight.
            match state.gateway.invoice_status(invoice_id).await {
                Ok(InvoiceStatus::Paid) => {
                    match state.payments.reconcile_paid(payment_id, None).await {
                        Ok(effect) => {
                            let text = super::handlers::payment::effect_message(&effect);
                            let _ = bot.send_message(chat_id, text).await;
                            Ok("Payment confirmed!".to_string())
                        }
                        Err(e) => Ok(views::user_message(&e).to_string()),
                    }
                }
                Ok(InvoiceStatus::Pending) => Ok("Payment not confirmed yet.".to_string()),
                Ok(InvoiceStatus::Other(status)) => Ok(format!("Invoice status: {status}.")),
                Err(e) => Ok(views::user_message(&kassa_db::StoreError::Domain(e)).to_string()),
            }
        }
        None => Ok("Invoice not found.".to_string()),
    }
}
