use chrono::Utc;
use kassa_core::purpose::{PaymentPurpose, PaymentRail};
use kassa_core::tier::SubscriptionTier;
use kassa_db::models::account::CARD_LOCK_DAYS;
use kassa_db::services::accounts::MIN_WITHDRAW_CENTS;
use reqwest::Url;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, InputFile, LabeledPrice, MessageId,
};
use tracing::info;

use crate::AppState;
use crate::bot::actions::Action;
use crate::bot::handlers::redeem;
use crate::bot::keyboards;
use crate::bot::membership;
use crate::bot::steps::{self, Step};
use crate::bot::views;

const RULES_TEXT: &str = "📜 Rules\n\n\
    1. Add numbers through the menu and wait until they are taken into work.\n\
    2. Numbers holding long enough are paid; see /hold for your holds.\n\
    3. Subscriptions raise your payout and queue priority.\n\
    4. Checks are prepaid: the amount is reserved when the check is created.";

pub async fn callback_handler(
    bot: Bot,
    q: CallbackQuery,
    state: AppState,
) -> Result<(), teloxide::RequestError> {
    info!("Received callback: {:?}", q.data);
    let callback_id = q.id.clone();
    let from = q.from.clone();

    let Some(message) = q.message.as_ref() else {
        let _ = bot.answer_callback_query(callback_id).await;
        return Ok(());
    };
    let chat_id = message.chat().id;
    let message_id = message.id();

    let Some(action) = q.data.as_deref().and_then(Action::parse) else {
        let _ = bot.answer_callback_query(callback_id).await;
        return Ok(());
    };

    // Every button press abandons whatever freeform input was pending, so a
    // stale "please type X" prompt can never fire after navigation.
    state.steps.clear(chat_id.0);

    match action {
        Action::Noop => {
            let _ = bot.answer_callback_query(callback_id).await;
        }

        Action::CheckSub => {
            if membership::all_members(&bot, &state.required_channels, from.id).await {
                let _ = bot.answer_callback_query(callback_id).await;
                let _ = bot.delete_message(chat_id, message_id).await;
                views::main_menu(&bot, &state, chat_id).await;
            } else {
                let _ = bot
                    .answer_callback_query(callback_id)
                    .text("You have not joined all channels yet!")
                    .show_alert(true)
                    .await;
            }
        }

        Action::BackMain => {
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot.delete_message(chat_id, message_id).await;
            views::main_menu(&bot, &state, chat_id).await;
        }

        Action::AddNumberMenu => {
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot
                .edit_message_text(chat_id, message_id, "Choose the number type")
                .reply_markup(keyboards::number_kinds())
                .await;
        }

        Action::AddNumber(kind) => {
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot
                .edit_message_text(
                    chat_id,
                    message_id,
                    format!("Enter the number in the format {}", kind.format_hint()),
                )
                .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                    Action::AddNumberMenu,
                )]))
                .await;
            state
                .steps
                .register(chat_id.0, Step::PhoneNumber { kind, message_id });
        }

        Action::MyNumbers => {
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot
                .edit_message_text(chat_id, message_id, "My numbers")
                .reply_markup(keyboards::my_numbers())
                .await;
        }

        Action::MyQueue | Action::MyWorking | Action::MySuccessful | Action::MyBlocked => {
            let _ = bot.answer_callback_query(callback_id).await;
            let (title, lines) = match action {
                Action::MyQueue => (
                    "Waiting",
                    state
                        .queue
                        .user_entries(chat_id.0)
                        .await
                        .unwrap_or_default()
                        .iter()
                        .map(|r| format!("{} ({})", r.phone_number, r.kind))
                        .collect::<Vec<_>>(),
                ),
                Action::MyWorking => (
                    "In work",
                    state
                        .queue
                        .working_for(chat_id.0)
                        .await
                        .unwrap_or_default()
                        .iter()
                        .map(|r| format!("{} ({})", r.phone_number, r.kind))
                        .collect(),
                ),
                Action::MySuccessful => (
                    "Successful",
                    state
                        .queue
                        .successful_for(chat_id.0)
                        .await
                        .unwrap_or_default()
                        .iter()
                        .map(|r| format!("{} ({})", r.phone_number, r.kind))
                        .collect(),
                ),
                _ => (
                    "Blocked",
                    state
                        .queue
                        .blocked_for(chat_id.0)
                        .await
                        .unwrap_or_default()
                        .iter()
                        .map(|r| format!("{} ({})", r.phone_number, r.kind))
                        .collect(),
                ),
            };
            let text = if lines.is_empty() {
                format!("{title}: empty")
            } else {
                format!("{title}\n{}", lines.join("\n"))
            };
            let _ = bot
                .edit_message_text(chat_id, message_id, text)
                .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                    Action::MyNumbers,
                )]))
                .await;
        }

        Action::QueueView => {
            let _ = bot.answer_callback_query(callback_id).await;
            let account = state.accounts.get(chat_id.0).await.ok().flatten();
            let sees_full = account
                .as_ref()
                .and_then(|a| a.active_tier(Utc::now()))
                .is_some_and(|tier| tier.sees_full_queue());
            let text = if sees_full {
                let snapshot = state.queue.ordered_snapshot().await.unwrap_or_default();
                if snapshot.is_empty() {
                    "The queue is empty".to_string()
                } else {
                    let lines: Vec<String> = snapshot
                        .iter()
                        .map(|t| format!("{} ({})", t.phone_number, t.kind.as_str()))
                        .collect();
                    format!("Queue:\n{}", lines.join("\n"))
                }
            } else {
                format!("Total queue: {}", state.queue.len().await.unwrap_or(0))
            };
            let _ = bot
                .edit_message_text(chat_id, message_id, text)
                .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                    Action::BackMain,
                )]))
                .await;
        }

        Action::Profile => {
            let _ = bot.answer_callback_query(callback_id).await;
            views::profile(&bot, &state, chat_id, Some(message_id)).await;
        }

        Action::Rules => {
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot
                .edit_message_text(chat_id, message_id, RULES_TEXT)
                .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                    Action::Profile,
                )]))
                .await;
        }

        Action::CreateCheckMenu => {
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot
                .edit_message_text(
                    chat_id,
                    message_id,
                    "🧾 Create a check to instantly send funds to any user.",
                )
                .reply_markup(InlineKeyboardMarkup::new(vec![
                    vec![keyboards::button("Create check ➕", Action::CreateCheck)],
                    keyboards::back_row(Action::Profile),
                ]))
                .await;
        }

        Action::CreateCheck => {
            let account = state.accounts.get(chat_id.0).await.ok().flatten();
            let Some(account) = account.filter(|a| a.card_active()) else {
                let _ = bot
                    .answer_callback_query(callback_id)
                    .text("Your card is not active")
                    .show_alert(true)
                    .await;
                return Ok(());
            };
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot
                .edit_message_text(
                    chat_id,
                    message_id,
                    format!(
                        "💰 Send the check amount.\nYour balance: ${}",
                        views::usd(account.card_balance)
                    ),
                )
                .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                    Action::CreateCheckMenu,
                )]))
                .await;
            state
                .steps
                .register(chat_id.0, Step::CheckAmount { message_id });
        }

        Action::ShowCheck(check_id) => {
            let _ = bot.answer_callback_query(callback_id).await;
            views::check_options(&bot, &state, chat_id, check_id, Some(message_id)).await;
        }

        Action::AddDescription(check_id) => {
            let _ = bot.answer_callback_query(callback_id).await;
            prompt_check_input(
                &bot,
                chat_id,
                message_id,
                check_id,
                "📝 Send the description for the check.",
            )
            .await;
            state
                .steps
                .register(chat_id.0, Step::CheckDescription { check_id, message_id });
        }

        Action::AddPassword(check_id) => {
            let _ = bot.answer_callback_query(callback_id).await;
            prompt_check_input(
                &bot,
                chat_id,
                message_id,
                check_id,
                "🔑 Send the password that will protect this check.",
            )
            .await;
            state
                .steps
                .register(chat_id.0, Step::CheckPassword { check_id, message_id });
        }

        Action::AddImage(check_id) => {
            let _ = bot.answer_callback_query(callback_id).await;
            prompt_check_input(
                &bot,
                chat_id,
                message_id,
                check_id,
                "🖼 Send the image to attach to this check.",
            )
            .await;
            state
                .steps
                .register(chat_id.0, Step::CheckImage { check_id, message_id });
        }

        Action::AddChannelGate(check_id) => {
            let _ = bot.answer_callback_query(callback_id).await;
            prompt_check_input(
                &bot,
                chat_id,
                message_id,
                check_id,
                "📢 Send the button name and channel link.\nFormat: Name https://t.me/yourchannel",
            )
            .await;
            state
                .steps
                .register(chat_id.0, Step::CheckChannelGate { check_id, message_id });
        }

        Action::TogglePremium(check_id) => {
            match state.vouchers.toggle_premium(check_id).await {
                Ok(enabled) => {
                    let text = if enabled {
                        "⭐ Premium-only enabled."
                    } else {
                        "⭐ Premium-only disabled."
                    };
                    let _ = bot.answer_callback_query(callback_id).text(text).await;
                    views::check_options(&bot, &state, chat_id, check_id, Some(message_id)).await;
                }
                Err(e) => {
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text(views::user_message(&e))
                        .show_alert(true)
                        .await;
                }
            }
        }

        Action::ShareCheck(check_id) => {
            let Ok(Some(voucher)) = state.vouchers.get(check_id).await else {
                let _ = bot
                    .answer_callback_query(callback_id)
                    .text("Check not found.")
                    .show_alert(true)
                    .await;
                return Ok(());
            };
            let username = views::bot_username(&bot).await;
            let link = format!("https://t.me/{}?start=check_{}", username, voucher.code);
            let mut rows = Vec::new();
            if let Ok(url) = link.parse::<Url>() {
                rows.push(vec![InlineKeyboardButton::url("Receive ✅", url)]);
            }
            let _ = bot
                .send_message(
                    chat_id,
                    format!("🦋 Check for ${} 🪙", views::usd(voucher.amount)),
                )
                .reply_markup(InlineKeyboardMarkup::new(rows))
                .await;
            let _ = bot
                .answer_callback_query(callback_id)
                .text("📤 You can forward this message.")
                .await;
        }

        Action::QrCheck(check_id) => {
            let Ok(Some(voucher)) = state.vouchers.get(check_id).await else {
                let _ = bot
                    .answer_callback_query(callback_id)
                    .text("Check not found.")
                    .show_alert(true)
                    .await;
                return Ok(());
            };
            let username = views::bot_username(&bot).await;
            let link = format!("https://t.me/{}?start=check_{}", username, voucher.code);
            let qr = format!(
                "https://quickchart.io/qr?text={}&size=200",
                urlencoding::encode(&link)
            );
            if let Ok(url) = qr.parse::<Url>() {
                let _ = bot.send_photo(chat_id, InputFile::url(url)).await;
            }
            let _ = bot
                .answer_callback_query(callback_id)
                .text("🔲 QR code for the check.")
                .await;
        }

        Action::DeleteCheck(check_id) => {
            match state.vouchers.delete(check_id, chat_id.0).await {
                Ok(_) => {
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text("🗑 Check deleted, funds returned.")
                        .await;
                    let _ = bot
                        .edit_message_text(
                            chat_id,
                            message_id,
                            "🧾 Create a check to instantly send funds to any user.",
                        )
                        .reply_markup(InlineKeyboardMarkup::new(vec![
                            vec![keyboards::button("Create check ➕", Action::CreateCheck)],
                            keyboards::back_row(Action::Profile),
                        ]))
                        .await;
                }
                Err(e) => {
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text(views::user_message(&e))
                        .show_alert(true)
                        .await;
                }
            }
        }

        Action::VerifyCheckSubs(check_id) => {
            let alert = redeem::verify_subs(&bot, &state, &from, chat_id, check_id).await?;
            let _ = bot
                .answer_callback_query(callback_id)
                .text(alert)
                .show_alert(true)
                .await;
        }

        Action::BuySub => {
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot
                .edit_message_text(chat_id, message_id, "Buy a subscription")
                .reply_markup(keyboards::pay_rails())
                .await;
        }

        Action::PayRail(rail) => {
            let _ = bot.answer_callback_query(callback_id).await;
            let method = match rail {
                PaymentRail::Stars => "🌟 Telegram Stars 🌟",
                PaymentRail::CryptoPay => "🌐 CryptoPay 🌐",
            };
            let _ = bot
                .edit_message_text(
                    chat_id,
                    message_id,
                    format!("🌒 Choose a subscription:\n— Method: {method}"),
                )
                .reply_markup(keyboards::tier_list(rail))
                .await;
        }

        Action::SubSelect(rail, tier) => {
            match start_subscription_purchase(&bot, &state, chat_id, message_id, rail, tier).await {
                Ok(()) => {
                    let _ = bot.answer_callback_query(callback_id).await;
                }
                Err(alert) => {
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text(alert)
                        .show_alert(true)
                        .await;
                }
            }
        }

        Action::SendStarsInvoice(payment_id) => {
            let intent = state.payments.get(payment_id).await.ok().flatten();
            let Some(intent) = intent.filter(|i| i.account_id == chat_id.0 && !i.is_paid()) else {
                let _ = bot
                    .answer_callback_query(callback_id)
                    .text("Invoice not found.")
                    .show_alert(true)
                    .await;
                return Ok(());
            };
            let (title, description) = match intent.purpose_parsed() {
                Some(PaymentPurpose::Subscription(tier)) => (
                    format!("Subscription {}", tier.as_str()),
                    "For 1 month".to_string(),
                ),
                Some(PaymentPurpose::Deposit) => {
                    ("Card top-up".to_string(), "Via Telegram Stars".to_string())
                }
                None => {
                    let _ = bot.answer_callback_query(callback_id).await;
                    return Ok(());
                }
            };
            let prices = vec![LabeledPrice {
                label: title.clone(),
                amount: intent.amount as u32,
            }];
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot
                .send_invoice(
                    chat_id,
                    title,
                    description,
                    intent.payload.unwrap_or_default(),
                    "XTR",
                    prices,
                )
                .await;
        }

        Action::CheckPayment(payment_id) => {
            let alert = steps::check_payment(&bot, &state, chat_id, payment_id).await?;
            let _ = bot
                .answer_callback_query(callback_id)
                .text(alert)
                .show_alert(true)
                .await;
        }

        Action::Referral => {
            let _ = bot.answer_callback_query(callback_id).await;
            views::referral(&bot, &state, chat_id, Some(message_id)).await;
        }

        Action::PayoutHistory => {
            let _ = bot.answer_callback_query(callback_id).await;
            let rows = state.accounts.paid_withdraws(chat_id.0).await.unwrap_or_default();
            let text = if rows.is_empty() {
                "Payout history:\n\nNo payouts yet".to_string()
            } else {
                let lines: Vec<String> = rows
                    .iter()
                    .map(|r| {
                        let when = r
                            .paid_at
                            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                            .unwrap_or_else(|| "-".to_string());
                        format!("🖥 ${} — {when} (request #{:06})", views::usd(r.amount), r.id)
                    })
                    .collect();
                format!("Payout history:\n\n{}", lines.join("\n"))
            };
            let _ = bot
                .edit_message_text(chat_id, message_id, text)
                .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                    Action::Referral,
                )]))
                .await;
        }

        Action::RequestsList => {
            let _ = bot.answer_callback_query(callback_id).await;
            let rows = state
                .accounts
                .pending_withdraws(chat_id.0)
                .await
                .unwrap_or_default();
            let mut buttons: Vec<Vec<InlineKeyboardButton>> = rows
                .iter()
                .map(|r| {
                    vec![keyboards::button(
                        format!("🖥 Request #{:06}", r.id),
                        Action::ViewRequest(r.id),
                    )]
                })
                .collect();
            buttons.push(keyboards::back_row(Action::Referral));
            let text = if rows.is_empty() {
                "My requests:\n\nNo requests"
            } else {
                "My requests:"
            };
            let _ = bot
                .edit_message_text(chat_id, message_id, text)
                .reply_markup(InlineKeyboardMarkup::new(buttons))
                .await;
        }

        Action::ViewRequest(request_id) => {
            let _ = bot.answer_callback_query(callback_id).await;
            views::view_request(&bot, &state, chat_id, request_id, Some(message_id)).await;
        }

        Action::EditRequestAmount(request_id) => {
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot
                .edit_message_text(chat_id, message_id, "Enter the new amount")
                .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                    Action::ViewRequest(request_id),
                )]))
                .await;
            state
                .steps
                .register(chat_id.0, Step::EditRequestAmount { request_id, message_id });
        }

        Action::CloseRequest(request_id) => {
            match state.accounts.close_withdraw(chat_id.0, request_id).await {
                Ok(()) => {
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text("Request closed, funds returned.")
                        .await;
                    views::referral(&bot, &state, chat_id, Some(message_id)).await;
                }
                Err(e) => {
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text(views::user_message(&e))
                        .show_alert(true)
                        .await;
                }
            }
        }

        Action::Withdraw => {
            let account = state.accounts.get(chat_id.0).await.ok().flatten();
            let balance = account.map(|a| a.referral_balance).unwrap_or(0);
            if balance < MIN_WITHDRAW_CENTS {
                let _ = bot
                    .answer_callback_query(callback_id)
                    .text(format!(
                        "Minimum withdrawal is ${}",
                        views::usd(MIN_WITHDRAW_CENTS)
                    ))
                    .show_alert(true)
                    .await;
                return Ok(());
            }
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot
                .edit_message_text(chat_id, message_id, "Enter the withdrawal amount")
                .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                    Action::Referral,
                )]))
                .await;
            state
                .steps
                .register(chat_id.0, Step::WithdrawAmount { message_id });
        }

        Action::Card => {
            let account = match state.accounts.get(chat_id.0).await {
                Ok(Some(account)) => account,
                _ => {
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text("Account not found.")
                        .show_alert(true)
                        .await;
                    return Ok(());
                }
            };
            let account = match state.accounts.refresh_card_lock(account).await {
                Ok(account) => account,
                Err(e) => {
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text(views::user_message(&e))
                        .show_alert(true)
                        .await;
                    return Ok(());
                }
            };
            let _ = bot.answer_callback_query(callback_id).await;

            if account.card_blocked() {
                let remaining = account
                    .card_locked_at
                    .map(|at| {
                        let elapsed = (Utc::now() - at).num_days();
                        (CARD_LOCK_DAYS - elapsed).max(0)
                    })
                    .unwrap_or(CARD_LOCK_DAYS);
                let _ = bot
                    .edit_message_text(
                        chat_id,
                        message_id,
                        format!("The card is blocked for 30 days. Remaining: {remaining} days"),
                    )
                    .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                        Action::Profile,
                    )]))
                    .await;
            } else if account.card_active() {
                let _ = bot
                    .edit_message_text(chat_id, message_id, "Enter the card password")
                    .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                        Action::Profile,
                    )]))
                    .await;
                state
                    .steps
                    .register(chat_id.0, Step::CardPassword { message_id });
            } else {
                let _ = bot
                    .edit_message_text(chat_id, message_id, "The card is not activated")
                    .reply_markup(InlineKeyboardMarkup::new(vec![
                        vec![keyboards::button("Activate 🔓", Action::ActivateCard)],
                        keyboards::back_row(Action::Profile),
                    ]))
                    .await;
            }
        }

        Action::ActivateCard => {
            let account = state.accounts.get(chat_id.0).await.ok().flatten();
            if !account.is_some_and(|a| a.card_status == "inactive") {
                let _ = bot
                    .answer_callback_query(callback_id)
                    .text("The card is not ready for activation")
                    .show_alert(true)
                    .await;
                return Ok(());
            }
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot
                .edit_message_text(chat_id, message_id, "Create a 4-digit PIN")
                .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                    Action::Card,
                )]))
                .await;
            state.steps.register(chat_id.0, Step::CardPin { message_id });
        }

        Action::CardSettings => {
            let _ = bot.answer_callback_query(callback_id).await;
            views::card_settings(&bot, chat_id, Some(message_id)).await;
        }

        Action::CardBack => {
            let _ = bot.answer_callback_query(callback_id).await;
            views::card_display(&bot, &state, chat_id, Some(message_id)).await;
        }

        Action::DepositMenu => {
            let _ = bot.answer_callback_query(callback_id).await;
            views::deposit_menu(&bot, chat_id, Some(message_id)).await;
        }

        Action::DepositRates => {
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot
                .edit_message_text(
                    chat_id,
                    message_id,
                    "» Top-up rates «\n\n\
                     Stars » 2 🌟 = $1 | minimum $10\n\n\
                     Crypto » 1:1 | minimum $10",
                )
                .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                    Action::DepositMenu,
                )]))
                .await;
        }

        Action::DepositInput(rail) => {
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot
                .edit_message_text(
                    chat_id,
                    message_id,
                    "Enter the top-up amount in $ (minimum $10)",
                )
                .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                    Action::DepositMenu,
                )]))
                .await;
            state
                .steps
                .register(chat_id.0, Step::DepositAmount { rail, message_id });
        }

        Action::TransferMoney => {
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot
                .edit_message_text(chat_id, message_id, "Send: username amount")
                .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                    Action::CardSettings,
                )]))
                .await;
            state
                .steps
                .register(chat_id.0, Step::TransferDetails { message_id });
        }

        Action::ConfirmTransfer { to, amount } => {
            match state.ledger.transfer(chat_id.0, to, amount).await {
                Ok(()) => {
                    let sender = state
                        .accounts
                        .get(chat_id.0)
                        .await
                        .ok()
                        .flatten()
                        .and_then(|a| a.username)
                        .unwrap_or_else(|| chat_id.0.to_string());
                    let _ = bot
                        .send_message(
                            ChatId(to),
                            format!(
                                "💸 Incoming transfer\nFrom: @{sender}\nAmount: ${}",
                                views::usd(amount)
                            ),
                        )
                        .await;
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text("Transfer complete")
                        .await;
                    views::card_display(&bot, &state, chat_id, Some(message_id)).await;
                }
                Err(e) => {
                    let _ = bot
                        .answer_callback_query(callback_id)
                        .text(views::user_message(&e))
                        .show_alert(true)
                        .await;
                }
            }
        }

        Action::CardHistory => {
            let _ = bot.answer_callback_query(callback_id).await;
            let text = views::card_history_text(&state, chat_id.0).await;
            let _ = bot
                .edit_message_text(chat_id, message_id, text)
                .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                    Action::CardSettings,
                )]))
                .await;
        }

        Action::BlockCard => {
            let _ = bot.answer_callback_query(callback_id).await;
            let _ = bot
                .edit_message_text(
                    chat_id,
                    message_id,
                    "Confirm the card block. The remaining balance will be written off.",
                )
                .reply_markup(InlineKeyboardMarkup::new(vec![
                    vec![keyboards::button("Confirm ✅", Action::ConfirmBlockCard)],
                    keyboards::back_row(Action::CardSettings),
                ]))
                .await;
        }

        Action::ConfirmBlockCard => match state.accounts.block_card(chat_id.0).await {
            Ok(()) => {
                let _ = bot.answer_callback_query(callback_id).await;
                let _ = bot
                    .edit_message_text(chat_id, message_id, "Card blocked, balance written off.")
                    .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
                        Action::Profile,
                    )]))
                    .await;
            }
            Err(e) => {
                let _ = bot
                    .answer_callback_query(callback_id)
                    .text(views::user_message(&e))
                    .show_alert(true)
                    .await;
            }
        },
    }

    Ok(())
}

async fn prompt_check_input(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    check_id: i64,
    prompt: &str,
) {
    let _ = bot
        .edit_message_text(chat_id, message_id, prompt)
        .reply_markup(InlineKeyboardMarkup::new(vec![keyboards::back_row(
            Action::ShowCheck(check_id),
        )]))
        .await;
}

/// Create the intent (and, for the crypto rail, the gateway invoice) for a
/// subscription purchase, then show the pay/verify controls. Returns the
/// alert text on failure.
async fn start_subscription_purchase(
    bot: &Bot,
    state: &AppState,
    chat_id: ChatId,
    message_id: MessageId,
    rail: PaymentRail,
    tier: SubscriptionTier,
) -> Result<(), String> {
    let purpose = PaymentPurpose::Subscription(tier);
    let payload = purpose.to_payload_string(chat_id.0, rand::random::<u64>());

    match rail {
        PaymentRail::Stars => {
            let price = tier.price_stars() as i64;
            let intent = state
                .payments
                .create_intent(chat_id.0, purpose, rail, price, &payload, None)
                .await
                .map_err(|e| views::user_message(&e).to_string())?;
            let _ = bot
                .edit_message_text(
                    chat_id,
                    message_id,
                    format!(
                        "💸 Pay the invoice\n— Method: 🌟 Telegram Stars 🌟\n— Amount: {price} Stars"
                    ),
                )
                .reply_markup(InlineKeyboardMarkup::new(vec![
                    vec![
                        keyboards::button("Pay", Action::SendStarsInvoice(intent.id)),
                        keyboards::button("Verify", Action::CheckPayment(intent.id)),
                    ],
                    vec![keyboards::button("Cancel", Action::PayRail(rail))],
                ]))
                .await;
        }
        PaymentRail::CryptoPay => {
            let price = tier.price_usd_cents();
            // The gateway call runs first; nothing is persisted or locked
            // until it has succeeded.
            let created = state
                .gateway
                .create_invoice(
                    "USDT",
                    &views::usd(price),
                    &format!("Subscription {} for 1 month", tier.as_str()),
                    &payload,
                )
                .await
                .map_err(|e| {
                    views::user_message(&kassa_db::StoreError::Domain(e)).to_string()
                })?;
            let intent = state
                .payments
                .create_intent(
                    chat_id.0,
                    purpose,
                    rail,
                    price,
                    &payload,
                    Some(&created.invoice_id),
                )
                .await
                .map_err(|e| views::user_message(&e).to_string())?;
            let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();
            if let Ok(url) = created.pay_url.parse::<Url>() {
                rows.push(vec![InlineKeyboardButton::url("Pay", url)]);
            }
            rows.push(vec![keyboards::button(
                "Verify",
                Action::CheckPayment(intent.id),
            )]);
            rows.push(vec![keyboards::button("Cancel", Action::PayRail(rail))]);
            let _ = bot
                .edit_message_text(
                    chat_id,
                    message_id,
                    format!(
                        "💸 Pay the invoice\n— Method: 🌐 CryptoPay 🌐\n— Amount: {} USDT",
                        views::usd(price)
                    ),
                )
                .reply_markup(InlineKeyboardMarkup::new(rows))
                .await;
        }
    }
    Ok(())
}
