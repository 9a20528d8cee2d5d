use kassa_core::purpose::PaymentRail;
use kassa_core::queue::NumberKind;
use kassa_core::tier::SubscriptionTier;
use kassa_core::voucher::ChannelGate;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::bot::actions::Action;
use kassa_db::models::voucher::Voucher;

pub fn button(label: impl Into<String>, action: Action) -> InlineKeyboardButton {
    InlineKeyboardButton::callback(label.into(), action.encode())
}

pub fn back_row(action: Action) -> Vec<InlineKeyboardButton> {
    vec![button("Back 🔙", action)]
}

pub fn main_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("Add number 🚀", Action::AddNumberMenu),
            button("My numbers 📱", Action::MyNumbers),
        ],
        vec![button("Queue 🔄", Action::QueueView)],
        vec![button("My profile 👤", Action::Profile)],
    ])
}

pub fn number_kinds() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("max 🖥", Action::AddNumber(NumberKind::Max)),
            button("vc 💻", Action::AddNumber(NumberKind::Vc)),
        ],
        back_row(Action::BackMain),
    ])
}

pub fn my_numbers() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("In work ⚙️", Action::MyWorking),
            button("Waiting ⏳", Action::MyQueue),
        ],
        vec![
            button("Successful ✅", Action::MySuccessful),
            button("Blocked 🛑", Action::MyBlocked),
        ],
        back_row(Action::BackMain),
    ])
}

pub fn profile() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("Buy subscription 💳", Action::BuySub),
            button("Referral program 🔗", Action::Referral),
        ],
        vec![
            button("Card 💳", Action::Card),
            button("Rules 📜", Action::Rules),
        ],
        vec![button("Create check 🧾", Action::CreateCheckMenu)],
        back_row(Action::BackMain),
    ])
}

pub fn pay_rails() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("🌟 Telegram Stars 🌟", Action::PayRail(PaymentRail::Stars)),
            button("🌐 CryptoPay 🌐", Action::PayRail(PaymentRail::CryptoPay)),
        ],
        back_row(Action::Profile),
    ])
}

pub fn tier_list(rail: PaymentRail) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = SubscriptionTier::ALL
        .into_iter()
        .map(|tier| vec![button(tier.as_str(), Action::SubSelect(rail, tier))])
        .collect();
    rows.push(back_row(Action::BuySub));
    InlineKeyboardMarkup::new(rows)
}

pub fn check_options(voucher: &Voucher) -> InlineKeyboardMarkup {
    let id = voucher.id;
    let subs_state = if voucher.channel_gates().is_empty() {
        "off"
    } else {
        "on"
    };
    let premium_state = if voucher.premium_only { "on" } else { "off" };
    InlineKeyboardMarkup::new(vec![
        vec![button("📝 Add description", Action::AddDescription(id))],
        vec![button("🔑 Add password", Action::AddPassword(id))],
        vec![button("🖼 Add image", Action::AddImage(id))],
        vec![button(
            format!("📢 Subscription gate: {subs_state}"),
            Action::AddChannelGate(id),
        )],
        vec![button(
            format!("⭐ Telegram Premium only: {premium_state}"),
            Action::TogglePremium(id),
        )],
        vec![
            button("📤 Share", Action::ShareCheck(id)),
            button("🔲 QR code", Action::QrCheck(id)),
        ],
        vec![button("🗑 Delete check", Action::DeleteCheck(id))],
        back_row(Action::CreateCheckMenu),
    ])
}

/// Join buttons for each gated channel plus the verification trigger.
pub fn redeem_gate(check_id: i64, gates: &[ChannelGate]) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = gates
        .iter()
        .filter_map(|gate| {
            gate.url
                .parse()
                .ok()
                .map(|url| vec![InlineKeyboardButton::url(gate.name.clone(), url)])
        })
        .collect();
    rows.push(vec![button(
        "Verify subscription 🔍",
        Action::VerifyCheckSubs(check_id),
    )]);
    InlineKeyboardMarkup::new(rows)
}

pub fn card_settings() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![button("History 📜", Action::CardHistory)],
        vec![button("Top up 💰", Action::DepositMenu)],
        vec![
            button("Transfer 💸", Action::TransferMoney),
            button("Block card 🛑", Action::BlockCard),
        ],
        back_row(Action::CardBack),
    ])
}

pub fn deposit_menu() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("⭐ Telegram Stars", Action::DepositInput(PaymentRail::Stars)),
            button("🌐 CryptoPay", Action::DepositInput(PaymentRail::CryptoPay)),
        ],
        vec![button("📊 Rates", Action::DepositRates)],
        back_row(Action::CardSettings),
    ])
}

pub fn referral() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![
            button("New request 💸", Action::Withdraw),
            button("My requests 📋", Action::RequestsList),
        ],
        vec![button("Payout history 💾", Action::PayoutHistory)],
        back_row(Action::Profile),
    ])
}
