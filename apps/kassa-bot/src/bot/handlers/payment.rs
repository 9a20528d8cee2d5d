use kassa_db::services::PaidEffect;
use teloxide::prelude::*;
use teloxide::types::PreCheckoutQuery;

use crate::bot::views;

pub async fn pre_checkout_handler(
    bot: Bot,
    q: PreCheckoutQuery,
) -> Result<(), teloxide::RequestError> {
    bot.answer_pre_checkout_query(q.id, true).await?;
    Ok(())
}

pub fn effect_message(effect: &PaidEffect) -> String {
    match effect {
        PaidEffect::Subscription(tier) => {
            format!("✅ Subscription {} activated for 30 days.", tier.as_str())
        }
        PaidEffect::Deposit { credited } => {
            format!("✅ Card topped up by ${}!", views::usd(*credited))
        }
    }
}
