use teloxide::prelude::*;
use teloxide::types::{ChatId, Recipient, UserId};

/// Resolve a configured channel reference (numeric id or @handle) into a
/// recipient for the membership lookup.
fn channel_recipient(channel: &str) -> Recipient {
    match channel.parse::<i64>() {
        Ok(id) => Recipient::Id(ChatId(id)),
        Err(_) => {
            Recipient::ChannelUsername(format!("@{}", channel.trim_start_matches('@')))
        }
    }
}

/// Check one channel membership; any lookup failure counts as "not a
/// member".
pub async fn is_member(bot: &Bot, channel: &str, user_id: UserId) -> bool {
    match bot.get_chat_member(channel_recipient(channel), user_id).await {
        Ok(member) => member.kind.is_present(),
        Err(e) => {
            tracing::warn!("Membership check for {} failed: {}", channel, e);
            false
        }
    }
}

/// True only when every channel reports membership.
pub async fn all_members(bot: &Bot, channels: &[String], user_id: UserId) -> bool {
    for channel in channels {
        if !is_member(bot, channel, user_id).await {
            return false;
        }
    }
    true
}
