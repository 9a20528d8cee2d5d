use kassa_core::purpose::PaymentRail;
use kassa_core::queue::NumberKind;
use kassa_core::tier::SubscriptionTier;

/// Every inline-keyboard action the bot understands. Callback data is
/// decoded into this once, at the dispatch boundary; the handler matches it
/// exhaustively instead of string-prefix routing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    CheckSub,
    BackMain,
    AddNumberMenu,
    AddNumber(NumberKind),
    MyNumbers,
    MyQueue,
    MyWorking,
    MySuccessful,
    MyBlocked,
    QueueView,
    Profile,
    Rules,
    CreateCheckMenu,
    CreateCheck,
    ShowCheck(i64),
    AddDescription(i64),
    AddPassword(i64),
    AddImage(i64),
    AddChannelGate(i64),
    TogglePremium(i64),
    ShareCheck(i64),
    QrCheck(i64),
    DeleteCheck(i64),
    VerifyCheckSubs(i64),
    BuySub,
    PayRail(PaymentRail),
    SubSelect(PaymentRail, SubscriptionTier),
    SendStarsInvoice(i64),
    CheckPayment(i64),
    Referral,
    PayoutHistory,
    RequestsList,
    ViewRequest(i64),
    EditRequestAmount(i64),
    CloseRequest(i64),
    Withdraw,
    Card,
    ActivateCard,
    CardSettings,
    CardBack,
    DepositMenu,
    DepositRates,
    DepositInput(PaymentRail),
    TransferMoney,
    ConfirmTransfer { to: i64, amount: i64 },
    CardHistory,
    BlockCard,
    ConfirmBlockCard,
    Noop,
}

fn rail_token(rail: PaymentRail) -> &'static str {
    match rail {
        PaymentRail::Stars => "stars",
        PaymentRail::CryptoPay => "crypto",
    }
}

fn parse_rail(token: &str) -> Option<PaymentRail> {
    match token {
        "stars" => Some(PaymentRail::Stars),
        "crypto" => Some(PaymentRail::CryptoPay),
        _ => None,
    }
}

impl Action {
    pub fn encode(&self) -> String {
        match self {
            Action::CheckSub => "check_sub".into(),
            Action::BackMain => "back_main".into(),
            Action::AddNumberMenu => "add_number".into(),
            Action::AddNumber(kind) => format!("add_number_{}", kind.as_str()),
            Action::MyNumbers => "my_numbers".into(),
            Action::MyQueue => "my_queue".into(),
            Action::MyWorking => "my_working".into(),
            Action::MySuccessful => "my_successful".into(),
            Action::MyBlocked => "my_blocked".into(),
            Action::QueueView => "queue".into(),
            Action::Profile => "profile".into(),
            Action::Rules => "rules".into(),
            Action::CreateCheckMenu => "check_menu".into(),
            Action::CreateCheck => "check_new".into(),
            Action::ShowCheck(id) => format!("check_show_{id}"),
            Action::AddDescription(id) => format!("check_desc_{id}"),
            Action::AddPassword(id) => format!("check_pass_{id}"),
            Action::AddImage(id) => format!("check_image_{id}"),
            Action::AddChannelGate(id) => format!("check_subs_{id}"),
            Action::TogglePremium(id) => format!("check_premium_{id}"),
            Action::ShareCheck(id) => format!("check_share_{id}"),
            Action::QrCheck(id) => format!("check_qr_{id}"),
            Action::DeleteCheck(id) => format!("check_delete_{id}"),
            Action::VerifyCheckSubs(id) => format!("check_verify_{id}"),
            Action::BuySub => "buy_sub".into(),
            Action::PayRail(rail) => format!("pay_{}", rail_token(*rail)),
            Action::SubSelect(rail, tier) => {
                format!("sub_{}_{}", rail_token(*rail), tier.code())
            }
            Action::SendStarsInvoice(id) => format!("stars_inv_{id}"),
            Action::CheckPayment(id) => format!("pay_check_{id}"),
            Action::Referral => "referral".into(),
            Action::PayoutHistory => "payout_history".into(),
            Action::RequestsList => "requests_list".into(),
            Action::ViewRequest(id) => format!("request_view_{id}"),
            Action::EditRequestAmount(id) => format!("request_edit_{id}"),
            Action::CloseRequest(id) => format!("request_close_{id}"),
            Action::Withdraw => "withdraw".into(),
            Action::Card => "card".into(),
            Action::ActivateCard => "card_activate".into(),
            Action::CardSettings => "card_settings".into(),
            Action::CardBack => "card_back".into(),
            Action::DepositMenu => "deposit_menu".into(),
            Action::DepositRates => "deposit_rates".into(),
            Action::DepositInput(rail) => format!("deposit_{}", rail_token(*rail)),
            Action::TransferMoney => "transfer".into(),
            Action::ConfirmTransfer { to, amount } => format!("transfer_go_{to}_{amount}"),
            Action::CardHistory => "card_history".into(),
            Action::BlockCard => "card_block".into(),
            Action::ConfirmBlockCard => "card_block_go".into(),
            Action::Noop => "noop".into(),
        }
    }

    pub fn parse(data: &str) -> Option<Action> {
        let action = match data {
            "check_sub" => Action::CheckSub,
            "back_main" => Action::BackMain,
            "add_number" => Action::AddNumberMenu,
            "my_numbers" => Action::MyNumbers,
            "my_queue" => Action::MyQueue,
            "my_working" => Action::MyWorking,
            "my_successful" => Action::MySuccessful,
            "my_blocked" => Action::MyBlocked,
            "queue" => Action::QueueView,
            "profile" => Action::Profile,
            "rules" => Action::Rules,
            "check_menu" => Action::CreateCheckMenu,
            "check_new" => Action::CreateCheck,
            "buy_sub" => Action::BuySub,
            "referral" => Action::Referral,
            "payout_history" => Action::PayoutHistory,
            "requests_list" => Action::RequestsList,
            "withdraw" => Action::Withdraw,
            "card" => Action::Card,
            "card_activate" => Action::ActivateCard,
            "card_settings" => Action::CardSettings,
            "card_back" => Action::CardBack,
            "deposit_menu" => Action::DepositMenu,
            "deposit_rates" => Action::DepositRates,
            "transfer" => Action::TransferMoney,
            "card_history" => Action::CardHistory,
            "card_block" => Action::BlockCard,
            "card_block_go" => Action::ConfirmBlockCard,
            "noop" => Action::Noop,
            _ => return Action::parse_prefixed(data),
        };
        Some(action)
    }

    fn parse_prefixed(data: &str) -> Option<Action> {
        if let Some(kind) = data.strip_prefix("add_number_") {
            return NumberKind::parse(kind).map(Action::AddNumber);
        }
        if let Some(rest) = data.strip_prefix("check_") {
            if let Some(id) = id_after(rest, "show_") {
                return Some(Action::ShowCheck(id));
            }
            if let Some(id) = id_after(rest, "desc_") {
                return Some(Action::AddDescription(id));
            }
            if let Some(id) = id_after(rest, "pass_") {
                return Some(Action::AddPassword(id));
            }
            if let Some(id) = id_after(rest, "image_") {
                return Some(Action::AddImage(id));
            }
            if let Some(id) = id_after(rest, "subs_") {
                return Some(Action::AddChannelGate(id));
            }
            if let Some(id) = id_after(rest, "premium_") {
                return Some(Action::TogglePremium(id));
            }
            if let Some(id) = id_after(rest, "share_") {
                return Some(Action::ShareCheck(id));
            }
            if let Some(id) = id_after(rest, "qr_") {
                return Some(Action::QrCheck(id));
            }
            if let Some(id) = id_after(rest, "delete_") {
                return Some(Action::DeleteCheck(id));
            }
            if let Some(id) = id_after(rest, "verify_") {
                return Some(Action::VerifyCheckSubs(id));
            }
            return None;
        }
        if let Some(rail) = data.strip_prefix("pay_").and_then(parse_rail) {
            return Some(Action::PayRail(rail));
        }
        if let Some(rest) = data.strip_prefix("sub_") {
            let (rail, tier) = rest.split_once('_')?;
            return Some(Action::SubSelect(
                parse_rail(rail)?,
                SubscriptionTier::parse(tier)?,
            ));
        }
        if let Some(id) = id_after(data, "stars_inv_") {
            return Some(Action::SendStarsInvoice(id));
        }
        if let Some(id) = id_after(data, "pay_check_") {
            return Some(Action::CheckPayment(id));
        }
        if let Some(id) = id_after(data, "request_view_") {
            return Some(Action::ViewRequest(id));
        }
        if let Some(id) = id_after(data, "request_edit_") {
            return Some(Action::EditRequestAmount(id));
        }
        if let Some(id) = id_after(data, "request_close_") {
            return Some(Action::CloseRequest(id));
        }
        if let Some(rail) = data.strip_prefix("deposit_").and_then(parse_rail) {
            return Some(Action::DepositInput(rail));
        }
        if let Some(rest) = data.strip_prefix("transfer_go_") {
            let (to, amount) = rest.split_once('_')?;
            return Some(Action::ConfirmTransfer {
                to: to.parse().ok()?,
                amount: amount.parse().ok()?,
            });
        }
        None
    }
}

fn id_after(data: &str, prefix: &str) -> Option<i64> {
    data.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_action_round_trips_through_its_encoding() {
        let actions = [
            Action::CheckSub,
            Action::AddNumber(NumberKind::Max),
            Action::ShowCheck(17),
            Action::AddChannelGate(3),
            Action::VerifyCheckSubs(9),
            Action::PayRail(PaymentRail::CryptoPay),
            Action::SubSelect(PaymentRail::Stars, SubscriptionTier::VipNexus),
            Action::SendStarsInvoice(5),
            Action::CheckPayment(12),
            Action::ViewRequest(2),
            Action::DepositInput(PaymentRail::Stars),
            Action::ConfirmTransfer { to: 42, amount: 150 },
            Action::ConfirmBlockCard,
        ];
        for action in actions {
            assert_eq!(Action::parse(&action.encode()), Some(action));
        }
    }

    #[test]
    fn unknown_data_is_rejected() {
        assert_eq!(Action::parse("definitely_not_a_thing"), None);
        assert_eq!(Action::parse("check_show_abc"), None);
        assert_eq!(Action::parse("sub_stars_diamond"), None);
        assert_eq!(Action::parse("transfer_go_42"), None);
    }
}
