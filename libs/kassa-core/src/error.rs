use thiserror::Error;

/// Everything a user-facing flow can fail with. Handlers translate these
/// into chat messages or callback alerts; none of them are fatal.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DomainError {
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("invalid amount")]
    InvalidAmount,
    #[error("cannot transfer to yourself")]
    SelfTransfer,
    #[error("check already redeemed")]
    AlreadyRedeemed,
    #[error("Telegram Premium required")]
    PremiumRequired,
    #[error("channel subscription required")]
    MembershipRequired,
    #[error("wrong password")]
    WrongPassword,
    #[error("check not found")]
    VoucherNotFound,
    #[error("account not found")]
    AccountNotFound,
    #[error("phone number already queued")]
    DuplicatePhoneNumber,
    #[error("payment gateway unavailable: {0}")]
    GatewayUnavailable(String),
    #[error("payment already reconciled")]
    AlreadyReconciled,
}
