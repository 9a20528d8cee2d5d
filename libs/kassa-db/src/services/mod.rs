pub mod accounts;
pub mod ledger;
pub mod payments;
pub mod queue;
pub mod vouchers;

pub use accounts::AccountService;
pub use ledger::LedgerService;
pub use payments::{PaidEffect, PaymentService};
pub use queue::QueueService;
pub use vouchers::VoucherService;
