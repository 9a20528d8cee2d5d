pub mod account;
pub mod ledger;
pub mod payment;
pub mod queue;
pub mod voucher;
