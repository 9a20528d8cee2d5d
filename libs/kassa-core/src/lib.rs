pub mod error;
pub mod purpose;
pub mod queue;
pub mod steps;
pub mod tier;
pub mod voucher;

pub use error::DomainError;
