use std::sync::Arc;

use kassa_core::steps::PendingSteps;
use kassa_db::services::{
    AccountService, LedgerService, PaymentService, QueueService, VoucherService,
};

use crate::bot::steps::Step;
use crate::gateway::PaymentGateway;

#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub ledger: LedgerService,
    pub vouchers: VoucherService,
    pub payments: PaymentService,
    pub queue: QueueService,
    pub gateway: Arc<dyn PaymentGateway>,
    pub steps: Arc<PendingSteps<Step>>,
    pub required_channels: Arc<Vec<String>>,
}
