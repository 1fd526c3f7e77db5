pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of a refund call against the payment gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundReceipt {
    pub reference: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Refunds `amount` against a completed transaction, with `gateway_fee`
    /// reported for reconciliation. An Err aborts the whole cancellation.
    async fn refund(
        &self,
        transaction_id: &str,
        amount: f64,
        gateway_fee: f64,
    ) -> anyhow::Result<RefundReceipt>;
}
