use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;

use super::{PaymentGateway, RefundReceipt};

pub struct HttpPaymentGateway {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpPaymentGateway {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            // Bounded so a hung gateway cannot stall a cancellation forever.
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
        }
    }
}

#[derive(serde::Deserialize)]
struct RefundResponse {
    success: bool,
    reference: Option<String>,
    error: Option<String>,
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn refund(
        &self,
        transaction_id: &str,
        amount: f64,
        gateway_fee: f64,
    ) -> anyhow::Result<RefundReceipt> {
        let url = format!("{}/v1/refunds", self.base_url);

        let response: RefundResponse = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "transaction_id": transaction_id,
                "amount": amount,
                "gateway_fee": gateway_fee,
            }))
            .send()
            .await
            .context("failed to reach payment gateway")?
            .error_for_status()
            .context("payment gateway returned error")?
            .json()
            .await
            .context("invalid payment gateway response")?;

        if !response.success {
            anyhow::bail!(
                "gateway rejected refund: {}",
                response.error.unwrap_or_else(|| "unknown error".to_string())
            );
        }

        Ok(RefundReceipt {
            reference: response.reference.unwrap_or_default(),
        })
    }
}
