use async_trait::async_trait;
use kassa_core::DomainError;
use serde::Deserialize;

/// A freshly created invoice at the external gateway.
#[derive(Debug, Clone)]
pub struct CreatedInvoice {
    pub invoice_id: String,
    pub pay_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Other(String),
}

/// External crypto-invoice service. Creation and status checks may block on
/// the network; callers must never hold a ledger transaction across them.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_invoice(
        &self,
        asset: &str,
        amount: &str,
        description: &str,
        payload: &str,
    ) -> Result<CreatedInvoice, DomainError>;

    async fn invoice_status(&self, invoice_id: &str) -> Result<InvoiceStatus, DomainError>;
}

#[derive(Clone)]
pub struct CryptoPayClient {
    http: reqwest::Client,
    token: String,
    base: String,
}

#[derive(Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct CreatedInvoiceDto {
    invoice_id: i64,
    pay_url: String,
}

#[derive(Deserialize)]
struct InvoiceListDto {
    items: Vec<InvoiceItemDto>,
}

#[derive(Deserialize)]
struct InvoiceItemDto {
    status: String,
}

impl CryptoPayClient {
    pub fn new(token: String, base: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
            base,
        }
    }
}

fn unavailable(err: impl ToString) -> DomainError {
    DomainError::GatewayUnavailable(err.to_string())
}

#[async_trait]
impl PaymentGateway for CryptoPayClient {
    async fn create_invoice(
        &self,
        asset: &str,
        amount: &str,
        description: &str,
        payload: &str,
    ) -> Result<CreatedInvoice, DomainError> {
        let resp = self
            .http
            .post(format!("{}/createInvoice", self.base))
            .header("Crypto-Pay-API-Token", &self.token)
            .json(&serde_json::json!({
                "asset": asset,
                "amount": amount,
                "description": description,
                "payload": payload,
            }))
            .send()
            .await
            .map_err(unavailable)?;

        let body: ApiEnvelope<CreatedInvoiceDto> = resp.json().await.map_err(unavailable)?;
        if !body.ok {
            tracing::error!("createInvoice failed: {:?}", body.error);
            return Err(unavailable(format!("{:?}", body.error)));
        }
        let invoice = body.result.ok_or_else(|| unavailable("empty result"))?;
        Ok(CreatedInvoice {
            invoice_id: invoice.invoice_id.to_string(),
            pay_url: invoice.pay_url,
        })
    }

    async fn invoice_status(&self, invoice_id: &str) -> Result<InvoiceStatus, DomainError> {
        let resp = self
            .http
            .get(format!(
                "{}/getInvoices?invoice_ids={}",
                self.base, invoice_id
            ))
            .header("Crypto-Pay-API-Token", &self.token)
            .send()
            .await
            .map_err(unavailable)?;

        let body: ApiEnvelope<InvoiceListDto> = resp.json().await.map_err(unavailable)?;
        if !body.ok {
            tracing::error!("getInvoices failed: {:?}", body.error);
            return Err(unavailable(format!("{:?}", body.error)));
        }
        let items = body.result.ok_or_else(|| unavailable("empty result"))?;
        let Some(item) = items.items.first() else {
            return Err(unavailable("invoice not found"));
        };
        Ok(match item.status.as_str() {
            "paid" => InvoiceStatus::Paid,
            "active" => InvoiceStatus::Pending,
            other => InvoiceStatus::Other(other.to_string()),
        })
    }
}
