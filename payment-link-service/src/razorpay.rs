use common_crypto::SecretString;
use common_observability::LinkMetrics;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RazorpayCredentials;
use crate::gateway::{
    CreateLinkRequest, GatewayError, GatewayLink, GatewayPayment, GatewaySettlement,
    GatewayVirtualAccount, PaymentGateway, ReconItem, SettlementQuery, VirtualAccountRequest,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

/// REST client for the Razorpay v1 API using basic auth.
#[derive(Clone)]
pub struct RazorpayClient {
    http: Client,
    base_url: String,
    key_id: String,
    key_secret: SecretString,
    metrics: LinkMetrics,
}

impl RazorpayClient {
    pub fn new(http: Client, base_url: &str, credentials: &RazorpayCredentials, metrics: LinkMetrics) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            key_id: credentials.key_id.clone(),
            key_secret: credentials.key_secret.clone(),
            metrics,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(&self, operation: &'static str, req: RequestBuilder) -> Result<T, GatewayError> {
        let result = req
            .basic_auth(&self.key_id, Some(self.key_secret.expose()))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await;
        let response = match result {
            Ok(resp) => resp,
            Err(err) => {
                self.record(operation, "transport_error");
                warn!(operation, error = %err, "Razorpay request failed");
                return Err(err.into());
            }
        };
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            self.record(operation, "rejected");
            let (code, description) = match serde_json::from_slice::<ErrorEnvelope>(&body) {
                Ok(env) => (
                    env.error.code.unwrap_or_else(|| "UNKNOWN".to_string()),
                    env.error.description.unwrap_or_default(),
                ),
                Err(_) => ("UNKNOWN".to_string(), String::from_utf8_lossy(&body).chars().take(200).collect()),
            };
            warn!(operation, status = status.as_u16(), code = %code, description = %description, "Razorpay rejected request");
            return Err(GatewayError::Api { status: status.as_u16(), code, description });
        }
        self.record(operation, "ok");
        debug!(operation, "Razorpay request succeeded");
        serde_json::from_slice(&body).map_err(|e| GatewayError::Decode(format!("{operation}: {e}")))
    }

    fn record(&self, operation: &str, outcome: &str) {
        self.metrics
            .gateway_requests_total
            .with_label_values(&[operation, outcome])
            .inc();
    }
}

#[async_trait::async_trait]
impl PaymentGateway for RazorpayClient {
    async fn create_payment_link(&self, req: &CreateLinkRequest) -> Result<GatewayLink, GatewayError> {
        let builder = self.http.post(self.url("/payment_links")).json(req);
        self.send("create_payment_link", builder).await
    }

    async fn fetch_payment_link(&self, link_id: &str) -> Result<GatewayLink, GatewayError> {
        let builder = self.http.get(self.url(&format!("/payment_links/{link_id}")));
        self.send("fetch_payment_link", builder).await
    }

    async fn cancel_payment_link(&self, link_id: &str) -> Result<GatewayLink, GatewayError> {
        let builder = self.http.post(self.url(&format!("/payment_links/{link_id}/cancel")));
        self.send("cancel_payment_link", builder).await
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        let builder = self.http.get(self.url(&format!("/payments/{payment_id}")));
        self.send("fetch_payment", builder).await
    }

    async fn fetch_settlement(&self, settlement_id: &str) -> Result<GatewaySettlement, GatewayError> {
        let builder = self.http.get(self.url(&format!("/settlements/{settlement_id}")));
        self.send("fetch_settlement", builder).await
    }

    async fn list_settlements(&self, query: &SettlementQuery) -> Result<Vec<GatewaySettlement>, GatewayError> {
        let builder = self.http.get(self.url("/settlements")).query(query);
        let page: Collection<GatewaySettlement> = self.send("list_settlements", builder).await?;
        Ok(page.items)
    }

    async fn settlement_recon(&self, year: i32, month: u32, day: Option<u32>) -> Result<Vec<ReconItem>, GatewayError> {
        let mut params = vec![("year", year.to_string()), ("month", month.to_string())];
        if let Some(day) = day {
            params.push(("day", day.to_string()));
        }
        let builder = self.http.get(self.url("/settlements/recon/combined")).query(&params);
        let page: Collection<ReconItem> = self.send("settlement_recon", builder).await?;
        Ok(page.items)
    }

    async fn create_virtual_account(&self, req: &VirtualAccountRequest) -> Result<GatewayVirtualAccount, GatewayError> {
        let builder = self.http.post(self.url("/virtual_accounts")).json(req);
        self.send("create_virtual_account", builder).await
    }
}
