use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway rejected request ({status}): {code}: {description}")]
    Api { status: u16, code: String, description: String },
    #[error("gateway transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected gateway response: {0}")]
    Decode(String),
}

/// Payment link states as the gateway reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    Created,
    PartiallyPaid,
    Expired,
    Cancelled,
    Paid,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Created => "created",
            LinkStatus::PartiallyPaid => "partially_paid",
            LinkStatus::Expired => "expired",
            LinkStatus::Cancelled => "cancelled",
            LinkStatus::Paid => "paid",
        }
    }

    /// Title-cased form shown on documents and in chat messages.
    pub fn label(&self) -> &'static str {
        match self {
            LinkStatus::Created => "Created",
            LinkStatus::PartiallyPaid => "Partially Paid",
            LinkStatus::Expired => "Expired",
            LinkStatus::Cancelled => "Cancelled",
            LinkStatus::Paid => "Paid",
        }
    }

    /// Accepts both the wire form (`partially_paid`) and the label (`Partially Paid`).
    pub fn from_str(s: &str) -> Option<Self> {
        let norm = s.trim().to_ascii_lowercase().replace(' ', "_");
        match norm.as_str() {
            "created" => Some(LinkStatus::Created),
            "partially_paid" => Some(LinkStatus::PartiallyPaid),
            "expired" => Some(LinkStatus::Expired),
            "cancelled" => Some(LinkStatus::Cancelled),
            "paid" => Some(LinkStatus::Paid),
            _ => None,
        }
    }

    /// A link that can still collect money.
    pub fn is_active(&self) -> bool {
        matches!(self, LinkStatus::Created | LinkStatus::PartiallyPaid)
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct LinkCustomer {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LinkNotify {
    pub sms: bool,
    pub email: bool,
}

/// Body of `POST /payment_links`. Amounts are in minor units.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CreateLinkRequest {
    pub amount: i64,
    pub currency: String,
    pub accept_partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_min_partial_amount: Option<i64>,
    pub description: String,
    pub reference_id: String,
    pub customer: LinkCustomer,
    pub notify: LinkNotify,
    pub reminder_enable: bool,
    pub notes: BTreeMap<String, String>,
    pub expire_by: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_method: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub upi_link: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinkPaymentRef {
    pub payment_id: String,
    pub amount: i64,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub plink_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayLink {
    pub id: String,
    pub short_url: String,
    pub status: LinkStatus,
    pub amount: i64,
    #[serde(default)]
    pub amount_paid: i64,
    pub currency: String,
    #[serde(default)]
    pub expire_by: Option<i64>,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub payments: Option<Vec<LinkPaymentRef>>,
    #[serde(default)]
    pub notes: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<i64>,
}

impl GatewayLink {
    pub fn payment_refs(&self) -> &[LinkPaymentRef] {
        self.payments.as_deref().unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayPayment {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fee: Option<i64>,
    #[serde(default)]
    pub tax: Option<i64>,
    #[serde(default)]
    pub notes: serde_json::Value,
    pub created_at: i64,
}

fn default_currency() -> String {
    "INR".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewaySettlement {
    pub id: String,
    pub amount: i64,
    pub status: String,
    #[serde(default)]
    pub fees: i64,
    #[serde(default)]
    pub tax: i64,
    #[serde(default)]
    pub utr: Option<String>,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SettlementQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u32>,
}

/// One line of the combined settlement reconciliation report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReconItem {
    pub entity_id: String,
    #[serde(rename = "type")]
    pub entity_type: String,
    pub amount: i64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub fee: i64,
    #[serde(default)]
    pub tax: i64,
    #[serde(default)]
    pub settlement_id: Option<String>,
    #[serde(default)]
    pub settlement_utr: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub notes: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VirtualAccountReceivers {
    pub types: Vec<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VirtualAccountRequest {
    pub receivers: VirtualAccountReceivers,
    pub description: String,
    pub customer_id: String,
    pub notes: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_expected: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_by: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatewayVirtualAccount {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount_expected: Option<i64>,
    #[serde(default)]
    pub receivers: serde_json::Value,
    #[serde(default)]
    pub close_by: Option<i64>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

/// String value of a gateway `notes` entry. Notes come back as an object, or
/// as an empty array when none were set.
pub fn note(notes: &serde_json::Value, key: &str) -> Option<String> {
    match notes.get(key)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_link(&self, req: &CreateLinkRequest) -> Result<GatewayLink, GatewayError>;
    async fn fetch_payment_link(&self, link_id: &str) -> Result<GatewayLink, GatewayError>;
    async fn cancel_payment_link(&self, link_id: &str) -> Result<GatewayLink, GatewayError>;
    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError>;
    async fn fetch_settlement(&self, settlement_id: &str) -> Result<GatewaySettlement, GatewayError>;
    async fn list_settlements(&self, query: &SettlementQuery) -> Result<Vec<GatewaySettlement>, GatewayError>;
    async fn settlement_recon(&self, year: i32, month: u32, day: Option<u32>) -> Result<Vec<ReconItem>, GatewayError>;
    async fn create_virtual_account(&self, req: &VirtualAccountRequest) -> Result<GatewayVirtualAccount, GatewayError>;
}
