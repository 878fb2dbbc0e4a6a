use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gateway::LinkStatus;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt {table} record {key}: {detail}")]
    Corrupt { table: &'static str, key: String, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentKind {
    Quotation,
    #[serde(rename = "Sales Order")]
    SalesOrder,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Quotation, DocumentKind::SalesOrder];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "Quotation",
            DocumentKind::SalesOrder => "Sales Order",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim() {
            "Quotation" => Some(DocumentKind::Quotation),
            "Sales Order" => Some(DocumentKind::SalesOrder),
            _ => None,
        }
    }

    /// URL path segment (`quotation`, `sales-order`), also used in ERP desk links.
    pub fn slug(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "quotation",
            DocumentKind::SalesOrder => "sales-order",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        match slug {
            "quotation" => Some(DocumentKind::Quotation),
            "sales-order" => Some(DocumentKind::SalesOrder),
            _ => None,
        }
    }

    /// Key under which the document name is recorded in gateway notes.
    pub fn note_key(&self) -> &'static str {
        match self {
            DocumentKind::Quotation => "quotation_id",
            DocumentKind::SalesOrder => "sales_order_id",
        }
    }
}

fn default_currency() -> String {
    "INR".to_string()
}

/// A submitted quotation or sales order plus the payment link fields the
/// service writes back onto it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SalesDocument {
    pub kind: DocumentKind,
    pub name: String,
    pub customer: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_mobile: Option<String>,
    pub grand_total: BigDecimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub valid_till: Option<NaiveDate>,
    #[serde(default)]
    pub amended_from: Option<String>,
    #[serde(default)]
    pub payment_link: Option<String>,
    #[serde(default)]
    pub payment_url: Option<String>,
    #[serde(default)]
    pub link_expiry: Option<DateTime<Utc>>,
    #[serde(default)]
    pub payment_status: Option<LinkStatus>,
    #[serde(default)]
    pub gateway_payment_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl SalesDocument {
    pub fn display_customer(&self) -> &str {
        self.customer_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.customer)
    }

    /// Keep link fields already recorded when an incoming copy of the
    /// document does not carry them.
    pub fn carry_link_fields(&mut self, stored: &SalesDocument) {
        if self.payment_link.is_none() {
            self.payment_link = stored.payment_link.clone();
            self.payment_url = stored.payment_url.clone();
            self.link_expiry = stored.link_expiry;
        }
        if self.payment_status.is_none() {
            self.payment_status = stored.payment_status;
        }
        if self.gateway_payment_id.is_none() {
            self.gateway_payment_id = stored.gateway_payment_id.clone();
        }
    }
}

/// Derived from amounts rather than reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentProgress {
    Pending,
    PartiallyPaid,
    Paid,
}

impl PaymentProgress {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentProgress::Pending => "pending",
            PaymentProgress::PartiallyPaid => "partially_paid",
            PaymentProgress::Paid => "paid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentProgress::Pending),
            "partially_paid" => Some(PaymentProgress::PartiallyPaid),
            "paid" => Some(PaymentProgress::Paid),
            _ => None,
        }
    }

    pub fn from_amounts(amount: &BigDecimal, paid: &BigDecimal) -> Self {
        let zero = BigDecimal::from(0);
        if *paid > zero && paid >= amount {
            PaymentProgress::Paid
        } else if *paid > zero {
            PaymentProgress::PartiallyPaid
        } else {
            PaymentProgress::Pending
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentLink {
    pub id: String,
    pub short_url: String,
    pub status: LinkStatus,
    pub progress: PaymentProgress,
    pub amount: BigDecimal,
    pub amount_paid: BigDecimal,
    pub remaining_amount: BigDecimal,
    pub currency: String,
    pub expire_by: Option<DateTime<Utc>>,
    pub reference_kind: DocumentKind,
    pub reference_name: String,
    pub customer: String,
    pub gateway_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentDetail {
    pub payment_id: String,
    pub link_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub method: Option<String>,
    pub customer: String,
    pub reference_kind: DocumentKind,
    pub reference_name: String,
    pub created_at: DateTime<Utc>,
}

/// Ledger receipt booked against a gateway payment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentEntry {
    pub name: String,
    pub reference_no: String,
    pub party: String,
    pub paid_amount: BigDecimal,
    pub currency: String,
    pub posting_date: NaiveDate,
    pub reference_kind: Option<DocumentKind>,
    pub reference_name: Option<String>,
    pub mode_of_payment: String,
    pub submitted: bool,
    pub settlement_payment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconciliationStatus {
    Pending,
    PartiallyReconciled,
    Reconciled,
}

impl ReconciliationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconciliationStatus::Pending => "pending",
            ReconciliationStatus::PartiallyReconciled => "partially_reconciled",
            ReconciliationStatus::Reconciled => "reconciled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReconciliationStatus::Pending),
            "partially_reconciled" => Some(ReconciliationStatus::PartiallyReconciled),
            "reconciled" => Some(ReconciliationStatus::Reconciled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settlement {
    pub settlement_id: String,
    pub amount: BigDecimal,
    pub fees: BigDecimal,
    pub tax: BigDecimal,
    pub currency: String,
    pub status: String,
    pub utr: Option<String>,
    pub created_at: DateTime<Utc>,
    pub reconciliation_status: ReconciliationStatus,
    pub reconciled_at: Option<DateTime<Utc>>,
    pub reconciled_by: Option<String>,
}

/// A payment (or other entity) that was paid out in a settlement.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SettlementPaymentEntry {
    pub entity_id: String,
    pub settlement_id: Option<String>,
    pub entity_type: String,
    pub amount: BigDecimal,
    pub fee: BigDecimal,
    pub tax: BigDecimal,
    pub currency: String,
    pub method: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub contact: Option<String>,
    pub quotation: Option<String>,
    pub customer: Option<String>,
    pub reconciliation_status: ReconciliationStatus,
    pub payment_entry: Option<String>,
    pub reconciled_at: Option<DateTime<Utc>>,
    pub reconciled_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub name: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub gateway_customer_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VirtualAccount {
    pub id: String,
    pub gateway_id: String,
    pub customer: String,
    pub customer_gateway_id: String,
    pub description: String,
    pub amount_expected: Option<BigDecimal>,
    pub status: String,
    pub receivers: serde_json::Value,
    pub close_by: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Persistence for documents, links and the settlement ledger.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    async fn upsert_document(&self, doc: &SalesDocument) -> Result<(), StoreError>;
    async fn get_document(&self, kind: DocumentKind, name: &str) -> Result<Option<SalesDocument>, StoreError>;
    async fn find_document_by_url(&self, short_url: &str) -> Result<Option<SalesDocument>, StoreError>;
    /// Documents carrying a payment link, most recently updated first.
    async fn list_linked_documents(&self, status: Option<LinkStatus>) -> Result<Vec<SalesDocument>, StoreError>;

    async fn upsert_payment_link(&self, link: &PaymentLink) -> Result<(), StoreError>;
    async fn get_payment_link(&self, id: &str) -> Result<Option<PaymentLink>, StoreError>;
    async fn list_payment_links(&self) -> Result<Vec<PaymentLink>, StoreError>;

    async fn upsert_payment_detail(&self, detail: &PaymentDetail) -> Result<(), StoreError>;
    async fn list_payment_details(&self, link_id: &str) -> Result<Vec<PaymentDetail>, StoreError>;

    async fn upsert_payment_entry(&self, entry: &PaymentEntry) -> Result<(), StoreError>;
    async fn list_payment_entries(&self, reference_no: &str) -> Result<Vec<PaymentEntry>, StoreError>;

    async fn upsert_settlement(&self, settlement: &Settlement) -> Result<(), StoreError>;
    async fn get_settlement(&self, id: &str) -> Result<Option<Settlement>, StoreError>;
    async fn list_settlements(&self) -> Result<Vec<Settlement>, StoreError>;

    async fn upsert_settlement_payment(&self, entry: &SettlementPaymentEntry) -> Result<(), StoreError>;
    async fn get_settlement_payment(&self, entity_id: &str) -> Result<Option<SettlementPaymentEntry>, StoreError>;
    async fn list_settlement_payments(&self, settlement_id: &str) -> Result<Vec<SettlementPaymentEntry>, StoreError>;

    async fn upsert_customer(&self, customer: &Customer) -> Result<(), StoreError>;
    async fn get_customer(&self, name: &str) -> Result<Option<Customer>, StoreError>;

    async fn insert_virtual_account(&self, account: &VirtualAccount) -> Result<(), StoreError>;

    /// Records a webhook event id. Returns false when it was already recorded.
    async fn record_webhook_event(&self, event_id: &str, event: &str) -> Result<bool, StoreError>;
    async fn release_webhook_event(&self, event_id: &str) -> Result<(), StoreError>;
}
