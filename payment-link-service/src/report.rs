use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::app_state::AppState;
use crate::error::ServiceError;
use crate::gateway::LinkStatus;
use crate::store::SalesDocument;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LinkStatusRow {
    pub doctype: &'static str,
    pub name: String,
    pub customer: String,
    pub grand_total: BigDecimal,
    pub currency: String,
    pub payment_link: Option<String>,
    pub payment_url: Option<String>,
    pub status: Option<&'static str>,
    pub link_expiry: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl From<SalesDocument> for LinkStatusRow {
    fn from(doc: SalesDocument) -> Self {
        Self {
            doctype: doc.kind.as_str(),
            customer: doc.display_customer().to_string(),
            status: doc.payment_status.map(|s| s.label()),
            name: doc.name,
            grand_total: doc.grand_total,
            currency: doc.currency,
            payment_link: doc.payment_link,
            payment_url: doc.payment_url,
            link_expiry: doc.link_expiry,
            updated_at: doc.updated_at,
        }
    }
}

/// Documents carrying payment links, newest first. `status` accepts either
/// `partially_paid` or `Partially Paid`.
pub async fn payment_link_status(state: &AppState, status: Option<&str>) -> Result<Vec<LinkStatusRow>, ServiceError> {
    let filter = match status.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(
            LinkStatus::from_str(raw)
                .ok_or_else(|| ServiceError::invalid("invalid_status", format!("unknown payment link status {raw}")))?,
        ),
        None => None,
    };
    let docs = state.store.list_linked_documents(filter).await?;
    Ok(docs.into_iter().map(LinkStatusRow::from).collect())
}
