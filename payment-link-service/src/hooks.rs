use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::cliq::{templates, CliqChannel, CliqMessage};
use crate::error::ServiceError;
use crate::links::{self, LinkOptions};
use crate::store::{Customer, PaymentLink, SalesDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookResult {
    Created,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct HookOutcome {
    pub result: HookResult,
    pub document: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<PaymentLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HookOutcome {
    fn skipped(doc: &SalesDocument) -> Self {
        Self { result: HookResult::Skipped, document: doc.name.clone(), link: None, error: None }
    }
}

async fn store_incoming(state: &AppState, mut doc: SalesDocument) -> Result<SalesDocument, ServiceError> {
    if let Some(stored) = state.store.get_document(doc.kind, &doc.name).await? {
        doc.carry_link_fields(&stored);
    }
    doc.updated_at = Utc::now();
    state.store.upsert_document(&doc).await?;
    Ok(doc)
}

/// Submit callback: store the document and give it a payment link.
pub async fn on_submit(state: &AppState, doc: SalesDocument) -> Result<HookOutcome, ServiceError> {
    let doc = store_incoming(state, doc).await?;
    generate_and_announce(state, &doc, false).await
}

/// Amend callback: retire the amended document's live link, then link the new revision.
pub async fn on_amend(state: &AppState, doc: SalesDocument) -> Result<HookOutcome, ServiceError> {
    let doc = store_incoming(state, doc).await?;
    if let Some(original) = &doc.amended_from {
        match state.store.get_document(doc.kind, original).await? {
            Some(previous) => {
                if let Some(link_id) = &previous.payment_link {
                    if let Err(err) = links::retire_link(state, link_id).await {
                        warn!(name = %original, link_id = %link_id, error = %err, "could not retire amended document's link");
                    }
                }
            }
            None => info!(name = %original, "amended document not stored; nothing to retire"),
        }
    }
    generate_and_announce(state, &doc, true).await
}

async fn generate_and_announce(
    state: &AppState,
    doc: &SalesDocument,
    is_update: bool,
) -> Result<HookOutcome, ServiceError> {
    if doc.grand_total <= BigDecimal::zero() {
        info!(doctype = doc.kind.as_str(), name = %doc.name, "zero total; payment link skipped");
        return Ok(HookOutcome::skipped(doc));
    }

    match links::create_for_document(state, doc.kind, &doc.name, &LinkOptions::default()).await {
        Ok(link) => {
            let card = templates::document_card(
                doc.kind,
                &doc.name,
                doc.display_customer(),
                &doc.currency,
                &doc.grand_total,
                &link.short_url,
                is_update,
            );
            if let Err(err) = state.notifier.post(CliqChannel::Sales, &card).await {
                warn!(name = %doc.name, error = %err, "document card failed; sending plain text");
                let fallback = CliqMessage::text(templates::simple_document_text(doc.kind, &doc.name, is_update));
                if let Err(err) = state.notifier.post(CliqChannel::Sales, &fallback).await {
                    warn!(name = %doc.name, error = %err, "document notification failed");
                }
            }
            Ok(HookOutcome { result: HookResult::Created, document: doc.name.clone(), link: Some(link), error: None })
        }
        Err(err @ ServiceError::Store(_)) => Err(err),
        Err(err) => {
            warn!(doctype = doc.kind.as_str(), name = %doc.name, error = %err, "payment link generation failed");
            let text = templates::link_failure_text(doc.kind, &doc.name, &err.to_string());
            if let Err(notify_err) = state.notifier.post(CliqChannel::Sales, &CliqMessage::text(text)).await {
                warn!(name = %doc.name, error = %notify_err, "failure notification not delivered");
            }
            Ok(HookOutcome {
                result: HookResult::Failed,
                document: doc.name.clone(),
                link: None,
                error: Some(err.to_string()),
            })
        }
    }
}

/// Customer save callback: make sure the customer has a gateway customer id.
pub async fn on_customer_saved(state: &AppState, mut customer: Customer) -> Result<Customer, ServiceError> {
    let existing = state.store.get_customer(&customer.name).await?;
    let known = customer
        .gateway_customer_id
        .clone()
        .filter(|id| !id.trim().is_empty())
        .or_else(|| existing.and_then(|c| c.gateway_customer_id));
    customer.gateway_customer_id = Some(known.unwrap_or_else(|| Uuid::new_v4().to_string()));
    state.store.upsert_customer(&customer).await?;
    Ok(customer)
}
