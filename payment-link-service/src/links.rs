use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use common_crypto::random_suffix;
use common_money::{from_minor_units, normalize_scale, remaining, to_minor_units};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::error::ServiceError;
use crate::gateway::{
    CreateLinkRequest, GatewayLink, GatewayPayment, LinkCustomer, LinkNotify, LinkStatus, LinkPaymentRef,
};
use crate::store::{DocumentKind, PaymentDetail, PaymentLink, PaymentProgress, SalesDocument};

const MAX_REFERENCE_ID_LEN: usize = 40;
const REFERENCE_SUFFIX_LEN: usize = 8;

/// Optional overrides for link creation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinkOptions {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub accept_partial: Option<bool>,
    #[serde(default)]
    pub first_min_partial_amount: Option<BigDecimal>,
    #[serde(default)]
    pub expire_by: Option<DateTime<Utc>>,
    #[serde(default)]
    pub callback_url: Option<String>,
    #[serde(default)]
    pub callback_method: Option<String>,
    #[serde(default)]
    pub upi_link: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnsuredLink {
    pub link: PaymentLink,
    pub created: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkDetails {
    pub link: PaymentLink,
    pub gateway: GatewayLink,
    pub payments: Vec<GatewayPayment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentSummary {
    pub link_id: String,
    pub payments: Vec<PaymentDetail>,
    pub total_payments: usize,
    pub total_paid: BigDecimal,
    pub remaining: BigDecimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    pub link_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub total: usize,
    pub synced: Vec<PaymentLink>,
    pub failed: Vec<SyncFailure>,
}

/// `<name>_<8 hex>`, with the name cut so the whole id fits the gateway's 40 characters.
pub fn build_reference_id(name: &str) -> String {
    let keep = MAX_REFERENCE_ID_LEN - REFERENCE_SUFFIX_LEN - 1;
    let head: String = name.chars().take(keep).collect();
    format!("{head}_{}", random_suffix(REFERENCE_SUFFIX_LEN))
}

fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(23, 59, 59).map(|naive| Utc.from_utc_datetime(&naive))
}

/// Link expiry: explicit override, else end of the validity date, else end of
/// day `default_days` from today.
pub fn resolve_expiry(
    explicit: Option<DateTime<Utc>>,
    valid_till: Option<NaiveDate>,
    default_days: i64,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>, ServiceError> {
    let expiry = match (explicit, valid_till) {
        (Some(at), _) => at,
        (None, Some(date)) => end_of_day(date)
            .ok_or_else(|| ServiceError::invalid("invalid_validity", format!("invalid validity date {date}")))?,
        (None, None) => u64::try_from(default_days)
            .ok()
            .and_then(|days| now.date_naive().checked_add_days(Days::new(days)))
            .and_then(end_of_day)
            .ok_or_else(|| ServiceError::invalid("invalid_validity", "default expiry out of range"))?,
    };
    if expiry <= now {
        return Err(ServiceError::invalid(
            "validity_in_past",
            format!("link expiry {} is not in the future", expiry.to_rfc3339()),
        ));
    }
    Ok(expiry)
}

/// Local status after a gateway read. A fully paid link is `Paid`, gateway
/// cancellation or expiry is kept, and any other link with money received is
/// `Partially Paid`.
pub fn merge_status(gateway: LinkStatus, amount: i64, amount_paid: i64) -> LinkStatus {
    if amount > 0 && amount_paid >= amount {
        return LinkStatus::Paid;
    }
    match gateway {
        LinkStatus::Cancelled | LinkStatus::Expired => gateway,
        _ if amount_paid > 0 => LinkStatus::PartiallyPaid,
        other => other,
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn timestamp(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
}

fn build_request(
    doc: &SalesDocument,
    options: &LinkOptions,
    allow_partial: bool,
    expire_by: DateTime<Utc>,
) -> Result<CreateLinkRequest, ServiceError> {
    let amount = to_minor_units(&doc.grand_total)?;
    let is_revision = doc.amended_from.is_some();
    let description = options.description.clone().unwrap_or_else(|| {
        format!(
            "Payment for {} {}{}",
            doc.kind.as_str(),
            doc.name,
            if is_revision { " (Revised)" } else { "" }
        )
    });
    let first_min_partial_amount = match &options.first_min_partial_amount {
        Some(min) => Some(to_minor_units(min)?),
        None => None,
    };

    let mut notes = BTreeMap::new();
    notes.insert(doc.kind.note_key().to_string(), doc.name.clone());
    notes.insert("customer".to_string(), doc.display_customer().to_string());
    notes.insert("is_revision".to_string(), is_revision.to_string());
    if let Some(original) = &doc.amended_from {
        notes.insert("original_quote".to_string(), original.clone());
    }

    Ok(CreateLinkRequest {
        amount,
        currency: doc.currency.clone(),
        accept_partial: options.accept_partial.unwrap_or(allow_partial),
        first_min_partial_amount,
        description,
        reference_id: build_reference_id(&doc.name),
        customer: LinkCustomer {
            name: Some(doc.display_customer().to_string()),
            email: non_empty(&doc.contact_email),
            contact: non_empty(&doc.contact_mobile),
        },
        notify: LinkNotify { sms: true, email: true },
        reminder_enable: true,
        notes,
        expire_by: expire_by.timestamp(),
        callback_url: options.callback_url.clone(),
        callback_method: options.callback_method.clone(),
        upi_link: options.upi_link.unwrap_or(false),
    })
}

pub(crate) async fn load_document(
    state: &AppState,
    kind: DocumentKind,
    name: &str,
) -> Result<SalesDocument, ServiceError> {
    state
        .store
        .get_document(kind, name)
        .await?
        .ok_or_else(|| ServiceError::not_found("document_not_found", kind.as_str(), name))
}

pub(crate) async fn load_link(state: &AppState, link_id: &str) -> Result<PaymentLink, ServiceError> {
    state
        .store
        .get_payment_link(link_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("payment_link_not_found", "payment link", link_id))
}

/// Creates a gateway payment link for a stored document and records it on the document.
pub async fn create_for_document(
    state: &AppState,
    kind: DocumentKind,
    name: &str,
    options: &LinkOptions,
) -> Result<PaymentLink, ServiceError> {
    let mut doc = load_document(state, kind, name).await?;
    if doc.grand_total <= BigDecimal::zero() {
        return Err(ServiceError::invalid("invalid_amount", "grand total must be greater than zero"));
    }
    let now = Utc::now();
    let expire_by = resolve_expiry(options.expire_by, doc.valid_till, state.config.default_expiry_days, now)?;
    let request = build_request(&doc, options, state.config.allow_partial_payments, expire_by)?;

    let created = match state.gateway.create_payment_link(&request).await {
        Ok(link) => link,
        Err(err) => {
            state
                .metrics
                .payment_links_created_total
                .with_label_values(&[kind.as_str(), "failed"])
                .inc();
            warn!(doctype = kind.as_str(), name = %name, error = %err, "payment link creation failed");
            return Err(err.into());
        }
    };

    let amount = from_minor_units(created.amount);
    let paid = from_minor_units(created.amount_paid);
    let link = PaymentLink {
        id: created.id.clone(),
        short_url: created.short_url.clone(),
        status: created.status,
        progress: PaymentProgress::from_amounts(&amount, &paid),
        remaining_amount: remaining(&amount, &paid),
        amount,
        amount_paid: paid,
        currency: created.currency.clone(),
        expire_by: timestamp(created.expire_by).or(Some(expire_by)),
        reference_kind: kind,
        reference_name: doc.name.clone(),
        customer: doc.display_customer().to_string(),
        gateway_payment_id: None,
        created_at: now,
        updated_at: now,
    };
    state.store.upsert_payment_link(&link).await?;

    doc.payment_link = Some(link.id.clone());
    doc.payment_url = Some(link.short_url.clone());
    doc.link_expiry = link.expire_by;
    doc.payment_status = Some(link.status);
    doc.gateway_payment_id = None;
    doc.updated_at = now;
    state.store.upsert_document(&doc).await?;

    state
        .metrics
        .payment_links_created_total
        .with_label_values(&[kind.as_str(), "created"])
        .inc();
    info!(link_id = %link.id, doctype = kind.as_str(), name = %name, amount = %link.amount, "payment link created");
    Ok(link)
}

/// Local record for a gateway link that was created outside this service
/// but whose short url is stored on a document.
pub(crate) fn adopt_gateway_link(doc: &SalesDocument, gateway: &GatewayLink) -> PaymentLink {
    let amount = from_minor_units(gateway.amount);
    let paid = from_minor_units(gateway.amount_paid);
    let now = Utc::now();
    PaymentLink {
        id: gateway.id.clone(),
        short_url: gateway.short_url.clone(),
        status: gateway.status,
        progress: PaymentProgress::from_amounts(&amount, &paid),
        remaining_amount: remaining(&amount, &paid),
        amount,
        amount_paid: paid,
        currency: gateway.currency.clone(),
        expire_by: timestamp(gateway.expire_by),
        reference_kind: doc.kind,
        reference_name: doc.name.clone(),
        customer: doc.display_customer().to_string(),
        gateway_payment_id: None,
        created_at: timestamp(gateway.created_at).unwrap_or(now),
        updated_at: now,
    }
}

/// Cancels a superseded link on the gateway and marks it and its document
/// cancelled locally. Gateway failures are logged; the local record is still updated.
pub(crate) async fn retire_link(state: &AppState, link_id: &str) -> Result<(), ServiceError> {
    let local = state.store.get_payment_link(link_id).await?;
    if let Some(link) = &local {
        if !link.status.is_active() {
            return Ok(());
        }
    }
    match state.gateway.cancel_payment_link(link_id).await {
        Ok(_) => info!(link_id = %link_id, "superseded payment link cancelled"),
        Err(err) => warn!(link_id = %link_id, error = %err, "failed to cancel superseded payment link"),
    }
    if let Some(mut link) = local {
        link.status = LinkStatus::Cancelled;
        link.updated_at = Utc::now();
        state.store.upsert_payment_link(&link).await?;
        mirror_onto_document(state, &link).await?;
    }
    Ok(())
}

/// Replaces the document's current link with a fresh one.
pub async fn regenerate_for_revision(
    state: &AppState,
    kind: DocumentKind,
    name: &str,
) -> Result<PaymentLink, ServiceError> {
    let doc = load_document(state, kind, name).await?;
    if let Some(old) = &doc.payment_link {
        retire_link(state, old).await?;
    }
    create_for_document(state, kind, name, &LinkOptions::default()).await
}

/// Returns the document's active link, creating one when there is none.
pub async fn get_or_create(state: &AppState, kind: DocumentKind, name: &str) -> Result<EnsuredLink, ServiceError> {
    let doc = load_document(state, kind, name).await?;
    if let Some(link_id) = &doc.payment_link {
        if let Some(link) = state.store.get_payment_link(link_id).await? {
            if link.status.is_active() {
                return Ok(EnsuredLink { link, created: false });
            }
        }
    }
    let link = create_for_document(state, kind, name, &LinkOptions::default()).await?;
    Ok(EnsuredLink { link, created: true })
}

fn detail_from_payment(link: &PaymentLink, payment: &GatewayPayment) -> PaymentDetail {
    PaymentDetail {
        payment_id: payment.id.clone(),
        link_id: link.id.clone(),
        amount: from_minor_units(payment.amount),
        currency: payment.currency.clone(),
        status: payment.status.clone(),
        method: payment.method.clone(),
        customer: link.customer.clone(),
        reference_kind: link.reference_kind,
        reference_name: link.reference_name.clone(),
        created_at: timestamp(Some(payment.created_at)).unwrap_or_else(Utc::now),
    }
}

fn detail_from_ref(link: &PaymentLink, payment: &LinkPaymentRef) -> PaymentDetail {
    PaymentDetail {
        payment_id: payment.payment_id.clone(),
        link_id: link.id.clone(),
        amount: from_minor_units(payment.amount),
        currency: link.currency.clone(),
        status: payment.status.clone().unwrap_or_else(|| "created".to_string()),
        method: payment.method.clone(),
        customer: link.customer.clone(),
        reference_kind: link.reference_kind,
        reference_name: link.reference_name.clone(),
        created_at: timestamp(payment.created_at).unwrap_or_else(Utc::now),
    }
}

pub(crate) async fn record_payment_details(state: &AppState, link: &PaymentLink, gateway: &GatewayLink) -> Result<(), ServiceError> {
    for payment_ref in gateway.payment_refs() {
        let detail = match state.gateway.fetch_payment(&payment_ref.payment_id).await {
            Ok(payment) => detail_from_payment(link, &payment),
            Err(err) => {
                warn!(payment_id = %payment_ref.payment_id, error = %err, "payment fetch failed; using link payment data");
                detail_from_ref(link, payment_ref)
            }
        };
        state.store.upsert_payment_detail(&detail).await?;
    }
    Ok(())
}

/// Applies a gateway read to the local link, its payment details and the referenced document.
pub async fn apply_gateway_state(
    state: &AppState,
    mut link: PaymentLink,
    gateway: &GatewayLink,
) -> Result<PaymentLink, ServiceError> {
    let amount = from_minor_units(gateway.amount);
    let paid = from_minor_units(gateway.amount_paid);
    link.status = merge_status(gateway.status, gateway.amount, gateway.amount_paid);
    link.progress = PaymentProgress::from_amounts(&amount, &paid);
    link.remaining_amount = remaining(&amount, &paid);
    link.amount = normalize_scale(&amount);
    link.amount_paid = normalize_scale(&paid);
    link.short_url = gateway.short_url.clone();
    if let Some(expiry) = timestamp(gateway.expire_by) {
        link.expire_by = Some(expiry);
    }
    if let Some(latest) = gateway.payment_refs().iter().max_by_key(|p| p.created_at.unwrap_or(0)) {
        link.gateway_payment_id = Some(latest.payment_id.clone());
    }
    link.updated_at = Utc::now();

    state.store.upsert_payment_link(&link).await?;
    record_payment_details(state, &link, gateway).await?;
    mirror_onto_document(state, &link).await?;
    info!(link_id = %link.id, status = link.status.as_str(), amount_paid = %link.amount_paid, "payment link state applied");
    Ok(link)
}

/// Copies link status and payment id onto the referenced document, if it
/// still points at this link.
pub(crate) async fn mirror_onto_document(state: &AppState, link: &PaymentLink) -> Result<(), ServiceError> {
    let Some(mut doc) = state.store.get_document(link.reference_kind, &link.reference_name).await? else {
        warn!(link_id = %link.id, name = %link.reference_name, "referenced document missing");
        return Ok(());
    };
    if doc.payment_link.as_deref() != Some(link.id.as_str()) {
        return Ok(());
    }
    doc.payment_status = Some(link.status);
    if link.gateway_payment_id.is_some() {
        doc.gateway_payment_id = link.gateway_payment_id.clone();
    }
    doc.updated_at = Utc::now();
    state.store.upsert_document(&doc).await?;
    Ok(())
}

pub async fn sync_status(state: &AppState, link_id: &str) -> Result<PaymentLink, ServiceError> {
    let link = load_link(state, link_id).await?;
    let gateway = state.gateway.fetch_payment_link(link_id).await?;
    apply_gateway_state(state, link, &gateway).await
}

/// Syncs every stored link. Per-link failures are collected, not raised.
pub async fn sync_all(state: &AppState) -> Result<SyncReport, ServiceError> {
    let links = state.store.list_payment_links().await?;
    let mut report = SyncReport { total: links.len(), ..Default::default() };
    for link in links {
        match sync_status(state, &link.id).await {
            Ok(synced) => report.synced.push(synced),
            Err(err) => {
                warn!(link_id = %link.id, error = %err, "payment link sync failed");
                report.failed.push(SyncFailure { link_id: link.id, error: err.to_string() });
            }
        }
    }
    info!(total = report.total, failed = report.failed.len(), "payment link sync finished");
    Ok(report)
}

pub async fn cancel(state: &AppState, link_id: &str) -> Result<PaymentLink, ServiceError> {
    let mut link = load_link(state, link_id).await?;
    let gateway = state.gateway.cancel_payment_link(link_id).await?;
    link.status = gateway.status;
    link.updated_at = Utc::now();
    state.store.upsert_payment_link(&link).await?;
    mirror_onto_document(state, &link).await?;
    info!(link_id = %link_id, "payment link cancelled");
    Ok(link)
}

pub async fn details(state: &AppState, link_id: &str) -> Result<LinkDetails, ServiceError> {
    let link = load_link(state, link_id).await?;
    let gateway = state.gateway.fetch_payment_link(link_id).await?;
    let mut payments = Vec::new();
    for payment_ref in gateway.payment_refs() {
        match state.gateway.fetch_payment(&payment_ref.payment_id).await {
            Ok(payment) => payments.push(payment),
            Err(err) => warn!(payment_id = %payment_ref.payment_id, error = %err, "skipping payment that could not be fetched"),
        }
    }
    Ok(LinkDetails { link, gateway, payments })
}

pub async fn payment_summary(state: &AppState, link_id: &str) -> Result<PaymentSummary, ServiceError> {
    let link = load_link(state, link_id).await?;
    let payments = state.store.list_payment_details(link_id).await?;
    let total_paid = payments
        .iter()
        .filter(|p| p.status == "captured")
        .fold(BigDecimal::zero(), |acc, p| acc + &p.amount);
    let total_paid = normalize_scale(&total_paid);
    Ok(PaymentSummary {
        link_id: link.id,
        total_payments: payments.len(),
        remaining: remaining(&link.amount, &total_paid),
        total_paid,
        payments,
    })
}
