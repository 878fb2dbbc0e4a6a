use chrono::{DateTime, TimeZone, Utc};
use common_crypto::random_suffix;
use common_money::{from_minor_units, normalize_scale};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::error::ServiceError;
use crate::gateway::{note, GatewaySettlement, ReconItem, SettlementQuery};
use crate::store::{
    DocumentKind, PaymentEntry, ReconciliationStatus, Settlement, SettlementPaymentEntry,
};

pub const SYSTEM_USER: &str = "system";
pub const MODE_OF_PAYMENT: &str = "Razorpay";

#[derive(Debug, Clone, Serialize)]
pub struct ReconSummary {
    pub items: usize,
    pub entries: Vec<SettlementPaymentEntry>,
    pub settlements: Vec<Settlement>,
}

fn from_epoch(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap_or_else(Utc::now)
}

fn settlement_record(gateway: &GatewaySettlement, existing: Option<Settlement>) -> Settlement {
    let (reconciliation_status, reconciled_at, reconciled_by) = match existing {
        Some(prev) => (prev.reconciliation_status, prev.reconciled_at, prev.reconciled_by),
        None => (ReconciliationStatus::Pending, None, None),
    };
    Settlement {
        settlement_id: gateway.id.clone(),
        amount: from_minor_units(gateway.amount),
        fees: from_minor_units(gateway.fees),
        tax: from_minor_units(gateway.tax),
        currency: gateway.currency.clone(),
        status: gateway.status.clone(),
        utr: gateway.utr.clone(),
        created_at: from_epoch(gateway.created_at),
        reconciliation_status,
        reconciled_at,
        reconciled_by,
    }
}

fn entry_record(item: &ReconItem, existing: Option<SettlementPaymentEntry>) -> SettlementPaymentEntry {
    let mut entry = existing.unwrap_or_else(|| SettlementPaymentEntry {
        entity_id: item.entity_id.clone(),
        settlement_id: None,
        entity_type: item.entity_type.clone(),
        amount: from_minor_units(0),
        fee: from_minor_units(0),
        tax: from_minor_units(0),
        currency: item.currency.clone(),
        method: None,
        description: None,
        email: None,
        contact: None,
        quotation: None,
        customer: None,
        reconciliation_status: ReconciliationStatus::Pending,
        payment_entry: None,
        reconciled_at: None,
        reconciled_by: None,
    });
    entry.settlement_id = item.settlement_id.clone().or(entry.settlement_id);
    entry.entity_type = item.entity_type.clone();
    entry.amount = from_minor_units(item.amount);
    entry.fee = from_minor_units(item.fee);
    entry.tax = from_minor_units(item.tax);
    entry.currency = item.currency.clone();
    entry.method = item.method.clone();
    entry.description = item.description.clone();
    entry.email = item.email.clone();
    entry.contact = item.contact.clone();
    entry.quotation = noted_document(&item.notes).map(|(_, name)| name).or(entry.quotation);
    entry.customer = note(&item.notes, "customer").or(entry.customer);
    entry
}

/// Sales document named in gateway notes, under whichever kind's key is present.
fn noted_document(notes: &serde_json::Value) -> Option<(DocumentKind, String)> {
    DocumentKind::ALL
        .iter()
        .find_map(|kind| note(notes, kind.note_key()).map(|name| (*kind, name)))
}

/// Kind of a document known only by name, from whichever store record carries it.
async fn stored_document_kind(state: &AppState, name: &str) -> Result<Option<DocumentKind>, ServiceError> {
    for kind in DocumentKind::ALL {
        if state.store.get_document(kind, name).await?.is_some() {
            return Ok(Some(kind));
        }
    }
    Ok(None)
}

async fn mirror_settlement(state: &AppState, gateway: &GatewaySettlement) -> Result<Settlement, ServiceError> {
    let existing = state.store.get_settlement(&gateway.id).await?;
    let record = settlement_record(gateway, existing);
    state.store.upsert_settlement(&record).await?;
    Ok(record)
}

pub async fn fetch_settlement(state: &AppState, settlement_id: &str) -> Result<Settlement, ServiceError> {
    let gateway = state.gateway.fetch_settlement(settlement_id).await?;
    mirror_settlement(state, &gateway).await
}

pub async fn fetch_all(state: &AppState, query: &SettlementQuery) -> Result<Vec<Settlement>, ServiceError> {
    let settlements = state.gateway.list_settlements(query).await?;
    let mut mirrored = Vec::with_capacity(settlements.len());
    for gateway in &settlements {
        mirrored.push(mirror_settlement(state, gateway).await?);
    }
    info!(count = mirrored.len(), "settlements mirrored");
    Ok(mirrored)
}

/// Pulls the combined recon report for a day (or a whole month) and
/// reconciles every settlement it touches.
pub async fn recon(state: &AppState, year: i32, month: u32, day: Option<u32>) -> Result<ReconSummary, ServiceError> {
    if !(1..=12).contains(&month) {
        return Err(ServiceError::invalid("invalid_period", format!("month {month} out of range")));
    }
    if let Some(d) = day {
        if !(1..=31).contains(&d) {
            return Err(ServiceError::invalid("invalid_period", format!("day {d} out of range")));
        }
    }

    let items = state.gateway.settlement_recon(year, month, day).await?;
    let mut touched = BTreeSet::new();
    let mut entries = Vec::with_capacity(items.len());
    for item in &items {
        let existing = state.store.get_settlement_payment(&item.entity_id).await?;
        let entry = entry_record(item, existing);
        state.store.upsert_settlement_payment(&entry).await?;
        if let Some(id) = &entry.settlement_id {
            touched.insert(id.clone());
        }
        entries.push(entry);
    }

    let mut settlements = Vec::new();
    for settlement_id in touched {
        if state.store.get_settlement(&settlement_id).await?.is_none() {
            if let Err(err) = fetch_settlement(state, &settlement_id).await {
                warn!(settlement_id = %settlement_id, error = %err, "settlement header fetch failed; skipping");
                continue;
            }
        }
        settlements.push(reconcile_settlement(state, &settlement_id, SYSTEM_USER).await?);
    }
    info!(year, month, day = ?day, items = items.len(), settlements = settlements.len(), "settlement recon finished");
    Ok(ReconSummary { items: items.len(), entries, settlements })
}

async fn submitted_entry_for(state: &AppState, payment_id: &str) -> Result<Option<PaymentEntry>, ServiceError> {
    let entries = state.store.list_payment_entries(payment_id).await?;
    Ok(entries.into_iter().find(|e| e.submitted))
}

fn mark_reconciled(entry: &mut SettlementPaymentEntry, payment_entry: &str, user: &str) {
    entry.reconciliation_status = ReconciliationStatus::Reconciled;
    entry.payment_entry = Some(payment_entry.to_string());
    entry.reconciled_at = Some(Utc::now());
    entry.reconciled_by = Some(user.to_string());
}

/// Matches one settled payment to its submitted ledger receipt.
pub async fn reconcile_payment(
    state: &AppState,
    payment_id: &str,
    user: &str,
) -> Result<SettlementPaymentEntry, ServiceError> {
    let mut entry = state
        .store
        .get_settlement_payment(payment_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("settlement_payment_not_found", "settlement payment", payment_id))?;
    let receipts = state.store.list_payment_entries(payment_id).await?;
    if receipts.is_empty() {
        return Err(ServiceError::not_found("payment_entry_not_found", "payment entry for", payment_id));
    }
    let Some(receipt) = receipts.iter().find(|e| e.submitted) else {
        return Err(ServiceError::Conflict {
            code: "payment_entry_not_submitted",
            message: format!("payment entry {} is not submitted", receipts[0].name),
        });
    };
    mark_reconciled(&mut entry, &receipt.name, user);
    state.store.upsert_settlement_payment(&entry).await?;
    info!(payment_id = %payment_id, payment_entry = %receipt.name, user = %user, "settlement payment reconciled");
    Ok(entry)
}

pub fn settlement_status(total: usize, reconciled: usize) -> ReconciliationStatus {
    if total > 0 && reconciled == total {
        ReconciliationStatus::Reconciled
    } else if reconciled > 0 {
        ReconciliationStatus::PartiallyReconciled
    } else {
        ReconciliationStatus::Pending
    }
}

/// Auto-matches the settlement's open entries against submitted receipts
/// and rolls the result up onto the settlement.
pub async fn reconcile_settlement(state: &AppState, settlement_id: &str, user: &str) -> Result<Settlement, ServiceError> {
    let mut settlement = state
        .store
        .get_settlement(settlement_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("settlement_not_found", "settlement", settlement_id))?;
    let entries = state.store.list_settlement_payments(settlement_id).await?;
    let mut reconciled = 0;
    for mut entry in entries.iter().cloned() {
        if entry.reconciliation_status == ReconciliationStatus::Reconciled {
            reconciled += 1;
            continue;
        }
        if let Some(receipt) = submitted_entry_for(state, &entry.entity_id).await? {
            mark_reconciled(&mut entry, &receipt.name, user);
            state.store.upsert_settlement_payment(&entry).await?;
            reconciled += 1;
        }
    }

    settlement.reconciliation_status = settlement_status(entries.len(), reconciled);
    if settlement.reconciliation_status == ReconciliationStatus::Reconciled {
        settlement.reconciled_at = Some(Utc::now());
        settlement.reconciled_by = Some(user.to_string());
    }
    state.store.upsert_settlement(&settlement).await?;
    state
        .metrics
        .settlements_reconciled_total
        .with_label_values(&[settlement.reconciliation_status.as_str()])
        .inc();
    info!(
        settlement_id = %settlement_id,
        entries = entries.len(),
        reconciled,
        status = settlement.reconciliation_status.as_str(),
        "settlement reconciled"
    );
    Ok(settlement)
}

pub async fn settlement_payments(state: &AppState, settlement_id: &str) -> Result<Vec<SettlementPaymentEntry>, ServiceError> {
    Ok(state.store.list_settlement_payments(settlement_id).await?)
}

pub async fn list_settlements(state: &AppState) -> Result<Vec<Settlement>, ServiceError> {
    Ok(state.store.list_settlements().await?)
}

pub(crate) fn new_entry_name() -> String {
    format!("PE-{}", random_suffix(10).to_uppercase())
}

/// Books `draft` unless the payment already has a receipt. A submitted
/// receipt is returned as is; an unsubmitted one is submitted in its place.
pub(crate) async fn ensure_payment_entry(state: &AppState, draft: PaymentEntry) -> Result<PaymentEntry, ServiceError> {
    let existing = state.store.list_payment_entries(&draft.reference_no).await?;
    if let Some(found) = existing.iter().find(|e| e.submitted) {
        info!(payment_id = %draft.reference_no, payment_entry = %found.name, "payment entry already exists");
        return Ok(found.clone());
    }
    if let Some(mut pending) = existing.into_iter().next() {
        pending.submitted = true;
        state.store.upsert_payment_entry(&pending).await?;
        info!(payment_id = %draft.reference_no, payment_entry = %pending.name, "pending payment entry submitted");
        return Ok(pending);
    }
    state.store.upsert_payment_entry(&draft).await?;
    info!(payment_id = %draft.reference_no, payment_entry = %draft.name, amount = %draft.paid_amount, "payment entry created");
    Ok(draft)
}

/// Refreshes a settled payment from the gateway and books a submitted receipt for it.
pub async fn create_payment_entry(state: &AppState, payment_id: &str) -> Result<PaymentEntry, ServiceError> {
    let mut entry = state
        .store
        .get_settlement_payment(payment_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("settlement_payment_not_found", "settlement payment", payment_id))?;

    let payment = state.gateway.fetch_payment(payment_id).await?;
    entry.amount = from_minor_units(payment.amount);
    entry.currency = payment.currency.clone();
    entry.method = payment.method.clone().or(entry.method);
    entry.description = payment.description.clone().or(entry.description);
    entry.email = payment.email.clone().or(entry.email);
    entry.contact = payment.contact.clone().or(entry.contact);
    let noted = noted_document(&payment.notes);
    entry.quotation = noted.as_ref().map(|(_, name)| name.clone()).or(entry.quotation);
    entry.customer = note(&payment.notes, "customer").or(entry.customer);
    let reference = match (noted, &entry.quotation) {
        (Some(found), _) => Some(found),
        (None, Some(name)) => {
            let kind = stored_document_kind(state, name).await?.unwrap_or(DocumentKind::Quotation);
            Some((kind, name.clone()))
        }
        (None, None) => None,
    };

    let now = Utc::now();
    let draft = PaymentEntry {
        name: new_entry_name(),
        reference_no: payment_id.to_string(),
        party: entry.customer.clone().unwrap_or_else(|| "Unknown".to_string()),
        paid_amount: normalize_scale(&entry.amount),
        currency: entry.currency.clone(),
        posting_date: now.date_naive(),
        reference_kind: reference.as_ref().map(|(kind, _)| *kind),
        reference_name: reference.map(|(_, name)| name),
        mode_of_payment: MODE_OF_PAYMENT.to_string(),
        submitted: true,
        settlement_payment: Some(entry.entity_id.clone()),
        created_at: now,
    };
    let receipt = ensure_payment_entry(state, draft).await?;
    entry.payment_entry = Some(receipt.name.clone());
    state.store.upsert_settlement_payment(&entry).await?;
    Ok(receipt)
}
