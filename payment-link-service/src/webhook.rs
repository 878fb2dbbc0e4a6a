use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{TimeZone, Utc};
use common_crypto::verify_hex_signature;
use common_money::{from_minor_units, normalize_scale};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::app_state::AppState;
use crate::cliq::{templates, CliqChannel, CliqMessage};
use crate::error::ServiceError;
use crate::gateway::LinkStatus;
use crate::links;
use crate::settlement::{ensure_payment_entry, new_entry_name, MODE_OF_PAYMENT};
use crate::store::{PaymentDetail, PaymentEntry, PaymentLink, SalesDocument};

pub const SIGNATURE_HEADER: &str = "X-Razorpay-Signature";
pub const EVENT_ID_HEADER: &str = "X-Razorpay-Event-Id";

#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    pub event: String,
    #[serde(default)]
    pub payload: WebhookPayload,
}

#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub payment_link: Option<Entity<LinkEntity>>,
    #[serde(default)]
    pub payment: Option<Entity<PaymentEntity>>,
}

#[derive(Debug, Deserialize)]
pub struct Entity<T> {
    pub entity: T,
}

#[derive(Debug, Deserialize)]
pub struct LinkEntity {
    pub id: String,
    #[serde(default)]
    pub short_url: Option<String>,
    #[serde(default)]
    pub status: Option<LinkStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    pub id: String,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    Ignored,
    Duplicate,
}

impl WebhookOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Processed => "processed",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::Duplicate => "duplicate",
        }
    }
}

fn reply(status: StatusCode, code: Option<&'static str>, body: String) -> Response {
    let mut resp = (status, body).into_response();
    if let Some(code) = code {
        resp.headers_mut().insert("X-Error-Code", HeaderValue::from_static(code));
    }
    resp
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// `POST /webhooks/razorpay`
pub async fn razorpay_webhook(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let Some(secret) = state.config.webhook_secret.as_ref().filter(|s| !s.is_empty()) else {
        error!("webhook received but no webhook secret is configured");
        return reply(StatusCode::INTERNAL_SERVER_ERROR, Some("secret_missing"), "Webhook secret not configured.".into());
    };
    let Some(signature) = header(&headers, SIGNATURE_HEADER) else {
        return reply(StatusCode::BAD_REQUEST, Some("sig_missing"), "Missing signature.".into());
    };
    if !verify_hex_signature(secret.expose().as_bytes(), &body, signature) {
        warn!("webhook signature mismatch");
        return reply(StatusCode::FORBIDDEN, Some("sig_mismatch"), "Invalid signature.".into());
    }
    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(env) => env,
        Err(err) => {
            warn!(error = %err, "malformed webhook body");
            return reply(StatusCode::BAD_REQUEST, Some("malformed"), format!("Malformed payload: {err}"));
        }
    };

    let event_id = header(&headers, EVENT_ID_HEADER).map(str::to_string);
    if let Some(id) = &event_id {
        match state.store.record_webhook_event(id, &envelope.event).await {
            Ok(true) => {}
            Ok(false) => {
                info!(event_id = %id, event = %envelope.event, "duplicate webhook delivery");
                record_metric(&state, &envelope.event, WebhookOutcome::Duplicate.as_str());
                return reply(StatusCode::OK, None, "OK".into());
            }
            Err(err) => {
                error!(event_id = %id, error = %err, "failed to record webhook event");
                return reply(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Some("processing_error"),
                    format!("Webhook processing error: {err}"),
                );
            }
        }
    }

    match process_event(&state, &envelope).await {
        Ok(outcome) => {
            record_metric(&state, &envelope.event, outcome.as_str());
            reply(StatusCode::OK, None, "OK".into())
        }
        Err(err) => {
            error!(event = %envelope.event, error = %err, "webhook processing failed");
            record_metric(&state, &envelope.event, "failed");
            if let Some(id) = &event_id {
                if let Err(release_err) = state.store.release_webhook_event(id).await {
                    warn!(event_id = %id, error = %release_err, "failed to release webhook event id");
                }
            }
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                Some("processing_error"),
                format!("Webhook processing error: {err}"),
            )
        }
    }
}

fn record_metric(state: &AppState, event: &str, outcome: &str) {
    let event = if event.starts_with("payment_link.") { event } else { "other" };
    state.metrics.webhook_events_total.with_label_values(&[event, outcome]).inc();
}

/// Dispatches a verified event.
pub async fn process_event(state: &AppState, envelope: &WebhookEnvelope) -> Result<WebhookOutcome, ServiceError> {
    let Some(link_entity) = envelope.payload.payment_link.as_ref().map(|e| &e.entity) else {
        info!(event = %envelope.event, "webhook without payment link entity ignored");
        return Ok(WebhookOutcome::Ignored);
    };
    let payment = envelope.payload.payment.as_ref().map(|e| &e.entity);
    match envelope.event.as_str() {
        "payment_link.paid" | "payment_link.partially_paid" => on_payment(state, link_entity, payment).await,
        "payment_link.cancelled" => on_closed(state, link_entity, LinkStatus::Cancelled).await,
        "payment_link.expired" => on_closed(state, link_entity, LinkStatus::Expired).await,
        other => {
            info!(event = %other, "unhandled webhook event ignored");
            Ok(WebhookOutcome::Ignored)
        }
    }
}

enum Located {
    Link(PaymentLink),
    Document(SalesDocument),
    Unknown,
}

async fn locate(state: &AppState, entity: &LinkEntity) -> Result<Located, ServiceError> {
    if let Some(link) = state.store.get_payment_link(&entity.id).await? {
        return Ok(Located::Link(link));
    }
    if let Some(url) = &entity.short_url {
        if let Some(doc) = state.store.find_document_by_url(url).await? {
            return Ok(Located::Document(doc));
        }
    }
    Ok(Located::Unknown)
}

async fn adopt(state: &AppState, mut doc: SalesDocument, link_id: &str) -> Result<(PaymentLink, crate::gateway::GatewayLink), ServiceError> {
    let gateway = state.gateway.fetch_payment_link(link_id).await?;
    let link = links::adopt_gateway_link(&doc, &gateway);
    if doc.payment_link.as_deref() != Some(link_id) {
        doc.payment_link = Some(link_id.to_string());
        doc.updated_at = Utc::now();
        state.store.upsert_document(&doc).await?;
    }
    Ok((link, gateway))
}

async fn on_payment(
    state: &AppState,
    entity: &LinkEntity,
    payment: Option<&PaymentEntity>,
) -> Result<WebhookOutcome, ServiceError> {
    let (link, gateway) = match locate(state, entity).await? {
        Located::Link(link) => {
            let gateway = state.gateway.fetch_payment_link(&link.id).await?;
            (link, gateway)
        }
        Located::Document(doc) => adopt(state, doc, &entity.id).await?,
        Located::Unknown => {
            warn!(link_id = %entity.id, "payment for unknown payment link ignored");
            return Ok(WebhookOutcome::Ignored);
        }
    };

    let mut link = links::apply_gateway_state(state, link, &gateway).await?;
    if let Some(payment) = payment {
        let detail = PaymentDetail {
            payment_id: payment.id.clone(),
            link_id: link.id.clone(),
            amount: from_minor_units(payment.amount),
            currency: payment.currency.clone().unwrap_or_else(|| link.currency.clone()),
            status: payment.status.clone().unwrap_or_else(|| "captured".to_string()),
            method: payment.method.clone(),
            customer: link.customer.clone(),
            reference_kind: link.reference_kind,
            reference_name: link.reference_name.clone(),
            created_at: payment
                .created_at
                .and_then(|s| Utc.timestamp_opt(s, 0).single())
                .unwrap_or_else(Utc::now),
        };
        state.store.upsert_payment_detail(&detail).await?;
        if link.gateway_payment_id.as_deref() != Some(payment.id.as_str()) {
            link.gateway_payment_id = Some(payment.id.clone());
            state.store.upsert_payment_link(&link).await?;
            links::mirror_onto_document(state, &link).await?;
        }
    }

    let doc = state.store.get_document(link.reference_kind, &link.reference_name).await?;
    if link.status == LinkStatus::Paid {
        if let (Some(doc), Some(payment_id)) = (&doc, link.gateway_payment_id.clone()) {
            let now = Utc::now();
            let draft = PaymentEntry {
                name: new_entry_name(),
                reference_no: payment_id,
                party: doc.customer.clone(),
                paid_amount: normalize_scale(&doc.grand_total),
                currency: doc.currency.clone(),
                posting_date: now.date_naive(),
                reference_kind: Some(doc.kind),
                reference_name: Some(doc.name.clone()),
                mode_of_payment: MODE_OF_PAYMENT.to_string(),
                submitted: true,
                settlement_payment: None,
                created_at: now,
            };
            ensure_payment_entry(state, draft).await?;
        }
    }

    let amount = payment.map(|p| from_minor_units(p.amount)).unwrap_or_else(|| link.amount_paid.clone());
    let text = templates::payment_received_text(
        &link.customer,
        &link.currency,
        &amount,
        &link.id,
        doc.as_ref().map(|d| (d.kind, d.name.as_str())),
    );
    if let Err(err) = state.notifier.post(CliqChannel::Accounts, &CliqMessage::text(text)).await {
        warn!(link_id = %link.id, error = %err, "payment notification not delivered");
    }
    info!(link_id = %link.id, status = link.status.as_str(), "payment webhook processed");
    Ok(WebhookOutcome::Processed)
}

async fn on_closed(state: &AppState, entity: &LinkEntity, status: LinkStatus) -> Result<WebhookOutcome, ServiceError> {
    match locate(state, entity).await? {
        Located::Link(mut link) => {
            link.status = status;
            link.updated_at = Utc::now();
            state.store.upsert_payment_link(&link).await?;
            links::mirror_onto_document(state, &link).await?;
        }
        Located::Document(mut doc) => {
            doc.payment_status = Some(status);
            doc.updated_at = Utc::now();
            state.store.upsert_document(&doc).await?;
        }
        Located::Unknown => {
            warn!(link_id = %entity.id, status = status.as_str(), "status change for unknown payment link ignored");
            return Ok(WebhookOutcome::Ignored);
        }
    }
    info!(link_id = %entity.id, status = status.as_str(), "payment link closed");
    Ok(WebhookOutcome::Processed)
}
