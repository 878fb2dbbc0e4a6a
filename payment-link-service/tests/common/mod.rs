#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, Response};
use bigdecimal::BigDecimal;
use chrono::Utc;
use common_crypto::{hash_api_key, sign_hex, SecretString};
use common_observability::LinkMetrics;
use httpmock::MockServer;
use payment_link_service::cliq::CliqChannel;
use payment_link_service::gateway::LinkStatus;
use payment_link_service::store::{DocumentKind, PaymentLink, PaymentProgress, SalesDocument};
use payment_link_service::{
    AppState, CliqClient, CliqConfig, MemoryStore, RazorpayClient, RazorpayCredentials, ServiceConfig,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

pub const ADMIN_KEY: &str = "test-admin-key";
pub const WEBHOOK_SECRET: &str = "whsec_test";

pub struct Harness {
    pub state: AppState,
    pub store: MemoryStore,
    pub gateway: MockServer,
    pub cliq: MockServer,
}

pub fn config(gateway_url: &str, cliq_url: &str) -> ServiceConfig {
    ServiceConfig {
        razorpay: RazorpayCredentials {
            key_id: "rzp_test_key".into(),
            key_secret: SecretString::new("rzp_test_secret"),
            sandbox: true,
        },
        razorpay_api_base: gateway_url.to_string(),
        webhook_secret: Some(SecretString::new(WEBHOOK_SECRET)),
        allow_partial_payments: true,
        default_expiry_days: 30,
        virtual_account_prefix: "VA-".into(),
        cliq: CliqConfig {
            enabled: true,
            base_url: cliq_url.to_string(),
            bot_unique_name: Some("paybot".into()),
            bot_token: Some(SecretString::new("tok123")),
            channels: HashMap::from([
                (CliqChannel::Sales, "salesteam".to_string()),
                (CliqChannel::Accounts, "accountsteam".to_string()),
                (CliqChannel::Project, "projectteam".to_string()),
                (CliqChannel::Purchase, "purchaseteam".to_string()),
                (CliqChannel::Notification, "notifyteam".to_string()),
            ]),
        },
        site_url: "https://erp.example.com".into(),
        admin_key_hashes: vec![hash_api_key(ADMIN_KEY)],
        database_url: None,
        host: "127.0.0.1".into(),
        port: 0,
        link_sync_interval_secs: None,
    }
}

pub async fn harness() -> Harness {
    harness_with(|_| {}).await
}

pub async fn harness_with(tweak: impl FnOnce(&mut ServiceConfig)) -> Harness {
    let gateway = MockServer::start_async().await;
    let cliq = MockServer::start_async().await;
    let mut cfg = config(&gateway.base_url(), &cliq.base_url());
    tweak(&mut cfg);

    let metrics = LinkMetrics::new();
    let http = reqwest::Client::new();
    let store = MemoryStore::new();
    let razorpay = RazorpayClient::new(http.clone(), &cfg.razorpay_api_base, &cfg.razorpay, metrics.clone());
    let notifier = CliqClient::new(http, cfg.cliq.clone(), metrics.clone());
    let state = AppState {
        config: Arc::new(cfg),
        gateway: Arc::new(razorpay),
        store: Arc::new(store.clone()),
        notifier: Arc::new(notifier),
        metrics: Arc::new(metrics),
    };
    Harness { state, store, gateway, cliq }
}

pub fn channel_path(unique_name: &str) -> String {
    format!("/api/v2/channelsbyname/{unique_name}/message")
}

pub fn money(raw: &str) -> BigDecimal {
    BigDecimal::from_str(raw).unwrap()
}

pub fn quotation(name: &str, total: &str) -> SalesDocument {
    SalesDocument {
        kind: DocumentKind::Quotation,
        name: name.to_string(),
        customer: "CUST-0001".into(),
        customer_name: Some("Acme Interiors".into()),
        contact_email: Some("buyer@acme.test".into()),
        contact_mobile: Some("".into()),
        grand_total: money(total),
        currency: "INR".into(),
        valid_till: None,
        amended_from: None,
        payment_link: None,
        payment_url: None,
        link_expiry: None,
        payment_status: None,
        gateway_payment_id: None,
        updated_at: Utc::now(),
    }
}

/// A quotation already carrying `link_id`, plus its stored link record.
pub fn linked_quotation(name: &str, total: &str, link_id: &str) -> (SalesDocument, PaymentLink) {
    let mut doc = quotation(name, total);
    doc.payment_link = Some(link_id.to_string());
    doc.payment_url = Some(short_url(link_id));
    doc.payment_status = Some(LinkStatus::Created);
    let now = Utc::now();
    let link = PaymentLink {
        id: link_id.to_string(),
        short_url: short_url(link_id),
        status: LinkStatus::Created,
        progress: PaymentProgress::Pending,
        amount: money(total).with_scale(2),
        amount_paid: money("0.00"),
        remaining_amount: money(total).with_scale(2),
        currency: "INR".into(),
        expire_by: None,
        reference_kind: DocumentKind::Quotation,
        reference_name: name.to_string(),
        customer: "Acme Interiors".into(),
        gateway_payment_id: None,
        created_at: now,
        updated_at: now,
    };
    (doc, link)
}

pub fn short_url(link_id: &str) -> String {
    format!("https://rzp.io/i/{link_id}")
}

pub fn link_json(id: &str, status: &str, amount: i64, paid: i64, payments: Value) -> Value {
    json!({
        "id": id,
        "short_url": short_url(id),
        "status": status,
        "amount": amount,
        "amount_paid": paid,
        "currency": "INR",
        "expire_by": Utc::now().timestamp() + 86_400,
        "reference_id": "ref",
        "payments": payments,
        "notes": {"quotation_id": "QTN-1"},
        "created_at": Utc::now().timestamp()
    })
}

pub fn payment_json(id: &str, amount: i64, status: &str) -> Value {
    json!({
        "id": id,
        "amount": amount,
        "currency": "INR",
        "status": status,
        "method": "upi",
        "email": "buyer@acme.test",
        "contact": "+919999999999",
        "notes": {"quotation_id": "QTN-1", "customer": "Acme Interiors"},
        "created_at": Utc::now().timestamp()
    })
}

pub fn sign(body: &[u8]) -> String {
    sign_hex(WEBHOOK_SECRET.as_bytes(), body).unwrap()
}

pub fn admin_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri).header("X-API-Key", ADMIN_KEY);
    match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn webhook_request(body: &Value, event_id: Option<&str>) -> Request<Body> {
    let raw = body.to_string();
    let mut builder = Request::builder()
        .method("POST")
        .uri("/webhooks/razorpay")
        .header("content-type", "application/json")
        .header("X-Razorpay-Signature", sign(raw.as_bytes()));
    if let Some(id) = event_id {
        builder = builder.header("X-Razorpay-Event-Id", id);
    }
    builder.body(Body::from(raw)).unwrap()
}

pub async fn body_json(resp: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(resp: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn error_code(resp: &Response<Body>) -> String {
    resp.headers()
        .get("X-Error-Code")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}
