mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::*;
use httpmock::Method::{GET, POST};
use payment_link_service::gateway::LinkStatus;
use payment_link_service::store::{DocumentKind, PaymentProgress, ReconciliationStatus, SettlementPaymentEntry};
use payment_link_service::{build_router, DocumentStore};
use serde_json::{json, Value};
use tower::ServiceExt;

fn paid_event(link_id: &str, payment_id: &str, amount: i64) -> Value {
    json!({
        "event": "payment_link.paid",
        "payload": {
            "payment_link": {"entity": {"id": link_id, "short_url": short_url(link_id), "status": "paid"}},
            "payment": {"entity": {
                "id": payment_id,
                "amount": amount,
                "currency": "INR",
                "status": "captured",
                "method": "upi",
                "created_at": 1_760_000_100
            }}
        }
    })
}

fn paid_link(link_id: &str, payment_id: &str, amount: i64) -> Value {
    link_json(
        link_id,
        "paid",
        amount,
        amount,
        json!([{"payment_id": payment_id, "amount": amount, "method": "upi", "status": "captured", "created_at": 1_760_000_100}]),
    )
}

#[tokio::test]
async fn missing_secret_is_server_error() {
    let h = harness_with(|cfg| cfg.webhook_secret = None).await;
    let resp = build_router(h.state.clone())
        .oneshot(webhook_request(&json!({"event": "payment_link.paid"}), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(&resp), "secret_missing");
}

#[tokio::test]
async fn missing_signature_is_bad_request() {
    let h = harness().await;
    let req = Request::builder()
        .method("POST")
        .uri("/webhooks/razorpay")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"event":"payment_link.paid"}"#))
        .unwrap();
    let resp = build_router(h.state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&resp), "sig_missing");
}

#[tokio::test]
async fn tampered_body_is_forbidden() {
    let h = harness().await;
    let signed = r#"{"event":"payment_link.paid"}"#;
    let req = Request::builder()
        .method("POST")
        .uri("/webhooks/razorpay")
        .header("X-Razorpay-Signature", sign(signed.as_bytes()))
        .body(Body::from(r#"{"event":"payment_link.cancelled"}"#))
        .unwrap();
    let resp = build_router(h.state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(&resp), "sig_mismatch");
}

#[tokio::test]
async fn signed_garbage_is_malformed() {
    let h = harness().await;
    let raw = "not json";
    let req = Request::builder()
        .method("POST")
        .uri("/webhooks/razorpay")
        .header("X-Razorpay-Signature", sign(raw.as_bytes()))
        .body(Body::from(raw))
        .unwrap();
    let resp = build_router(h.state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&resp), "malformed");
}

#[tokio::test]
async fn unrelated_event_is_acknowledged() {
    let h = harness().await;
    let event = json!({"event": "payment.captured", "payload": {"payment": {"entity": {"id": "pay_1", "amount": 100}}}});
    let resp = build_router(h.state.clone()).oneshot(webhook_request(&event, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_text(resp).await, "OK");
}

#[tokio::test]
async fn paid_event_books_one_payment_entry() {
    let h = harness().await;
    let (doc, link) = linked_quotation("QTN-20", "1500", "plink_20");
    h.store.upsert_document(&doc).await.unwrap();
    h.store.upsert_payment_link(&link).await.unwrap();
    let fetch = h
        .gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payment_links/plink_20");
            then.status(200).json_body(paid_link("plink_20", "pay_20", 150000));
        })
        .await;
    h.gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payments/pay_20");
            then.status(200).json_body(payment_json("pay_20", 150000, "captured"));
        })
        .await;
    let notice = h
        .cliq
        .mock_async(|when, then| {
            when.method(POST)
                .path(channel_path("accountsteam"))
                .body_contains("Payment received for Acme Interiors")
                .body_contains("Quotation: QTN-20");
            then.status(200);
        })
        .await;

    let app = build_router(h.state.clone());
    let event = paid_event("plink_20", "pay_20", 150000);
    let resp = app.clone().oneshot(webhook_request(&event, Some("evt_20"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // same event id: acknowledged without reprocessing
    let resp = app.clone().oneshot(webhook_request(&event, Some("evt_20"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    fetch.assert_hits_async(1).await;
    notice.assert_hits_async(1).await;

    // a fresh delivery id for the same payment does not double-book
    let resp = app.oneshot(webhook_request(&event, Some("evt_20b"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let entries = h.store.list_payment_entries("pay_20").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].party, "CUST-0001");
    assert_eq!(entries[0].paid_amount, money("1500"));
    assert_eq!(entries[0].reference_kind, Some(DocumentKind::Quotation));
    assert_eq!(entries[0].reference_name.as_deref(), Some("QTN-20"));
    assert!(entries[0].submitted);

    let stored = h.store.get_document(DocumentKind::Quotation, "QTN-20").await.unwrap().unwrap();
    assert_eq!(stored.payment_status, Some(LinkStatus::Paid));
    assert_eq!(stored.gateway_payment_id.as_deref(), Some("pay_20"));
    let details = h.store.list_payment_details("plink_20").await.unwrap();
    assert_eq!(details.len(), 1);
}

#[tokio::test]
async fn payment_for_link_known_only_by_url_is_adopted() {
    let h = harness().await;
    let mut doc = quotation("QTN-21", "700");
    doc.payment_url = Some(short_url("plink_21"));
    h.store.upsert_document(&doc).await.unwrap();
    h.gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payment_links/plink_21");
            then.status(200).json_body(paid_link("plink_21", "pay_21", 70000));
        })
        .await;
    h.gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payments/pay_21");
            then.status(200).json_body(payment_json("pay_21", 70000, "captured"));
        })
        .await;

    let resp = build_router(h.state.clone())
        .oneshot(webhook_request(&paid_event("plink_21", "pay_21", 70000), Some("evt_21")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let link = h.store.get_payment_link("plink_21").await.unwrap().unwrap();
    assert_eq!(link.status, LinkStatus::Paid);
    assert_eq!(link.reference_name, "QTN-21");
    let stored = h.store.get_document(DocumentKind::Quotation, "QTN-21").await.unwrap().unwrap();
    assert_eq!(stored.payment_link.as_deref(), Some("plink_21"));
    assert_eq!(stored.payment_status, Some(LinkStatus::Paid));
    assert_eq!(h.store.list_payment_entries("pay_21").await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_link_is_ignored() {
    let h = harness().await;
    let fetch = h
        .gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payment_links/plink_ghost");
            then.status(200).json_body(paid_link("plink_ghost", "pay_g", 100));
        })
        .await;
    let resp = build_router(h.state.clone())
        .oneshot(webhook_request(&paid_event("plink_ghost", "pay_g", 100), Some("evt_g")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    fetch.assert_hits_async(0).await;
    assert!(h.store.list_payment_entries("pay_g").await.unwrap().is_empty());
}

#[tokio::test]
async fn cancelled_event_marks_link_and_document() {
    let h = harness().await;
    let (doc, link) = linked_quotation("QTN-22", "250", "plink_22");
    h.store.upsert_document(&doc).await.unwrap();
    h.store.upsert_payment_link(&link).await.unwrap();
    let event = json!({
        "event": "payment_link.cancelled",
        "payload": {"payment_link": {"entity": {"id": "plink_22", "short_url": short_url("plink_22"), "status": "cancelled"}}}
    });

    let resp = build_router(h.state.clone()).oneshot(webhook_request(&event, Some("evt_22"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let link = h.store.get_payment_link("plink_22").await.unwrap().unwrap();
    assert_eq!(link.status, LinkStatus::Cancelled);
    let stored = h.store.get_document(DocumentKind::Quotation, "QTN-22").await.unwrap().unwrap();
    assert_eq!(stored.payment_status, Some(LinkStatus::Cancelled));
}

#[tokio::test]
async fn expired_event_for_document_only_updates_status() {
    let h = harness().await;
    let mut doc = quotation("QTN-23", "250");
    doc.payment_url = Some(short_url("plink_23"));
    h.store.upsert_document(&doc).await.unwrap();
    let event = json!({
        "event": "payment_link.expired",
        "payload": {"payment_link": {"entity": {"id": "plink_23", "short_url": short_url("plink_23"), "status": "expired"}}}
    });

    let resp = build_router(h.state.clone()).oneshot(webhook_request(&event, None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let stored = h.store.get_document(DocumentKind::Quotation, "QTN-23").await.unwrap().unwrap();
    assert_eq!(stored.payment_status, Some(LinkStatus::Expired));
}

#[tokio::test]
async fn failed_processing_releases_event_for_redelivery() {
    let h = harness().await;
    let (doc, link) = linked_quotation("QTN-24", "400", "plink_24");
    h.store.upsert_document(&doc).await.unwrap();
    h.store.upsert_payment_link(&link).await.unwrap();
    let broken = h
        .gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payment_links/plink_24");
            then.status(500).json_body(json!({"error": {"code": "SERVER_ERROR", "description": "try later"}}));
        })
        .await;

    let app = build_router(h.state.clone());
    let event = paid_event("plink_24", "pay_24", 40000);
    let resp = app.clone().oneshot(webhook_request(&event, Some("evt_24"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_code(&resp), "processing_error");
    assert!(body_text(resp).await.starts_with("Webhook processing error:"));

    broken.delete_async().await;
    h.gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payment_links/plink_24");
            then.status(200).json_body(paid_link("plink_24", "pay_24", 40000));
        })
        .await;
    h.gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payments/pay_24");
            then.status(200).json_body(payment_json("pay_24", 40000, "captured"));
        })
        .await;

    let resp = app.oneshot(webhook_request(&event, Some("evt_24"))).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(h.store.list_payment_entries("pay_24").await.unwrap().len(), 1);
}

fn partial_event(link_id: &str, payment_id: &str, amount: i64) -> Value {
    let mut event = paid_event(link_id, payment_id, amount);
    event["event"] = json!("payment_link.partially_paid");
    event["payload"]["payment_link"]["entity"]["status"] = json!("partially_paid");
    event
}

#[tokio::test]
async fn partial_then_full_payment_books_one_receipt() {
    let h = harness().await;
    let (doc, link) = linked_quotation("QTN-25", "1500", "plink_25");
    h.store.upsert_document(&doc).await.unwrap();
    h.store.upsert_payment_link(&link).await.unwrap();
    for (id, created_at) in [("pay_25a", 1_760_000_100), ("pay_25b", 1_760_000_200)] {
        let mut payment = payment_json(id, 75000, "captured");
        payment["created_at"] = json!(created_at);
        h.gateway
            .mock_async(|when, then| {
                when.method(GET).path(format!("/payments/{id}"));
                then.status(200).json_body(payment);
            })
            .await;
    }
    let first_payment = json!({"payment_id": "pay_25a", "amount": 75000, "method": "upi", "status": "captured", "created_at": 1_760_000_100});
    let partial = h
        .gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payment_links/plink_25");
            then.status(200)
                .json_body(link_json("plink_25", "partially_paid", 150000, 75000, json!([first_payment.clone()])));
        })
        .await;

    let app = build_router(h.state.clone());
    let resp = app
        .clone()
        .oneshot(webhook_request(&partial_event("plink_25", "pay_25a", 75000), Some("evt_25a")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let stored = h.store.get_payment_link("plink_25").await.unwrap().unwrap();
    assert_eq!(stored.status, LinkStatus::PartiallyPaid);
    assert_eq!(stored.progress, PaymentProgress::PartiallyPaid);
    assert_eq!(stored.amount_paid.to_string(), "750.00");
    assert_eq!(stored.remaining_amount.to_string(), "750.00");
    assert!(h.store.list_payment_entries("pay_25a").await.unwrap().is_empty());
    let quote = h.store.get_document(DocumentKind::Quotation, "QTN-25").await.unwrap().unwrap();
    assert_eq!(quote.payment_status, Some(LinkStatus::PartiallyPaid));

    partial.delete_async().await;
    h.gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payment_links/plink_25");
            then.status(200).json_body(link_json(
                "plink_25",
                "paid",
                150000,
                150000,
                json!([
                    first_payment,
                    {"payment_id": "pay_25b", "amount": 75000, "method": "upi", "status": "captured", "created_at": 1_760_000_200}
                ]),
            ));
        })
        .await;

    let resp = app
        .oneshot(webhook_request(&paid_event("plink_25", "pay_25b", 75000), Some("evt_25b")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let stored = h.store.get_payment_link("plink_25").await.unwrap().unwrap();
    assert_eq!(stored.status, LinkStatus::Paid);
    assert_eq!(stored.progress, PaymentProgress::Paid);
    assert_eq!(stored.remaining_amount.to_string(), "0.00");
    assert_eq!(stored.gateway_payment_id.as_deref(), Some("pay_25b"));
    assert_eq!(h.store.list_payment_details("plink_25").await.unwrap().len(), 2);

    assert!(h.store.list_payment_entries("pay_25a").await.unwrap().is_empty());
    let entries = h.store.list_payment_entries("pay_25b").await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].paid_amount.to_string(), "1500.00");
    assert_eq!(entries[0].reference_name.as_deref(), Some("QTN-25"));
}

#[tokio::test]
async fn sales_order_payment_is_booked_once_across_webhook_and_settlement() {
    let h = harness().await;
    let create = h
        .gateway
        .mock_async(|when, then| {
            when.method(POST)
                .path("/payment_links")
                .json_body_partial(r#"{"amount":150000,"notes":{"sales_order_id":"SO-1","is_revision":"false"}}"#);
            then.status(200).json_body(link_json("plink_so", "created", 150000, 0, json!(null)));
        })
        .await;
    let card = h
        .cliq
        .mock_async(|when, then| {
            when.method(POST).path(channel_path("salesteam")).body_contains("NEW SALES ORDER");
            then.status(200).json_body(json!({}));
        })
        .await;
    let mut so_payment = payment_json("pay_so", 150000, "captured");
    so_payment["notes"] = json!({"sales_order_id": "SO-1", "customer": "Acme Interiors"});
    let payment_fetch = h
        .gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payments/pay_so");
            then.status(200).json_body(so_payment);
        })
        .await;
    h.gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payment_links/plink_so");
            then.status(200).json_body(paid_link("plink_so", "pay_so", 150000));
        })
        .await;

    let mut order = quotation("SO-1", "1500");
    order.kind = DocumentKind::SalesOrder;
    let app = build_router(h.state.clone());
    let resp = app
        .clone()
        .oneshot(admin_request("POST", "/hooks/documents/submit", Some(serde_json::to_value(&order).unwrap())))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["result"], "created");
    create.assert_async().await;
    card.assert_async().await;
    let link = h.store.get_payment_link("plink_so").await.unwrap().unwrap();
    assert_eq!(link.reference_kind, DocumentKind::SalesOrder);
    assert_eq!(link.reference_name, "SO-1");

    let resp = app
        .clone()
        .oneshot(webhook_request(&paid_event("plink_so", "pay_so", 150000), Some("evt_so")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let booked = h.store.list_payment_entries("pay_so").await.unwrap();
    assert_eq!(booked.len(), 1);
    assert_eq!(booked[0].reference_kind, Some(DocumentKind::SalesOrder));
    assert_eq!(booked[0].reference_name.as_deref(), Some("SO-1"));
    assert_eq!(booked[0].paid_amount.to_string(), "1500.00");

    h.store
        .upsert_settlement_payment(&SettlementPaymentEntry {
            entity_id: "pay_so".into(),
            settlement_id: Some("setl_so".into()),
            entity_type: "payment".into(),
            amount: money("1500"),
            fee: money("30"),
            tax: money("5.40"),
            currency: "INR".into(),
            method: Some("upi".into()),
            description: None,
            email: None,
            contact: None,
            quotation: None,
            customer: None,
            reconciliation_status: ReconciliationStatus::Pending,
            payment_entry: None,
            reconciled_at: None,
            reconciled_by: None,
        })
        .await
        .unwrap();
    let resp = app
        .oneshot(admin_request("POST", "/settlement-payments/pay_so/payment-entry", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(body_json(resp).await["name"], booked[0].name.as_str());
    payment_fetch.assert_hits_async(2).await;

    let entries = h.store.list_payment_entries("pay_so").await.unwrap();
    assert_eq!(entries.len(), 1);
    let settled = h.store.get_settlement_payment("pay_so").await.unwrap().unwrap();
    assert_eq!(settled.payment_entry.as_deref(), Some(booked[0].name.as_str()));
    assert_eq!(settled.quotation.as_deref(), Some("SO-1"));
}
