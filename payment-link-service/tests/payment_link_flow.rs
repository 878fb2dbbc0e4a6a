mod common;

use axum::http::StatusCode;
use chrono::NaiveDate;
use common::*;
use httpmock::Method::{GET, POST};
use payment_link_service::gateway::LinkStatus;
use payment_link_service::store::DocumentKind;
use payment_link_service::{build_router, links, DocumentStore};
use serde_json::json;
use tower::ServiceExt;

#[tokio::test]
async fn submit_creates_link_and_announces_card() {
    let h = harness().await;
    let create = h
        .gateway
        .mock_async(|when, then| {
            when.method(POST)
                .path("/payment_links")
                .json_body_partial(r#"{"amount":150000,"currency":"INR","reminder_enable":true,"notes":{"quotation_id":"QTN-1","is_revision":"false"}}"#);
            then.status(200).json_body(link_json("plink_1", "created", 150000, 0, json!(null)));
        })
        .await;
    let card = h
        .cliq
        .mock_async(|when, then| {
            when.method(POST)
                .path(channel_path("salesteam"))
                .query_param("bot_unique_name", "paybot")
                .query_param("zapikey", "tok123")
                .body_contains("NEW QUOTE");
            then.status(200).json_body(json!({}));
        })
        .await;

    let doc = serde_json::to_value(quotation("QTN-1", "1500")).unwrap();
    let resp = build_router(h.state.clone())
        .oneshot(admin_request("POST", "/hooks/documents/submit", Some(doc)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["result"], "created");
    assert_eq!(body["link"]["id"], "plink_1");

    create.assert_async().await;
    card.assert_async().await;
    let stored = h.store.get_document(DocumentKind::Quotation, "QTN-1").await.unwrap().unwrap();
    assert_eq!(stored.payment_link.as_deref(), Some("plink_1"));
    assert_eq!(stored.payment_url.as_deref(), Some("https://rzp.io/i/plink_1"));
    assert_eq!(stored.payment_status, Some(LinkStatus::Created));
    assert!(stored.link_expiry.is_some());
    assert!(h.store.get_payment_link("plink_1").await.unwrap().is_some());
}

#[tokio::test]
async fn zero_total_document_is_skipped() {
    let h = harness().await;
    let create = h
        .gateway
        .mock_async(|when, then| {
            when.method(POST).path("/payment_links");
            then.status(200).json_body(link_json("plink_x", "created", 0, 0, json!(null)));
        })
        .await;

    let doc = serde_json::to_value(quotation("QTN-0", "0")).unwrap();
    let resp = build_router(h.state.clone())
        .oneshot(admin_request("POST", "/hooks/documents/submit", Some(doc)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["result"], "skipped");
    create.assert_hits_async(0).await;
    let stored = h.store.get_document(DocumentKind::Quotation, "QTN-0").await.unwrap().unwrap();
    assert!(stored.payment_link.is_none());
}

#[tokio::test]
async fn gateway_rejection_reports_failure_to_sales() {
    let h = harness().await;
    h.gateway
        .mock_async(|when, then| {
            when.method(POST).path("/payment_links");
            then.status(400)
                .json_body(json!({"error": {"code": "BAD_REQUEST_ERROR", "description": "customer contact invalid"}}));
        })
        .await;
    let failure = h
        .cliq
        .mock_async(|when, then| {
            when.method(POST)
                .path(channel_path("salesteam"))
                .body_contains("Payment Link generation failed for Quotation *QTN-2*");
            then.status(204);
        })
        .await;

    let outcome = payment_link_service::hooks::on_submit(&h.state, quotation("QTN-2", "99.50")).await.unwrap();
    assert_eq!(outcome.result, payment_link_service::hooks::HookResult::Failed);
    assert!(outcome.error.unwrap().contains("customer contact invalid"));
    failure.assert_async().await;
}

#[tokio::test]
async fn amend_cancels_previous_link_and_links_revision() {
    let h = harness().await;
    let (original, old_link) = linked_quotation("QTN-5", "800", "plink_old");
    h.store.upsert_document(&original).await.unwrap();
    h.store.upsert_payment_link(&old_link).await.unwrap();

    let cancel = h
        .gateway
        .mock_async(|when, then| {
            when.method(POST).path("/payment_links/plink_old/cancel");
            then.status(200).json_body(link_json("plink_old", "cancelled", 80000, 0, json!(null)));
        })
        .await;
    let create = h
        .gateway
        .mock_async(|when, then| {
            when.method(POST)
                .path("/payment_links")
                .json_body_partial(r#"{"notes":{"is_revision":"true","original_quote":"QTN-5"}}"#)
                .body_contains("Payment for Quotation QTN-5-1 (Revised)");
            then.status(200).json_body(link_json("plink_new", "created", 90000, 0, json!(null)));
        })
        .await;
    let card = h
        .cliq
        .mock_async(|when, then| {
            when.method(POST).path(channel_path("salesteam")).body_contains("QUOTE UPDATED");
            then.status(200);
        })
        .await;

    let mut revision = quotation("QTN-5-1", "900");
    revision.amended_from = Some("QTN-5".into());
    let resp = build_router(h.state.clone())
        .oneshot(admin_request(
            "POST",
            "/hooks/documents/amend",
            Some(serde_json::to_value(&revision).unwrap()),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["link"]["id"], "plink_new");

    cancel.assert_async().await;
    create.assert_async().await;
    card.assert_async().await;
    let old = h.store.get_payment_link("plink_old").await.unwrap().unwrap();
    assert_eq!(old.status, LinkStatus::Cancelled);
    let previous = h.store.get_document(DocumentKind::Quotation, "QTN-5").await.unwrap().unwrap();
    assert_eq!(previous.payment_status, Some(LinkStatus::Cancelled));
}

#[tokio::test]
async fn amend_without_original_is_rejected() {
    let h = harness().await;
    let resp = build_router(h.state.clone())
        .oneshot(admin_request(
            "POST",
            "/hooks/documents/amend",
            Some(serde_json::to_value(quotation("QTN-9", "10")).unwrap()),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&resp), "missing_amended_from");
}

#[tokio::test]
async fn explicit_creation_passes_partial_options() {
    let h = harness().await;
    h.store.upsert_document(&quotation("QTN-3", "2000")).await.unwrap();
    let create = h
        .gateway
        .mock_async(|when, then| {
            when.method(POST)
                .path("/payment_links")
                .json_body_partial(r#"{"accept_partial":true,"first_min_partial_amount":50000,"upi_link":true}"#);
            then.status(200).json_body(link_json("plink_3", "created", 200000, 0, json!(null)));
        })
        .await;

    let resp = build_router(h.state.clone())
        .oneshot(admin_request(
            "POST",
            "/documents/quotation/QTN-3/payment-link",
            Some(json!({"accept_partial": true, "first_min_partial_amount": "500", "upi_link": true})),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    create.assert_async().await;
}

#[tokio::test]
async fn validity_in_past_is_rejected_before_gateway_call() {
    let h = harness().await;
    let mut doc = quotation("QTN-4", "100");
    doc.valid_till = NaiveDate::from_ymd_opt(2020, 1, 31);
    h.store.upsert_document(&doc).await.unwrap();
    let create = h
        .gateway
        .mock_async(|when, then| {
            when.method(POST).path("/payment_links");
            then.status(200).json_body(link_json("plink_4", "created", 10000, 0, json!(null)));
        })
        .await;

    let resp = build_router(h.state.clone())
        .oneshot(admin_request("POST", "/documents/quotation/QTN-4/payment-link", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&resp), "validity_in_past");
    create.assert_hits_async(0).await;
}

#[tokio::test]
async fn unknown_document_kind_is_rejected() {
    let h = harness().await;
    let resp = build_router(h.state.clone())
        .oneshot(admin_request("POST", "/documents/invoice/INV-1/payment-link", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(error_code(&resp), "unknown_document_kind");
}

#[tokio::test]
async fn ensure_reuses_active_link() {
    let h = harness().await;
    let (doc, link) = linked_quotation("QTN-6", "500", "plink_6");
    h.store.upsert_document(&doc).await.unwrap();
    h.store.upsert_payment_link(&link).await.unwrap();
    let create = h
        .gateway
        .mock_async(|when, then| {
            when.method(POST).path("/payment_links");
            then.status(200).json_body(link_json("plink_other", "created", 50000, 0, json!(null)));
        })
        .await;

    let resp = build_router(h.state.clone())
        .oneshot(admin_request("GET", "/documents/quotation/QTN-6/payment-link", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["created"], false);
    assert_eq!(body["link"]["id"], "plink_6");
    create.assert_hits_async(0).await;
}

#[tokio::test]
async fn sync_applies_partial_payment() {
    let h = harness().await;
    let (doc, link) = linked_quotation("QTN-7", "1500", "plink_7");
    h.store.upsert_document(&doc).await.unwrap();
    h.store.upsert_payment_link(&link).await.unwrap();
    h.gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payment_links/plink_7");
            then.status(200).json_body(link_json(
                "plink_7",
                "partially_paid",
                150000,
                50000,
                json!([{"payment_id": "pay_71", "amount": 50000, "method": "upi", "status": "captured", "created_at": 1_760_000_000}]),
            ));
        })
        .await;
    h.gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payments/pay_71");
            then.status(200).json_body(payment_json("pay_71", 50000, "captured"));
        })
        .await;

    let app = build_router(h.state.clone());
    let resp = app
        .clone()
        .oneshot(admin_request("POST", "/payment-links/plink_7/sync", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["status"], "partially_paid");
    assert_eq!(body["progress"], "partially_paid");
    assert_eq!(body["gateway_payment_id"], "pay_71");
    let remaining: bigdecimal::BigDecimal = serde_json::from_value(body["remaining_amount"].clone()).unwrap();
    assert_eq!(remaining, money("1000"));

    let stored = h.store.get_document(DocumentKind::Quotation, "QTN-7").await.unwrap().unwrap();
    assert_eq!(stored.payment_status, Some(LinkStatus::PartiallyPaid));
    assert_eq!(stored.gateway_payment_id.as_deref(), Some("pay_71"));

    let resp = app
        .oneshot(admin_request("GET", "/payment-links/plink_7/payments", None))
        .await
        .unwrap();
    let summary = body_json(resp).await;
    assert_eq!(summary["total_payments"], 1);
    let paid: bigdecimal::BigDecimal = serde_json::from_value(summary["total_paid"].clone()).unwrap();
    assert_eq!(paid, money("500"));
}

#[tokio::test]
async fn sync_all_collects_failures() {
    let h = harness().await;
    for (name, id) in [("QTN-10", "plink_ok"), ("QTN-11", "plink_gone")] {
        let (doc, link) = linked_quotation(name, "100", id);
        h.store.upsert_document(&doc).await.unwrap();
        h.store.upsert_payment_link(&link).await.unwrap();
    }
    h.gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payment_links/plink_ok");
            then.status(200).json_body(link_json("plink_ok", "created", 10000, 0, json!([])));
        })
        .await;
    h.gateway
        .mock_async(|when, then| {
            when.method(GET).path("/payment_links/plink_gone");
            then.status(400)
                .json_body(json!({"error": {"code": "BAD_REQUEST_ERROR", "description": "The id provided does not exist"}}));
        })
        .await;

    let report = links::sync_all(&h.state).await.unwrap();
    assert_eq!(report.total, 2);
    assert_eq!(report.synced.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].link_id, "plink_gone");
}

#[tokio::test]
async fn cancel_marks_link_and_document() {
    let h = harness().await;
    let (doc, link) = linked_quotation("QTN-12", "300", "plink_12");
    h.store.upsert_document(&doc).await.unwrap();
    h.store.upsert_payment_link(&link).await.unwrap();
    h.gateway
        .mock_async(|when, then| {
            when.method(POST).path("/payment_links/plink_12/cancel");
            then.status(200).json_body(link_json("plink_12", "cancelled", 30000, 0, json!(null)));
        })
        .await;

    let resp = build_router(h.state.clone())
        .oneshot(admin_request("POST", "/payment-links/plink_12/cancel", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["status"], "cancelled");
    let stored = h.store.get_document(DocumentKind::Quotation, "QTN-12").await.unwrap().unwrap();
    assert_eq!(stored.payment_status, Some(LinkStatus::Cancelled));
}

#[tokio::test]
async fn missing_link_is_404() {
    let h = harness().await;
    let resp = build_router(h.state.clone())
        .oneshot(admin_request("GET", "/payment-links/plink_nope", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(&resp), "payment_link_not_found");
}
