use common_http_errors::{http_error_metrics_layer, ApiError, MAX_ERROR_CODES};
use axum::{Router, routing::get, http::StatusCode};
use axum::middleware;
use std::sync::atomic::{AtomicUsize, Ordering};
use once_cell::sync::Lazy;
use tower::ServiceExt;

static NEXT_CODE: Lazy<AtomicUsize> = Lazy::new(|| AtomicUsize::new(0));

async fn rotating_error() -> Result<&'static str, ApiError> {
    let n = NEXT_CODE.fetch_add(1, Ordering::Relaxed);
    let code = format!("link_code_{n}");
    Err(ApiError::BadRequest { code: Box::leak(code.into_boxed_str()), trace_id: None, message: None })
}

#[tokio::test]
async fn error_codes_past_the_guard_still_respond() {
    let app = Router::new()
        .route("/err", get(rotating_error))
        .layer(middleware::from_fn(http_error_metrics_layer("test-svc")));

    for _ in 0..(MAX_ERROR_CODES + 10) {
        let resp = app
            .clone()
            .oneshot(axum::http::Request::builder().uri("/err").body(axum::body::Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(resp.headers().get("X-Error-Code").is_some());
    }

    let families = prometheus::default_registry().gather();
    let overflow = families
        .iter()
        .find(|f| f.get_name() == "http_error_code_overflow_total")
        .expect("overflow counter registered");
    assert!(overflow.get_metric()[0].get_counter().get_value() >= 10.0);
}
