use axum::{
    extract::State,
    http::{
        header::{ACCEPT, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, StatusCode,
    },
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use common_http_errors::{http_error_metrics_layer, ApiError};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::app_state::AppState;
use crate::auth::require_api_key;
use crate::link_handlers as links;
use crate::notification_handlers::send_notification;
use crate::settlement_handlers as settlements;
use crate::webhook::razorpay_webhook;

pub const SERVICE_NAME: &str = "payment-link-service";

async fn health() -> &'static str {
    "ok"
}

async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"))],
            body,
        )
            .into_response(),
        Err(err) => ApiError::internal(err, None).into_response(),
    }
}

fn cors(site_url: &str) -> CorsLayer {
    let mut origins = ["http://localhost:8000", "http://localhost:3000"]
        .into_iter()
        .filter_map(|o| o.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    if let Ok(site) = site_url.parse::<HeaderValue>() {
        if !site_url.is_empty() {
            origins.push(site);
        }
    }
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([ACCEPT, CONTENT_TYPE, HeaderName::from_static("x-api-key")])
}

/// Full service router: public health, metrics and webhook routes, plus the
/// API-key protected admin surface.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/hooks/documents/submit", post(links::document_submitted))
        .route("/hooks/documents/amend", post(links::document_amended))
        .route("/hooks/customers", post(links::customer_saved))
        .route(
            "/documents/:kind/:name/payment-link",
            post(links::create_document_link).get(links::ensure_document_link),
        )
        .route("/documents/:kind/:name/payment-link/regenerate", post(links::regenerate_document_link))
        .route("/payment-links", get(links::list_links))
        .route("/payment-links/sync", post(links::sync_all_links))
        .route("/payment-links/:id", get(links::get_link))
        .route("/payment-links/:id/sync", post(links::sync_link))
        .route("/payment-links/:id/cancel", post(links::cancel_link))
        .route("/payment-links/:id/details", get(links::link_details))
        .route("/payment-links/:id/payments", get(links::link_payments))
        .route("/settlements", get(settlements::list_settlements).post(settlements::fetch_all_settlements))
        .route("/settlements/recon", post(settlements::run_recon))
        .route("/settlements/:id", get(settlements::fetch_settlement))
        .route("/settlements/:id/reconcile", post(settlements::reconcile_settlement))
        .route("/settlements/:id/payments", get(settlements::settlement_payments))
        .route("/settlement-payments/:payment_id/reconcile", post(settlements::reconcile_payment))
        .route("/settlement-payments/:payment_id/payment-entry", post(settlements::create_payment_entry))
        .route("/virtual-accounts", post(links::create_virtual_account))
        .route("/notifications", post(send_notification))
        .route("/reports/payment-link-status", get(links::payment_link_status_report))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics))
        .route("/webhooks/razorpay", post(razorpay_webhook))
        .merge(protected)
        .layer(middleware::from_fn(http_error_metrics_layer(SERVICE_NAME)))
        .layer(cors(&state.config.site_url))
        .with_state(state)
}
