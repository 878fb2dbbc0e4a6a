use axum::{
    extract::Request,
    http::{HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::Lazy;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts};
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub trace_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized { code: &'static str, trace_id: Option<Uuid> },
    BadRequest { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    NotFound { code: &'static str, trace_id: Option<Uuid> },
    Conflict { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    BadGateway { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    Internal { trace_id: Option<Uuid>, message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E, trace_id: Option<Uuid>) -> Self { Self::Internal { trace_id, message: Some(e.to_string()) } }
    pub fn invalid(code: &'static str, message: impl Into<String>) -> Self { Self::BadRequest { code, trace_id: None, message: Some(message.into()) } }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body, error_code) = match self {
            ApiError::Unauthorized { code, trace_id } => (
                StatusCode::UNAUTHORIZED,
                ErrorBody { code: code.into(), trace_id, message: None },
                code
            ),
            ApiError::BadRequest { code, trace_id, message } => (
                StatusCode::BAD_REQUEST,
                ErrorBody { code: code.into(), trace_id, message },
                code
            ),
            ApiError::NotFound { code, trace_id } => (
                StatusCode::NOT_FOUND,
                ErrorBody { code: code.into(), trace_id, message: None },
                code
            ),
            ApiError::Conflict { code, trace_id, message } => (
                StatusCode::CONFLICT,
                ErrorBody { code: code.into(), trace_id, message },
                code
            ),
            ApiError::BadGateway { code, trace_id, message } => (
                StatusCode::BAD_GATEWAY,
                ErrorBody { code: code.into(), trace_id, message },
                code
            ),
            ApiError::Internal { trace_id, message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorBody { code: "internal_error".into(), trace_id, message },
                "internal_error"
            ),
        };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Distinct `X-Error-Code` values tracked before new codes collapse into `_overflow`.
pub const MAX_ERROR_CODES: usize = 40;
const OVERFLOW_LABEL: &str = "_overflow";

struct ErrorCodeMetrics {
    errors_total: IntCounterVec,
    distinct_codes: IntGauge,
    overflow_total: IntCounter,
    seen: Mutex<HashSet<String>>,
}

static ERROR_METRICS: Lazy<ErrorCodeMetrics> = Lazy::new(|| {
    let errors_total = IntCounterVec::new(
        Opts::new("http_errors_total", "Count of HTTP error responses emitted (status >= 400)"),
        &["service", "code", "status"],
    )
    .unwrap();
    let distinct_codes = IntGauge::new(
        "http_error_codes_distinct",
        "Distinct X-Error-Code values observed",
    )
    .unwrap();
    let overflow_total = IntCounter::new(
        "http_error_code_overflow_total",
        "Error responses whose code was folded into the overflow label",
    )
    .unwrap();
    let registry = prometheus::default_registry();
    let _ = registry.register(Box::new(errors_total.clone()));
    let _ = registry.register(Box::new(distinct_codes.clone()));
    let _ = registry.register(Box::new(overflow_total.clone()));
    ErrorCodeMetrics { errors_total, distinct_codes, overflow_total, seen: Mutex::new(HashSet::new()) }
});

fn label_for_code(code: &str) -> String {
    let metrics = &*ERROR_METRICS;
    let mut seen = match metrics.seen.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if seen.contains(code) {
        return code.to_string();
    }
    if seen.len() >= MAX_ERROR_CODES {
        metrics.overflow_total.inc();
        return OVERFLOW_LABEL.to_string();
    }
    seen.insert(code.to_string());
    metrics.distinct_codes.set(seen.len() as i64);
    code.to_string()
}

fn record_error(service: &str, code: &str, status: u16) {
    let label = label_for_code(code);
    ERROR_METRICS
        .errors_total
        .with_label_values(&[service, &label, &status.to_string()])
        .inc();
}

pub type MiddlewareFuture = Pin<Box<dyn Future<Output = Response> + Send>>;

/// Middleware counting error responses into `http_errors_total{service,code,status}`.
///
/// Use with `axum::middleware::from_fn(http_error_metrics_layer("svc"))`. The
/// counter lives in the prometheus default registry.
pub fn http_error_metrics_layer(
    service: &'static str,
) -> impl Fn(Request, Next) -> MiddlewareFuture + Clone + Send + Sync + 'static {
    move |req: Request, next: Next| {
        Box::pin(async move {
            let resp = next.run(req).await;
            let status = resp.status();
            if status.is_client_error() || status.is_server_error() {
                let code = resp
                    .headers()
                    .get("X-Error-Code")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("none")
                    .to_string();
                record_error(service, &code, status.as_u16());
            }
            resp
        }) as MiddlewareFuture
    }
}

#[doc(hidden)]
pub mod test_helpers {
    pub fn simulate_error_code(code: &str) {
        super::record_error("test", code, 400);
    }

    pub fn distinct_gauge() -> i64 {
        super::ERROR_METRICS.distinct_codes.get()
    }

    pub fn overflow_count() -> u64 {
        super::ERROR_METRICS.overflow_total.get()
    }
}
