use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use common_http_errors::ApiResult;
use serde::Deserialize;

use crate::app_state::AppState;
use crate::gateway::SettlementQuery;
use crate::settlement::{self, ReconSummary, SYSTEM_USER};
use crate::store::{PaymentEntry, Settlement, SettlementPaymentEntry};

#[derive(Debug, Default, Deserialize)]
pub struct ReconcileBy {
    #[serde(default)]
    pub user: Option<String>,
}

impl ReconcileBy {
    fn user(&self) -> &str {
        self.user.as_deref().map(str::trim).filter(|u| !u.is_empty()).unwrap_or(SYSTEM_USER)
    }
}

#[derive(Debug, Deserialize)]
pub struct ReconPeriod {
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub day: Option<u32>,
}

pub async fn list_settlements(State(state): State<AppState>) -> ApiResult<Json<Vec<Settlement>>> {
    Ok(Json(settlement::list_settlements(&state).await?))
}

pub async fn fetch_all_settlements(
    State(state): State<AppState>,
    Query(query): Query<SettlementQuery>,
) -> ApiResult<Json<Vec<Settlement>>> {
    Ok(Json(settlement::fetch_all(&state, &query).await?))
}

pub async fn fetch_settlement(
    State(state): State<AppState>,
    Path(settlement_id): Path<String>,
) -> ApiResult<Json<Settlement>> {
    Ok(Json(settlement::fetch_settlement(&state, &settlement_id).await?))
}

pub async fn run_recon(
    State(state): State<AppState>,
    Json(period): Json<ReconPeriod>,
) -> ApiResult<Json<ReconSummary>> {
    Ok(Json(settlement::recon(&state, period.year, period.month, period.day).await?))
}

pub async fn reconcile_settlement(
    State(state): State<AppState>,
    Path(settlement_id): Path<String>,
    body: Option<Json<ReconcileBy>>,
) -> ApiResult<Json<Settlement>> {
    let by = body.map(|Json(b)| b).unwrap_or_default();
    Ok(Json(settlement::reconcile_settlement(&state, &settlement_id, by.user()).await?))
}

pub async fn settlement_payments(
    State(state): State<AppState>,
    Path(settlement_id): Path<String>,
) -> ApiResult<Json<Vec<SettlementPaymentEntry>>> {
    Ok(Json(settlement::settlement_payments(&state, &settlement_id).await?))
}

pub async fn reconcile_payment(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
    body: Option<Json<ReconcileBy>>,
) -> ApiResult<Json<SettlementPaymentEntry>> {
    let by = body.map(|Json(b)| b).unwrap_or_default();
    Ok(Json(settlement::reconcile_payment(&state, &payment_id, by.user()).await?))
}

pub async fn create_payment_entry(
    State(state): State<AppState>,
    Path(payment_id): Path<String>,
) -> ApiResult<(StatusCode, Json<PaymentEntry>)> {
    let entry = settlement::create_payment_entry(&state, &payment_id).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}
