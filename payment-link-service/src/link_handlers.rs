use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use common_http_errors::{ApiError, ApiResult};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::error::ServiceError;
use crate::hooks::{self, HookOutcome};
use crate::links::{self, EnsuredLink, LinkDetails, LinkOptions, PaymentSummary, SyncReport};
use crate::report::{self, LinkStatusRow};
use crate::store::{Customer, DocumentKind, PaymentLink, SalesDocument, VirtualAccount};
use crate::virtual_account::{self, NewVirtualAccount};

fn document_kind(slug: &str) -> Result<DocumentKind, ApiError> {
    DocumentKind::from_slug(slug)
        .ok_or_else(|| ApiError::invalid("unknown_document_kind", format!("unsupported document type {slug}")))
}

pub async fn document_submitted(
    State(state): State<AppState>,
    Json(doc): Json<SalesDocument>,
) -> ApiResult<Json<HookOutcome>> {
    Ok(Json(hooks::on_submit(&state, doc).await?))
}

pub async fn document_amended(
    State(state): State<AppState>,
    Json(doc): Json<SalesDocument>,
) -> ApiResult<Json<HookOutcome>> {
    if doc.amended_from.is_none() {
        return Err(ApiError::invalid("missing_amended_from", "amended documents must name amended_from"));
    }
    Ok(Json(hooks::on_amend(&state, doc).await?))
}

pub async fn customer_saved(
    State(state): State<AppState>,
    Json(customer): Json<Customer>,
) -> ApiResult<Json<Customer>> {
    Ok(Json(hooks::on_customer_saved(&state, customer).await?))
}

pub async fn create_document_link(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
    options: Option<Json<LinkOptions>>,
) -> ApiResult<(StatusCode, Json<PaymentLink>)> {
    let kind = document_kind(&kind)?;
    let options = options.map(|Json(o)| o).unwrap_or_default();
    let link = links::create_for_document(&state, kind, &name, &options).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn ensure_document_link(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> ApiResult<Json<EnsuredLink>> {
    let kind = document_kind(&kind)?;
    Ok(Json(links::get_or_create(&state, kind, &name).await?))
}

pub async fn regenerate_document_link(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> ApiResult<(StatusCode, Json<PaymentLink>)> {
    let kind = document_kind(&kind)?;
    let link = links::regenerate_for_revision(&state, kind, &name).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

pub async fn list_links(State(state): State<AppState>) -> ApiResult<Json<Vec<PaymentLink>>> {
    let links = state.store.list_payment_links().await.map_err(ServiceError::from)?;
    Ok(Json(links))
}

pub async fn get_link(State(state): State<AppState>, Path(link_id): Path<String>) -> ApiResult<Json<PaymentLink>> {
    Ok(Json(links::load_link(&state, &link_id).await?))
}

pub async fn sync_link(State(state): State<AppState>, Path(link_id): Path<String>) -> ApiResult<Json<PaymentLink>> {
    Ok(Json(links::sync_status(&state, &link_id).await?))
}

pub async fn sync_all_links(State(state): State<AppState>) -> ApiResult<Json<SyncReport>> {
    Ok(Json(links::sync_all(&state).await?))
}

pub async fn cancel_link(State(state): State<AppState>, Path(link_id): Path<String>) -> ApiResult<Json<PaymentLink>> {
    Ok(Json(links::cancel(&state, &link_id).await?))
}

pub async fn link_details(State(state): State<AppState>, Path(link_id): Path<String>) -> ApiResult<Json<LinkDetails>> {
    Ok(Json(links::details(&state, &link_id).await?))
}

pub async fn link_payments(
    State(state): State<AppState>,
    Path(link_id): Path<String>,
) -> ApiResult<Json<PaymentSummary>> {
    Ok(Json(links::payment_summary(&state, &link_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusReportQuery {
    pub status: Option<String>,
}

pub async fn payment_link_status_report(
    State(state): State<AppState>,
    Query(query): Query<StatusReportQuery>,
) -> ApiResult<Json<Vec<LinkStatusRow>>> {
    Ok(Json(report::payment_link_status(&state, query.status.as_deref()).await?))
}

pub async fn create_virtual_account(
    State(state): State<AppState>,
    Json(input): Json<NewVirtualAccount>,
) -> ApiResult<(StatusCode, Json<VirtualAccount>)> {
    let account = virtual_account::create(&state, input).await?;
    Ok((StatusCode::CREATED, Json(account)))
}
