use common_http_errors::ApiError;
use common_money::MoneyError;
use thiserror::Error;
use tracing::error;

use crate::cliq::NotifyError;
use crate::gateway::GatewayError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
    #[error("invalid amount: {0}")]
    Money(#[from] MoneyError),
    #[error("{what} {id} not found")]
    NotFound { code: &'static str, what: &'static str, id: String },
    #[error("{message}")]
    Invalid { code: &'static str, message: String },
    #[error("{message}")]
    Conflict { code: &'static str, message: String },
}

impl ServiceError {
    pub fn not_found(code: &'static str, what: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { code, what, id: id.into() }
    }

    pub fn invalid(code: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid { code, message: message.into() }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound { code, .. } => ApiError::NotFound { code, trace_id: None },
            ServiceError::Invalid { code, message } => ApiError::invalid(code, message),
            ServiceError::Money(e) => ApiError::invalid("invalid_amount", e.to_string()),
            ServiceError::Conflict { code, message } => {
                ApiError::Conflict { code, trace_id: None, message: Some(message) }
            }
            ServiceError::Gateway(e) => {
                ApiError::BadGateway { code: "gateway_error", trace_id: None, message: Some(e.to_string()) }
            }
            ServiceError::Notify(NotifyError::Disabled) => {
                ApiError::invalid("notifications_disabled", NotifyError::Disabled.to_string())
            }
            ServiceError::Notify(e @ (NotifyError::NotConfigured(_) | NotifyError::UnknownChannel(_))) => {
                ApiError::invalid("notification_not_configured", e.to_string())
            }
            ServiceError::Notify(e) => {
                ApiError::BadGateway { code: "notification_failed", trace_id: None, message: Some(e.to_string()) }
            }
            ServiceError::Store(e) => {
                error!(error = %e, "store failure");
                ApiError::internal(e, None)
            }
        }
    }
}
