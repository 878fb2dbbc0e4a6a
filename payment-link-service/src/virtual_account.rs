use bigdecimal::BigDecimal;
use chrono::{DateTime, TimeZone, Utc};
use common_money::{from_minor_units, to_minor_units};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{info, warn};

use crate::app_state::AppState;
use crate::cliq::{templates, CliqChannel, CliqMessage};
use crate::error::ServiceError;
use crate::gateway::{VirtualAccountReceivers, VirtualAccountRequest};
use crate::hooks;
use crate::store::VirtualAccount;

#[derive(Debug, Clone, Deserialize)]
pub struct NewVirtualAccount {
    pub customer: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount_expected: Option<BigDecimal>,
    #[serde(default)]
    pub close_by: Option<DateTime<Utc>>,
}

/// Opens a bank-transfer virtual account for a stored customer.
pub async fn create(state: &AppState, input: NewVirtualAccount) -> Result<VirtualAccount, ServiceError> {
    let customer = state
        .store
        .get_customer(&input.customer)
        .await?
        .ok_or_else(|| ServiceError::not_found("customer_not_found", "customer", &input.customer))?;
    if let Some(close_by) = input.close_by {
        if close_by <= Utc::now() {
            return Err(ServiceError::invalid("close_by_in_past", "close_by must be in the future"));
        }
    }
    let amount_expected = match &input.amount_expected {
        Some(amount) => Some(to_minor_units(amount)?),
        None => None,
    };
    let customer = hooks::on_customer_saved(state, customer).await?;
    let customer_gateway_id = customer.gateway_customer_id.clone().unwrap_or_default();
    let display = customer.customer_name.clone().unwrap_or_else(|| customer.name.clone());

    let description = input
        .description
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format!("Virtual Account for Customer {display}"));
    let mut notes = BTreeMap::new();
    notes.insert("customer_name".to_string(), display.clone());
    let request = VirtualAccountRequest {
        receivers: VirtualAccountReceivers { types: vec!["bank_account".to_string()] },
        description: description.clone(),
        customer_id: customer_gateway_id.clone(),
        notes,
        amount_expected,
        close_by: input.close_by.map(|at| at.timestamp()),
    };

    let created = state.gateway.create_virtual_account(&request).await?;
    let account = VirtualAccount {
        id: format!("{}{}", state.config.virtual_account_prefix, created.id),
        gateway_id: created.id.clone(),
        customer: customer.name.clone(),
        customer_gateway_id,
        description: created.description.clone().unwrap_or(description),
        amount_expected: created.amount_expected.or(amount_expected).map(from_minor_units),
        status: created.status.clone(),
        receivers: created.receivers.clone(),
        close_by: created
            .close_by
            .and_then(|s| Utc.timestamp_opt(s, 0).single())
            .or(input.close_by),
        created_at: Utc::now(),
    };
    state.store.insert_virtual_account(&account).await?;

    let text = templates::virtual_account_text(&created.id, &display);
    if let Err(err) = state.notifier.post(CliqChannel::Accounts, &CliqMessage::text(text)).await {
        warn!(account = %account.id, error = %err, "virtual account notification not delivered");
    }
    info!(account = %account.id, customer = %account.customer, "virtual account created");
    Ok(account)
}
