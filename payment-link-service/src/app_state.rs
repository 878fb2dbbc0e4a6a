use common_observability::LinkMetrics;
use std::sync::Arc;

use crate::cliq::CliqClient;
use crate::config::ServiceConfig;
use crate::gateway::PaymentGateway;
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub store: Arc<dyn DocumentStore>,
    pub notifier: Arc<CliqClient>,
    pub metrics: Arc<LinkMetrics>,
}
