pub mod app;
pub mod app_state;
pub mod auth;
pub mod cliq;
pub mod config;
pub mod error;
pub mod gateway;
pub mod hooks;
pub mod link_handlers;
pub mod links;
pub mod memory_store;
pub mod notification_handlers;
pub mod pg_store;
pub mod razorpay;
pub mod report;
pub mod settlement;
pub mod settlement_handlers;
pub mod store;
pub mod virtual_account;
pub mod webhook;

// Re-export key types for tests and the binary
pub use crate::app::build_router;
pub use crate::app_state::AppState;
pub use crate::cliq::CliqClient;
pub use crate::config::{CliqConfig, RazorpayCredentials, ServiceConfig};
pub use crate::error::ServiceError;
pub use crate::gateway::PaymentGateway;
pub use crate::memory_store::MemoryStore;
pub use crate::pg_store::PgStore;
pub use crate::razorpay::RazorpayClient;
pub use crate::store::DocumentStore;
