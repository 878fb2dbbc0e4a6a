use anyhow::Context;
use common_observability::LinkMetrics;
use payment_link_service::{
    build_router, links, AppState, CliqClient, DocumentStore, MemoryStore, PaymentGateway, PgStore, RazorpayClient,
    ServiceConfig,
};
use sqlx::postgres::PgPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

fn spawn_link_sync(state: AppState, every_secs: u64) {
    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(every_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match links::sync_all(&state).await {
                Ok(report) => info!(total = report.total, failed = report.failed.len(), "periodic link sync"),
                Err(err) => warn!(error = %err, "periodic link sync failed"),
            }
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServiceConfig::from_env().context("loading payment-link-service config")?;
    let metrics = LinkMetrics::new();
    let http = reqwest::Client::builder()
        .user_agent("payment-link-service")
        .build()
        .context("building http client")?;

    let store: Arc<dyn DocumentStore> = match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("using postgres document store");
            Arc::new(PgStore::new(pool))
        }
        None => {
            warn!("DATABASE_URL not set; documents and links are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };
    if config.webhook_secret.is_none() {
        warn!("RAZORPAY_WEBHOOK_SECRET not set; webhook deliveries will be rejected");
    }
    if config.admin_key_hashes.is_empty() {
        warn!("ADMIN_API_KEY_SHA256 not set; every admin request will be rejected");
    }

    let gateway: Arc<dyn PaymentGateway> = Arc::new(RazorpayClient::new(
        http.clone(),
        &config.razorpay_api_base,
        &config.razorpay,
        metrics.clone(),
    ));
    let notifier = Arc::new(CliqClient::new(http, config.cliq.clone(), metrics.clone()));
    let sync_every = config.link_sync_interval_secs;
    let sandbox = config.razorpay.sandbox;
    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));

    let state = AppState {
        config: Arc::new(config),
        gateway,
        store,
        notifier,
        metrics: Arc::new(metrics),
    };
    if let Some(secs) = sync_every {
        info!(every_secs = secs, "periodic payment link sync enabled");
        spawn_link_sync(state.clone(), secs);
    }

    let app = build_router(state);
    info!(%addr, sandbox, "starting payment-link-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
