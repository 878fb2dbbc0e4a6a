use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct LinkMetrics {
    pub registry: Registry,
    pub webhook_events_total: IntCounterVec,
    pub payment_links_created_total: IntCounterVec,
    pub gateway_requests_total: IntCounterVec,
    pub notifications_total: IntCounterVec,
    pub settlements_reconciled_total: IntCounterVec,
}

impl LinkMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let webhook_events_total = IntCounterVec::new(
            Opts::new("payment_link_webhook_events_total", "Gateway webhook deliveries by event and outcome"),
            &["event", "outcome"],
        ).unwrap();
        let payment_links_created_total = IntCounterVec::new(
            Opts::new("payment_links_created_total", "Payment links created by document type"),
            &["doctype", "outcome"],
        ).unwrap();
        let gateway_requests_total = IntCounterVec::new(
            Opts::new("payment_gateway_requests_total", "Outbound payment gateway calls"),
            &["operation", "outcome"],
        ).unwrap();
        let notifications_total = IntCounterVec::new(
            Opts::new("chat_notifications_total", "Chat notifications posted by channel"),
            &["channel", "outcome"],
        ).unwrap();
        let settlements_reconciled_total = IntCounterVec::new(
            Opts::new("settlements_reconciled_total", "Settlement reconciliation runs by resulting status"),
            &["status"],
        ).unwrap();
        let _ = registry.register(Box::new(webhook_events_total.clone()));
        let _ = registry.register(Box::new(payment_links_created_total.clone()));
        let _ = registry.register(Box::new(gateway_requests_total.clone()));
        let _ = registry.register(Box::new(notifications_total.clone()));
        let _ = registry.register(Box::new(settlements_reconciled_total.clone()));
        LinkMetrics {
            registry,
            webhook_events_total,
            payment_links_created_total,
            gateway_requests_total,
            notifications_total,
            settlements_reconciled_total,
        }
    }

    /// Text exposition of this registry followed by the process default registry.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut families = self.registry.gather();
        families.extend(prometheus::gather());
        let mut buf = Vec::new();
        encoder.encode(&families, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

impl Default for LinkMetrics {
    fn default() -> Self { Self::new() }
}
