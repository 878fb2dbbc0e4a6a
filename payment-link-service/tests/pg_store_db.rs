mod common;

use common::*;
use payment_link_service::gateway::LinkStatus;
use payment_link_service::store::DocumentKind;
use payment_link_service::{DocumentStore, PgStore};
use sqlx::PgPool;

#[tokio::test]
#[ignore]
async fn documents_links_and_webhook_ids_round_trip() {
    let dsn = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for this ignored test");
    let pool = PgPool::connect(&dsn).await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    let store = PgStore::new(pool);

    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let name = format!("QTN-{suffix}");
    let link_id = format!("plink_{suffix}");
    let (doc, mut link) = linked_quotation(&name, "1250.50", &link_id);
    store.upsert_document(&doc).await.unwrap();
    store.upsert_payment_link(&link).await.unwrap();

    let loaded = store.get_document(DocumentKind::Quotation, &name).await.unwrap().unwrap();
    assert_eq!(loaded.payment_link.as_deref(), Some(link_id.as_str()));
    assert_eq!(loaded.grand_total, money("1250.50"));
    let by_url = store.find_document_by_url(&short_url(&link_id)).await.unwrap().unwrap();
    assert_eq!(by_url.name, name);

    link.status = LinkStatus::Paid;
    store.upsert_payment_link(&link).await.unwrap();
    let loaded = store.get_payment_link(&link_id).await.unwrap().unwrap();
    assert_eq!(loaded.status, LinkStatus::Paid);

    let event_id = format!("evt_{suffix}");
    assert!(store.record_webhook_event(&event_id, "payment_link.paid").await.unwrap());
    assert!(!store.record_webhook_event(&event_id, "payment_link.paid").await.unwrap());
    store.release_webhook_event(&event_id).await.unwrap();
    assert!(store.record_webhook_event(&event_id, "payment_link.paid").await.unwrap());
}
