use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::gateway::LinkStatus;
use crate::store::{
    Customer, DocumentKind, DocumentStore, PaymentDetail, PaymentEntry, PaymentLink, SalesDocument,
    Settlement, SettlementPaymentEntry, StoreError, VirtualAccount,
};

#[derive(Default)]
struct MemoryState {
    documents: HashMap<(DocumentKind, String), SalesDocument>,
    links: HashMap<String, PaymentLink>,
    details: HashMap<String, PaymentDetail>,
    entries: HashMap<String, PaymentEntry>,
    settlements: HashMap<String, Settlement>,
    settlement_payments: HashMap<String, SettlementPaymentEntry>,
    customers: HashMap<String, Customer>,
    virtual_accounts: HashMap<String, VirtualAccount>,
    webhook_events: HashSet<String>,
}

/// Process-local store for development and tests.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn virtual_accounts(&self) -> Vec<VirtualAccount> {
        self.inner.lock().await.virtual_accounts.values().cloned().collect()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn upsert_document(&self, doc: &SalesDocument) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        state.documents.insert((doc.kind, doc.name.clone()), doc.clone());
        Ok(())
    }

    async fn get_document(&self, kind: DocumentKind, name: &str) -> Result<Option<SalesDocument>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state.documents.get(&(kind, name.to_string())).cloned())
    }

    async fn find_document_by_url(&self, short_url: &str) -> Result<Option<SalesDocument>, StoreError> {
        let state = self.inner.lock().await;
        Ok(state
            .documents
            .values()
            .find(|d| d.payment_url.as_deref() == Some(short_url))
            .cloned())
    }

    async fn list_linked_documents(&self, status: Option<LinkStatus>) -> Result<Vec<SalesDocument>, StoreError> {
        let state = self.inner.lock().await;
        let mut docs: Vec<SalesDocument> = state
            .documents
            .values()
            .filter(|d| d.payment_link.is_some())
            .filter(|d| status.is_none() || d.payment_status == status)
            .cloned()
            .collect();
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.name.cmp(&b.name)));
        Ok(docs)
    }

    async fn upsert_payment_link(&self, link: &PaymentLink) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        state.links.insert(link.id.clone(), link.clone());
        Ok(())
    }

    async fn get_payment_link(&self, id: &str) -> Result<Option<PaymentLink>, StoreError> {
        Ok(self.inner.lock().await.links.get(id).cloned())
    }

    async fn list_payment_links(&self) -> Result<Vec<PaymentLink>, StoreError> {
        let state = self.inner.lock().await;
        let mut links: Vec<PaymentLink> = state.links.values().cloned().collect();
        links.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(links)
    }

    async fn upsert_payment_detail(&self, detail: &PaymentDetail) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        state.details.insert(detail.payment_id.clone(), detail.clone());
        Ok(())
    }

    async fn list_payment_details(&self, link_id: &str) -> Result<Vec<PaymentDetail>, StoreError> {
        let state = self.inner.lock().await;
        let mut details: Vec<PaymentDetail> =
            state.details.values().filter(|d| d.link_id == link_id).cloned().collect();
        details.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(details)
    }

    async fn upsert_payment_entry(&self, entry: &PaymentEntry) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        state.entries.insert(entry.name.clone(), entry.clone());
        Ok(())
    }

    async fn list_payment_entries(&self, reference_no: &str) -> Result<Vec<PaymentEntry>, StoreError> {
        let state = self.inner.lock().await;
        let mut entries: Vec<PaymentEntry> =
            state.entries.values().filter(|e| e.reference_no == reference_no).cloned().collect();
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(entries)
    }

    async fn upsert_settlement(&self, settlement: &Settlement) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        state.settlements.insert(settlement.settlement_id.clone(), settlement.clone());
        Ok(())
    }

    async fn get_settlement(&self, id: &str) -> Result<Option<Settlement>, StoreError> {
        Ok(self.inner.lock().await.settlements.get(id).cloned())
    }

    async fn list_settlements(&self) -> Result<Vec<Settlement>, StoreError> {
        let state = self.inner.lock().await;
        let mut settlements: Vec<Settlement> = state.settlements.values().cloned().collect();
        settlements.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(settlements)
    }

    async fn upsert_settlement_payment(&self, entry: &SettlementPaymentEntry) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        state.settlement_payments.insert(entry.entity_id.clone(), entry.clone());
        Ok(())
    }

    async fn get_settlement_payment(&self, entity_id: &str) -> Result<Option<SettlementPaymentEntry>, StoreError> {
        Ok(self.inner.lock().await.settlement_payments.get(entity_id).cloned())
    }

    async fn list_settlement_payments(&self, settlement_id: &str) -> Result<Vec<SettlementPaymentEntry>, StoreError> {
        let state = self.inner.lock().await;
        let mut entries: Vec<SettlementPaymentEntry> = state
            .settlement_payments
            .values()
            .filter(|e| e.settlement_id.as_deref() == Some(settlement_id))
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        Ok(entries)
    }

    async fn upsert_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        state.customers.insert(customer.name.clone(), customer.clone());
        Ok(())
    }

    async fn get_customer(&self, name: &str) -> Result<Option<Customer>, StoreError> {
        Ok(self.inner.lock().await.customers.get(name).cloned())
    }

    async fn insert_virtual_account(&self, account: &VirtualAccount) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        state.virtual_accounts.insert(account.id.clone(), account.clone());
        Ok(())
    }

    async fn record_webhook_event(&self, event_id: &str, _event: &str) -> Result<bool, StoreError> {
        Ok(self.inner.lock().await.webhook_events.insert(event_id.to_string()))
    }

    async fn release_webhook_event(&self, event_id: &str) -> Result<(), StoreError> {
        self.inner.lock().await.webhook_events.remove(event_id);
        Ok(())
    }
}
