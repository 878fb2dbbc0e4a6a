use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;

use crate::gateway::LinkStatus;
use crate::store::{
    Customer, DocumentKind, DocumentStore, PaymentDetail, PaymentEntry, PaymentLink, PaymentProgress,
    ReconciliationStatus, SalesDocument, Settlement, SettlementPaymentEntry, StoreError, VirtualAccount,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn corrupt(table: &'static str, key: &str, detail: impl Into<String>) -> StoreError {
    StoreError::Corrupt { table, key: key.to_string(), detail: detail.into() }
}

fn kind_of(table: &'static str, key: &str, raw: &str) -> Result<DocumentKind, StoreError> {
    DocumentKind::from_str(raw).ok_or_else(|| corrupt(table, key, format!("unknown document kind {raw}")))
}

fn recon_status_of(table: &'static str, key: &str, raw: &str) -> Result<ReconciliationStatus, StoreError> {
    ReconciliationStatus::from_str(raw)
        .ok_or_else(|| corrupt(table, key, format!("unknown reconciliation status {raw}")))
}

#[derive(sqlx::FromRow)]
struct DocumentRow {
    kind: String,
    name: String,
    customer: String,
    customer_name: Option<String>,
    contact_email: Option<String>,
    contact_mobile: Option<String>,
    grand_total: BigDecimal,
    currency: String,
    valid_till: Option<NaiveDate>,
    amended_from: Option<String>,
    payment_link: Option<String>,
    payment_url: Option<String>,
    link_expiry: Option<DateTime<Utc>>,
    payment_status: Option<String>,
    gateway_payment_id: Option<String>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DocumentRow> for SalesDocument {
    type Error = StoreError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        let kind = kind_of("sales_documents", &row.name, &row.kind)?;
        let payment_status = match row.payment_status.as_deref() {
            Some(raw) => Some(
                LinkStatus::from_str(raw)
                    .ok_or_else(|| corrupt("sales_documents", &row.name, format!("unknown link status {raw}")))?,
            ),
            None => None,
        };
        Ok(SalesDocument {
            kind,
            name: row.name,
            customer: row.customer,
            customer_name: row.customer_name,
            contact_email: row.contact_email,
            contact_mobile: row.contact_mobile,
            grand_total: row.grand_total,
            currency: row.currency,
            valid_till: row.valid_till,
            amended_from: row.amended_from,
            payment_link: row.payment_link,
            payment_url: row.payment_url,
            link_expiry: row.link_expiry,
            payment_status,
            gateway_payment_id: row.gateway_payment_id,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LinkRow {
    id: String,
    short_url: String,
    status: String,
    progress: String,
    amount: BigDecimal,
    amount_paid: BigDecimal,
    remaining_amount: BigDecimal,
    currency: String,
    expire_by: Option<DateTime<Utc>>,
    reference_kind: String,
    reference_name: String,
    customer: String,
    gateway_payment_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<LinkRow> for PaymentLink {
    type Error = StoreError;

    fn try_from(row: LinkRow) -> Result<Self, Self::Error> {
        let status = LinkStatus::from_str(&row.status)
            .ok_or_else(|| corrupt("payment_links", &row.id, format!("unknown status {}", row.status)))?;
        let progress = PaymentProgress::from_str(&row.progress)
            .ok_or_else(|| corrupt("payment_links", &row.id, format!("unknown progress {}", row.progress)))?;
        let reference_kind = kind_of("payment_links", &row.id, &row.reference_kind)?;
        Ok(PaymentLink {
            id: row.id,
            short_url: row.short_url,
            status,
            progress,
            amount: row.amount,
            amount_paid: row.amount_paid,
            remaining_amount: row.remaining_amount,
            currency: row.currency,
            expire_by: row.expire_by,
            reference_kind,
            reference_name: row.reference_name,
            customer: row.customer,
            gateway_payment_id: row.gateway_payment_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct DetailRow {
    payment_id: String,
    link_id: String,
    amount: BigDecimal,
    currency: String,
    status: String,
    method: Option<String>,
    customer: String,
    reference_kind: String,
    reference_name: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<DetailRow> for PaymentDetail {
    type Error = StoreError;

    fn try_from(row: DetailRow) -> Result<Self, Self::Error> {
        let reference_kind = kind_of("payment_details", &row.payment_id, &row.reference_kind)?;
        Ok(PaymentDetail {
            payment_id: row.payment_id,
            link_id: row.link_id,
            amount: row.amount,
            currency: row.currency,
            status: row.status,
            method: row.method,
            customer: row.customer,
            reference_kind,
            reference_name: row.reference_name,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    name: String,
    reference_no: String,
    party: String,
    paid_amount: BigDecimal,
    currency: String,
    posting_date: NaiveDate,
    reference_kind: Option<String>,
    reference_name: Option<String>,
    mode_of_payment: String,
    submitted: bool,
    settlement_payment: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for PaymentEntry {
    type Error = StoreError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let reference_kind = match row.reference_kind.as_deref() {
            Some(raw) => Some(kind_of("payment_entries", &row.name, raw)?),
            None => None,
        };
        Ok(PaymentEntry {
            name: row.name,
            reference_no: row.reference_no,
            party: row.party,
            paid_amount: row.paid_amount,
            currency: row.currency,
            posting_date: row.posting_date,
            reference_kind,
            reference_name: row.reference_name,
            mode_of_payment: row.mode_of_payment,
            submitted: row.submitted,
            settlement_payment: row.settlement_payment,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SettlementRow {
    settlement_id: String,
    amount: BigDecimal,
    fees: BigDecimal,
    tax: BigDecimal,
    currency: String,
    status: String,
    utr: Option<String>,
    created_at: DateTime<Utc>,
    reconciliation_status: String,
    reconciled_at: Option<DateTime<Utc>>,
    reconciled_by: Option<String>,
}

impl TryFrom<SettlementRow> for Settlement {
    type Error = StoreError;

    fn try_from(row: SettlementRow) -> Result<Self, Self::Error> {
        let reconciliation_status = recon_status_of("settlements", &row.settlement_id, &row.reconciliation_status)?;
        Ok(Settlement {
            settlement_id: row.settlement_id,
            amount: row.amount,
            fees: row.fees,
            tax: row.tax,
            currency: row.currency,
            status: row.status,
            utr: row.utr,
            created_at: row.created_at,
            reconciliation_status,
            reconciled_at: row.reconciled_at,
            reconciled_by: row.reconciled_by,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SettlementPaymentRow {
    entity_id: String,
    settlement_id: Option<String>,
    entity_type: String,
    amount: BigDecimal,
    fee: BigDecimal,
    tax: BigDecimal,
    currency: String,
    method: Option<String>,
    description: Option<String>,
    email: Option<String>,
    contact: Option<String>,
    quotation: Option<String>,
    customer: Option<String>,
    reconciliation_status: String,
    payment_entry: Option<String>,
    reconciled_at: Option<DateTime<Utc>>,
    reconciled_by: Option<String>,
}

impl TryFrom<SettlementPaymentRow> for SettlementPaymentEntry {
    type Error = StoreError;

    fn try_from(row: SettlementPaymentRow) -> Result<Self, Self::Error> {
        let reconciliation_status =
            recon_status_of("settlement_payments", &row.entity_id, &row.reconciliation_status)?;
        Ok(SettlementPaymentEntry {
            entity_id: row.entity_id,
            settlement_id: row.settlement_id,
            entity_type: row.entity_type,
            amount: row.amount,
            fee: row.fee,
            tax: row.tax,
            currency: row.currency,
            method: row.method,
            description: row.description,
            email: row.email,
            contact: row.contact,
            quotation: row.quotation,
            customer: row.customer,
            reconciliation_status,
            payment_entry: row.payment_entry,
            reconciled_at: row.reconciled_at,
            reconciled_by: row.reconciled_by,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    name: String,
    customer_name: Option<String>,
    gateway_customer_id: Option<String>,
}

const DOCUMENT_COLUMNS: &str = "kind, name, customer, customer_name, contact_email, contact_mobile, grand_total, currency, valid_till, amended_from, payment_link, payment_url, link_expiry, payment_status, gateway_payment_id, updated_at";
const LINK_COLUMNS: &str = "id, short_url, status, progress, amount, amount_paid, remaining_amount, currency, expire_by, reference_kind, reference_name, customer, gateway_payment_id, created_at, updated_at";
const DETAIL_COLUMNS: &str = "payment_id, link_id, amount, currency, status, method, customer, reference_kind, reference_name, created_at";
const ENTRY_COLUMNS: &str = "name, reference_no, party, paid_amount, currency, posting_date, reference_kind, reference_name, mode_of_payment, submitted, settlement_payment, created_at";
const SETTLEMENT_COLUMNS: &str = "settlement_id, amount, fees, tax, currency, status, utr, created_at, reconciliation_status, reconciled_at, reconciled_by";
const SETTLEMENT_PAYMENT_COLUMNS: &str = "entity_id, settlement_id, entity_type, amount, fee, tax, currency, method, description, email, contact, quotation, customer, reconciliation_status, payment_entry, reconciled_at, reconciled_by";

#[async_trait::async_trait]
impl DocumentStore for PgStore {
    async fn upsert_document(&self, doc: &SalesDocument) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO sales_documents (kind, name, customer, customer_name, contact_email, contact_mobile, grand_total, currency, valid_till, amended_from, payment_link, payment_url, link_expiry, payment_status, gateway_payment_id, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
             ON CONFLICT (kind, name) DO UPDATE SET
               customer = EXCLUDED.customer, customer_name = EXCLUDED.customer_name,
               contact_email = EXCLUDED.contact_email, contact_mobile = EXCLUDED.contact_mobile,
               grand_total = EXCLUDED.grand_total, currency = EXCLUDED.currency,
               valid_till = EXCLUDED.valid_till, amended_from = EXCLUDED.amended_from,
               payment_link = EXCLUDED.payment_link, payment_url = EXCLUDED.payment_url,
               link_expiry = EXCLUDED.link_expiry, payment_status = EXCLUDED.payment_status,
               gateway_payment_id = EXCLUDED.gateway_payment_id, updated_at = EXCLUDED.updated_at",
        )
        .bind(doc.kind.as_str())
        .bind(&doc.name)
        .bind(&doc.customer)
        .bind(&doc.customer_name)
        .bind(&doc.contact_email)
        .bind(&doc.contact_mobile)
        .bind(&doc.grand_total)
        .bind(&doc.currency)
        .bind(doc.valid_till)
        .bind(&doc.amended_from)
        .bind(&doc.payment_link)
        .bind(&doc.payment_url)
        .bind(doc.link_expiry)
        .bind(doc.payment_status.map(|s| s.as_str()))
        .bind(&doc.gateway_payment_id)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_document(&self, kind: DocumentKind, name: &str) -> Result<Option<SalesDocument>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM sales_documents WHERE kind = $1 AND name = $2"
        ))
        .bind(kind.as_str())
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SalesDocument::try_from).transpose()
    }

    async fn find_document_by_url(&self, short_url: &str) -> Result<Option<SalesDocument>, StoreError> {
        let row = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM sales_documents WHERE payment_url = $1 ORDER BY updated_at DESC LIMIT 1"
        ))
        .bind(short_url)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SalesDocument::try_from).transpose()
    }

    async fn list_linked_documents(&self, status: Option<LinkStatus>) -> Result<Vec<SalesDocument>, StoreError> {
        let rows = sqlx::query_as::<_, DocumentRow>(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM sales_documents
             WHERE payment_link IS NOT NULL AND ($1::text IS NULL OR payment_status = $1)
             ORDER BY updated_at DESC, name"
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SalesDocument::try_from).collect()
    }

    async fn upsert_payment_link(&self, link: &PaymentLink) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO payment_links (id, short_url, status, progress, amount, amount_paid, remaining_amount, currency, expire_by, reference_kind, reference_name, customer, gateway_payment_id, created_at, updated_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
             ON CONFLICT (id) DO UPDATE SET
               short_url = EXCLUDED.short_url, status = EXCLUDED.status, progress = EXCLUDED.progress,
               amount = EXCLUDED.amount, amount_paid = EXCLUDED.amount_paid,
               remaining_amount = EXCLUDED.remaining_amount, currency = EXCLUDED.currency,
               expire_by = EXCLUDED.expire_by, gateway_payment_id = EXCLUDED.gateway_payment_id,
               updated_at = EXCLUDED.updated_at",
        )
        .bind(&link.id)
        .bind(&link.short_url)
        .bind(link.status.as_str())
        .bind(link.progress.as_str())
        .bind(&link.amount)
        .bind(&link.amount_paid)
        .bind(&link.remaining_amount)
        .bind(&link.currency)
        .bind(link.expire_by)
        .bind(link.reference_kind.as_str())
        .bind(&link.reference_name)
        .bind(&link.customer)
        .bind(&link.gateway_payment_id)
        .bind(link.created_at)
        .bind(link.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_payment_link(&self, id: &str) -> Result<Option<PaymentLink>, StoreError> {
        let row = sqlx::query_as::<_, LinkRow>(&format!("SELECT {LINK_COLUMNS} FROM payment_links WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(PaymentLink::try_from).transpose()
    }

    async fn list_payment_links(&self) -> Result<Vec<PaymentLink>, StoreError> {
        let rows = sqlx::query_as::<_, LinkRow>(&format!(
            "SELECT {LINK_COLUMNS} FROM payment_links ORDER BY created_at DESC, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PaymentLink::try_from).collect()
    }

    async fn upsert_payment_detail(&self, detail: &PaymentDetail) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO payment_details (payment_id, link_id, amount, currency, status, method, customer, reference_kind, reference_name, created_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
             ON CONFLICT (payment_id) DO UPDATE SET
               amount = EXCLUDED.amount, currency = EXCLUDED.currency, status = EXCLUDED.status,
               method = EXCLUDED.method, created_at = EXCLUDED.created_at",
        )
        .bind(&detail.payment_id)
        .bind(&detail.link_id)
        .bind(&detail.amount)
        .bind(&detail.currency)
        .bind(&detail.status)
        .bind(&detail.method)
        .bind(&detail.customer)
        .bind(detail.reference_kind.as_str())
        .bind(&detail.reference_name)
        .bind(detail.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_payment_details(&self, link_id: &str) -> Result<Vec<PaymentDetail>, StoreError> {
        let rows = sqlx::query_as::<_, DetailRow>(&format!(
            "SELECT {DETAIL_COLUMNS} FROM payment_details WHERE link_id = $1 ORDER BY created_at DESC"
        ))
        .bind(link_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PaymentDetail::try_from).collect()
    }

    async fn upsert_payment_entry(&self, entry: &PaymentEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO payment_entries (name, reference_no, party, paid_amount, currency, posting_date, reference_kind, reference_name, mode_of_payment, submitted, settlement_payment, created_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
             ON CONFLICT (name) DO UPDATE SET
               submitted = EXCLUDED.submitted, settlement_payment = EXCLUDED.settlement_payment",
        )
        .bind(&entry.name)
        .bind(&entry.reference_no)
        .bind(&entry.party)
        .bind(&entry.paid_amount)
        .bind(&entry.currency)
        .bind(entry.posting_date)
        .bind(entry.reference_kind.map(|k| k.as_str()))
        .bind(&entry.reference_name)
        .bind(&entry.mode_of_payment)
        .bind(entry.submitted)
        .bind(&entry.settlement_payment)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_payment_entries(&self, reference_no: &str) -> Result<Vec<PaymentEntry>, StoreError> {
        let rows = sqlx::query_as::<_, EntryRow>(&format!(
            "SELECT {ENTRY_COLUMNS} FROM payment_entries WHERE reference_no = $1 ORDER BY created_at"
        ))
        .bind(reference_no)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PaymentEntry::try_from).collect()
    }

    async fn upsert_settlement(&self, settlement: &Settlement) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO settlements (settlement_id, amount, fees, tax, currency, status, utr, created_at, reconciliation_status, reconciled_at, reconciled_by)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11)
             ON CONFLICT (settlement_id) DO UPDATE SET
               amount = EXCLUDED.amount, fees = EXCLUDED.fees, tax = EXCLUDED.tax,
               currency = EXCLUDED.currency, status = EXCLUDED.status, utr = EXCLUDED.utr,
               reconciliation_status = EXCLUDED.reconciliation_status,
               reconciled_at = EXCLUDED.reconciled_at, reconciled_by = EXCLUDED.reconciled_by",
        )
        .bind(&settlement.settlement_id)
        .bind(&settlement.amount)
        .bind(&settlement.fees)
        .bind(&settlement.tax)
        .bind(&settlement.currency)
        .bind(&settlement.status)
        .bind(&settlement.utr)
        .bind(settlement.created_at)
        .bind(settlement.reconciliation_status.as_str())
        .bind(settlement.reconciled_at)
        .bind(&settlement.reconciled_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_settlement(&self, id: &str) -> Result<Option<Settlement>, StoreError> {
        let row = sqlx::query_as::<_, SettlementRow>(&format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM settlements WHERE settlement_id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Settlement::try_from).transpose()
    }

    async fn list_settlements(&self) -> Result<Vec<Settlement>, StoreError> {
        let rows = sqlx::query_as::<_, SettlementRow>(&format!(
            "SELECT {SETTLEMENT_COLUMNS} FROM settlements ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Settlement::try_from).collect()
    }

    async fn upsert_settlement_payment(&self, entry: &SettlementPaymentEntry) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO settlement_payments (entity_id, settlement_id, entity_type, amount, fee, tax, currency, method, description, email, contact, quotation, customer, reconciliation_status, payment_entry, reconciled_at, reconciled_by)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17)
             ON CONFLICT (entity_id) DO UPDATE SET
               settlement_id = EXCLUDED.settlement_id, entity_type = EXCLUDED.entity_type,
               amount = EXCLUDED.amount, fee = EXCLUDED.fee, tax = EXCLUDED.tax,
               currency = EXCLUDED.currency, method = EXCLUDED.method,
               description = EXCLUDED.description, email = EXCLUDED.email, contact = EXCLUDED.contact,
               quotation = EXCLUDED.quotation, customer = EXCLUDED.customer,
               reconciliation_status = EXCLUDED.reconciliation_status,
               payment_entry = EXCLUDED.payment_entry, reconciled_at = EXCLUDED.reconciled_at,
               reconciled_by = EXCLUDED.reconciled_by",
        )
        .bind(&entry.entity_id)
        .bind(&entry.settlement_id)
        .bind(&entry.entity_type)
        .bind(&entry.amount)
        .bind(&entry.fee)
        .bind(&entry.tax)
        .bind(&entry.currency)
        .bind(&entry.method)
        .bind(&entry.description)
        .bind(&entry.email)
        .bind(&entry.contact)
        .bind(&entry.quotation)
        .bind(&entry.customer)
        .bind(entry.reconciliation_status.as_str())
        .bind(&entry.payment_entry)
        .bind(entry.reconciled_at)
        .bind(&entry.reconciled_by)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_settlement_payment(&self, entity_id: &str) -> Result<Option<SettlementPaymentEntry>, StoreError> {
        let row = sqlx::query_as::<_, SettlementPaymentRow>(&format!(
            "SELECT {SETTLEMENT_PAYMENT_COLUMNS} FROM settlement_payments WHERE entity_id = $1"
        ))
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SettlementPaymentEntry::try_from).transpose()
    }

    async fn list_settlement_payments(&self, settlement_id: &str) -> Result<Vec<SettlementPaymentEntry>, StoreError> {
        let rows = sqlx::query_as::<_, SettlementPaymentRow>(&format!(
            "SELECT {SETTLEMENT_PAYMENT_COLUMNS} FROM settlement_payments WHERE settlement_id = $1 ORDER BY entity_id"
        ))
        .bind(settlement_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SettlementPaymentEntry::try_from).collect()
    }

    async fn upsert_customer(&self, customer: &Customer) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO customers (name, customer_name, gateway_customer_id) VALUES ($1,$2,$3)
             ON CONFLICT (name) DO UPDATE SET
               customer_name = EXCLUDED.customer_name,
               gateway_customer_id = COALESCE(customers.gateway_customer_id, EXCLUDED.gateway_customer_id)",
        )
        .bind(&customer.name)
        .bind(&customer.customer_name)
        .bind(&customer.gateway_customer_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_customer(&self, name: &str) -> Result<Option<Customer>, StoreError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            "SELECT name, customer_name, gateway_customer_id FROM customers WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| Customer {
            name: r.name,
            customer_name: r.customer_name,
            gateway_customer_id: r.gateway_customer_id,
        }))
    }

    async fn insert_virtual_account(&self, account: &VirtualAccount) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO virtual_accounts (id, gateway_id, customer, customer_gateway_id, description, amount_expected, status, receivers, close_by, created_at)
             VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)",
        )
        .bind(&account.id)
        .bind(&account.gateway_id)
        .bind(&account.customer)
        .bind(&account.customer_gateway_id)
        .bind(&account.description)
        .bind(&account.amount_expected)
        .bind(&account.status)
        .bind(&account.receivers)
        .bind(account.close_by)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_webhook_event(&self, event_id: &str, event: &str) -> Result<bool, StoreError> {
        let inserted = sqlx::query_scalar::<_, i32>(
            "INSERT INTO webhook_events (event_id, event) VALUES ($1, $2) ON CONFLICT (event_id) DO NOTHING RETURNING 1",
        )
        .bind(event_id)
        .bind(event)
        .fetch_optional(&self.pool)
        .await?;
        Ok(inserted.is_some())
    }

    async fn release_webhook_event(&self, event_id: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM webhook_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
