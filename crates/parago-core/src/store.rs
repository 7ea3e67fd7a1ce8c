//! Persistence seam for receipts, transactions, and categories.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Category, NewTransaction, ReceiptCommit, ReceiptNotes, ReceiptRecord, ReceiptStatus,
    TransactionRecord,
};

/// Storage operations the pipeline depends on. Every write bumps the
/// record's revision; `update_notes_if_revision` is the compare-and-swap
/// used by the background categorization pass.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a pending placeholder receipt for an owner.
    async fn create_receipt(&self, owner_id: &str) -> Result<ReceiptRecord, StoreError>;

    /// Fetch a receipt by id.
    async fn receipt(&self, id: &str) -> Result<Option<ReceiptRecord>, StoreError>;

    /// Write final fields to a receipt and mark it processed.
    async fn commit_receipt(
        &self,
        id: &str,
        commit: &ReceiptCommit,
    ) -> Result<ReceiptRecord, StoreError>;

    /// Mark a receipt failed with a diagnostic message.
    async fn mark_receipt_failed(&self, id: &str, reason: &str) -> Result<(), StoreError>;

    /// Remove a receipt record.
    async fn delete_receipt(&self, id: &str) -> Result<(), StoreError>;

    /// Find a processed receipt matching owner, vendor, total, and date
    /// exactly.
    async fn find_processed_receipt(
        &self,
        owner_id: &str,
        vendor: &str,
        total: Decimal,
        date: NaiveDate,
    ) -> Result<Option<ReceiptRecord>, StoreError>;

    /// Replace a receipt's notes only if its revision still matches.
    /// Returns false when the record changed underneath the caller or no
    /// longer exists.
    async fn update_notes_if_revision(
        &self,
        id: &str,
        expected_revision: u64,
        notes: &ReceiptNotes,
    ) -> Result<bool, StoreError>;

    /// Fail every pending receipt last touched before the cutoff. Returns
    /// the number of receipts swept.
    async fn fail_stale_pending(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;

    /// Insert a transaction, minting its id.
    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<TransactionRecord, StoreError>;

    /// Delete all transactions referencing a receipt. Returns the number
    /// removed.
    async fn delete_transactions_for_receipt(
        &self,
        owner_id: &str,
        receipt_id: &str,
    ) -> Result<u64, StoreError>;

    /// List transactions referencing a receipt.
    async fn transactions_for_receipt(
        &self,
        owner_id: &str,
        receipt_id: &str,
    ) -> Result<Vec<TransactionRecord>, StoreError>;

    /// List the categories available to an owner.
    async fn categories(&self, owner_id: &str) -> Result<Vec<Category>, StoreError>;
}

#[derive(Default)]
struct Inner {
    receipts: HashMap<String, ReceiptRecord>,
    transactions: HashMap<String, TransactionRecord>,
    categories: HashMap<String, Vec<Category>>,
}

/// In-memory store. The whole state sits behind one mutex, which is plenty
/// for a single-process service and keeps the CAS semantics trivial.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the category taxonomy for an owner.
    pub fn seed_categories(&self, owner_id: &str, categories: Vec<Category>) {
        self.inner
            .lock()
            .categories
            .insert(owner_id.to_string(), categories);
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_receipt(&self, owner_id: &str) -> Result<ReceiptRecord, StoreError> {
        let now = Utc::now();
        let record = ReceiptRecord {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.to_string(),
            status: ReceiptStatus::Pending,
            vendor: None,
            date: None,
            total: None,
            currency: None,
            notes: ReceiptNotes::default(),
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        self.inner
            .lock()
            .receipts
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn receipt(&self, id: &str) -> Result<Option<ReceiptRecord>, StoreError> {
        Ok(self.inner.lock().receipts.get(id).cloned())
    }

    async fn commit_receipt(
        &self,
        id: &str,
        commit: &ReceiptCommit,
    ) -> Result<ReceiptRecord, StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .receipts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.status = ReceiptStatus::Processed;
        record.vendor = Some(commit.vendor.clone());
        record.date = Some(commit.date);
        record.total = Some(commit.total);
        record.currency = Some(commit.currency.clone());
        record.notes = commit.notes.clone();
        record.updated_at = Utc::now();
        record.revision += 1;
        Ok(record.clone())
    }

    async fn mark_receipt_failed(&self, id: &str, reason: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .receipts
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.status = ReceiptStatus::Failed;
        record.notes.message = Some(reason.to_string());
        record.updated_at = Utc::now();
        record.revision += 1;
        Ok(())
    }

    async fn delete_receipt(&self, id: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .receipts
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn find_processed_receipt(
        &self,
        owner_id: &str,
        vendor: &str,
        total: Decimal,
        date: NaiveDate,
    ) -> Result<Option<ReceiptRecord>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .receipts
            .values()
            .find(|r| {
                r.owner_id == owner_id
                    && r.status == ReceiptStatus::Processed
                    && r.vendor.as_deref() == Some(vendor)
                    && r.total == Some(total)
                    && r.date == Some(date)
            })
            .cloned())
    }

    async fn update_notes_if_revision(
        &self,
        id: &str,
        expected_revision: u64,
        notes: &ReceiptNotes,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let Some(record) = inner.receipts.get_mut(id) else {
            return Ok(false);
        };
        if record.revision != expected_revision {
            return Ok(false);
        }
        record.notes = notes.clone();
        record.updated_at = Utc::now();
        record.revision += 1;
        Ok(true)
    }

    async fn fail_stale_pending(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let mut swept = 0;
        for record in inner.receipts.values_mut() {
            if record.status == ReceiptStatus::Pending && record.updated_at < cutoff {
                record.status = ReceiptStatus::Failed;
                record.notes.message = Some("receipt scan did not complete".to_string());
                record.updated_at = Utc::now();
                record.revision += 1;
                swept += 1;
            }
        }
        Ok(swept)
    }

    async fn insert_transaction(
        &self,
        transaction: NewTransaction,
    ) -> Result<TransactionRecord, StoreError> {
        let record = TransactionRecord {
            id: Uuid::new_v4().to_string(),
            owner_id: transaction.owner_id,
            receipt_id: transaction.receipt_id,
            title: transaction.title,
            amount: transaction.amount,
            date: transaction.date,
            vendor: transaction.vendor,
            category_id: transaction.category_id,
            source: transaction.source,
        };
        self.inner
            .lock()
            .transactions
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn delete_transactions_for_receipt(
        &self,
        owner_id: &str,
        receipt_id: &str,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock();
        let before = inner.transactions.len();
        inner
            .transactions
            .retain(|_, t| !(t.owner_id == owner_id && t.receipt_id == receipt_id));
        Ok((before - inner.transactions.len()) as u64)
    }

    async fn transactions_for_receipt(
        &self,
        owner_id: &str,
        receipt_id: &str,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .transactions
            .values()
            .filter(|t| t.owner_id == owner_id && t.receipt_id == receipt_id)
            .cloned()
            .collect())
    }

    async fn categories(&self, owner_id: &str) -> Result<Vec<Category>, StoreError> {
        Ok(self
            .inner
            .lock()
            .categories
            .get(owner_id)
            .cloned()
            .unwrap_or_default())
    }
}
