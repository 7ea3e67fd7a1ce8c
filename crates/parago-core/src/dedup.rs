//! Duplicate receipt detection.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::StoreError;
use crate::store::RecordStore;

/// Detects whether an incoming scan duplicates a receipt the owner already
/// has. A processed receipt only counts as a duplicate while a transaction
/// still references it; once its transactions are gone the receipt is an
/// orphan and resubmission wins.
pub struct DuplicateDetector {
    store: Arc<dyn RecordStore>,
}

impl DuplicateDetector {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Return the id of the existing receipt this scan duplicates, if any.
    /// Matching is exact equality on owner, vendor, total, and date.
    pub async fn find_duplicate(
        &self,
        owner_id: &str,
        vendor: &str,
        total: Decimal,
        date: NaiveDate,
    ) -> Result<Option<String>, StoreError> {
        let Some(existing) = self
            .store
            .find_processed_receipt(owner_id, vendor, total, date)
            .await?
        else {
            return Ok(None);
        };

        let transactions = self
            .store
            .transactions_for_receipt(owner_id, &existing.id)
            .await?;
        if transactions.is_empty() {
            return Ok(None);
        }
        Ok(Some(existing.id))
    }
}
