//! Receipt, transaction, and category records persisted by the pipeline.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a receipt record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    /// Placeholder created at scan start, not yet committed.
    Pending,
    /// Extraction finished and the record carries final fields.
    Processed,
    /// The scan failed and the record holds a diagnostic note.
    Failed,
}

/// A stored receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptRecord {
    /// Unique record id.
    pub id: String,

    /// Owner the receipt belongs to.
    pub owner_id: String,

    /// Current lifecycle status.
    pub status: ReceiptStatus,

    /// Canonical vendor name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,

    /// Transaction date printed on the receipt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,

    /// Total amount paid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<Decimal>,

    /// ISO currency code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,

    /// Structured notes: line items plus an optional message.
    #[serde(default)]
    pub notes: ReceiptNotes,

    /// Creation timestamp.
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,

    /// Optimistic-concurrency revision, bumped on every write.
    pub revision: u64,
}

/// Structured notes attached to a receipt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReceiptNotes {
    /// Line items recognized on the receipt.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<LineItem>,

    /// Free-form diagnostic or status message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A single purchased item on a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    /// Item name as printed.
    pub name: String,

    /// Purchased quantity, when the document carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantity: Option<Decimal>,

    /// Line price exactly as printed on the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,

    /// Assigned category id, filled in by the categorization pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

impl LineItem {
    /// Quantity for display purposes. Items without a recognized quantity
    /// count as a single unit.
    pub fn display_quantity(&self) -> Decimal {
        self.quantity.unwrap_or(Decimal::ONE)
    }
}

/// Origin of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionSource {
    /// Created by the receipt scan pipeline.
    Ocr,
    /// Entered by hand.
    Manual,
}

/// A stored transaction referencing a receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique record id.
    pub id: String,

    /// Owner the transaction belongs to.
    pub owner_id: String,

    /// Receipt this transaction was derived from.
    pub receipt_id: String,

    /// Human-readable title.
    pub title: String,

    /// Transaction amount.
    pub amount: Decimal,

    /// Transaction date.
    pub date: NaiveDate,

    /// Vendor name.
    pub vendor: String,

    /// Assigned category id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,

    /// How the transaction was created.
    pub source: TransactionSource,
}

/// Transaction fields supplied at insert time; the store mints the id.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub owner_id: String,
    pub receipt_id: String,
    pub title: String,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub vendor: String,
    pub category_id: Option<String>,
    pub source: TransactionSource,
}

/// An expense category available to an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Unique category id.
    pub id: String,

    /// Display name.
    pub name: String,
}

/// Fields pulled out of a single analyzed document, before commit coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedReceipt {
    /// Vendor name after normalization and verification, if any was found.
    pub vendor: Option<String>,

    /// Total amount, if any source in the cascade produced one.
    pub total: Option<Decimal>,

    /// Transaction date.
    pub date: Option<NaiveDate>,

    /// Transaction time.
    pub time: Option<NaiveTime>,

    /// Currency code recognized on the document.
    pub currency: String,

    /// Recognized line items.
    pub items: Vec<LineItem>,
}

/// Final field set written to a receipt at commit time.
#[derive(Debug, Clone)]
pub struct ReceiptCommit {
    pub vendor: String,
    pub date: NaiveDate,
    pub total: Decimal,
    pub currency: String,
    pub notes: ReceiptNotes,
}
