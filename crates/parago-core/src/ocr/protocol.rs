//! Wire types for the document-analysis vendor API.
//!
//! Field payloads are heavily shape-shifting: depending on the document, a
//! value arrives as a typed `value*` property, a nested currency object, or
//! only as raw `content` text. Every field is therefore optional and the
//! extraction cascades decide which representation wins.

use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;

/// State of an asynchronous analysis job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationStatus {
    NotStarted,
    Running,
    Succeeded,
    Failed,
}

/// Top-level poll response for an analysis job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeOperation {
    /// Job state.
    pub status: OperationStatus,

    /// Analysis payload, present once the job succeeded.
    #[serde(default)]
    pub analyze_result: Option<AnalyzeResult>,

    /// Vendor error detail, present when the job failed.
    #[serde(default)]
    pub error: Option<VendorError>,
}

/// Vendor-reported failure detail.
#[derive(Debug, Clone, Deserialize)]
pub struct VendorError {
    /// Machine-readable error code.
    #[serde(default)]
    pub code: String,

    /// Human-readable message.
    #[serde(default)]
    pub message: String,
}

impl VendorError {
    /// Whether the code names a problem with the submitted document rather
    /// than with the service.
    pub fn is_content_error(&self) -> bool {
        matches!(
            self.code.as_str(),
            "InvalidContent" | "InvalidContentDimensions" | "InvalidContentLength" | "InvalidImage"
        )
    }
}

/// Completed analysis payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeResult {
    /// Full recognized text of the document.
    #[serde(default)]
    pub content: String,

    /// Structured documents recognized on the page.
    #[serde(default)]
    pub documents: Vec<AnalyzedDocument>,
}

impl AnalyzeResult {
    /// Fields of the first recognized document, if any.
    pub fn first_document(&self) -> Option<&ReceiptFields> {
        self.documents.first().map(|d| &d.fields)
    }
}

/// A single recognized document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedDocument {
    /// Vendor document classification, e.g. `receipt.retailMeal`.
    #[serde(default)]
    pub doc_type: String,

    /// Recognized fields.
    #[serde(default)]
    pub fields: ReceiptFields,
}

/// Receipt-level fields recognized by the vendor. Field names on the wire
/// are PascalCase.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ReceiptFields {
    pub merchant_name: Option<FieldValue>,
    pub merchant_address: Option<FieldValue>,
    pub total: Option<FieldValue>,
    pub subtotal: Option<FieldValue>,
    pub total_tax: Option<FieldValue>,
    pub amount_due: Option<FieldValue>,
    pub transaction_date: Option<FieldValue>,
    pub transaction_time: Option<FieldValue>,
    pub items: Option<ItemsField>,
}

/// One recognized field in any of its wire representations.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FieldValue {
    pub value_number: Option<f64>,
    pub value_string: Option<String>,
    pub value_date: Option<NaiveDate>,
    pub value_time: Option<NaiveTime>,
    pub value_currency: Option<CurrencyValue>,
    pub content: Option<String>,
}

/// Typed currency amount.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyValue {
    #[serde(default)]
    pub amount: Option<f64>,

    #[serde(default)]
    pub currency_code: Option<String>,
}

/// The `Items` array field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemsField {
    pub value_array: Vec<ItemEntry>,
}

/// One entry of the items array.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ItemEntry {
    pub value_object: ItemFields,
}

/// Recognized per-item fields. Different document models label the item
/// name differently, so all three candidates are kept.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ItemFields {
    pub description: Option<FieldValue>,
    pub name: Option<FieldValue>,
    pub product_name: Option<FieldValue>,
    pub quantity: Option<FieldValue>,
    pub price: Option<FieldValue>,
    pub total_price: Option<FieldValue>,
}
