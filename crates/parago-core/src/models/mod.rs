//! Data models for receipts, transactions, and configuration.

pub mod config;
pub mod receipt;

pub use config::{
    CategorizeConfig, ExtractionConfig, OcrConfig, ScanConfig, SweepConfig, UploadConfig,
};
pub use receipt::{
    Category, LineItem, NewTransaction, ParsedReceipt, ReceiptCommit, ReceiptNotes, ReceiptRecord,
    ReceiptStatus, TransactionRecord, TransactionSource,
};
