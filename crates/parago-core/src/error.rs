//! Error types for the parago-core library.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the scan pipeline.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The uploaded buffer contained no bytes.
    #[error("file is empty")]
    EmptyFile,

    /// The uploaded buffer exceeded the configured size ceiling.
    #[error("file is {size} bytes, ceiling is {limit}")]
    FileTooLarge { size: usize, limit: usize },

    /// The declared or inferred media type is not accepted by the pipeline.
    #[error("unsupported media type: {0}")]
    InvalidType(String),

    /// OCR protocol error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Text-generation vendor error.
    #[error("text generation error: {0}")]
    Llm(#[from] LlmError),

    /// Record store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by the OCR client.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The submission response did not carry a job-location reference.
    #[error("submission response is missing the job reference")]
    MissingJobReference,

    /// The vendor rejected the document as malformed.
    #[error("vendor rejected the document: {0}")]
    InvalidDocument(String),

    /// The analysis job did not reach a terminal state within the poll budget.
    #[error("analysis not finished after {polls} polls")]
    Timeout { polls: u32 },

    /// The analysis job finished in the failed state.
    #[error("analysis failed: {code}: {message}")]
    Analysis { code: String, message: String },

    /// A succeeded job carried no analysis payload.
    #[error("succeeded job carried no analysis result")]
    EmptyResult,

    /// Transport-level failure talking to the vendor.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The vendor answered with an unexpected status code.
    #[error("unexpected response status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// The vendor payload could not be decoded.
    #[error("failed to decode vendor payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors raised by text-generation clients.
#[derive(Error, Debug)]
pub enum LlmError {
    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),

    /// The vendor answered with a non-success status.
    #[error("API error: {0}")]
    Api(String),

    /// The vendor payload had an unexpected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors raised by record store implementations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No record with the given id.
    #[error("record not found: {0}")]
    NotFound(String),

    /// Backend-specific failure.
    #[error("{0}")]
    Backend(String),
}

/// Per-file error taxonomy reported to the caller.
///
/// The serialized names are part of the batch endpoint's wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    EmptyFile,
    FileTooLarge,
    InvalidType,
    AzureInvalidFormat,
    OcrTimeout,
    MissingJobReference,
    Duplicate,
    Unknown,
}

impl ErrorKind {
    /// Validation-class failures. An all-failed batch that contains at least
    /// one of these reports a client error instead of a 200.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            ErrorKind::EmptyFile
                | ErrorKind::FileTooLarge
                | ErrorKind::InvalidType
                | ErrorKind::AzureInvalidFormat
        )
    }

    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::EmptyFile => "empty_file",
            ErrorKind::FileTooLarge => "file_too_large",
            ErrorKind::InvalidType => "invalid_type",
            ErrorKind::AzureInvalidFormat => "azure_invalid_format",
            ErrorKind::OcrTimeout => "ocr_timeout",
            ErrorKind::MissingJobReference => "missing_job_reference",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl ScanError {
    /// Classify the error for the per-file report.
    ///
    /// Anything without a dedicated kind surfaces as `Unknown`, with the
    /// Display string carried as the message.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::EmptyFile => ErrorKind::EmptyFile,
            ScanError::FileTooLarge { .. } => ErrorKind::FileTooLarge,
            ScanError::InvalidType(_) => ErrorKind::InvalidType,
            ScanError::Ocr(OcrError::InvalidDocument(_)) => ErrorKind::AzureInvalidFormat,
            ScanError::Ocr(OcrError::Timeout { .. }) => ErrorKind::OcrTimeout,
            ScanError::Ocr(OcrError::MissingJobReference) => ErrorKind::MissingJobReference,
            _ => ErrorKind::Unknown,
        }
    }
}

/// Result type for the parago library.
pub type Result<T> = std::result::Result<T, ScanError>;
