//! Document-analysis client: submission, polling, and wire types.

pub mod client;
pub mod protocol;

pub use client::{AnalyzeBackend, HttpAnalyzeBackend, JobRef, OcrClient};
pub use protocol::{AnalyzeOperation, AnalyzeResult, OperationStatus, ReceiptFields};

/// Media types accepted for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Jpeg,
    Png,
    Webp,
    Pdf,
}

impl MediaType {
    /// Resolve from a declared MIME type.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/jpeg" | "image/jpg" => Some(MediaType::Jpeg),
            "image/png" => Some(MediaType::Png),
            "image/webp" => Some(MediaType::Webp),
            "application/pdf" => Some(MediaType::Pdf),
            _ => None,
        }
    }

    /// Resolve from a file name extension.
    pub fn from_filename(name: &str) -> Option<Self> {
        let ext = name.rsplit('.').next()?;
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(MediaType::Jpeg),
            "png" => Some(MediaType::Png),
            "webp" => Some(MediaType::Webp),
            "pdf" => Some(MediaType::Pdf),
            _ => None,
        }
    }

    /// Canonical MIME string sent to the vendor.
    pub fn as_mime(&self) -> &'static str {
        match self {
            MediaType::Jpeg => "image/jpeg",
            MediaType::Png => "image/png",
            MediaType::Webp => "image/webp",
            MediaType::Pdf => "application/pdf",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_from_mime() {
        assert_eq!(MediaType::from_mime("image/jpeg"), Some(MediaType::Jpeg));
        assert_eq!(MediaType::from_mime("IMAGE/PNG"), Some(MediaType::Png));
        assert_eq!(MediaType::from_mime("application/pdf"), Some(MediaType::Pdf));
        assert_eq!(MediaType::from_mime("text/plain"), None);
        assert_eq!(MediaType::from_mime("image/gif"), None);
    }

    #[test]
    fn test_media_type_from_filename() {
        assert_eq!(MediaType::from_filename("receipt.JPG"), Some(MediaType::Jpeg));
        assert_eq!(MediaType::from_filename("scan.pdf"), Some(MediaType::Pdf));
        assert_eq!(MediaType::from_filename("img.webp"), Some(MediaType::Webp));
        assert_eq!(MediaType::from_filename("notes.txt"), None);
        assert_eq!(MediaType::from_filename("noextension"), None);
    }
}
