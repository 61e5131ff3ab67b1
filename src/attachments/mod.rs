//! Attachment text extraction.
//!
//! Attachments arrive either as files already on disk (webhook uploads) or
//! as in-memory buffers. Buffers are written to a scoped temporary file
//! that is removed when extraction returns, whatever the outcome.
//!
//! Extraction never fails outward: unsupported types and unreadable files
//! both yield empty text, with a warning logged for the latter.

pub mod decode;
pub mod docx;
pub mod pdf;

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::AttachmentError;
use crate::model::Attachment;

const PDF_MEDIA_TYPE: &str = "application/pdf";
const DOCX_MEDIA_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Where an attachment's bytes live.
#[derive(Debug, Clone)]
pub enum AttachmentSource {
    Disk(PathBuf),
    Memory(Vec<u8>),
}

/// A file received alongside an inbound message.
#[derive(Debug, Clone)]
pub struct InboundAttachment {
    pub filename: String,
    pub media_type: String,
    pub size: u64,
    pub source: AttachmentSource,
}

impl InboundAttachment {
    pub fn from_disk(
        filename: impl Into<String>,
        media_type: impl Into<String>,
        size: u64,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            filename: filename.into(),
            media_type: media_type.into(),
            size,
            source: AttachmentSource::Disk(path.into()),
        }
    }

    pub fn from_bytes(
        filename: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            filename: filename.into(),
            media_type: media_type.into(),
            size: bytes.len() as u64,
            source: AttachmentSource::Memory(bytes),
        }
    }

    /// Storage reference recorded on the proposal; only disk-backed files have one.
    pub fn storage_path(&self) -> Option<String> {
        match &self.source {
            AttachmentSource::Disk(path) => Some(path.display().to_string()),
            AttachmentSource::Memory(_) => None,
        }
    }
}

/// Document formats we can read text from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Docx,
}

impl DocumentKind {
    /// Detect from the declared media type, then the filename suffix.
    pub fn detect(media_type: &str, filename: &str) -> Option<Self> {
        let media_type = media_type.trim().to_ascii_lowercase();
        let filename = filename.trim().to_ascii_lowercase();

        if media_type == PDF_MEDIA_TYPE || filename.ends_with(".pdf") {
            Some(Self::Pdf)
        } else if media_type == DOCX_MEDIA_TYPE || filename.ends_with(".docx") {
            Some(Self::Docx)
        } else {
            None
        }
    }

    fn suffix(&self) -> &'static str {
        match self {
            Self::Pdf => ".pdf",
            Self::Docx => ".docx",
        }
    }

    fn read(&self, path: &Path) -> Result<String, AttachmentError> {
        match self {
            Self::Pdf => pdf::extract_pdf_text(path),
            Self::Docx => docx::extract_docx_text(path),
        }
    }
}

/// Turns attachments into plain text.
#[derive(Debug, Clone, Default)]
pub struct AttachmentTextExtractor {
    /// Directory for materialized buffers; the system temp dir when unset.
    temp_dir: Option<PathBuf>,
}

impl AttachmentTextExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temp_dir(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_dir: Some(temp_dir.into()),
        }
    }

    /// Extract text from one attachment. Returns an empty string on any failure.
    pub async fn extract(&self, attachment: &InboundAttachment) -> String {
        let Some(kind) = DocumentKind::detect(&attachment.media_type, &attachment.filename) else {
            debug!(
                filename = %attachment.filename,
                media_type = %attachment.media_type,
                "Unsupported attachment type, skipping"
            );
            return String::new();
        };

        let source = attachment.source.clone();
        let temp_dir = self.temp_dir.clone();
        let result = tokio::task::spawn_blocking(move || {
            extract_blocking(kind, &source, temp_dir.as_deref())
        })
        .await
        .map_err(|e| AttachmentError::Task(e.to_string()))
        .and_then(|inner| inner);

        match result {
            Ok(text) => {
                debug!(
                    filename = %attachment.filename,
                    bytes = attachment.size,
                    chars = text.len(),
                    "Extracted attachment text"
                );
                text
            }
            Err(e) => {
                warn!(filename = %attachment.filename, error = %e, "Attachment extraction failed");
                String::new()
            }
        }
    }

    /// Extract every attachment in order and return its stored metadata.
    pub async fn extract_all(&self, attachments: &[InboundAttachment]) -> Vec<Attachment> {
        let mut out = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            let extracted_text = self.extract(attachment).await;
            out.push(Attachment {
                filename: attachment.filename.clone(),
                storage_path: attachment.storage_path(),
                media_type: attachment.media_type.clone(),
                size: attachment.size,
                extracted_text,
            });
        }
        out
    }
}

/// Read a source synchronously. Memory buffers live in a temp file for the
/// duration of the read only.
fn extract_blocking(
    kind: DocumentKind,
    source: &AttachmentSource,
    temp_dir: Option<&Path>,
) -> Result<String, AttachmentError> {
    match source {
        AttachmentSource::Disk(path) => kind.read(path),
        AttachmentSource::Memory(bytes) => {
            let mut builder = tempfile::Builder::new();
            builder.prefix("rfp-attachment-").suffix(kind.suffix());
            let mut temp = match temp_dir {
                Some(dir) => builder.tempfile_in(dir)?,
                None => builder.tempfile()?,
            };
            temp.write_all(bytes)?;
            temp.flush()?;
            kind.read(temp.path())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_media_type_or_suffix() {
        assert_eq!(DocumentKind::detect("application/pdf", "x.bin"), Some(DocumentKind::Pdf));
        assert_eq!(
            DocumentKind::detect("application/octet-stream", "Quote.PDF"),
            Some(DocumentKind::Pdf)
        );
        assert_eq!(DocumentKind::detect(DOCX_MEDIA_TYPE, "x"), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::detect("", "terms.docx"), Some(DocumentKind::Docx));
        assert_eq!(DocumentKind::detect("image/png", "logo.png"), None);
    }

    #[tokio::test]
    async fn unsupported_type_is_empty() {
        let extractor = AttachmentTextExtractor::new();
        let attachment = InboundAttachment::from_bytes("logo.png", "image/png", vec![0x89, 0x50]);
        assert_eq!(extractor.extract(&attachment).await, "");
        // Total: calling again gives the same answer.
        assert_eq!(extractor.extract(&attachment).await, "");
    }

    #[tokio::test]
    async fn unreadable_pdf_degrades_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = AttachmentTextExtractor::with_temp_dir(dir.path());
        let attachment =
            InboundAttachment::from_bytes("quote.pdf", "application/pdf", b"%PDF-garbage".to_vec());

        assert_eq!(extractor.extract(&attachment).await, "");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn memory_docx_is_read_and_temp_file_removed() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = AttachmentTextExtractor::with_temp_dir(dir.path());
        let attachment = InboundAttachment::from_bytes(
            "terms.docx",
            DOCX_MEDIA_TYPE,
            docx::docx_bytes(&["Payment: Net 30", "Warranty: 2 years"]),
        );

        assert_eq!(
            extractor.extract(&attachment).await,
            "Payment: Net 30\nWarranty: 2 years"
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_disk_file_degrades() {
        let extractor = AttachmentTextExtractor::new();
        let attachment = InboundAttachment::from_disk(
            "gone.docx",
            DOCX_MEDIA_TYPE,
            10,
            "/nonexistent/path/gone.docx",
        );
        assert_eq!(extractor.extract(&attachment).await, "");
    }

    #[tokio::test]
    async fn extract_all_keeps_metadata_for_every_file() {
        let extractor = AttachmentTextExtractor::new();
        let attachments = vec![
            InboundAttachment::from_bytes("a.png", "image/png", vec![1, 2, 3]),
            InboundAttachment::from_disk("b.pdf", "application/pdf", 42, "/nonexistent/b.pdf"),
        ];

        let stored = extractor.extract_all(&attachments).await;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].filename, "a.png");
        assert_eq!(stored[0].size, 3);
        assert!(stored[0].storage_path.is_none());
        assert_eq!(stored[1].storage_path.as_deref(), Some("/nonexistent/b.pdf"));
        assert!(stored.iter().all(|a| a.extracted_text.is_empty()));
    }
}
