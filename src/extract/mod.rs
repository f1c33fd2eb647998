//! Plain-text extraction from uploaded office documents.
//!
//! Dispatch is a pure function of the declared file type and the raw
//! bytes; no state is shared between calls.

pub mod docx;
pub mod pdf;
pub mod text;

use thiserror::Error;

use crate::db::models::FileType;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("failed to extract text from PDF: {0}")]
    Pdf(String),

    #[error("failed to extract text from DOCX: {0}")]
    Docx(String),

    /// The stored bytes could not be loaded for extraction.
    #[error("failed to read stored file: {0}")]
    Read(String),

    /// The extraction task panicked or was cancelled.
    #[error("extraction task aborted: {0}")]
    Aborted(String),

    #[error("content extraction not supported for {0} files")]
    Unsupported(FileType),
}

/// Whether [`extract`] handles this file type at all.
pub fn is_extractable(file_type: FileType) -> bool {
    matches!(
        file_type,
        FileType::Pdf | FileType::Doc | FileType::Docx | FileType::Txt
    )
}

/// Convert raw file bytes into plain text according to the declared type.
///
/// `doc` shares the DOCX reader; legacy binary Word files fail there and
/// surface as [`ExtractionError::Docx`].
pub fn extract(file_type: FileType, bytes: &[u8]) -> Result<String, ExtractionError> {
    match file_type {
        FileType::Pdf => pdf::extract_pdf(bytes),
        FileType::Doc | FileType::Docx => docx::extract_docx(bytes),
        FileType::Txt => Ok(text::extract_txt(bytes)),
        other => Err(ExtractionError::Unsupported(other)),
    }
}
