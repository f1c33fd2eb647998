use lopdf::Document;

use super::ExtractionError;

/// Extract the text of every page, concatenated in page order.
///
/// Any page that fails to decode fails the whole document.
pub fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractionError> {
    let document =
        Document::load_mem(bytes).map_err(|e| ExtractionError::Pdf(format!("load: {e}")))?;

    if document.is_encrypted() {
        return Err(ExtractionError::Pdf("document is encrypted".into()));
    }

    // `get_pages` is keyed by 1-based page number, so iteration is in order.
    let mut text = String::new();
    for page_number in document.get_pages().into_keys() {
        let page_text = document
            .extract_text(&[page_number])
            .map_err(|e| ExtractionError::Pdf(format!("page {page_number}: {e}")))?;
        text.push_str(&page_text);
    }

    Ok(text)
}
