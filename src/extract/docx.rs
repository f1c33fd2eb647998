use docx_rs::{DocumentChild, ParagraphChild, RunChild};

use super::ExtractionError;

/// Extract body paragraphs in document order, joined by newlines.
///
/// Only top-level paragraphs are read; table contents are skipped.
pub fn extract_docx(bytes: &[u8]) -> Result<String, ExtractionError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| ExtractionError::Docx(e.to_string()))?;

    let paragraphs: Vec<String> = docx
        .document
        .children
        .into_iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(paragraph) => Some(paragraph_text(&paragraph.children)),
            _ => None,
        })
        .collect();

    Ok(paragraphs.join("\n"))
}

fn paragraph_text(children: &[ParagraphChild]) -> String {
    let mut text = String::new();
    for child in children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(t) => text.push_str(&t.text),
                    RunChild::Tab(_) => text.push('\t'),
                    RunChild::Break(_) => text.push('\n'),
                    _ => {}
                }
            }
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use docx_rs::{Docx, Paragraph, Run};
    use std::io::Cursor;

    fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
        let mut docx = Docx::new();
        for text in paragraphs {
            docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text)));
        }

        let mut buf = Cursor::new(Vec::new());
        docx.build().pack(&mut buf).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_paragraphs_joined_by_newline() {
        let bytes = build_docx(&["First paragraph", "Second paragraph"]);
        let text = extract_docx(&bytes).unwrap();
        assert_eq!(text, "First paragraph\nSecond paragraph");
    }

    #[test]
    fn test_not_a_zip() {
        let result = extract_docx(b"plain text pretending to be docx");
        assert!(matches!(result, Err(ExtractionError::Docx(_))));
    }
}
