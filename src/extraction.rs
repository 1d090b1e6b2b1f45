//! Page-level text extraction from PDF documents.
//!
//! Extraction reads from a path because uploads are staged to a transient file first. Pages are
//! numbered from 1 in document order and whitespace-only pages never leave this module.

use lopdf::Document;
use std::path::Path;
use thiserror::Error;

/// Text extracted from a single PDF page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// One-based page number within the source document.
    pub page_number: u32,
    /// Raw page text as produced by the extractor.
    pub text: String,
}

/// Errors raised while reading a PDF.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The document could not be parsed as a PDF.
    #[error("Failed to parse PDF: {0}")]
    Parse(String),
}

/// Turns a document on disk into an ordered list of non-empty pages.
pub trait PageExtractor: Send + Sync {
    /// Extract the text of every page that carries some.
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractionError>;
}

/// [`PageExtractor`] backed by `lopdf`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    /// Construct the extractor.
    pub const fn new() -> Self {
        Self
    }
}

impl PageExtractor for LopdfExtractor {
    fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, ExtractionError> {
        let document =
            Document::load(path).map_err(|error| ExtractionError::Parse(error.to_string()))?;

        let mut pages = Vec::new();
        // `get_pages` is keyed by page number, so iteration is already ascending.
        for page_number in document.get_pages().into_keys() {
            let text = match document.extract_text(&[page_number]) {
                Ok(text) => text,
                Err(error) => {
                    tracing::warn!(
                        page_number,
                        error = %error,
                        "Page text could not be decoded; treating page as empty"
                    );
                    continue;
                }
            };

            if text.trim().is_empty() {
                tracing::trace!(page_number, "Skipping page without text");
                continue;
            }

            pages.push(PageText { page_number, text });
        }

        tracing::debug!(pages = pages.len(), "PDF text extraction complete");
        Ok(pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{Object, Stream, dictionary};
    use std::io::Write;

    /// Build an in-memory PDF with one page per entry; `None` produces a page without text.
    fn build_pdf(pages: &[Option<&str>]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for page in pages {
            let operations = match page {
                Some(text) => vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
                None => Vec::new(),
            };
            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().expect("encode content"),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).expect("serialize pdf");
        buffer
    }

    fn write_temp(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".pdf")
            .tempfile()
            .expect("temp file");
        file.write_all(bytes).expect("write pdf");
        file
    }

    #[test]
    fn extracts_pages_in_order_and_skips_blank_ones() {
        let pdf = build_pdf(&[Some("First page text"), None, Some("Third page text")]);
        let file = write_temp(&pdf);

        let pages = LopdfExtractor::new()
            .extract_pages(file.path())
            .expect("extraction succeeds");

        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);
        assert!(pages[0].text.contains("First page text"));
        assert_eq!(pages[1].page_number, 3);
        assert!(pages[1].text.contains("Third page text"));
    }

    #[test]
    fn textless_document_yields_no_pages() {
        let pdf = build_pdf(&[None, None]);
        let file = write_temp(&pdf);

        let pages = LopdfExtractor::new()
            .extract_pages(file.path())
            .expect("extraction succeeds");
        assert!(pages.is_empty());
    }

    #[test]
    fn extraction_is_deterministic() {
        let pdf = build_pdf(&[Some("Stable text")]);
        let first = LopdfExtractor::new()
            .extract_pages(write_temp(&pdf).path())
            .expect("first run");
        let second = LopdfExtractor::new()
            .extract_pages(write_temp(&pdf).path())
            .expect("second run");
        assert_eq!(first, second);
    }

    #[test]
    fn garbage_bytes_are_a_parse_error() {
        let file = write_temp(b"definitely not a pdf");
        let error = LopdfExtractor::new()
            .extract_pages(file.path())
            .unwrap_err();
        assert!(matches!(error, ExtractionError::Parse(_)));
    }
}
