//! services/api/src/extract.rs
//!
//! Turns an uploaded document into raw text.
//!
//! Plain text is decoded as UTF-8. PDFs are parsed page by page with
//! `pdf-extract` on the blocking pool. The file extension decides which path
//! is taken; anything else is rejected before a single byte is parsed.

use bytes::Bytes;
use pdf_extract::{Document, OutputError, PlainTextOutput};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// Errors produced while resolving a document to text.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("File is not valid UTF-8 text: {0}")]
    InvalidEncoding(String),
    #[error("Could not extract text from the document: {0}")]
    ExtractionFailed(String),
}

/// The document formats we know how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Pdf,
}

impl DocumentFormat {
    /// Picks a format from the file extension (case-insensitive).
    pub fn from_file_name(file_name: &str) -> Result<Self, ExtractError> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "txt" => Ok(DocumentFormat::PlainText),
            "pdf" => Ok(DocumentFormat::Pdf),
            _ => Err(ExtractError::UnsupportedFormat(file_name.to_string())),
        }
    }
}

/// Decodes a plain-text upload, dropping a leading byte-order mark.
pub fn extract_plain_text(data: &[u8]) -> Result<String, ExtractError> {
    let text = std::str::from_utf8(data).map_err(|e| ExtractError::InvalidEncoding(e.to_string()))?;
    Ok(text.strip_prefix('\u{feff}').unwrap_or(text).to_string())
}

/// Extracts the text of every page, in order, one line break between pages.
///
/// A page that fails to extract contributes an empty string. Only a document
/// that cannot be opened at all is an error.
pub fn extract_pdf(data: &[u8]) -> Result<String, ExtractError> {
    let mut doc =
        Document::load_mem(data).map_err(|e| ExtractError::ExtractionFailed(e.to_string()))?;
    if doc.is_encrypted() {
        // Documents with an owner password only still open with the empty user password.
        doc.decrypt("")
            .map_err(|e| ExtractError::ExtractionFailed(format!("encrypted document: {}", e)))?;
    }

    let page_numbers: Vec<u32> = doc.get_pages().into_keys().collect();
    let pages: Vec<String> = page_numbers
        .iter()
        .map(|&page_num| extract_pdf_page(&doc, page_num))
        .collect();

    let empty_pages = pages.iter().filter(|p| p.trim().is_empty()).count();
    if empty_pages > 0 {
        debug!("{} of {} PDF pages yielded no text", empty_pages, pages.len());
    }

    Ok(pages.join("\n"))
}

/// The text of a single page, or an empty string if the page cannot be read.
fn extract_pdf_page(doc: &Document, page_num: u32) -> String {
    // pdf-extract panics on some malformed pages (missing fonts, bad boxes).
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<String, OutputError> {
        let mut text = String::new();
        {
            let mut output = PlainTextOutput::new(&mut text);
            pdf_extract::output_doc_page(doc, &mut output, page_num)?;
        }
        Ok(text)
    }));

    match outcome {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            warn!("Skipping unreadable PDF page {}: {}", page_num, e);
            String::new()
        }
        Err(_) => {
            warn!("Skipping PDF page {}: the parser panicked", page_num);
            String::new()
        }
    }
}

/// Resolves an uploaded file to text according to its extension.
pub async fn extract_document(file_name: &str, data: Bytes) -> Result<String, ExtractError> {
    match DocumentFormat::from_file_name(file_name)? {
        DocumentFormat::PlainText => extract_plain_text(&data),
        DocumentFormat::Pdf => {
            // CPU bound; keep it off the async workers.
            tokio::task::spawn_blocking(move || extract_pdf(&data))
                .await
                .map_err(|e| {
                    warn!("PDF extraction task failed: {}", e);
                    ExtractError::ExtractionFailed("the PDF parser aborted".to_string())
                })?
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    /// A PDF with one page per `(font, text)` pair. Only font `F1` is defined.
    fn pdf_with_pages(pages: &[(&str, &str)]) -> Vec<u8> {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for &(font, text) in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec![Object::Name(font.as_bytes().to_vec()), Object::Integer(24)]),
                    Operation::new("Td", vec![Object::Integer(100), Object::Integer(600)]),
                    Operation::new("Tj", vec![Object::string_literal(text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::Reference(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(595),
                    Object::Integer(842),
                ],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn formats_are_picked_by_extension() {
        assert_eq!(DocumentFormat::from_file_name("mail.txt").unwrap(), DocumentFormat::PlainText);
        assert_eq!(DocumentFormat::from_file_name("Invoice.PDF").unwrap(), DocumentFormat::Pdf);
        assert_eq!(DocumentFormat::from_file_name("a.b.pdf").unwrap(), DocumentFormat::Pdf);
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        for name in ["report.csv", "notes", "archive.pdf.zip", ".txt.exe", ""] {
            assert!(
                matches!(DocumentFormat::from_file_name(name), Err(ExtractError::UnsupportedFormat(_))),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn plain_text_is_decoded_and_bom_stripped() {
        assert_eq!(extract_plain_text(b"Hello team").unwrap(), "Hello team");
        assert_eq!(extract_plain_text("\u{feff}Ol\u{e1}".as_bytes()).unwrap(), "Ol\u{e1}");
    }

    #[test]
    fn invalid_utf8_is_an_encoding_error() {
        assert!(matches!(
            extract_plain_text(&[0x48, 0xff, 0xfe]),
            Err(ExtractError::InvalidEncoding(_))
        ));
    }

    #[test]
    fn garbage_pdf_fails_extraction() {
        assert!(matches!(
            extract_pdf(b"This is not a PDF"),
            Err(ExtractError::ExtractionFailed(_))
        ));
    }

    #[test]
    fn pdf_pages_are_extracted_in_order() {
        let pdf = pdf_with_pages(&[("F1", "Alpha"), ("F1", "Bravo"), ("F1", "Charlie")]);
        let text = extract_pdf(&pdf).unwrap();

        let alpha = text.find("Alpha").unwrap();
        let bravo = text.find("Bravo").unwrap();
        let charlie = text.find("Charlie").unwrap();
        assert!(alpha < bravo && bravo < charlie, "pages out of order: {:?}", text);
    }

    #[test]
    fn a_bad_page_does_not_lose_the_good_ones() {
        // The second page uses a font that is never defined.
        let pdf = pdf_with_pages(&[("F1", "Hello"), ("F9", "World"), ("F1", "Again")]);
        let text = extract_pdf(&pdf).unwrap();

        assert!(text.contains("Hello"), "{:?}", text);
        assert!(text.contains("Again"), "{:?}", text);
        assert!(!text.contains("World"), "{:?}", text);
    }

    #[tokio::test]
    async fn pdf_uploads_go_through_the_blocking_pool() {
        let pdf = pdf_with_pages(&[("F1", "Invoice"), ("F1", "attached")]);
        let text = extract_document("Mail.PDF", Bytes::from(pdf)).await.unwrap();
        assert!(text.contains("Invoice") && text.contains("attached"));
    }

    #[tokio::test]
    async fn csv_is_rejected_regardless_of_contents() {
        let result = extract_document("data.csv", Bytes::from_static(b"Please review the invoice")).await;
        assert!(matches!(result, Err(ExtractError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn broken_pdf_upload_is_reported_not_swallowed() {
        let result = extract_document("mail.pdf", Bytes::from_static(b"%PDF-1.4 truncated")).await;
        assert!(matches!(result, Err(ExtractError::ExtractionFailed(_))));
    }
}
