//! Plain-text extraction from uploaded files.
//!
//! PDF goes through `pdf-extract`, DOCX is read straight from the
//! `word/document.xml` part of its ZIP container, everything else is decoded
//! as UTF-8. Page and paragraph boundaries collapse to a single `\n`.
//! Parsing is CPU-bound and runs on the blocking thread pool.

use std::io::{Cursor, Read};

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;
use zip::ZipArchive;

use crate::document::{Document, DocumentFormat};
use crate::error::{RagError, Result};

const DOCX_BODY_PART: &str = "word/document.xml";

/// Extract plain text from a document according to its declared format.
///
/// # Errors
///
/// Returns [`RagError::Extraction`] for malformed PDF/DOCX input and
/// [`RagError::Decode`] for plain-text input that is not valid UTF-8.
pub async fn extract_text(document: &Document) -> Result<String> {
    debug!(
        filename = %document.filename,
        format = %document.format,
        bytes = document.bytes.len(),
        "extracting text"
    );

    match document.format {
        DocumentFormat::Pdf => {
            let bytes = document.bytes.clone();
            run_blocking(DocumentFormat::Pdf, move || extract_pdf(&bytes)).await
        }
        DocumentFormat::Docx => {
            let bytes = document.bytes.clone();
            run_blocking(DocumentFormat::Docx, move || extract_docx(&bytes)).await
        }
        DocumentFormat::PlainText => decode_plain_text(&document.bytes),
    }
}

async fn run_blocking<F>(format: DocumentFormat, extract: F) -> Result<String>
where
    F: FnOnce() -> Result<String> + Send + 'static,
{
    // A panicking parser surfaces as a JoinError rather than taking the worker down.
    tokio::task::spawn_blocking(extract)
        .await
        .map_err(|e| extraction_error(format, format!("extraction task failed: {e}")))?
}

fn extraction_error(format: DocumentFormat, message: impl Into<String>) -> RagError {
    RagError::Extraction { format: format.to_string(), message: message.into() }
}

/// Extract the text of every page of a PDF, one `\n` between pages.
pub fn extract_pdf(bytes: &[u8]) -> Result<String> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| extraction_error(DocumentFormat::Pdf, e.to_string()))?;

    let pages: Vec<&str> = text
        .split('\u{c}')
        .map(|page| page.trim_matches('\n'))
        .filter(|page| !page.is_empty())
        .collect();
    Ok(pages.join("\n"))
}

/// Extract the paragraphs of a DOCX body, one `\n` between paragraphs.
pub fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| extraction_error(DocumentFormat::Docx, format!("not a zip container: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCX_BODY_PART)
        .map_err(|e| extraction_error(DocumentFormat::Docx, format!("{DOCX_BODY_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| extraction_error(DocumentFormat::Docx, format!("{DOCX_BODY_PART}: {e}")))?;

    docx_paragraphs(&xml).map(|paragraphs| paragraphs.join("\n"))
}

fn docx_paragraphs(xml: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_run = false;
    let mut in_text_run = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:r" => in_run = true,
                b"w:t" => in_text_run = true,
                b"w:p" => current.clear(),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                // Outside a run, `w:tab` is a tab-stop definition.
                b"w:tab" if in_run => current.push('\t'),
                b"w:br" | b"w:cr" if in_run => current.push('\n'),
                b"w:p" => paragraphs.push(String::new()),
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:r" => in_run = false,
                b"w:t" => in_text_run = false,
                b"w:p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Text(e)) if in_text_run => {
                let text = e
                    .unescape()
                    .map_err(|e| extraction_error(DocumentFormat::Docx, e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(extraction_error(
                    DocumentFormat::Docx,
                    format!("XML parse error at byte {}: {e}", reader.buffer_position()),
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

/// Decode a plain-text upload. A leading BOM is dropped and CRLF becomes LF.
pub fn decode_plain_text(bytes: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(bytes).map_err(|e| RagError::Decode(e.to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    Ok(text.replace("\r\n", "\n"))
}
