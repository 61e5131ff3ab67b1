//! PDF text extraction over `lopdf` content streams.
//!
//! String operands are glyph codes in the current font's encoding, so each
//! run is decoded through the encoding selected by the last `Tf`. Fonts
//! whose encoding `lopdf` cannot resolve fall back to lossy UTF-8.

use std::collections::BTreeMap;
use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{Document, Encoding, Object, ObjectId};
use tracing::debug;

use crate::attachments::decode::{normalize_whitespace, safe_decode_token};
use crate::error::AttachmentError;

/// Text-showing operators whose string operands are rendered text.
const TEXT_OPERATORS: [&str; 4] = ["Tj", "TJ", "'", "\""];

/// Font resource name to its text encoding.
type FontEncodings<'a> = BTreeMap<Vec<u8>, Encoding<'a>>;

/// Extract plain text from every page of the PDF at `path`.
///
/// Runs inside one `BT`/`ET` block are joined with spaces, blocks with
/// newlines. A page whose content stream cannot be decoded is skipped.
pub fn extract_pdf_text(path: &Path) -> Result<String, AttachmentError> {
    let doc = Document::load(path).map_err(|e| AttachmentError::Pdf(e.to_string()))?;

    let mut blocks: Vec<String> = Vec::new();
    for (page_number, page_id) in doc.get_pages() {
        let content = match doc
            .get_page_content(page_id)
            .and_then(|data| Content::decode(&data))
        {
            Ok(content) => content,
            Err(e) => {
                debug!(page = page_number, error = %e, "Skipping undecodable PDF page");
                continue;
            }
        };
        let encodings = page_encodings(&doc, page_id);
        blocks.extend(text_blocks(&content.operations, &encodings));
    }

    Ok(normalize_whitespace(&blocks.join("\n")))
}

/// Encodings of every font the page references. Fonts that fail to resolve
/// are left out.
fn page_encodings(doc: &Document, page_id: ObjectId) -> FontEncodings<'_> {
    let fonts = match doc.get_page_fonts(page_id) {
        Ok(fonts) => fonts,
        Err(e) => {
            debug!(error = %e, "No font resources on PDF page");
            return FontEncodings::new();
        }
    };

    fonts
        .into_iter()
        .filter_map(|(name, font)| match font.get_font_encoding(doc) {
            Ok(encoding) => Some((name, encoding)),
            Err(e) => {
                debug!(
                    font = %String::from_utf8_lossy(&name),
                    error = %e,
                    "Unresolvable font encoding"
                );
                None
            }
        })
        .collect()
}

/// Group decoded text runs into `BT`/`ET` blocks.
fn text_blocks(operations: &[Operation], encodings: &FontEncodings<'_>) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut runs: Vec<String> = Vec::new();
    let mut encoding: Option<&Encoding<'_>> = None;

    for op in operations {
        match op.operator.as_str() {
            "BT" => runs.clear(),
            "ET" => {
                if !runs.is_empty() {
                    blocks.push(runs.join(" "));
                    runs.clear();
                }
            }
            "Tf" => {
                encoding = op
                    .operands
                    .first()
                    .and_then(|name| name.as_name().ok())
                    .and_then(|name| encodings.get(name));
            }
            operator if TEXT_OPERATORS.contains(&operator) => {
                let mut text = String::new();
                collect_strings(&op.operands, encoding, &mut text);
                if !text.is_empty() {
                    runs.push(safe_decode_token(&text));
                }
            }
            _ => {}
        }
    }

    // Unterminated trailing block.
    if !runs.is_empty() {
        blocks.push(runs.join(" "));
    }
    blocks
}

/// Decode and concatenate string operands, descending into `TJ` arrays.
fn collect_strings(operands: &[Object], encoding: Option<&Encoding<'_>>, out: &mut String) {
    for operand in operands {
        match operand {
            Object::String(bytes, _) => out.push_str(&decode_run(bytes, encoding)),
            Object::Array(items) => collect_strings(items, encoding, out),
            _ => {}
        }
    }
}

fn decode_run(bytes: &[u8], encoding: Option<&Encoding<'_>>) -> String {
    match encoding.map(|e| Document::decode_text(e, bytes)) {
        Some(Ok(text)) => text,
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}
