//! DOCX text extraction: `word/document.xml` out of the zip container.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::AttachmentError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract the raw text of a DOCX file, one line per paragraph.
///
/// Returns an empty string when the document holds no text.
pub fn extract_docx_text(path: &Path) -> Result<String, AttachmentError> {
    let file = File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| AttachmentError::Docx(e.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| AttachmentError::Docx(format!("{DOCUMENT_PART}: {e}")))?
        .read_to_string(&mut xml)?;

    document_text(&xml)
}

/// Walk the document XML collecting `w:t` runs.
fn document_text(xml: &str) -> Result<String, AttachmentError> {
    let mut reader = Reader::from_str(xml);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_text = false,
                b"w:p" => paragraphs.push(std::mem::take(&mut current)),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => current.push('\t'),
                b"w:br" => current.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_text => {
                let text = t
                    .unescape()
                    .map_err(|e| AttachmentError::Docx(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(AttachmentError::Docx(e.to_string())),
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    let text = paragraphs.join("\n");
    if text.trim().is_empty() {
        Ok(String::new())
    } else {
        Ok(text.trim().to_string())
    }
}

/// `word/document.xml` with one paragraph per entry.
#[cfg(test)]
pub(crate) fn document_xml(paragraphs: &[&str]) -> String {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{p}</w:t></w:r></w:p>"))
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{body}</w:body></w:document>"
    )
}

/// An in-memory DOCX container holding `paragraphs`.
#[cfg(test)]
pub(crate) fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::{Cursor, Write};

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file(DOCUMENT_PART, zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(document_xml(paragraphs).as_bytes()).unwrap();
    zip.finish().unwrap().into_inner()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn write_docx(path: &Path, xml: &str) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        zip.start_file(DOCUMENT_PART, SimpleFileOptions::default()).unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    #[test]
    fn paragraphs_become_lines() {
        let xml = document_xml(&["Unit price: $25", "Delivery in 10 days"]);
        assert_eq!(
            document_text(&xml).unwrap(),
            "Unit price: $25\nDelivery in 10 days"
        );
    }

    #[test]
    fn entities_are_unescaped() {
        let xml = document_xml(&["Parts &amp; labour"]);
        assert_eq!(document_text(&xml).unwrap(), "Parts & labour");
    }

    #[test]
    fn empty_document_yields_empty_string() {
        let xml = document_xml(&[]);
        assert_eq!(document_text(&xml).unwrap(), "");
    }

    #[test]
    fn reads_zip_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("proposal.docx");
        write_docx(&path, &document_xml(&["Warranty: 2 years"]));

        assert_eq!(extract_docx_text(&path).unwrap(), "Warranty: 2 years");
    }

    #[test]
    fn zip_without_document_part_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.docx");
        let mut zip = zip::ZipWriter::new(File::create(&path).unwrap());
        zip.start_file("readme.txt", SimpleFileOptions::default()).unwrap();
        zip.write_all(b"hi").unwrap();
        zip.finish().unwrap();

        assert!(matches!(extract_docx_text(&path), Err(AttachmentError::Docx(_))));
    }
}
