use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lopdf::{Document, Encoding, Object, ObjectId};

use crate::converter::{read_input, write_output, ConvertOptions, Converter};
use crate::error::ConversionError;

/// Pattern lopdf emits for CID fonts it cannot decode.
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Extracts the embedded text of every page. Scanned documents without a
/// text layer are rejected rather than producing an empty file.
pub struct PdfToText;

impl PdfToText {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfToText {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for PdfToText {
    fn name(&self) -> &str {
        "pdf-to-text"
    }

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        _options: &ConvertOptions,
    ) -> Result<PathBuf, ConversionError> {
        let _span = tracing::info_span!("converter.pdf_to_text").entered();

        let pdf_bytes = read_input(input)?;
        let doc = Document::load_mem(&pdf_bytes)
            .map_err(|e| ConversionError::Malformed(format!("not a readable PDF: {}", e)))?;

        let mut text = extract_lines(&doc).join("\n");
        text.push('\n');
        if !has_usable_text(&text) {
            return Err(ConversionError::Unsupported(
                "PDF has no extractable text layer".to_string(),
            ));
        }

        write_output(output, text.as_bytes())
    }
}

/// Text of every page, one entry per line of the content stream.
///
/// Lines end at `T*`, `'` and `"`, and at `Td`, `TD`, `Tm` or `ET` once
/// text has been shown on them. Pages that cannot be decoded are skipped.
pub(crate) fn extract_lines(doc: &Document) -> Vec<String> {
    let mut lines = Vec::new();

    for (page_num, page_id) in doc.get_pages() {
        match page_lines(doc, page_id) {
            Ok(mut page) => lines.append(&mut page),
            Err(e) => {
                tracing::warn!(page = page_num, "Skipping page without readable text: {}", e);
            }
        }
    }

    lines
}

fn page_lines(doc: &Document, page_id: ObjectId) -> lopdf::Result<Vec<String>> {
    let encodings: BTreeMap<Vec<u8>, Encoding> = doc
        .get_page_fonts(page_id)?
        .into_iter()
        .filter_map(|(name, font)| font.get_font_encoding(doc).ok().map(|enc| (name, enc)))
        .collect();
    let content = doc.get_and_decode_page_content(page_id)?;

    let mut lines = Vec::new();
    let mut current = String::new();
    let mut encoding: Option<&Encoding> = None;

    for operation in &content.operations {
        match operation.operator.as_str() {
            "Tf" => {
                encoding = operation
                    .operands
                    .first()
                    .and_then(|name| name.as_name().ok())
                    .and_then(|name| encodings.get(name));
            }
            "Tj" | "TJ" => {
                if let Some(enc) = encoding {
                    collect_text(&mut current, enc, &operation.operands)?;
                }
            }
            "'" | "\"" => {
                lines.push(std::mem::take(&mut current));
                if let Some(enc) = encoding {
                    collect_text(&mut current, enc, &operation.operands)?;
                }
            }
            "T*" => lines.push(std::mem::take(&mut current)),
            "Td" | "TD" | "Tm" | "ET" => {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
            }
            _ => {}
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    Ok(lines)
}

fn collect_text(text: &mut String, encoding: &Encoding, operands: &[Object]) -> lopdf::Result<()> {
    for operand in operands {
        match operand {
            Object::String(bytes, _) => text.push_str(&Document::decode_text(encoding, bytes)?),
            Object::Array(items) => collect_text(text, encoding, items)?,
            // large negative kerning in a TJ array stands for a word gap
            Object::Integer(i) if *i < -100 => text.push(' '),
            _ => {}
        }
    }
    Ok(())
}

fn has_usable_text(text: &str) -> bool {
    let cleaned = text.replace(IDENTITY_H_PATTERN, "");
    cleaned.chars().any(|c| c.is_alphanumeric())
}
