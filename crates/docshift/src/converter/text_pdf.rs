use std::path::{Path, PathBuf};

use crate::converter::{read_input, write_output, ConvertOptions, Converter};
use crate::error::ConversionError;

const DEFAULT_LINES_PER_PAGE: usize = 60;
const MAX_LINES_PER_PAGE: usize = 200;

/// Lays out plain text in a monospaced font, one PDF page per
/// `lines_per_page` lines (option, default 60).
pub struct TextToPdf;

impl TextToPdf {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextToPdf {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for TextToPdf {
    fn name(&self) -> &str {
        "text-to-pdf"
    }

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        options: &ConvertOptions,
    ) -> Result<PathBuf, ConversionError> {
        let _span = tracing::info_span!("converter.text_to_pdf").entered();

        let lines_per_page = lines_per_page(options)?;
        let bytes = read_input(input)?;
        let text = String::from_utf8(bytes)
            .map_err(|_| ConversionError::Malformed("input is not valid UTF-8 text".to_string()))?;

        let pdf_bytes = create_text_pdf(&text, lines_per_page)?;
        write_output(output, &pdf_bytes)
    }
}

fn lines_per_page(options: &ConvertOptions) -> Result<usize, ConversionError> {
    match options.get("lines_per_page") {
        None => Ok(DEFAULT_LINES_PER_PAGE),
        Some(raw) => match raw.parse::<usize>() {
            Ok(n) if (1..=MAX_LINES_PER_PAGE).contains(&n) => Ok(n),
            _ => Err(ConversionError::Unsupported(format!(
                "lines_per_page must be between 1 and {}, got '{}'",
                MAX_LINES_PER_PAGE, raw
            ))),
        },
    }
}

fn create_text_pdf(text: &str, lines_per_page: usize) -> Result<Vec<u8>, ConversionError> {
    use lopdf::{dictionary, Document, Object, Stream};

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

    let lines: Vec<&str> = text.lines().collect();
    let empty: &[&str] = &[];
    let pages: Vec<&[&str]> = if lines.is_empty() {
        vec![empty]
    } else {
        lines.chunks(lines_per_page).collect()
    };

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page_lines in pages {
        let content = format_page_content(page_lines);
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| ConversionError::Tool(e.to_string()))?;

    Ok(buffer)
}

fn format_page_content(lines: &[&str]) -> String {
    let mut content = String::new();
    content.push_str("BT\n");
    content.push_str("/F1 10 Tf\n");
    content.push_str("50 742 Td\n");
    content.push_str("12 TL\n");

    for line in lines {
        content.push_str(&format!("({}) Tj T*\n", escape_pdf_string(line)));
    }

    content.push_str("ET\n");
    content
}

fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            c if c.is_ascii() && !c.is_control() => c.to_string(),
            // Courier without an embedded font only covers ASCII
            _ => " ".to_string(),
        })
        .collect()
}
