//! Format identifiers and the (input, output) pairs converters are keyed by.
//!
//! Every identifier is normalized to a lower-case file extension, whether it
//! was given as an extension (`PDF`, `.pdf`), an alias (`jpeg`) or a MIME
//! type (`application/pdf`). Registration and lookup share this normalization.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::DocshiftError;

/// A normalized format identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Format(String);

impl Format {
    /// Parses an extension, alias or MIME type.
    pub fn parse(raw: &str) -> Result<Self, DocshiftError> {
        let trimmed = raw.trim();
        if trimmed.contains('/') {
            return Self::from_mime(trimmed);
        }

        let ext = trimmed.trim_start_matches('.').to_ascii_lowercase();
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(DocshiftError::invalid_input(format!(
                "invalid format identifier '{}'",
                raw
            )));
        }

        Ok(Self(canonical_extension(&ext).to_string()))
    }

    /// Derives the format from a MIME type such as `text/plain; charset=utf-8`.
    pub fn from_mime(mime: &str) -> Result<Self, DocshiftError> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if let Some(ext) = well_known_mime_extension(&essence) {
            return Ok(Self(ext.to_string()));
        }

        mime_guess::get_mime_extensions_str(&essence)
            .and_then(|exts| exts.first())
            .map(|ext| Self(canonical_extension(ext).to_string()))
            .ok_or_else(|| DocshiftError::invalid_input(format!("unknown MIME type '{}'", mime)))
    }

    /// Derives the format from a file name's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| Self::parse(e).ok())
    }

    pub fn extension(&self) -> &str {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// MIME type for responses carrying this format.
    pub fn mime_type(&self) -> String {
        mime_guess::from_ext(&self.0)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Format {
    type Error = DocshiftError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Format> for String {
    fn from(value: Format) -> Self {
        value.0
    }
}

impl std::str::FromStr for Format {
    type Err = DocshiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn canonical_extension(ext: &str) -> &str {
    match ext {
        "jpeg" | "jpe" => "jpg",
        "text" => "txt",
        "markdown" => "md",
        "tif" => "tiff",
        "htm" => "html",
        "yml" => "yaml",
        other => other,
    }
}

fn well_known_mime_extension(essence: &str) -> Option<&'static str> {
    match essence {
        "application/pdf" => Some("pdf"),
        "text/plain" => Some("txt"),
        "text/markdown" => Some("md"),
        "text/csv" => Some("csv"),
        "text/html" => Some("html"),
        "application/json" => Some("json"),
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/tiff" => Some("tiff"),
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Some("docx"),
        _ => None,
    }
}

/// The key a converter is registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FormatPair {
    pub input: Format,
    pub output: Format,
}

impl FormatPair {
    pub fn new(input: Format, output: Format) -> Self {
        Self { input, output }
    }

    pub fn parse(input: &str, output: &str) -> Result<Self, DocshiftError> {
        Ok(Self::new(Format::parse(input)?, Format::parse(output)?))
    }
}

impl fmt::Display for FormatPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.input, self.output)
    }
}
