pub mod passthrough;
pub mod pdf_text;
pub mod registry;
pub mod statement;
pub mod text_pdf;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

pub use passthrough::Passthrough;
pub use pdf_text::PdfToText;
pub use registry::FormatRegistry;
pub use statement::{StatementToCsv, StatementToJson, Transaction};
pub use text_pdf::TextToPdf;

/// Free-form converter options supplied with a submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConvertOptions(BTreeMap<String, String>);

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A unit of conversion work for one format pair.
///
/// Implementations read `input` without modifying it and write their result
/// to `output`, a scratch location owned by the caller. The returned path is
/// the file that was written.
pub trait Converter: Send + Sync {
    fn name(&self) -> &str;

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        options: &ConvertOptions,
    ) -> Result<PathBuf, ConversionError>;
}

pub(crate) fn read_input(path: &Path) -> Result<Vec<u8>, ConversionError> {
    std::fs::read(path).map_err(|e| ConversionError::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

pub(crate) fn write_output(path: &Path, content: &[u8]) -> Result<PathBuf, ConversionError> {
    std::fs::write(path, content).map_err(|e| ConversionError::Write {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(path.to_path_buf())
}
