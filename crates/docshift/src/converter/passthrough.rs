use std::path::{Path, PathBuf};

use crate::converter::{ConvertOptions, Converter};
use crate::error::ConversionError;

/// Copies the input unchanged. Used for identity pairs such as `txt -> txt`.
pub struct Passthrough;

impl Passthrough {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Passthrough {
    fn default() -> Self {
        Self::new()
    }
}

impl Converter for Passthrough {
    fn name(&self) -> &str {
        "passthrough"
    }

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        _options: &ConvertOptions,
    ) -> Result<PathBuf, ConversionError> {
        if !input.is_file() {
            return Err(ConversionError::Read {
                path: input.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        std::fs::copy(input, output).map_err(|e| ConversionError::Write {
            path: output.to_path_buf(),
            source: e,
        })?;
        Ok(output.to_path_buf())
    }
}
