//! Converters with scripted behavior for exercising failure paths.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use docshift::{ConversionError, ConvertOptions, Converter};

/// Always fails with a tool error and writes nothing.
pub struct FailingConverter;

impl Converter for FailingConverter {
    fn name(&self) -> &str {
        "always-fails"
    }

    fn convert(
        &self,
        _input: &Path,
        _output: &Path,
        _options: &ConvertOptions,
    ) -> Result<PathBuf, ConversionError> {
        Err(ConversionError::Tool("simulated converter crash".to_string()))
    }
}

/// Writes half an output file and then fails.
pub struct PartialWriteConverter;

impl Converter for PartialWriteConverter {
    fn name(&self) -> &str {
        "partial-write"
    }

    fn convert(
        &self,
        _input: &Path,
        output: &Path,
        _options: &ConvertOptions,
    ) -> Result<PathBuf, ConversionError> {
        std::fs::write(output, b"half a docu").map_err(|e| ConversionError::Write {
            path: output.to_path_buf(),
            source: e,
        })?;
        Err(ConversionError::Tool("disk full".to_string()))
    }
}

/// Copies the input after sleeping.
pub struct SlowConverter {
    pub delay: Duration,
}

impl SlowConverter {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Converter for SlowConverter {
    fn name(&self) -> &str {
        "slow"
    }

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        _options: &ConvertOptions,
    ) -> Result<PathBuf, ConversionError> {
        std::thread::sleep(self.delay);
        std::fs::copy(input, output).map_err(|e| ConversionError::Write {
            path: output.to_path_buf(),
            source: e,
        })?;
        Ok(output.to_path_buf())
    }
}

pub struct PanickingConverter;

impl Converter for PanickingConverter {
    fn name(&self) -> &str {
        "panics"
    }

    fn convert(
        &self,
        _input: &Path,
        _output: &Path,
        _options: &ConvertOptions,
    ) -> Result<PathBuf, ConversionError> {
        panic!("converter blew up");
    }
}

/// Reports success without writing anything.
pub struct SilentConverter;

impl Converter for SilentConverter {
    fn name(&self) -> &str {
        "silent"
    }

    fn convert(
        &self,
        _input: &Path,
        output: &Path,
        _options: &ConvertOptions,
    ) -> Result<PathBuf, ConversionError> {
        Ok(output.to_path_buf())
    }
}

/// Upper-cases text input and counts its invocations.
#[derive(Default)]
pub struct UppercaseConverter {
    pub calls: Arc<AtomicUsize>,
}

impl Converter for UppercaseConverter {
    fn name(&self) -> &str {
        "uppercase"
    }

    fn convert(
        &self,
        input: &Path,
        output: &Path,
        options: &ConvertOptions,
    ) -> Result<PathBuf, ConversionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let text = std::fs::read_to_string(input).map_err(|e| ConversionError::Read {
            path: input.to_path_buf(),
            source: e,
        })?;
        let suffix = options.get("suffix").unwrap_or("");
        std::fs::write(output, format!("{}{}", text.to_uppercase(), suffix)).map_err(|e| {
            ConversionError::Write {
                path: output.to_path_buf(),
                source: e,
            }
        })?;
        Ok(output.to_path_buf())
    }
}
