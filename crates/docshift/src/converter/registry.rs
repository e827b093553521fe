use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::converter::{
    Converter, Passthrough, PdfToText, StatementToCsv, StatementToJson, TextToPdf,
};
use crate::error::{DocshiftError, Result};
use crate::format::{Format, FormatPair};

/// Maps format pairs to converters.
///
/// At most one converter per pair. Lookups take a shared lock, so concurrent
/// resolution never waits on another reader.
pub struct FormatRegistry {
    converters: RwLock<HashMap<FormatPair, Arc<dyn Converter>>>,
}

impl FormatRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            converters: RwLock::new(HashMap::new()),
        }
    }

    /// A registry holding the converters shipped with this crate.
    pub fn with_builtin_converters() -> Self {
        let registry = Self::new();
        let text_to_pdf: Arc<dyn Converter> = Arc::new(TextToPdf::new());
        let pdf_to_text: Arc<dyn Converter> = Arc::new(PdfToText::new());
        let statement_to_csv: Arc<dyn Converter> = Arc::new(StatementToCsv::new());
        let statement_to_json: Arc<dyn Converter> = Arc::new(StatementToJson::new());
        let passthrough: Arc<dyn Converter> = Arc::new(Passthrough::new());
        let builtin = [
            ("txt", "pdf", Arc::clone(&text_to_pdf)),
            ("md", "pdf", text_to_pdf),
            ("pdf", "txt", pdf_to_text),
            ("pdf", "csv", statement_to_csv),
            ("pdf", "json", statement_to_json),
            ("txt", "txt", Arc::clone(&passthrough)),
            ("pdf", "pdf", passthrough),
        ];

        for (input, output, converter) in builtin {
            if let Err(e) = registry.register(input, output, converter) {
                log::error!("Failed to register builtin converter {}->{}: {}", input, output, e);
            }
        }
        registry
    }

    /// Adds a converter. Fails with [`DocshiftError::Conflict`] when the pair
    /// is already taken.
    pub fn register(
        &self,
        input: &str,
        output: &str,
        converter: Arc<dyn Converter>,
    ) -> Result<()> {
        let pair = FormatPair::parse(input, output)?;
        let mut map = self.write_map();
        if map.contains_key(&pair) {
            return Err(DocshiftError::Conflict { pair });
        }
        log::debug!("Registered converter '{}' for {}", converter.name(), pair);
        map.insert(pair, converter);
        Ok(())
    }

    /// Adds or replaces a converter, returning the one it displaced.
    pub fn register_or_replace(
        &self,
        input: &str,
        output: &str,
        converter: Arc<dyn Converter>,
    ) -> Result<Option<Arc<dyn Converter>>> {
        let pair = FormatPair::parse(input, output)?;
        let previous = self.write_map().insert(pair.clone(), converter);
        if let Some(ref old) = previous {
            log::info!("Replaced converter '{}' for {}", old.name(), pair);
        }
        Ok(previous)
    }

    pub fn unregister(&self, input: &str, output: &str) -> Result<Option<Arc<dyn Converter>>> {
        let pair = FormatPair::parse(input, output)?;
        Ok(self.write_map().remove(&pair))
    }

    /// Looks up the converter for a pair.
    pub fn resolve(&self, input: &Format, output: &Format) -> Result<Arc<dyn Converter>> {
        let pair = FormatPair::new(input.clone(), output.clone());
        self.read_map()
            .get(&pair)
            .cloned()
            .ok_or(DocshiftError::UnsupportedFormat { pair })
    }

    pub fn supports(&self, input: &Format, output: &Format) -> bool {
        self.resolve(input, output).is_ok()
    }

    /// All registered pairs, sorted.
    pub fn pairs(&self) -> Vec<FormatPair> {
        let mut pairs: Vec<FormatPair> = self.read_map().keys().cloned().collect();
        pairs.sort();
        pairs
    }

    pub fn len(&self) -> usize {
        self.read_map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_map().is_empty()
    }

    fn read_map(&self) -> std::sync::RwLockReadGuard<'_, HashMap<FormatPair, Arc<dyn Converter>>> {
        self.converters.read().unwrap_or_else(|poisoned| {
            log::warn!("Format registry lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write_map(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<FormatPair, Arc<dyn Converter>>> {
        self.converters.write().unwrap_or_else(|poisoned| {
            log::warn!("Format registry lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}
