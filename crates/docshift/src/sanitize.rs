//! Helpers for untrusted file names and for data entering tracing spans.
//!
//! Declared upload names come straight from clients; nothing derived from
//! them may escape the storage roots. Span fields only ever carry the file
//! name component of a path.

use std::path::{Component, Path};

const MAX_NAME_LEN: usize = 200;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// True when `name` is a single plain path component: no separators, no
/// parent or root references, no NUL and no drive prefix.
pub fn is_safe_name(name: &str) -> bool {
    if name.is_empty() || name.contains('\0') || name.contains('/') || name.contains('\\') {
        return false;
    }
    if name.contains("..") {
        return false;
    }

    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Reduces a safe declared name to `[A-Za-z0-9._-]`, keeping the extension.
///
/// Callers validate with [`is_safe_name`] first; this only makes the name
/// pleasant on disk.
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    let mut result = if trimmed.is_empty() {
        "upload".to_string()
    } else {
        trimmed.to_string()
    };

    if result.len() > MAX_NAME_LEN {
        // keep the tail so the extension survives
        let cut = result.len() - MAX_NAME_LEN;
        result = result[cut..].to_string();
    }
    result
}

/// `report.final.pdf` -> `report.final`; names without a stem become `output`.
pub fn file_stem(name: &str) -> String {
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("output")
        .to_string()
}
