
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::{DocbaseError, Result};

/// Maximum accepted size for an uploaded file, in bytes.
pub const MAX_UPLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// File extensions the extractor understands, lowercase, without the dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "json", "csv"];

#[derive(Debug, Clone, Serialize)]
pub struct SupportedFormat {
    pub extension: String,
    pub name: String,
    pub max_size_mb: u64,
}

#[inline]
pub fn supported_formats() -> Vec<SupportedFormat> {
    let max_size_mb = MAX_UPLOAD_BYTES / (1024 * 1024);
    let names = [
        ("txt", "Plain Text"),
        ("md", "Markdown Document"),
        ("json", "JSON Data File"),
        ("csv", "CSV Spreadsheet"),
    ];

    names
        .iter()
        .map(|(extension, name)| SupportedFormat {
            extension: format!(".{extension}"),
            name: (*name).to_string(),
            max_size_mb,
        })
        .collect()
}

/// Detect the lowercase extension of `file_name` and check it is supported.
/// Missing or unsupported extensions are validation errors.
#[inline]
pub fn detect_extension(file_name: &str) -> Result<String> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_lowercase)
        .ok_or_else(|| {
            DocbaseError::Validation(format!(
                "cannot determine file extension for '{file_name}'"
            ))
        })?;

    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(DocbaseError::Validation(format!(
            "unsupported file format '.{extension}'; supported: {}",
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    Ok(extension)
}

/// Extract plain text from a file of the given (already validated) extension.
#[inline]
pub fn extract_text(path: &Path, extension: &str) -> Result<String> {
    let text = match extension {
        "txt" => read_file(path)?,
        "md" => extract_markdown(path)?,
        "json" => extract_json(path)?,
        "csv" => extract_csv(path)?,
        _ => {
            return Err(DocbaseError::Validation(format!(
                "no extractor available for '.{extension}'"
            )));
        }
    };

    debug!("Extracted {} chars from {}", text.chars().count(), path.display());
    Ok(text)
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        DocbaseError::Validation(format!("failed to read {}: {e}", path.display()))
    })
}

/// Strip heading markers, list bullets, and emphasis prefixes so the indexed
/// text is prose rather than markup.
fn extract_markdown(path: &Path) -> Result<String> {
    let content = read_file(path)?;

    let text = content
        .lines()
        .map(|line| {
            let trimmed =
                line.trim_start_matches(|c: char| c == '#' || c == ' ' || c == '-' || c == '*');
            trimmed.trim_start_matches('*').trim_start_matches('_')
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(text)
}

fn extract_json(path: &Path) -> Result<String> {
    let content = read_file(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| DocbaseError::Validation(format!("failed to parse JSON: {e}")))?;
    Ok(json_to_text(&value))
}

/// Flatten a JSON value into "key: value" lines, depth first.
fn json_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Object(obj) => obj
            .iter()
            .map(|(k, v)| format!("{k}: {}", json_to_text(v)))
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::Array(arr) => arr
            .iter()
            .map(json_to_text)
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Null => String::new(),
    }
}

/// Join CSV cells with a column separator so rows read as sentences.
fn extract_csv(path: &Path) -> Result<String> {
    let content = read_file(path)?;

    let text = content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            line.split(',')
                .map(str::trim)
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(text)
}
