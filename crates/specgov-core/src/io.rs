use crate::error::{Result, SpecError};
use crate::paths;
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Prevents partial writes from corrupting spec files.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

pub fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_yaml::to_string(value)?;
    atomic_write(path, data.as_bytes())
}

/// Load a YAML document as JSON-model data. An empty document loads as an
/// empty mapping.
pub fn load_yaml_value(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value = serde_yaml::from_str(&text)?;
    Ok(match value {
        Value::Null => Value::Object(Default::default()),
        other => other,
    })
}

/// Like [`load_yaml_value`], prefixing parse errors with the file that
/// failed so fail-fast messages point at it.
pub fn load_spec_document(root: &Path, path: &Path) -> Result<Value> {
    load_yaml_value(path).map_err(|e| match e {
        SpecError::Yaml(err) => SpecError::SchemaViolation(format!(
            "{}\n  - <root>: not valid YAML: {err}",
            paths::rel(root, path)
        )),
        other => other,
    })
}

pub fn load_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

/// Append `section` to a text file, inserting a newline first when the
/// existing content does not end with one.
pub fn append_section(path: &Path, section: &str) -> Result<()> {
    let mut content = if path.exists() {
        std::fs::read_to_string(path)?
    } else {
        String::new()
    };
    if !content.ends_with('\n') {
        content.push('\n');
    }
    content.push_str(section);
    atomic_write(path, content.as_bytes())
}
