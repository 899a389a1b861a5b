use crate::error::{Result, SpecError};
use serde_json::Value;
use std::path::Path;

/// Requirement text from `--input`, or from a file. YAML files holding a
/// `requirements` list (or a bare list) are flattened into one entry per
/// paragraph; anything else is read as-is.
pub fn read_input(input: Option<&str>, file: Option<&Path>) -> Result<String> {
    if let Some(text) = input {
        return Ok(text.to_string());
    }
    let Some(path) = file else {
        return Err(SpecError::Configuration(
            "either --input or --file is required".to_string(),
        ));
    };
    if !path.is_file() {
        return Err(SpecError::Configuration(format!(
            "Input file not found: {}",
            path.display()
        )));
    }
    let text = std::fs::read_to_string(path)?;

    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    if !is_yaml {
        return Ok(text);
    }

    let doc: Value = serde_yaml::from_str(&text)?;
    match &doc {
        Value::Object(map) => match map.get("requirements") {
            Some(Value::Array(items)) => {
                let entries = items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => Ok(format!("- {s}")),
                        other => Ok(serde_yaml::to_string(other)?),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(entries.join("\n\n"))
            }
            _ => Ok(text),
        },
        Value::Array(items) => Ok(items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n\n")),
        _ => Ok(text),
    }
}
