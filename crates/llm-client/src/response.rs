use crate::error::LlmError;
use crate::Result;
use serde_json::Value;

/// Parse a model answer as a JSON object.
///
/// Models asked for bare JSON sometimes wrap it in a ``` fence anyway; the
/// fence line and the closing fence are stripped before parsing.
pub fn extract_json(text: &str) -> Result<Value> {
    let mut body = text.trim();
    if body.starts_with("```") {
        if let Some(first_nl) = body.find('\n') {
            if let Some(last_fence) = body.rfind("```") {
                if last_fence > first_nl {
                    body = body[first_nl + 1..last_fence].trim();
                }
            }
        }
    }
    serde_json::from_str(body).map_err(|source| LlmError::Parse {
        text: body.chars().take(200).collect(),
        source,
    })
}
