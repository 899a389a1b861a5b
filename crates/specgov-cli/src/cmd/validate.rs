use crate::output::print_json;
use specgov_core::validate;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let summary = validate::run(root)?;
    tracing::debug!(files = summary.files, "validation passed");
    if json {
        return print_json(&summary);
    }
    println!("OK: specs validation passed");
    Ok(())
}
